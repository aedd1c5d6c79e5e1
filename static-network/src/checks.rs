//! Connectivity checks to run once a topology has been provisioned

use crate::address_plan::AddressPlan;
use crate::topology::NodeKind;
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Number of echo requests sent by each check
pub const PING_COUNT: u32 = 3;

/// A ping from one end host to another
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingCheck {
    pub source: Arc<str>,
    pub destination: Arc<str>,
    /// The first address of the destination node
    pub address: Ipv4Addr,
    pub count: u32,
}

impl Display for PingCheck {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.source, self.destination, self.address
        )
    }
}

/// One check per pair of addressed end hosts, from the host declared first to the other one
///
/// Routers and forwarding hosts are left out.
pub fn ping_checks(plan: &AddressPlan<'_>) -> Vec<PingCheck> {
    let endpoints: Vec<(&Arc<str>, Ipv4Addr)> = plan
        .topology()
        .nodes()
        .filter(|n| n.kind() == NodeKind::Host && !plan.is_forwarding(n.id()))
        .filter_map(|n| {
            let (_, first_address) = plan.addresses_of(n.id()).into_iter().next()?;
            Some((n.id(), first_address.address()))
        })
        .collect();

    let mut checks = Vec::new();
    for (i, (source, _)) in endpoints.iter().enumerate() {
        for (destination, address) in &endpoints[i + 1..] {
            checks.push(PingCheck {
                source: (*source).clone(),
                destination: (*destination).clone(),
                address: *address,
                count: PING_COUNT,
            });
        }
    }

    checks
}
