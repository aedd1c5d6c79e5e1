use crate::topology::ip::{Ipv4Cidr, parse_ipv4};
use anyhow::{Context, anyhow, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A static route a node should have once provisioned
///
/// The textual form follows `ip route add` syntax: `default via 10.0.0.2 dev h1-eth0` or
/// `10.0.3.0/24 via 10.0.4.2`, where `dev` is optional in both cases.
#[derive(Clone, Debug, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum RouteIntent {
    Default {
        gateway: Ipv4Addr,
        device: Option<String>,
    },
    Subnet {
        destination: Ipv4Cidr,
        gateway: Ipv4Addr,
        device: Option<String>,
    },
}

impl RouteIntent {
    pub fn default_via(gateway: Ipv4Addr) -> Self {
        RouteIntent::Default {
            gateway,
            device: None,
        }
    }

    pub fn subnet_via(destination: Ipv4Cidr, gateway: Ipv4Addr) -> Self {
        RouteIntent::Subnet {
            destination,
            gateway,
            device: None,
        }
    }

    /// Restricts the route to the provided interface
    pub fn dev(mut self, name: impl Into<String>) -> Self {
        match &mut self {
            RouteIntent::Default { device, .. } | RouteIntent::Subnet { device, .. } => {
                *device = Some(name.into());
            }
        }
        self
    }

    pub fn gateway(&self) -> Ipv4Addr {
        match self {
            RouteIntent::Default { gateway, .. } | RouteIntent::Subnet { gateway, .. } => *gateway,
        }
    }

    pub fn device(&self) -> Option<&str> {
        match self {
            RouteIntent::Default { device, .. } | RouteIntent::Subnet { device, .. } => {
                device.as_deref()
            }
        }
    }

    /// The destination subnet, or `None` for a default route
    pub fn destination(&self) -> Option<Ipv4Cidr> {
        match self {
            RouteIntent::Default { .. } => None,
            RouteIntent::Subnet { destination, .. } => Some(*destination),
        }
    }
}

impl Display for RouteIntent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.destination() {
            None => write!(f, "default")?,
            Some(destination) => write!(f, "{destination}")?,
        }

        write!(f, " via {}", self.gateway())?;

        if let Some(device) = self.device() {
            write!(f, " dev {device}")?;
        }

        Ok(())
    }
}

impl FromStr for RouteIntent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        let destination = match parts.next().ok_or(anyhow!("empty route"))? {
            "default" => None,
            subnet => Some(
                subnet
                    .parse::<Ipv4Cidr>()
                    .context("invalid destination subnet")?,
            ),
        };

        if parts.next() != Some("via") {
            bail!("expected `via` after the route destination");
        }

        let gateway = parse_ipv4(parts.next().ok_or(anyhow!("missing gateway address"))?)
            .context("invalid gateway")?;

        let device = match parts.next() {
            None => None,
            Some("dev") => Some(
                parts
                    .next()
                    .ok_or(anyhow!("missing interface name after `dev`"))?
                    .to_string(),
            ),
            Some(other) => bail!("unexpected token `{other}` after the gateway"),
        };

        if parts.next().is_some() {
            bail!("route contains trailing characters");
        }

        Ok(match destination {
            None => RouteIntent::Default { gateway, device },
            Some(destination) => RouteIntent::Subnet {
                destination,
                gateway,
                device,
            },
        })
    }
}

#[test]
fn test_parse_route_intent() {
    let route: RouteIntent = "default via 10.0.0.2 dev h1-eth0".parse().unwrap();
    assert_eq!(route.destination(), None);
    assert_eq!(route.gateway(), Ipv4Addr::new(10, 0, 0, 2));
    assert_eq!(route.device(), Some("h1-eth0"));
    assert_eq!(route.to_string(), "default via 10.0.0.2 dev h1-eth0");

    let route: RouteIntent = "10.0.3.0/24   via 10.0.4.2".parse().unwrap();
    assert_eq!(route.destination().unwrap().to_string(), "10.0.3.0/24");
    assert_eq!(route.device(), None);
    assert_eq!(route.to_string(), "10.0.3.0/24 via 10.0.4.2");
}

#[test]
fn test_parse_route_intent_rejects_malformed_input() {
    for input in [
        "",
        "default",
        "default 10.0.0.1",
        "default via",
        "default via 10.0.0.256",
        "default via 10.0.0.1 dev",
        "default via 10.0.0.1 through eth0",
        "default via 10.0.0.1 dev eth0 metric 10",
        "10.0.3.0/40 via 10.0.4.2",
        "default via fe80::1",
    ] {
        assert!(input.parse::<RouteIntent>().is_err(), "{input}");
    }
}
