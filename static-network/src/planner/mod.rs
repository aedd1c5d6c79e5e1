//! Compilation of a topology and its address plan into an ordered list of provisioning actions

pub mod action;
mod command;

use crate::address_plan::AddressPlan;
use crate::error::TopologyError;
use crate::planner::action::{ActionKind, ProvisioningAction};
use crate::topology::TopologyModel;
use serde::Serialize;
use tracing::info;

/// The ordered actions that realize a topology's addressing and routing
///
/// Addresses come first, then forwarding flags, then routes: a route's gateway has to be
/// reachable through an address that is already configured.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProvisioningPlan {
    actions: Vec<ProvisioningAction>,
}

impl ProvisioningPlan {
    pub fn actions(&self) -> &[ProvisioningAction] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions.iter().filter(|a| a.kind() == kind).count()
    }

    /// The actions that undo the forwarding flags of this plan, latest node first
    ///
    /// Addresses and routes go away together with the emulated nodes.
    pub fn teardown(&self) -> Vec<ProvisioningAction> {
        self.actions
            .iter()
            .rev()
            .filter_map(|action| match action {
                ProvisioningAction::EnableForwarding { node_id } => {
                    Some(ProvisioningAction::DisableForwarding {
                        node_id: node_id.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a ProvisioningPlan {
    type Item = &'a ProvisioningAction;
    type IntoIter = std::slice::Iter<'a, ProvisioningAction>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

/// Compiles the address plan against `topology`
///
/// This is a pure function: it has no side effects and compiling the same inputs twice yields
/// the same plan. It fails without producing any action if the plan references a node that is
/// missing from `topology`, or that has another kind there.
pub fn compile(
    topology: &TopologyModel,
    plan: &AddressPlan<'_>,
) -> Result<ProvisioningPlan, TopologyError> {
    for node_id in plan.referenced_nodes() {
        let planned_kind = plan.topology().node(node_id).ok().map(|n| n.kind());
        let actual_kind = topology.node(node_id).ok().map(|n| n.kind());
        if actual_kind.is_none() || actual_kind != planned_kind {
            return Err(TopologyError::IncompleteTopology {
                node_id: node_id.clone(),
            });
        }
    }

    let mut actions = Vec::new();

    for node in topology.nodes() {
        for (interface, address) in plan.addresses_of(node.id()) {
            actions.push(ProvisioningAction::SetInterfaceAddress {
                node_id: node.id().clone(),
                interface: interface.to_string(),
                address,
            });
        }
    }

    for node in topology.nodes() {
        if plan.is_forwarding(node.id()) {
            actions.push(ProvisioningAction::EnableForwarding {
                node_id: node.id().clone(),
            });
        }
    }

    for node in topology.nodes() {
        for route in plan.routes(node.id()) {
            actions.push(ProvisioningAction::AddRoute {
                node_id: node.id().clone(),
                route: route.clone(),
            });
        }
    }

    let plan = ProvisioningPlan { actions };
    info!(
        actions = plan.len(),
        addresses = plan.count(ActionKind::SetInterfaceAddress),
        forwarding = plan.count(ActionKind::EnableForwarding),
        routes = plan.count(ActionKind::AddRoute),
        "compiled provisioning plan"
    );

    Ok(plan)
}

/// Compiles the address plan against the topology it was declared for
pub fn compile_plan(plan: &AddressPlan<'_>) -> Result<ProvisioningPlan, TopologyError> {
    compile(plan.topology(), plan)
}
