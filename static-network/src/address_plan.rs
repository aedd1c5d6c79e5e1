//! Addressing and routing intent for the nodes of a [`TopologyModel`]

use crate::error::TopologyError;
use crate::topology::ip::Ipv4Cidr;
use crate::topology::route::RouteIntent;
use crate::topology::{Node, TopologyModel, validate_name};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

/// Everything that must be configured on the nodes of a topology, validated as it is declared
///
/// The plan borrows the topology it was created for, so the topology cannot change once planning
/// has started.
pub struct AddressPlan<'a> {
    topology: &'a TopologyModel,
    /// Per-node plans, in the order the nodes were first referenced
    node_plans: Vec<NodePlan>,
    node_plan_indices: HashMap<Arc<str>, usize>,
    /// Which interface currently holds each assigned address
    assigned: HashMap<Ipv4Addr, (Arc<str>, String)>,
}

struct NodePlan {
    node_id: Arc<str>,
    /// Interfaces declared through the plan that are not attached to any link
    unattached_interfaces: Vec<String>,
    addresses: HashMap<String, Ipv4Cidr>,
    forwarding: bool,
    routes: Vec<RouteIntent>,
}

impl NodePlan {
    fn new(node_id: Arc<str>) -> Self {
        Self {
            node_id,
            unattached_interfaces: Vec::new(),
            addresses: HashMap::new(),
            forwarding: false,
            routes: Vec::new(),
        }
    }
}

impl<'a> AddressPlan<'a> {
    pub fn new(topology: &'a TopologyModel) -> Self {
        Self {
            topology,
            node_plans: Vec::new(),
            node_plan_indices: HashMap::new(),
            assigned: HashMap::new(),
        }
    }

    pub fn topology(&self) -> &'a TopologyModel {
        self.topology
    }

    /// Assigns an address in CIDR notation (e.g. `10.0.0.1/24`) to an interface of a node
    pub fn assign(
        &mut self,
        node_id: &str,
        interface: &str,
        cidr: &str,
    ) -> Result<(), TopologyError> {
        let cidr: Ipv4Cidr = cidr.parse().map_err(|e| TopologyError::InvalidCidr {
            input: cidr.to_string(),
            reason: format!("{e:#}"),
        })?;

        self.assign_cidr(node_id, interface, cidr)
    }

    /// Assigns an address to an interface of a node
    ///
    /// Hosts and routers may own interfaces that are not attached to any link (they are declared
    /// on first use). Assigning to an interface that already has an address replaces it.
    pub fn assign_cidr(
        &mut self,
        node_id: &str,
        interface: &str,
        cidr: Ipv4Cidr,
    ) -> Result<(), TopologyError> {
        let node = self.topology.node(node_id)?;
        let invalid_interface = |reason: &str| TopologyError::InvalidInterface {
            node_id: node.id().clone(),
            interface: interface.to_string(),
            reason: reason.to_string(),
        };

        if !node.kind().is_ip_node() {
            return Err(invalid_interface("switches do not own addressable interfaces"));
        }
        if let Err(reason) = validate_name(interface) {
            return Err(invalid_interface(reason));
        }
        if cidr.network_prefix() == 0 {
            return Err(TopologyError::InvalidCidr {
                input: cidr.to_string(),
                reason: "an interface address needs a prefix of at least /1".to_string(),
            });
        }

        if let Some((existing_node_id, existing_interface)) = self.assigned.get(&cidr.address()) {
            if **existing_node_id != *node_id || existing_interface != interface {
                return Err(TopologyError::AddressConflict {
                    address: cidr.address(),
                    node_id: node.id().clone(),
                    interface: interface.to_string(),
                    existing_node_id: existing_node_id.clone(),
                    existing_interface: existing_interface.clone(),
                });
            }
        }

        let node_plan = self.node_plan_mut(node);
        if node.interface(interface).is_none()
            && !node_plan.unattached_interfaces.iter().any(|i| i == interface)
        {
            debug!(node_id, interface, "declaring unattached interface");
            node_plan.unattached_interfaces.push(interface.to_string());
        }

        let replaced = node_plan.addresses.insert(interface.to_string(), cidr);
        if let Some(replaced) = replaced {
            if replaced.address() != cidr.address() {
                debug!(node_id, interface, %replaced, "releasing replaced address");
                self.assigned.remove(&replaced.address());
            }
        }

        debug!(node_id, interface, %cidr, "assigning address");
        self.assigned
            .insert(cidr.address(), (node.id().clone(), interface.to_string()));

        Ok(())
    }

    /// Records whether the node should forward IP traffic between its interfaces
    pub fn set_forwarding(&mut self, node_id: &str, enabled: bool) -> Result<(), TopologyError> {
        let node = self.topology.node(node_id)?;
        if enabled && !node.kind().is_ip_node() {
            return Err(TopologyError::InvalidForwarding {
                node_id: node.id().clone(),
                kind: node.kind(),
            });
        }

        debug!(node_id, enabled, "setting forwarding flag");
        self.node_plan_mut(node).forwarding = enabled;
        Ok(())
    }

    /// Parses a route in `ip route` syntax and adds it to the node
    pub fn set_route_str(&mut self, node_id: &str, route: &str) -> Result<(), TopologyError> {
        let node = self.topology.node(node_id)?;
        let route: RouteIntent = route.parse().map_err(|e| TopologyError::InvalidRoute {
            node_id: node.id().clone(),
            route: route.to_string(),
            reason: format!("{e:#}"),
        })?;

        self.set_route(node_id, route)
    }

    /// Adds a route to the node, after the routes declared before it
    ///
    /// Only the route's shape is validated. Whether the gateway is actually reachable is up to
    /// the network once it is provisioned.
    pub fn set_route(&mut self, node_id: &str, route: RouteIntent) -> Result<(), TopologyError> {
        let node = self.topology.node(node_id)?;
        let invalid_route = |reason: String| TopologyError::InvalidRoute {
            node_id: node.id().clone(),
            route: route.to_string(),
            reason,
        };

        if !node.kind().is_ip_node() {
            return Err(invalid_route(
                "switches do not hold routing tables".to_string(),
            ));
        }

        if let Some(device) = route.device() {
            if !self.has_interface(node, device) {
                return Err(invalid_route(format!(
                    "interface `{device}` does not exist on the node"
                )));
            }
        }

        if let Some(destination) = route.destination() {
            if !destination.is_network_address() {
                return Err(invalid_route(format!(
                    "the destination has host bits set (did you mean {}/{}?)",
                    destination.network(),
                    destination.network_prefix()
                )));
            }
        }

        let gateway = route.gateway();
        if gateway.is_unspecified() || gateway.is_broadcast() || gateway.is_multicast() {
            return Err(invalid_route(format!(
                "{gateway} is not a unicast gateway address"
            )));
        }

        debug!(node_id, %route, "adding route");
        self.node_plan_mut(node).routes.push(route);
        Ok(())
    }

    fn node_plan_mut(&mut self, node: &Node) -> &mut NodePlan {
        let index = match self.node_plan_indices.get(node.id()) {
            Some(&index) => index,
            None => {
                let index = self.node_plans.len();
                self.node_plans.push(NodePlan::new(node.id().clone()));
                self.node_plan_indices.insert(node.id().clone(), index);
                index
            }
        };

        &mut self.node_plans[index]
    }

    fn node_plan(&self, node_id: &str) -> Option<&NodePlan> {
        self.node_plan_indices
            .get(node_id)
            .map(|&index| &self.node_plans[index])
    }

    fn has_interface(&self, node: &Node, name: &str) -> bool {
        node.interface(name).is_some()
            || self
                .node_plan(node.id())
                .is_some_and(|p| p.unattached_interfaces.iter().any(|i| i == name))
    }

    /// All interfaces of the node: those created by links first, then those declared through
    /// the plan, each group in declaration order
    pub fn interfaces(&self, node_id: &str) -> Result<Vec<&str>, TopologyError> {
        let node = self.topology.node(node_id)?;
        let mut interfaces: Vec<&str> = node.interfaces().iter().map(|i| i.name()).collect();
        if let Some(plan) = self.node_plan(node_id) {
            interfaces.extend(plan.unattached_interfaces.iter().map(String::as_str));
        }

        Ok(interfaces)
    }

    pub fn address_of(&self, node_id: &str, interface: &str) -> Option<Ipv4Cidr> {
        self.node_plan(node_id)?.addresses.get(interface).copied()
    }

    /// The addressed interfaces of the node, in interface declaration order
    pub fn addresses_of(&self, node_id: &str) -> Vec<(&str, Ipv4Cidr)> {
        let Some(plan) = self.node_plan(node_id) else {
            return Vec::new();
        };

        self.interfaces(node_id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|interface| Some((interface, *plan.addresses.get(interface)?)))
            .collect()
    }

    pub fn is_forwarding(&self, node_id: &str) -> bool {
        self.node_plan(node_id).is_some_and(|p| p.forwarding)
    }

    /// The routes of the node, in declaration order
    pub fn routes(&self, node_id: &str) -> &[RouteIntent] {
        self.node_plan(node_id)
            .map(|p| p.routes.as_slice())
            .unwrap_or_default()
    }

    /// Ids of every node the plan holds addresses, flags or routes for
    pub fn referenced_nodes(&self) -> impl Iterator<Item = &Arc<str>> {
        self.node_plans.iter().map(|p| &p.node_id)
    }
}
