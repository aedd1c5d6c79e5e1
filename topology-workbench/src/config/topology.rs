use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};
use static_network::topology::LinkOptions;
use static_network::{AddressPlan, Ipv4Cidr, NodeKind, RouteIntent, TopologyError, TopologyModel};

#[derive(Deserialize, Clone)]
pub struct TopologyJson {
    nodes: Vec<TopologyNodeJson>,
    #[serde(default)]
    links: Vec<TopologyLinkJson>,
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct TopologyNodeJson {
    id: String,
    #[serde(rename = "type")]
    #[serde(default = "default_node_kind")]
    kind: TopologyNodeKindJson,
    /// Whether the node should forward IP traffic between its interfaces
    #[serde(default)]
    forwarding: bool,
    #[serde(default)]
    interfaces: Vec<TopologyInterfaceJson>,
    /// Routes in `ip route` syntax, e.g. `default via 10.0.1.1 dev h1-eth0`
    #[serde(default)]
    #[serde_as(as = "Vec<DisplayFromStr>")]
    routes: Vec<RouteIntent>,
}

fn default_node_kind() -> TopologyNodeKindJson {
    TopologyNodeKindJson::Host
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "camelCase")]
enum TopologyNodeKindJson {
    Host,
    Switch,
    Router,
}

impl From<TopologyNodeKindJson> for NodeKind {
    fn from(kind: TopologyNodeKindJson) -> Self {
        match kind {
            TopologyNodeKindJson::Host => NodeKind::Host,
            TopologyNodeKindJson::Switch => NodeKind::Switch,
            TopologyNodeKindJson::Router => NodeKind::Router,
        }
    }
}

#[serde_as]
#[derive(Deserialize, Clone)]
struct TopologyInterfaceJson {
    name: String,
    #[serde_as(as = "DisplayFromStr")]
    address: Ipv4Cidr,
}

#[derive(Deserialize, Clone)]
struct TopologyLinkJson {
    source: String,
    target: String,
    /// The link's bandwidth, in megabits per second (unshaped when absent)
    #[serde(default)]
    bandwidth_mbps: Option<u32>,
    /// Name of the interface on the source node (generated when absent)
    #[serde(default)]
    source_interface: Option<String>,
    /// Name of the interface on the target node (generated when absent)
    #[serde(default)]
    target_interface: Option<String>,
}

impl TopologyJson {
    /// Declares the nodes first and the links afterwards, both in file order
    pub fn model(&self) -> Result<TopologyModel, TopologyError> {
        let mut topology = TopologyModel::new();
        for node in &self.nodes {
            topology.add_node(&node.id, node.kind.into())?;
        }

        for link in &self.links {
            topology.add_link_with(
                &link.source,
                &link.target,
                LinkOptions {
                    bandwidth_mbps: link.bandwidth_mbps,
                    source_interface: link.source_interface.clone(),
                    target_interface: link.target_interface.clone(),
                },
            )?;
        }

        Ok(topology)
    }

    /// The addresses, forwarding flags and routes of every node, declared against `topology`
    ///
    /// Addresses go first, so routes may refer to interfaces that only exist in the plan.
    pub fn address_plan<'a>(
        &self,
        topology: &'a TopologyModel,
    ) -> Result<AddressPlan<'a>, TopologyError> {
        let mut plan = AddressPlan::new(topology);
        for node in &self.nodes {
            for interface in &node.interfaces {
                plan.assign_cidr(&node.id, &interface.name, interface.address)?;
            }
        }

        for node in &self.nodes {
            if node.forwarding {
                plan.set_forwarding(&node.id, true)?;
            }

            for route in &node.routes {
                plan.set_route(&node.id, route.clone())?;
            }
        }

        Ok(plan)
    }
}
