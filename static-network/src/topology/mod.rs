//! Declarative static topology
//!
//! Nodes and links are declared once, up front. Every declaration is validated eagerly, so a
//! model that was built without errors is always well formed. Traversal follows insertion order,
//! which keeps everything derived from the model reproducible.

pub mod ip;
pub mod route;

use crate::error::TopologyError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Host,
    Switch,
    Router,
}

impl NodeKind {
    /// Whether nodes of this kind take part in IP (i.e. own addressable interfaces)
    pub fn is_ip_node(self) -> bool {
        match self {
            NodeKind::Host | NodeKind::Router => true,
            NodeKind::Switch => false,
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeKind::Host => "host",
            NodeKind::Switch => "switch",
            NodeKind::Router => "router",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Node {
    #[serde(with = "crate::util::serde_arc_str")]
    id: Arc<str>,
    kind: NodeKind,
    interfaces: Vec<Interface>,
}

impl Node {
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Interfaces created by links, in the order they were declared
    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    // Interfaces are named `<node>-eth<N>`, using the lowest free index
    fn next_interface_name(&self) -> String {
        let mut index = 0;
        loop {
            let name = format!("{}-eth{index}", self.id);
            if self.interface(&name).is_none() {
                return name;
            }

            index += 1;
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Interface {
    name: String,
    link: LinkId,
}

impl Interface {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The link this interface terminates
    pub fn link(&self) -> LinkId {
        self.link
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LinkId(usize);

impl Display for LinkId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Link {
    id: LinkId,
    endpoints: [LinkEndpoint; 2],
    /// `None` means the link is not shaped
    bandwidth_mbps: Option<u32>,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn endpoints(&self) -> &[LinkEndpoint; 2] {
        &self.endpoints
    }

    pub fn bandwidth_mbps(&self) -> Option<u32> {
        self.bandwidth_mbps
    }

    pub fn connects(&self, node_id: &str) -> bool {
        self.endpoints.iter().any(|e| &*e.node_id == node_id)
    }

    /// The endpoint on the opposite side of `node_id`, if the link touches that node
    pub fn peer_of(&self, node_id: &str) -> Option<&LinkEndpoint> {
        match &self.endpoints {
            [a, b] if &*a.node_id == node_id => Some(b),
            [a, b] if &*b.node_id == node_id => Some(a),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct LinkEndpoint {
    #[serde(with = "crate::util::serde_arc_str")]
    node_id: Arc<str>,
    /// Switches are opaque L2 elements, so their side of a link has no interface
    interface: Option<String>,
}

impl LinkEndpoint {
    pub fn node_id(&self) -> &Arc<str> {
        &self.node_id
    }

    pub fn interface(&self) -> Option<&str> {
        self.interface.as_deref()
    }
}

impl Display for LinkEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.interface {
            Some(interface) => f.write_str(interface),
            None => f.write_str(&self.node_id),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LinkOptions {
    pub bandwidth_mbps: Option<u32>,
    /// Interface name on the source node (generated when absent)
    pub source_interface: Option<String>,
    /// Interface name on the target node (generated when absent)
    pub target_interface: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TopologyModel {
    nodes: Vec<Node>,
    #[serde(skip)]
    node_indices: HashMap<Arc<str>, usize>,
    links: Vec<Link>,
}

impl TopologyModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: &str, kind: NodeKind) -> Result<&Node, TopologyError> {
        if let Err(reason) = validate_name(id) {
            return Err(TopologyError::InvalidNodeId {
                node_id: id.into(),
                reason: reason.to_string(),
            });
        }
        if self.node_indices.contains_key(id) {
            return Err(TopologyError::DuplicateNode { node_id: id.into() });
        }

        let id: Arc<str> = id.into();
        debug!(node_id = %id, %kind, "adding node");

        let index = self.nodes.len();
        self.node_indices.insert(id.clone(), index);
        self.nodes.push(Node {
            id,
            kind,
            interfaces: Vec::new(),
        });

        Ok(&self.nodes[index])
    }

    pub fn add_link(
        &mut self,
        source: &str,
        target: &str,
        bandwidth_mbps: Option<u32>,
    ) -> Result<&Link, TopologyError> {
        self.add_link_with(
            source,
            target,
            LinkOptions {
                bandwidth_mbps,
                ..LinkOptions::default()
            },
        )
    }

    pub fn add_link_with(
        &mut self,
        source: &str,
        target: &str,
        options: LinkOptions,
    ) -> Result<&Link, TopologyError> {
        let source_index = self.node_index(source)?;
        let target_index = self.node_index(target)?;

        let invalid_link = |reason: &str| TopologyError::InvalidLink {
            source_id: source.into(),
            target_id: target.into(),
            reason: reason.to_string(),
        };
        if source_index == target_index {
            return Err(invalid_link("a node cannot be linked to itself"));
        }
        if options.bandwidth_mbps == Some(0) {
            return Err(invalid_link("the bandwidth must be at least 1 Mbps"));
        }

        // Resolve both sides before touching the model, so a failure leaves it unchanged
        let source_interface =
            self.endpoint_interface(source_index, options.source_interface)?;
        let target_interface =
            self.endpoint_interface(target_index, options.target_interface)?;

        let id = LinkId(self.links.len());
        for (index, interface) in [
            (source_index, &source_interface),
            (target_index, &target_interface),
        ] {
            if let Some(name) = interface {
                self.nodes[index].interfaces.push(Interface {
                    name: name.clone(),
                    link: id,
                });
            }
        }

        debug!(
            %id,
            from = source_interface.as_deref().unwrap_or(source),
            to = target_interface.as_deref().unwrap_or(target),
            bandwidth_mbps = options.bandwidth_mbps,
            "adding link"
        );

        self.links.push(Link {
            id,
            endpoints: [
                LinkEndpoint {
                    node_id: self.nodes[source_index].id.clone(),
                    interface: source_interface,
                },
                LinkEndpoint {
                    node_id: self.nodes[target_index].id.clone(),
                    interface: target_interface,
                },
            ],
            bandwidth_mbps: options.bandwidth_mbps,
        });

        Ok(&self.links[id.0])
    }

    fn endpoint_interface(
        &self,
        node_index: usize,
        requested: Option<String>,
    ) -> Result<Option<String>, TopologyError> {
        let node = &self.nodes[node_index];
        let invalid_interface = |interface: String, reason: &str| TopologyError::InvalidInterface {
            node_id: node.id.clone(),
            interface,
            reason: reason.to_string(),
        };

        let name = match (node.kind.is_ip_node(), requested) {
            (false, None) => return Ok(None),
            (false, Some(name)) => {
                return Err(invalid_interface(name, "switches do not own interfaces"));
            }
            (true, None) => return Ok(Some(node.next_interface_name())),
            (true, Some(name)) => name,
        };

        if let Err(reason) = validate_name(&name) {
            return Err(invalid_interface(name, reason));
        }
        if node.interface(&name).is_some() {
            return Err(invalid_interface(
                name,
                "the interface is already attached to a link",
            ));
        }

        Ok(Some(name))
    }

    fn node_index(&self, id: &str) -> Result<usize, TopologyError> {
        self.node_indices
            .get(id)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode { node_id: id.into() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_indices.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Result<&Node, TopologyError> {
        Ok(&self.nodes[self.node_index(id)?])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    /// Links touching the node, in the order they were declared
    pub fn links_of<'a>(
        &'a self,
        id: &'a str,
    ) -> Result<impl Iterator<Item = &'a Link> + 'a, TopologyError> {
        self.node_index(id)?;
        Ok(self.links.iter().filter(move |l| l.connects(id)))
    }

    /// Nodes directly connected to the node, each listed once, in order of their first link
    pub fn neighbors(&self, id: &str) -> Result<Vec<&Node>, TopologyError> {
        let mut neighbors: Vec<&Node> = Vec::new();
        for link in self.links_of(id)? {
            let Some(peer) = link.peer_of(id) else {
                continue;
            };

            if neighbors.iter().all(|n| n.id != peer.node_id) {
                neighbors.push(self.node(&peer.node_id)?);
            }
        }

        Ok(neighbors)
    }

    /// Which peer each interface of every host and router is plugged into
    pub fn connections(&self) -> Vec<NodeConnections> {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_ip_node())
            .map(|node| NodeConnections {
                node_id: node.id.clone(),
                connections: node
                    .interfaces
                    .iter()
                    .filter_map(|interface| {
                        let peer = self.link(interface.link).peer_of(&node.id)?;
                        Some((interface.name.clone(), peer.to_string()))
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Checks that the name can be handed to `ip` as a namespace or interface name
///
/// Node ids obey the same rules, since interface names are derived from them.
pub(crate) fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("names cannot be empty");
    }
    if name.chars().any(|c| c.is_whitespace() || c == '/' || c == ':') {
        return Err("names cannot contain whitespace, `/` or `:`");
    }

    Ok(())
}

/// The interfaces of a node and the peers they are connected to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeConnections {
    pub node_id: Arc<str>,
    pub connections: Vec<(String, String)>,
}

impl Display for NodeConnections {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.node_id)?;
        for (interface, peer) in &self.connections {
            write!(f, " {interface}:{peer}")?;
        }

        Ok(())
    }
}
