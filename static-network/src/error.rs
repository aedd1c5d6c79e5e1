use crate::topology::NodeKind;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;

/// Validation failures raised while declaring or compiling a topology
///
/// None of these are transient: the caller must fix its input and rebuild the model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("invalid network node id `{node_id}`: {reason}")]
    InvalidNodeId { node_id: Arc<str>, reason: String },
    #[error("network node `{node_id}` was declared more than once")]
    DuplicateNode { node_id: Arc<str> },
    #[error("network node `{node_id}` was referenced but does not exist")]
    UnknownNode { node_id: Arc<str> },
    #[error("invalid link between `{source_id}` and `{target_id}`: {reason}")]
    InvalidLink {
        source_id: Arc<str>,
        target_id: Arc<str>,
        reason: String,
    },
    #[error(
        "address {address} of `{node_id}:{interface}` is already assigned to `{existing_node_id}:{existing_interface}`"
    )]
    AddressConflict {
        address: Ipv4Addr,
        node_id: Arc<str>,
        interface: String,
        existing_node_id: Arc<str>,
        existing_interface: String,
    },
    #[error("invalid interface `{interface}` on network node `{node_id}`: {reason}")]
    InvalidInterface {
        node_id: Arc<str>,
        interface: String,
        reason: String,
    },
    #[error("invalid cidr `{input}`: {reason}")]
    InvalidCidr { input: String, reason: String },
    #[error("invalid route `{route}` on network node `{node_id}`: {reason}")]
    InvalidRoute {
        node_id: Arc<str>,
        route: String,
        reason: String,
    },
    #[error("network node `{node_id}` is a {kind} and cannot forward ip traffic")]
    InvalidForwarding { node_id: Arc<str>, kind: NodeKind },
    #[error(
        "the address plan references network node `{node_id}`, which is missing from the topology or has another kind there"
    )]
    IncompleteTopology { node_id: Arc<str> },
}
