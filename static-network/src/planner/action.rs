use crate::topology::ip::Ipv4Cidr;
use crate::topology::route::RouteIntent;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// One unit of configuration work on a single node
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisioningAction {
    /// Assign an address to one of the node's interfaces
    SetInterfaceAddress {
        node_id: Arc<str>,
        interface: String,
        address: Ipv4Cidr,
    },
    /// Let the node forward IP traffic between its interfaces
    EnableForwarding { node_id: Arc<str> },
    /// Stop forwarding IP traffic (only used when tearing a topology down)
    DisableForwarding { node_id: Arc<str> },
    /// Insert a static route into the node's routing table
    AddRoute {
        node_id: Arc<str>,
        route: RouteIntent,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    SetInterfaceAddress,
    EnableForwarding,
    DisableForwarding,
    AddRoute,
}

impl Display for ActionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::SetInterfaceAddress => "SetInterfaceAddress",
            ActionKind::EnableForwarding => "EnableForwarding",
            ActionKind::DisableForwarding => "DisableForwarding",
            ActionKind::AddRoute => "AddRoute",
        };
        f.write_str(name)
    }
}

impl ProvisioningAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ProvisioningAction::SetInterfaceAddress { .. } => ActionKind::SetInterfaceAddress,
            ProvisioningAction::EnableForwarding { .. } => ActionKind::EnableForwarding,
            ProvisioningAction::DisableForwarding { .. } => ActionKind::DisableForwarding,
            ProvisioningAction::AddRoute { .. } => ActionKind::AddRoute,
        }
    }

    /// The node the action must be executed on
    pub fn target(&self) -> &Arc<str> {
        match self {
            ProvisioningAction::SetInterfaceAddress { node_id, .. }
            | ProvisioningAction::EnableForwarding { node_id }
            | ProvisioningAction::DisableForwarding { node_id }
            | ProvisioningAction::AddRoute { node_id, .. } => node_id,
        }
    }

    /// The action's parameters as plain strings, sorted by name
    pub fn params(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        match self {
            ProvisioningAction::SetInterfaceAddress {
                interface, address, ..
            } => {
                params.insert("interface", interface.clone());
                params.insert("address", address.to_string());
            }
            ProvisioningAction::EnableForwarding { .. } => {
                params.insert("ip_forward", "1".to_string());
            }
            ProvisioningAction::DisableForwarding { .. } => {
                params.insert("ip_forward", "0".to_string());
            }
            ProvisioningAction::AddRoute { route, .. } => {
                let destination = match route.destination() {
                    None => "default".to_string(),
                    Some(destination) => destination.to_string(),
                };
                params.insert("destination", destination);
                params.insert("gateway", route.gateway().to_string());
                if let Some(device) = route.device() {
                    params.insert("device", device.to_string());
                }
            }
        }

        params
    }
}

impl Display for ProvisioningAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisioningAction::SetInterfaceAddress {
                node_id,
                interface,
                address,
            } => write!(f, "set address {address} on {node_id}:{interface}"),
            ProvisioningAction::EnableForwarding { node_id } => {
                write!(f, "enable forwarding on {node_id}")
            }
            ProvisioningAction::DisableForwarding { node_id } => {
                write!(f, "disable forwarding on {node_id}")
            }
            ProvisioningAction::AddRoute { node_id, route } => {
                write!(f, "add route `{route}` on {node_id}")
            }
        }
    }
}

#[derive(Serialize)]
struct ProvisioningActionJson<'a> {
    kind: ActionKind,
    target: &'a str,
    params: BTreeMap<&'static str, String>,
}

impl Serialize for ProvisioningAction {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ProvisioningActionJson {
            kind: self.kind(),
            target: self.target(),
            params: self.params(),
        }
        .serialize(serializer)
    }
}
