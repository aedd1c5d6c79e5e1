//! Shell commands that realize planned steps on a node running the Linux networking stack

use crate::checks::PingCheck;
use crate::planner::action::ProvisioningAction;

const IP_FORWARD_SYSCTL: &str = "net.ipv4.ip_forward";

impl ProvisioningAction {
    /// The argv of the command that performs this action on its target node
    pub fn shell_command(&self) -> Vec<String> {
        match self {
            ProvisioningAction::SetInterfaceAddress {
                interface, address, ..
            } => argv(["ip", "addr", "add", &address.to_string(), "dev", interface]),
            ProvisioningAction::EnableForwarding { .. } => {
                argv(["sysctl", "-w", &format!("{IP_FORWARD_SYSCTL}=1")])
            }
            ProvisioningAction::DisableForwarding { .. } => {
                argv(["sysctl", "-w", &format!("{IP_FORWARD_SYSCTL}=0")])
            }
            ProvisioningAction::AddRoute { route, .. } => {
                let route = route.to_string();
                let mut command = argv(["ip", "route", "add"]);
                command.extend(route.split_whitespace().map(str::to_string));
                command
            }
        }
    }
}

impl PingCheck {
    /// The argv of the command that sends the echo requests from the source node
    pub fn shell_command(&self) -> Vec<String> {
        argv([
            "ping",
            "-c",
            &self.count.to_string(),
            &self.address.to_string(),
        ])
    }
}

fn argv<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::topology::route::RouteIntent;
    use std::net::Ipv4Addr;

    #[test]
    fn test_shell_commands_match_iproute2_syntax() {
        let set_address = ProvisioningAction::SetInterfaceAddress {
            node_id: "pc1".into(),
            interface: "pc1-eth2".to_string(),
            address: "10.0.4.1/24".parse().unwrap(),
        };
        assert_eq!(
            set_address.shell_command().join(" "),
            "ip addr add 10.0.4.1/24 dev pc1-eth2"
        );

        let forwarding = ProvisioningAction::EnableForwarding {
            node_id: "pc1".into(),
        };
        assert_eq!(
            forwarding.shell_command().join(" "),
            "sysctl -w net.ipv4.ip_forward=1"
        );

        let add_route = ProvisioningAction::AddRoute {
            node_id: "h1".into(),
            route: RouteIntent::default_via(Ipv4Addr::new(10, 0, 0, 2)).dev("h1-eth0"),
        };
        assert_eq!(
            add_route.shell_command(),
            [
                "ip", "route", "add", "default", "via", "10.0.0.2", "dev", "h1-eth0"
            ]
        );
    }

    #[test]
    fn test_ping_command() {
        let check = PingCheck {
            source: "h1".into(),
            destination: "h3".into(),
            address: Ipv4Addr::new(10, 0, 0, 3),
            count: 3,
        };
        assert_eq!(check.shell_command().join(" "), "ping -c 3 10.0.0.3");
    }
}
