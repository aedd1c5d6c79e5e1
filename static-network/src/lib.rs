pub mod adapter;
pub mod address_plan;
pub mod checks;
pub mod error;
pub mod planner;
pub mod topology;
mod util;

pub use address_plan::AddressPlan;
pub use error::TopologyError;
pub use planner::action::{ActionKind, ProvisioningAction};
pub use planner::{ProvisioningPlan, compile, compile_plan};
pub use topology::ip::Ipv4Cidr;
pub use topology::route::RouteIntent;
pub use topology::{LinkOptions, NodeKind, TopologyModel};

#[cfg(test)]
mod test {
    use super::*;
    use crate::adapter::{EmulatorAdapter, provision};
    use crate::checks::ping_checks;
    use bon::builder;
    use fastrand::Rng;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const BANDWIDTH_10_MBPS: u32 = 10;

    /// Two end hosts behind two hosts acting as routers: h1 - pc1 - pc2 - h2
    #[builder]
    fn router_topology(bandwidth_mbps: Option<u32>) -> TopologyModel {
        let mut topology = TopologyModel::new();
        for host in ["h1", "h2", "pc1", "pc2"] {
            topology.add_node(host, NodeKind::Host).unwrap();
        }

        topology.add_link("h1", "pc1", bandwidth_mbps).unwrap();
        topology.add_link("h2", "pc2", bandwidth_mbps).unwrap();
        topology.add_link("pc1", "pc2", bandwidth_mbps).unwrap();
        topology
    }

    /// Three hosts hanging off a chain of switches: h1 - s1 - s2 - s3 - h3, with h2 on s2
    fn linear_topology() -> TopologyModel {
        let mut topology = TopologyModel::new();
        for switch in ["s1", "s2", "s3"] {
            topology.add_node(switch, NodeKind::Switch).unwrap();
        }
        for host in ["h1", "h2", "h3"] {
            topology.add_node(host, NodeKind::Host).unwrap();
        }

        for (a, b) in [
            ("s1", "s2"),
            ("s2", "s3"),
            ("h1", "s1"),
            ("h2", "s2"),
            ("h3", "s3"),
        ] {
            topology.add_link(a, b, Some(BANDWIDTH_10_MBPS)).unwrap();
        }

        topology
    }

    fn router_plan(topology: &TopologyModel) -> AddressPlan<'_> {
        let mut plan = AddressPlan::new(topology);
        plan.assign("h1", "h1-eth0", "10.0.1.100/24").unwrap();
        plan.assign("h2", "h2-eth0", "10.0.2.100/24").unwrap();
        plan.assign("pc1", "pc1-eth1", "10.0.4.1/24").unwrap();
        plan.assign("pc2", "pc2-eth1", "10.0.4.2/24").unwrap();
        plan.set_forwarding("pc1", true).unwrap();
        plan.set_forwarding("pc2", true).unwrap();
        plan.set_route_str("pc1", "10.0.2.0/24 via 10.0.4.2")
            .unwrap();
        plan
    }

    #[test]
    fn test_single_host_behind_switch() {
        let mut topology = TopologyModel::new();
        topology.add_node("h1", NodeKind::Host).unwrap();
        topology.add_node("s1", NodeKind::Switch).unwrap();
        let link = topology.add_link("h1", "s1", Some(10)).unwrap();
        assert_eq!(link.bandwidth_mbps(), Some(10));
        assert_eq!(link.endpoints()[0].interface(), Some("h1-eth0"));
        assert_eq!(link.endpoints()[1].interface(), None);

        let mut plan = AddressPlan::new(&topology);
        plan.assign("h1", "h1-eth0", "10.0.0.1/24").unwrap();

        let compiled = compile(&topology, &plan).unwrap();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled.count(ActionKind::SetInterfaceAddress), 1);
        assert_eq!(compiled.count(ActionKind::AddRoute), 0);
        assert_eq!(compiled.count(ActionKind::EnableForwarding), 0);
        assert_eq!(
            compiled.actions()[0],
            ProvisioningAction::SetInterfaceAddress {
                node_id: "h1".into(),
                interface: "h1-eth0".to_string(),
                address: "10.0.0.1/24".parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_router_plan_orders_addresses_forwarding_routes() {
        let topology = router_topology().bandwidth_mbps(BANDWIDTH_10_MBPS).call();
        let plan = router_plan(&topology);
        let compiled = compile_plan(&plan).unwrap();

        let kinds: Vec<_> = compiled.actions().iter().map(|a| a.kind()).collect();
        assert_eq!(
            kinds,
            [
                ActionKind::SetInterfaceAddress,
                ActionKind::SetInterfaceAddress,
                ActionKind::SetInterfaceAddress,
                ActionKind::SetInterfaceAddress,
                ActionKind::EnableForwarding,
                ActionKind::EnableForwarding,
                ActionKind::AddRoute,
            ]
        );

        let targets: Vec<&str> = compiled.actions().iter().map(|a| &**a.target()).collect();
        assert_eq!(targets, ["h1", "h2", "pc1", "pc2", "pc1", "pc2", "pc1"]);

        let commands: Vec<String> = compiled
            .actions()
            .iter()
            .map(|a| a.shell_command().join(" "))
            .collect();
        assert_eq!(commands[2], "ip addr add 10.0.4.1/24 dev pc1-eth1");
        assert_eq!(commands[6], "ip route add 10.0.2.0/24 via 10.0.4.2");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let topology = router_topology().call();
        let plan = router_plan(&topology);

        let first = compile(&topology, &plan).unwrap();
        let second = compile(&topology, &plan).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn test_compile_is_deterministic_for_random_topologies() {
        for seed in 0..20 {
            let mut rng = Rng::with_seed(seed);
            let topology = random_topology(&mut rng);
            let plan = random_plan(&topology, &mut rng);

            let first = serde_json::to_string(&compile(&topology, &plan).unwrap()).unwrap();
            let second = serde_json::to_string(&compile(&topology, &plan).unwrap()).unwrap();
            assert_eq!(first, second, "seed {seed}");

            // A structurally identical model compiles to the same plan
            let cloned = topology.clone();
            let third = serde_json::to_string(&compile(&cloned, &plan).unwrap()).unwrap();
            assert_eq!(first, third, "seed {seed}");
        }
    }

    fn random_topology(rng: &mut Rng) -> TopologyModel {
        let mut topology = TopologyModel::new();
        let node_count = rng.usize(2..12);
        for i in 0..node_count {
            let kind = match rng.u8(0..3) {
                0 => NodeKind::Host,
                1 => NodeKind::Router,
                _ => NodeKind::Switch,
            };
            topology.add_node(&format!("n{i}"), kind).unwrap();
        }

        for _ in 0..rng.usize(1..2 * node_count) {
            let a = rng.usize(0..node_count);
            let b = rng.usize(0..node_count);
            if a == b {
                continue;
            }

            let bandwidth = rng.bool().then(|| rng.u32(1..1000));
            topology
                .add_link(&format!("n{a}"), &format!("n{b}"), bandwidth)
                .unwrap();
        }

        topology
    }

    fn random_plan<'a>(topology: &'a TopologyModel, rng: &mut Rng) -> AddressPlan<'a> {
        let mut plan = AddressPlan::new(topology);
        let mut next_host = 1u32;
        for node in topology.nodes().filter(|n| n.kind().is_ip_node()) {
            for interface in node.interfaces() {
                if rng.bool() {
                    let address = Ipv4Addr::from_bits(0x0a00_0000 + next_host);
                    next_host += 1;
                    plan.assign(node.id(), interface.name(), &format!("{address}/24"))
                        .unwrap();
                }
            }

            if rng.bool() {
                plan.set_forwarding(node.id(), true).unwrap();
            }

            for _ in 0..rng.usize(0..3) {
                let gateway = Ipv4Addr::new(10, 0, 0, rng.u8(1..255));
                plan.set_route(node.id(), RouteIntent::default_via(gateway))
                    .unwrap();
            }
        }

        plan
    }

    #[test]
    fn test_duplicate_address_is_rejected() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("h1", "h1-eth0", "10.0.1.100/24").unwrap();

        let err = plan.assign("h2", "h2-eth0", "10.0.1.100/16").unwrap_err();
        assert_eq!(
            err,
            TopologyError::AddressConflict {
                address: Ipv4Addr::new(10, 0, 1, 100),
                node_id: "h2".into(),
                interface: "h2-eth0".to_string(),
                existing_node_id: "h1".into(),
                existing_interface: "h1-eth0".to_string(),
            }
        );

        // Another interface of the same node conflicts too
        let err = plan.assign("h1", "lo1", "10.0.1.100/32").unwrap_err();
        assert!(matches!(err, TopologyError::AddressConflict { .. }));

        // Repeating an assignment is harmless
        plan.assign("h1", "h1-eth0", "10.0.1.100/24").unwrap();
    }

    #[test]
    fn test_reassigning_an_interface_releases_its_address() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("h1", "h1-eth0", "10.0.1.100/24").unwrap();
        plan.assign("h1", "h1-eth0", "10.0.1.101/24").unwrap();

        assert_eq!(
            plan.address_of("h1", "h1-eth0"),
            Some("10.0.1.101/24".parse().unwrap())
        );
        plan.assign("h2", "h2-eth0", "10.0.1.100/24").unwrap();

        let compiled = compile_plan(&plan).unwrap();
        assert_eq!(compiled.count(ActionKind::SetInterfaceAddress), 2);
    }

    #[test]
    fn test_malformed_cidr_is_rejected() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        for cidr in ["10.0.0.1/33", "10.0.0", "h1", "10.0.0.1/24/1"] {
            let err = plan.assign("h1", "h1-eth0", cidr).unwrap_err();
            assert!(matches!(err, TopologyError::InvalidCidr { .. }), "{cidr}");
        }
    }

    #[test]
    fn test_self_link_is_rejected() {
        let mut topology = TopologyModel::new();
        for kind in [NodeKind::Host, NodeKind::Switch, NodeKind::Router] {
            let id = format!("{kind}1");
            topology.add_node(&id, kind).unwrap();
            let err = topology.add_link(&id, &id, None).unwrap_err();
            assert!(matches!(err, TopologyError::InvalidLink { .. }), "{kind}");
        }

        assert_eq!(topology.links().count(), 0);
        assert!(topology.nodes().all(|n| n.interfaces().is_empty()));
    }

    #[test]
    fn test_zero_bandwidth_link_is_rejected() {
        let mut topology = TopologyModel::new();
        topology.add_node("h1", NodeKind::Host).unwrap();
        topology.add_node("s1", NodeKind::Switch).unwrap();

        let err = topology.add_link("h1", "s1", Some(0)).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidLink { .. }));
    }

    #[test]
    fn test_duplicate_and_unknown_nodes_are_rejected() {
        let mut topology = TopologyModel::new();
        topology.add_node("h1", NodeKind::Host).unwrap();

        let err = topology.add_node("h1", NodeKind::Switch).unwrap_err();
        assert_eq!(err, TopologyError::DuplicateNode { node_id: "h1".into() });

        let err = topology.add_link("h1", "s9", None).unwrap_err();
        assert_eq!(err, TopologyError::UnknownNode { node_id: "s9".into() });

        let mut plan = AddressPlan::new(&topology);
        let err = plan.assign("h9", "h9-eth0", "10.0.0.1/24").unwrap_err();
        assert_eq!(err, TopologyError::UnknownNode { node_id: "h9".into() });
    }

    #[test]
    fn test_switch_cannot_be_addressed() {
        let topology = linear_topology();
        let mut plan = AddressPlan::new(&topology);

        for interface in ["s1-eth0", "s1-eth1", "eth0"] {
            let err = plan.assign("s1", interface, "10.0.0.254/24").unwrap_err();
            assert!(
                matches!(err, TopologyError::InvalidInterface { .. }),
                "{interface}"
            );
        }

        let err = plan.set_forwarding("s1", true).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidForwarding { .. }));

        let err = plan
            .set_route_str("s1", "default via 10.0.0.1")
            .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidRoute { .. }));

        assert!(compile_plan(&plan).unwrap().is_empty());
    }

    #[test]
    fn test_route_via_unknown_interface_is_rejected() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("h1", "h1-eth0", "10.0.1.100/24").unwrap();

        let err = plan
            .set_route_str("h1", "default via 10.0.1.1 dev h1-eth1")
            .unwrap_err();
        assert_eq!(
            err,
            TopologyError::InvalidRoute {
                node_id: "h1".into(),
                route: "default via 10.0.1.1 dev h1-eth1".to_string(),
                reason: "interface `h1-eth1` does not exist on the node".to_string(),
            }
        );

        // The interface of another node does not count either
        let route = RouteIntent::default_via(Ipv4Addr::new(10, 0, 1, 1)).dev("pc1-eth0");
        let err = plan.set_route("h1", route).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidRoute { .. }));

        plan.set_route_str("h1", "default via 10.0.1.1 dev h1-eth0")
            .unwrap();
        assert_eq!(plan.routes("h1").len(), 1);
    }

    #[test]
    fn test_malformed_routes_are_rejected() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);

        for route in [
            "default",
            "10.0.3.0/24 via",
            "10.0.3.0/24 via 10.0.4",
            "10.0.3.1/24 via 10.0.4.2",
            "default via 0.0.0.0",
            "default via 255.255.255.255",
            "default via 224.0.0.1",
        ] {
            let err = plan.set_route_str("pc1", route).unwrap_err();
            assert!(matches!(err, TopologyError::InvalidRoute { .. }), "{route}");
        }

        assert!(plan.routes("pc1").is_empty());
    }

    #[test]
    fn test_unattached_interface_can_be_addressed_and_routed_through() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("pc1", "lo1", "192.168.0.1/32").unwrap();
        plan.assign("pc1", "pc1-eth0", "10.0.1.1/24").unwrap();
        plan.set_route_str("pc1", "192.168.1.0/24 via 10.0.1.100 dev lo1")
            .unwrap();

        assert_eq!(
            plan.interfaces("pc1").unwrap(),
            ["pc1-eth0", "pc1-eth1", "lo1"]
        );

        let compiled = compile_plan(&plan).unwrap();
        let interfaces: Vec<String> = compiled
            .actions()
            .iter()
            .filter_map(|a| a.params().get("interface").cloned())
            .collect();
        assert_eq!(interfaces, ["pc1-eth0", "lo1"]);
    }

    #[test]
    fn test_compile_against_other_topology_is_incomplete() {
        let full = router_topology().call();
        let plan = router_plan(&full);

        let mut partial = TopologyModel::new();
        partial.add_node("h1", NodeKind::Host).unwrap();
        partial.add_node("h2", NodeKind::Host).unwrap();

        let err = compile(&partial, &plan).unwrap_err();
        assert_eq!(
            err,
            TopologyError::IncompleteTopology {
                node_id: "pc1".into()
            }
        );
    }

    #[test]
    fn test_compile_against_topology_with_other_node_kinds_is_incomplete() {
        let full = router_topology().call();
        let plan = router_plan(&full);

        // Same ids, but pc2 is a switch here
        let mut other = TopologyModel::new();
        for (id, kind) in [
            ("h1", NodeKind::Host),
            ("h2", NodeKind::Host),
            ("pc1", NodeKind::Host),
            ("pc2", NodeKind::Switch),
        ] {
            other.add_node(id, kind).unwrap();
        }

        let err = compile(&other, &plan).unwrap_err();
        assert_eq!(
            err,
            TopologyError::IncompleteTopology {
                node_id: "pc2".into()
            }
        );
    }

    #[test]
    fn test_node_ids_must_be_usable_as_names() {
        let mut topology = TopologyModel::new();
        for id in ["", "edge host", "edge/host", "edge:host", "h1\t"] {
            let err = topology.add_node(id, NodeKind::Host).unwrap_err();
            assert!(matches!(err, TopologyError::InvalidNodeId { .. }), "{id:?}");
        }
        assert_eq!(topology.nodes().count(), 0);

        // Every generated interface name is addressable
        topology.add_node("edge-host", NodeKind::Host).unwrap();
        topology.add_node("s1", NodeKind::Switch).unwrap();
        topology.add_link("edge-host", "s1", None).unwrap();

        let mut plan = AddressPlan::new(&topology);
        plan.assign("edge-host", "edge-host-eth0", "10.0.0.1/24")
            .unwrap();
    }

    #[test]
    fn test_unusable_interface_names_are_rejected() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        for interface in ["", "h1 eth9", "h1/eth9", "h1:eth9"] {
            let err = plan.assign("h1", interface, "10.0.1.100/24").unwrap_err();
            assert!(
                matches!(err, TopologyError::InvalidInterface { .. }),
                "{interface:?}"
            );
        }
        assert_eq!(plan.interfaces("h1").unwrap(), ["h1-eth0"]);

        let mut topology = router_topology().call();
        for (source_interface, target_interface) in [
            (Some(""), None),
            (None, Some("")),
            (Some("h1 eth9"), None),
            (None, Some("pc2\teth9")),
        ] {
            let err = topology
                .add_link_with(
                    "h1",
                    "pc2",
                    LinkOptions {
                        source_interface: source_interface.map(str::to_string),
                        target_interface: target_interface.map(str::to_string),
                        ..LinkOptions::default()
                    },
                )
                .unwrap_err();
            assert!(matches!(err, TopologyError::InvalidInterface { .. }));
        }
        assert_eq!(topology.links().count(), 3);
    }

    #[test]
    fn test_catch_all_subnet_route() {
        let topology = router_topology().call();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("pc1", "pc1-eth1", "10.0.4.1/24").unwrap();
        plan.set_route_str("pc1", "0.0.0.0/0 via 10.0.4.2").unwrap();

        let compiled = compile_plan(&plan).unwrap();
        assert_eq!(
            compiled.actions()[1].shell_command().join(" "),
            "ip route add 0.0.0.0/0 via 10.0.4.2"
        );

        // A catch-all prefix is not a valid interface address
        let err = plan.assign("pc2", "pc2-eth1", "10.0.4.2/0").unwrap_err();
        assert!(matches!(err, TopologyError::InvalidCidr { .. }));
    }

    #[test]
    fn test_interfaces_are_named_after_their_node() {
        let mut topology = router_topology().call();
        let pc1 = topology.node("pc1").unwrap();
        let names: Vec<&str> = pc1.interfaces().iter().map(|i| i.name()).collect();
        assert_eq!(names, ["pc1-eth0", "pc1-eth1"]);

        topology
            .add_link_with(
                "pc1",
                "h2",
                LinkOptions {
                    source_interface: Some("pc1-eth2".to_string()),
                    ..LinkOptions::default()
                },
            )
            .unwrap();

        // Generated names skip the ones that were chosen explicitly
        let link = topology.add_link("h1", "pc1", None).unwrap();
        assert_eq!(link.endpoints()[0].interface(), Some("h1-eth1"));
        assert_eq!(link.endpoints()[1].interface(), Some("pc1-eth3"));

        let err = topology
            .add_link_with(
                "h1",
                "pc2",
                LinkOptions {
                    target_interface: Some("pc2-eth0".to_string()),
                    ..LinkOptions::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidInterface { .. }));
        assert_eq!(topology.node("h1").unwrap().interfaces().len(), 2);
    }

    #[test]
    fn test_switch_endpoints_cannot_be_named() {
        let mut topology = linear_topology();
        let err = topology
            .add_link_with(
                "h1",
                "s3",
                LinkOptions {
                    target_interface: Some("s3-eth9".to_string()),
                    ..LinkOptions::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, TopologyError::InvalidInterface { .. }));
        assert_eq!(topology.links().count(), 5);
    }

    #[test]
    fn test_traversal_follows_declaration_order() {
        let mut topology = linear_topology();
        // A parallel link is kept as a separate link but not as a separate neighbor
        topology.add_link("s2", "h2", None).unwrap();

        let neighbors: Vec<&str> = topology
            .neighbors("s2")
            .unwrap()
            .into_iter()
            .map(|n| &**n.id())
            .collect();
        assert_eq!(neighbors, ["s1", "s3", "h2"]);
        assert_eq!(topology.links_of("s2").unwrap().count(), 4);
        assert_eq!(topology.links_of("h2").unwrap().count(), 2);

        let ids: Vec<&Arc<str>> = topology.nodes().map(|n| n.id()).collect();
        assert_eq!(ids.len(), 6);
        assert_eq!(&**ids[3], "h1");

        assert!(matches!(
            topology.neighbors("s9"),
            Err(TopologyError::UnknownNode { .. })
        ));
    }

    #[test]
    fn test_connections_list_peer_of_each_interface() {
        let topology = router_topology().call();
        let connections: Vec<String> = topology
            .connections()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            connections,
            [
                "h1 h1-eth0:pc1-eth0",
                "h2 h2-eth0:pc2-eth0",
                "pc1 pc1-eth0:h1-eth0 pc1-eth1:pc2-eth1",
                "pc2 pc2-eth0:h2-eth0 pc2-eth1:pc1-eth1",
            ]
        );

        let connections: Vec<String> = linear_topology()
            .connections()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(connections, ["h1 h1-eth0:s1", "h2 h2-eth0:s2", "h3 h3-eth0:s3"]);
    }

    #[test]
    fn test_ping_checks_cover_every_pair_of_end_hosts() {
        let topology = linear_topology();
        let mut plan = AddressPlan::new(&topology);
        plan.assign("h1", "h1-eth0", "10.0.0.1/24").unwrap();
        plan.assign("h2", "h2-eth0", "10.0.0.2/24").unwrap();
        plan.assign("h3", "h3-eth0", "10.0.0.3/24").unwrap();

        let checks: Vec<String> = ping_checks(&plan).iter().map(|c| c.to_string()).collect();
        assert_eq!(
            checks,
            [
                "h1 -> h2 (10.0.0.2)",
                "h1 -> h3 (10.0.0.3)",
                "h2 -> h3 (10.0.0.3)",
            ]
        );

        // Forwarding hosts are not checked
        let topology = router_topology().call();
        let plan = router_plan(&topology);
        let checks: Vec<String> = ping_checks(&plan).iter().map(|c| c.to_string()).collect();
        assert_eq!(checks, ["h1 -> h2 (10.0.2.100)"]);
    }

    #[test]
    fn test_teardown_disables_forwarding_in_reverse_order() {
        let topology = router_topology().call();
        let compiled = compile_plan(&router_plan(&topology)).unwrap();

        assert_eq!(
            compiled.teardown(),
            [
                ProvisioningAction::DisableForwarding {
                    node_id: "pc2".into()
                },
                ProvisioningAction::DisableForwarding {
                    node_id: "pc1".into()
                },
            ]
        );
    }

    #[test]
    fn test_plan_serializes_kind_target_and_params() {
        let topology = router_topology().call();
        let compiled = compile_plan(&router_plan(&topology)).unwrap();

        let json = serde_json::to_value(&compiled).unwrap();
        assert_eq!(
            json[6],
            serde_json::json!({
                "kind": "AddRoute",
                "target": "pc1",
                "params": {
                    "destination": "10.0.2.0/24",
                    "gateway": "10.0.4.2",
                }
            })
        );
        assert_eq!(json[4]["params"]["ip_forward"], "1");
    }

    #[derive(Default)]
    struct RecordingAdapter {
        executed: Vec<String>,
        fail_at: Option<usize>,
    }

    #[derive(thiserror::Error, Debug)]
    #[error("the emulated node rejected the command")]
    struct CommandRejected;

    impl EmulatorAdapter for RecordingAdapter {
        type Error = CommandRejected;

        async fn execute(&mut self, action: &ProvisioningAction) -> Result<(), Self::Error> {
            if self.fail_at == Some(self.executed.len()) {
                return Err(CommandRejected);
            }

            self.executed.push(format!(
                "{}: {}",
                action.target(),
                action.shell_command().join(" ")
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_provision_executes_actions_in_order() {
        let topology = router_topology().call();
        let compiled = compile_plan(&router_plan(&topology)).unwrap();

        let mut adapter = RecordingAdapter::default();
        let executed = provision(&compiled, &mut adapter).await.unwrap();
        assert_eq!(executed, 7);
        assert_eq!(
            adapter.executed,
            [
                "h1: ip addr add 10.0.1.100/24 dev h1-eth0",
                "h2: ip addr add 10.0.2.100/24 dev h2-eth0",
                "pc1: ip addr add 10.0.4.1/24 dev pc1-eth1",
                "pc2: ip addr add 10.0.4.2/24 dev pc2-eth1",
                "pc1: sysctl -w net.ipv4.ip_forward=1",
                "pc2: sysctl -w net.ipv4.ip_forward=1",
                "pc1: ip route add 10.0.2.0/24 via 10.0.4.2",
            ]
        );
    }

    #[tokio::test]
    async fn test_provision_stops_at_first_adapter_failure() {
        let topology = router_topology().call();
        let compiled = compile_plan(&router_plan(&topology)).unwrap();

        let mut adapter = RecordingAdapter {
            fail_at: Some(4),
            ..RecordingAdapter::default()
        };
        let err = provision(&compiled, &mut adapter).await.unwrap_err();
        assert_eq!(err.step, 4);
        assert_eq!(err.action, compiled.actions()[4]);
        assert_eq!(
            err.to_string(),
            "provisioning step 4 failed (enable forwarding on pc1)"
        );
        assert_eq!(adapter.executed.len(), 4);
    }
}
