use static_network::checks::PingCheck;
use static_network::{ActionKind, NodeKind, ProvisioningAction, ProvisioningPlan, TopologyModel};

pub fn print_topology_summary(topology: &TopologyModel) {
    println!("--- Topology ---");
    let count = |kind: NodeKind| topology.nodes().filter(|n| n.kind() == kind).count();
    println!(
        "* Nodes: {} ({} hosts, {} switches, {} routers)",
        topology.nodes().count(),
        count(NodeKind::Host),
        count(NodeKind::Switch),
        count(NodeKind::Router),
    );

    println!("* Links: {}", topology.links().count());
    for link in topology.links() {
        let [a, b] = link.endpoints();
        match link.bandwidth_mbps() {
            Some(bandwidth) => println!("  * {}: {a} <-> {b} ({bandwidth} Mbps)", link.id()),
            None => println!("  * {}: {a} <-> {b} (unshaped)", link.id()),
        }
    }
}

pub fn print_plan_summary(plan: &ProvisioningPlan) {
    println!("--- Provisioning plan ---");
    println!(
        "* {} actions ({} addresses, {} forwarding flags, {} routes)",
        plan.len(),
        plan.count(ActionKind::SetInterfaceAddress),
        plan.count(ActionKind::EnableForwarding),
        plan.count(ActionKind::AddRoute),
    );
    print_actions(plan.actions());
}

pub fn print_actions(actions: &[ProvisioningAction]) {
    for (i, action) in actions.iter().enumerate() {
        println!(
            "  {}. [{}] {}",
            i + 1,
            action.target(),
            action.shell_command().join(" ")
        );
    }
}

pub fn print_ping_checks(checks: &[PingCheck]) {
    println!("--- Ping checks ---");
    if checks.is_empty() {
        println!("* No pair of addressed end hosts to check");
    }
    for check in checks {
        println!("* {check}");
    }
}

pub fn print_connections(topology: &TopologyModel) {
    println!("--- Connections ---");
    for connections in topology.connections() {
        println!("{connections}");
    }
}
