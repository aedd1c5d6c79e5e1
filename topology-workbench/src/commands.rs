use crate::config::cli::PlanOpt;
use crate::netns::NetnsAdapter;
use crate::util::{
    print_actions, print_connections, print_ping_checks, print_plan_summary,
    print_topology_summary,
};
use anyhow::{Context, bail};
use serde::Serialize;
use static_network::adapter::provision;
use static_network::checks::ping_checks;
use static_network::{
    AddressPlan, ProvisioningAction, ProvisioningPlan, TopologyModel, compile_plan,
};
use std::fs;
use tracing::debug;

#[derive(Serialize)]
struct PlanJson<'a> {
    topology: &'a TopologyModel,
    actions: &'a ProvisioningPlan,
    teardown: Vec<ProvisioningAction>,
}

pub fn plan(plan: &AddressPlan<'_>, options: &PlanOpt) -> anyhow::Result<()> {
    println!("* Plan output path: {}", options.plan_output.display());

    let topology = plan.topology();
    print_topology_summary(topology);

    let compiled = compile_plan(plan).context("failed to compile the provisioning plan")?;
    print_plan_summary(&compiled);

    let teardown = compiled.teardown();
    println!("--- Teardown ---");
    println!("* {} actions", teardown.len());
    print_actions(&teardown);

    print_ping_checks(&ping_checks(plan));

    println!("--- Plan output ---");
    let json = serde_json::to_vec_pretty(&PlanJson {
        topology,
        actions: &compiled,
        teardown,
    })
    .context("failed to serialize the provisioning plan")?;
    fs::write(&options.plan_output, json).context("failed to store the provisioning plan")?;
    println!("* Plan available at {}", options.plan_output.display());

    Ok(())
}

pub fn connections(topology: &TopologyModel) {
    print_connections(topology);
}

pub async fn apply(
    plan: &AddressPlan<'_>,
    adapter: &mut NetnsAdapter,
    ping: bool,
) -> anyhow::Result<()> {
    let compiled = compile_plan(plan).context("failed to compile the provisioning plan")?;

    println!("--- Provisioning ---");
    let executed = provision(&compiled, adapter)
        .await
        .context("failed to provision the topology")?;
    println!("* Executed {executed} of {} actions", compiled.len());

    if ping {
        run_ping_checks(plan, adapter).await?;
    }

    Ok(())
}

pub async fn ping(plan: &AddressPlan<'_>, adapter: &NetnsAdapter) -> anyhow::Result<()> {
    run_ping_checks(plan, adapter).await
}

pub async fn teardown(plan: &AddressPlan<'_>, adapter: &mut NetnsAdapter) -> anyhow::Result<()> {
    let compiled = compile_plan(plan).context("failed to compile the provisioning plan")?;
    let actions = compiled.teardown();

    println!("--- Teardown ---");
    let executed = provision(&actions, adapter)
        .await
        .context("failed to tear the topology down")?;
    println!("* Executed {executed} of {} actions", actions.len());

    Ok(())
}

async fn run_ping_checks(plan: &AddressPlan<'_>, adapter: &NetnsAdapter) -> anyhow::Result<()> {
    let checks = ping_checks(plan);

    println!("--- Ping checks ---");
    let mut failed = 0;
    for check in &checks {
        match adapter.run(&check.source, &check.shell_command()).await {
            Ok(_) if adapter.is_dry_run() => {}
            Ok(_) => println!("* {check}: ok"),
            Err(e) => {
                debug!(error = %e, "ping check failed");
                println!("* {check}: unreachable");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} ping checks failed", checks.len());
    }

    Ok(())
}
