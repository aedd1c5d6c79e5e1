mod commands;
mod config;
mod netns;
mod util;

use crate::config::cli::{CliOpt, Command};
use crate::config::load_topology;
use crate::netns::{NetnsAdapter, Privilege};
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Stdout is reserved for reports
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let options = CliOpt::parse();
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to initialize tokio")?;

    rt.block_on(run(options))
}

async fn run(options: CliOpt) -> anyhow::Result<()> {
    let topology_json = load_topology(&options.topology)?;
    let topology = topology_json
        .model()
        .context("the topology file describes an invalid topology")?;
    let plan = topology_json
        .address_plan(&topology)
        .context("the topology file describes an invalid address plan")?;

    println!("--- Params ---");
    println!("* Topology path: {}", options.topology.display());

    match options.command {
        Command::Plan(plan_options) => commands::plan(&plan, &plan_options),
        Command::Connections => {
            commands::connections(&topology);
            Ok(())
        }
        Command::Apply(apply_options) => {
            let mut adapter = netns_adapter(apply_options.exec.dry_run, apply_options.exec.sudo);
            commands::apply(&plan, &mut adapter, apply_options.ping).await
        }
        Command::Ping(exec_options) => {
            let adapter = netns_adapter(exec_options.dry_run, exec_options.sudo);
            commands::ping(&plan, &adapter).await
        }
        Command::Teardown(exec_options) => {
            let mut adapter = netns_adapter(exec_options.dry_run, exec_options.sudo);
            commands::teardown(&plan, &mut adapter).await
        }
    }
}

fn netns_adapter(dry_run: bool, sudo: bool) -> NetnsAdapter {
    let privilege = if sudo { Privilege::Sudo } else { Privilege::User };
    println!("* Dry run: {dry_run}");
    println!("* Privilege: {privilege}");
    NetnsAdapter::new(privilege, dry_run)
}
