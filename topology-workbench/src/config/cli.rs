use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to the JSON file containing the topology, its addresses and its routes
    #[arg(long)]
    pub topology: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile the provisioning plan and store it as JSON
    Plan(PlanOpt),
    /// Show which peer each interface is connected to
    Connections,
    /// Provision the emulated nodes
    Apply(ApplyOpt),
    /// Ping every end host from every other end host
    Ping(ExecOpt),
    /// Reset the forwarding flags set by `apply`
    Teardown(ExecOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct PlanOpt {
    /// Where the compiled plan should be written
    #[arg(long, default_value = "provisioning-plan.json")]
    pub plan_output: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct ApplyOpt {
    #[command(flatten)]
    pub exec: ExecOpt,

    /// Run the ping checks once the nodes have been provisioned
    #[arg(long)]
    pub ping: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ExecOpt {
    /// Print the commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Prefix every command with `sudo`
    #[arg(long)]
    pub sudo: bool,
}
