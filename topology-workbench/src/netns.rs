//! Runs provisioning steps inside the network namespace of each emulated node

use static_network::ProvisioningAction;
use static_network::adapter::EmulatorAdapter;
use std::fmt::{Display, Formatter};
use tokio::process::Command;
use tracing::trace;

#[derive(Debug, thiserror::Error)]
#[error("command failed: {command}\n{detail}")]
pub struct CommandError {
    pub command: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Prefix with `sudo`
    Sudo,
    /// Run as the current user
    User,
}

impl Display for Privilege {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Privilege::Sudo => f.write_str("sudo"),
            Privilege::User => f.write_str("user"),
        }
    }
}

/// Executes commands through `ip netns exec <node>`, or only prints them when running dry
pub struct NetnsAdapter {
    privilege: Privilege,
    dry_run: bool,
}

impl NetnsAdapter {
    pub fn new(privilege: Privilege, dry_run: bool) -> Self {
        Self { privilege, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Runs `argv` on the node, returning its trimmed stdout
    ///
    /// A dry run prints the command and returns an empty string.
    pub async fn run(&self, node_id: &str, argv: &[String]) -> Result<String, CommandError> {
        let command = netns_command(node_id, argv, self.privilege);
        let command_display = command.join(" ");
        if self.dry_run {
            println!("{command_display}");
            return Ok(String::new());
        }

        trace!(command = %command_display, "exec");
        let Some((program, args)) = command.split_first() else {
            return Err(CommandError {
                command: command_display,
                detail: "empty command".to_string(),
            });
        };

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CommandError {
                command: command_display.clone(),
                detail: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(CommandError {
                command: command_display,
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl EmulatorAdapter for NetnsAdapter {
    type Error = CommandError;

    async fn execute(&mut self, action: &ProvisioningAction) -> Result<(), Self::Error> {
        self.run(action.target(), &action.shell_command()).await?;
        Ok(())
    }
}

fn netns_command(node_id: &str, argv: &[String], privilege: Privilege) -> Vec<String> {
    let mut command = Vec::with_capacity(argv.len() + 5);
    if privilege == Privilege::Sudo {
        command.push("sudo".to_string());
    }
    command.extend(["ip", "netns", "exec", node_id].map(str::to_string));
    command.extend_from_slice(argv);
    command
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_netns_command() {
        let argv = ["sysctl", "-w", "net.ipv4.ip_forward=1"].map(str::to_string);
        assert_eq!(
            netns_command("pc1", &argv, Privilege::User).join(" "),
            "ip netns exec pc1 sysctl -w net.ipv4.ip_forward=1"
        );
        assert_eq!(
            netns_command("pc1", &argv, Privilege::Sudo).join(" "),
            "sudo ip netns exec pc1 sysctl -w net.ipv4.ip_forward=1"
        );
    }

    #[tokio::test]
    async fn test_dry_run_does_not_execute() {
        let mut adapter = NetnsAdapter::new(Privilege::User, true);
        let action = ProvisioningAction::EnableForwarding {
            node_id: "node-that-does-not-exist".into(),
        };
        adapter.execute(&action).await.unwrap();
    }
}
