//! Runs the workbench once per directory under `golden-tests/tests` and compares its output
//!
//! Each directory holds an `args` file, an `expected-stdout` file and, for cases running the
//! `plan` subcommand, an `expected-plan` file.

use anyhow::{Context, bail};
use console::style;
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const TESTS_DIR: &str = "golden-tests/tests";
const PLAN_OUTPUT_FILE: &str = "provisioning-plan.json";

struct GoldenCase {
    name: String,
    args: Vec<String>,
    expected_stdout: String,
    expected_plan: Option<String>,
}

impl GoldenCase {
    fn load(dir: &Path) -> anyhow::Result<Self> {
        let read = |file: &str| {
            let path = dir.join(file);
            fs::read_to_string(&path)
                .with_context(|| format!("failed to read `{}`", path.display()))
        };

        let expected_plan = if dir.join("expected-plan").is_file() {
            Some(read("expected-plan")?)
        } else {
            None
        };

        Ok(Self {
            name: dir.display().to_string(),
            args: read("args")?
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            expected_stdout: read("expected-stdout")?,
            expected_plan,
        })
    }
}

struct Run {
    stdout: String,
    plan: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let mut dirs = fs::read_dir(TESTS_DIR)
        .context("golden tests root directory not found")?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, _>>()?;
    dirs.retain(|path| path.is_dir());
    dirs.sort();

    let mut failed = 0;
    for dir in dirs {
        let case = GoldenCase::load(&dir)?;
        let problems = match run_workbench(&case.args) {
            Ok(run) => check(&case, &run),
            Err(e) => vec![format!("{e:?}")],
        };

        if problems.is_empty() {
            println!("{}: ✅", case.name);
        } else {
            failed += 1;
            println!("{}: ❌", case.name);
            for problem in problems {
                println!("{problem}");
            }
        }
    }

    if failed > 0 {
        bail!("{failed} golden tests failed");
    }

    Ok(())
}

fn run_workbench(args: &[String]) -> anyhow::Result<Run> {
    // Only the plan written by this run may be compared
    if Path::new(PLAN_OUTPUT_FILE).is_file() {
        fs::remove_file(PLAN_OUTPUT_FILE).context("failed to remove stale plan")?;
    }

    let output = Command::new("cargo")
        .args(["run", "--release", "--bin", "topology-workbench", "--"])
        .args(args)
        .output()
        .context("topology-workbench process crashed")?;

    let plan = if Path::new(PLAN_OUTPUT_FILE).is_file() {
        Some(fs::read_to_string(PLAN_OUTPUT_FILE).context("failed to read the written plan")?)
    } else {
        None
    };

    Ok(Run {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        plan,
    })
}

fn check(case: &GoldenCase, run: &Run) -> Vec<String> {
    let mut problems = Vec::new();
    if case.expected_stdout != run.stdout {
        problems.push(format!(
            "Expected stdout differs from actual stdout:\n{}",
            diff(&case.expected_stdout, &run.stdout)
        ));
    }

    match (&case.expected_plan, &run.plan) {
        (Some(expected_plan), Some(plan)) => {
            if expected_plan != plan {
                problems.push(format!(
                    "Expected plan differs from actual plan:\n{}",
                    diff(expected_plan, plan)
                ));
            }

            if let Err(e) = check_plan_matches_report(plan, &run.stdout) {
                problems.push(format!("{e:#}"));
            }
        }
        (Some(_), None) => problems.push(format!("no plan was written to {PLAN_OUTPUT_FILE}")),
        (None, Some(_)) => problems.push("a plan was written but no plan is expected".to_string()),
        (None, None) => {}
    }

    problems
}

/// Checks that the report lists the actions of the written plan, numbered and in order
fn check_plan_matches_report(plan: &str, stdout: &str) -> anyhow::Result<()> {
    let plan: Value = serde_json::from_str(plan).context("the written plan is not valid JSON")?;
    let actions = plan["actions"]
        .as_array()
        .context("the written plan has no `actions` array")?;

    // Skip the section header and the summary line
    let printed: Vec<&str> = stdout
        .lines()
        .skip_while(|line| *line != "--- Provisioning plan ---")
        .skip(2)
        .take_while(|line| line.starts_with("  "))
        .collect();
    if printed.len() != actions.len() {
        bail!(
            "the report lists {} actions, but the written plan has {}",
            printed.len(),
            actions.len()
        );
    }

    for (i, (action, line)) in actions.iter().zip(printed).enumerate() {
        let target = action["target"].as_str().unwrap_or_default();
        let command = match action["kind"].as_str() {
            Some("SetInterfaceAddress") => "ip addr add",
            Some("EnableForwarding") => "sysctl -w net.ipv4.ip_forward=1",
            Some("AddRoute") => "ip route add",
            other => bail!("action {} of the written plan has unexpected kind {other:?}", i + 1),
        };

        let expected = format!("  {}. [{target}] {command}", i + 1);
        if !line.starts_with(&expected) {
            bail!("action {} of the written plan is `{expected}`, but the report shows `{line}`", i + 1);
        }

        if let Some(address) = action["params"]["address"].as_str() {
            if !line.contains(address) {
                bail!("the report line `{line}` does not mention planned address {address}");
            }
        }
    }

    Ok(())
}

fn diff(expected: &str, actual: &str) -> String {
    let diff = TextDiff::from_lines(expected, actual);
    let mut unified = diff.unified_diff();
    unified.context_radius(3);

    let mut output = String::new();
    for hunk in unified.iter_hunks() {
        _ = writeln!(output, "{}", style(hunk.header()).cyan());
        for change in hunk.iter_changes() {
            let line = match change.tag() {
                ChangeTag::Delete => style(format!("-{change}")).red(),
                ChangeTag::Insert => style(format!("+{change}")).green(),
                ChangeTag::Equal => style(format!(" {change}")).dim(),
            };
            _ = write!(output, "{line}");
            if change.missing_newline() {
                _ = writeln!(output);
            }
        }
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;

    const REPORT: &str = "--- Provisioning plan ---
* 2 actions (1 addresses, 1 forwarding flags, 0 routes)
  1. [pc1] ip addr add 10.0.4.1/24 dev pc1-eth1
  2. [pc1] sysctl -w net.ipv4.ip_forward=1
--- Teardown ---
";

    #[test]
    fn test_plan_must_match_report() {
        let plan = r#"{ "actions": [
            { "kind": "SetInterfaceAddress", "target": "pc1",
              "params": { "address": "10.0.4.1/24", "interface": "pc1-eth1" } },
            { "kind": "EnableForwarding", "target": "pc1", "params": { "ip_forward": "1" } }
        ] }"#;
        check_plan_matches_report(plan, REPORT).unwrap();

        let reordered = r#"{ "actions": [
            { "kind": "EnableForwarding", "target": "pc1", "params": { "ip_forward": "1" } },
            { "kind": "SetInterfaceAddress", "target": "pc1",
              "params": { "address": "10.0.4.1/24", "interface": "pc1-eth1" } }
        ] }"#;
        assert!(check_plan_matches_report(reordered, REPORT).is_err());

        let missing = r#"{ "actions": [
            { "kind": "EnableForwarding", "target": "pc1", "params": { "ip_forward": "1" } }
        ] }"#;
        assert!(check_plan_matches_report(missing, REPORT).is_err());
    }
}
