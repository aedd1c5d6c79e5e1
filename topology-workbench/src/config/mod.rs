use crate::config::topology::TopologyJson;
use anyhow::Context;
use std::fs;
use std::path::Path;

pub mod cli;
pub mod topology;

pub fn load_topology(path: &Path) -> anyhow::Result<TopologyJson> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read topology file at `{}`", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("failed to parse topology file at `{}`", path.display()))
}
