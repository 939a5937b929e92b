//! Start-up configuration loading

use std::fs;
use std::path::Path;

use anyhow::Context;
use thermolink_core::AgentConfig;

/// Read and validate the config document at `path`
///
/// Any failure is fatal to start-up; the agent never runs on a partial or
/// default configuration.
pub fn load_config(path: &Path) -> anyhow::Result<AgentConfig> {
    let document = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = AgentConfig::from_json(&document)
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
