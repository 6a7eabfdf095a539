//! Implementation of the `phoenix-board config` command.

use anyhow::{Context, Result};

use crate::domain::models::Config;

/// Print the effective configuration as YAML, or JSON in JSON mode.
pub fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let rendered = if json_mode {
        serde_json::to_string_pretty(config).context("Failed to render configuration")?
    } else {
        serde_yaml::to_string(config).context("Failed to render configuration")?
    };
    println!("{rendered}");
    Ok(())
}
