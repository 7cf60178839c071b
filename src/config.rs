use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use std::fs;
use std::path::Path;

use crate::rack::params::{BYPASS_PARAMETERS, RackParams};

pub fn load_params<P: AsRef<Path>>(path: P) -> Result<RackParams> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
    let params: RackParams =
        serde_json::from_str(&content).context("Failed to parse parameter JSON")?;

    let sanitized = params.sanitized();
    if sanitized != params {
        warn!(
            "Parameters in {} were out of range and have been clamped",
            path.display()
        );
    }
    debug!("Loaded parameters from {}", path.display());
    Ok(sanitized)
}

pub fn save_params<P: AsRef<Path>>(path: P, params: &RackParams) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(params).context("Failed to serialize parameters")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write parameter file {}", path.display()))
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Some(true),
        "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Apply `name=value` overrides in order. Bypass switches take `true`/`false`
/// (or `on`/`off`, `1`/`0`); everything else takes a number within range.
pub fn apply_overrides<S: AsRef<str>>(params: &mut RackParams, overrides: &[S]) -> Result<()> {
    for entry in overrides {
        let entry = entry.as_ref();
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Override '{entry}' is not of the form name=value"))?;
        let (name, value) = (name.trim(), value.trim());

        if BYPASS_PARAMETERS.contains(&name) {
            let bypassed = parse_switch(value)
                .ok_or_else(|| anyhow!("'{name}' expects true or false, got '{value}'"))?;
            params
                .set_bypass(name, bypassed)
                .map_err(|e| anyhow!("{name}: {e}"))?;
        } else {
            let value: f32 = value
                .parse()
                .with_context(|| format!("'{name}' expects a number, got '{value}'"))?;
            params.set(name, value).map_err(|e| anyhow!("{name}: {e}"))?;
        }
    }
    Ok(())
}
