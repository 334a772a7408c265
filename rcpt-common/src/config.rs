//! Configuration loading
//!
//! Settings resolve with ENV → TOML priority: an environment variable always
//! wins over the config file, and every resolution is logged so operators can
//! see where a value came from.

use crate::{Error, Result};
use std::path::Path;
use tracing::{info, warn};

/// Load and parse a TOML configuration file
///
/// A missing file is not an error; services run with defaults and
/// environment overrides. A file that exists but does not parse is fatal.
pub fn load_toml_file(path: &Path) -> Result<Option<toml::Value>> {
    if !path.exists() {
        info!("Config file {} not found, using defaults", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded config file {}", path.display());
    Ok(Some(value))
}

/// Resolve a single string setting with ENV → TOML priority
///
/// Warns when the setting is present in multiple sources, since that is a
/// common misconfiguration (stale TOML value shadowed by an env var).
pub fn resolve_string(setting: &str, env_var: &str, toml_value: Option<String>) -> Option<String> {
    let env_value = std::env::var(env_var).ok().filter(|v| !v.is_empty());

    if env_value.is_some() && toml_value.is_some() {
        warn!(
            "{} found in both environment ({}) and TOML. Using environment (highest priority).",
            setting, env_var
        );
    }

    if let Some(value) = env_value {
        info!("{} loaded from environment variable {}", setting, env_var);
        return Some(value);
    }

    if let Some(value) = toml_value {
        info!("{} loaded from TOML config", setting);
        return Some(value);
    }

    None
}

/// Fetch a nested scalar out of a parsed TOML document, rendered as a string,
/// e.g. `("providers", "cloudflare", "secret")`. Strings, integers, and
/// booleans all resolve; tables and arrays do not.
pub fn toml_str(root: Option<&toml::Value>, path: &[&str]) -> Option<String> {
    let mut current = root?;
    for key in path {
        current = current.get(key)?;
    }
    match current {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
