//! Runtime config loader (strict parsing).

pub mod schema;

use std::fs;

use relaykit_core::{Failure, Result};

pub use schema::{RuntimeConfig, RuntimeSection, StreamSection};

/// Env var naming the config file.
pub const CONFIG_PATH_ENV: &str = "RELAYKIT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "relaykit.yaml";

pub fn load_from_file(path: &str) -> Result<RuntimeConfig> {
    let s = fs::read_to_string(path).map_err(Failure::internal)?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<RuntimeConfig> {
    let cfg: RuntimeConfig = serde_yaml::from_str(s)
        .map_err(|e| Failure::bad_request(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Path from `RELAYKIT_CONFIG`, else `relaykit.yaml`.
pub fn config_path() -> String {
    std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}
