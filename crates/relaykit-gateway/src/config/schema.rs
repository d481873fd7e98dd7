use std::net::SocketAddr;

use serde::Deserialize;
use relaykit_core::{Failure, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    pub version: u32,

    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub streams: StreamSection,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(Failure::bad_request(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        self.runtime.validate()?;
        self.streams.validate()?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Value stamped into every stream frame. Falls back to `$HOSTNAME`.
    #[serde(default)]
    pub hostname: Option<String>,

    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            hostname: None,
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl RuntimeSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if matches!(&self.hostname, Some(h) if h.trim().is_empty()) {
            return Err(Failure::bad_request("runtime.hostname must not be empty"));
        }
        if self.drain_timeout_ms > 60_000 {
            return Err(Failure::bad_request(
                "runtime.drain_timeout_ms must be at most 60000",
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            Failure::bad_request(format!("runtime.listen must be a valid SocketAddr: {e}"))
        })
    }

    pub fn resolved_hostname(&self) -> String {
        self.hostname
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| "localhost".to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamSection {
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,

    /// 0 = unlimited.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl StreamSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=60_000).contains(&self.default_interval_ms) {
            return Err(Failure::bad_request(
                "streams.default_interval_ms must be between 100 and 60000",
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_drain_timeout_ms() -> u64 {
    5000
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_max_sessions() -> usize {
    1024
}
