use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HubcastError, Result};
use crate::heartbeat::HeartbeatPolicy;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_NAME: &str = "anon";
pub const MAX_MESSAGE_BYTES: usize = 512; // inbound cap per message
pub const OUTBOUND_CAPACITY: usize = 256; // per-client queue, slow consumer threshold
pub const WRITE_WAIT_SECS: u64 = 10;
pub const PONG_WAIT_SECS: u64 = 60;
pub const PING_PERIOD_SECS: u64 = PONG_WAIT_SECS * 9 / 10;
pub const MAX_HEARTBEAT_SECS: u64 = 24 * 60 * 60;

/// Top-level config (hubcast.toml + HUBCAST_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubcastConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Send `Access-Control-Allow-Origin: *` on every response.
    #[serde(default = "bool_true")]
    pub allow_any_origin: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            allow_any_origin: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Pending payloads a client may have queued before it is evicted.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,
    /// Largest inbound message accepted from a client, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: OUTBOUND_CAPACITY,
            max_message_bytes: MAX_MESSAGE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Defaults to 9/10 of the pong timeout when unset.
    #[serde(default)]
    pub ping_interval_secs: Option<u64>,
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: None,
            pong_timeout_secs: PONG_WAIT_SECS,
            write_timeout_secs: WRITE_WAIT_SECS,
        }
    }
}

impl HeartbeatConfig {
    pub fn policy(&self) -> Result<HeartbeatPolicy> {
        let pong = Duration::from_secs(self.pong_timeout_secs);
        let write = Duration::from_secs(self.write_timeout_secs);
        match self.ping_interval_secs {
            Some(ping) => HeartbeatPolicy::new(Duration::from_secs(ping), pong, write),
            None => HeartbeatPolicy::from_pong_timeout(pong, write),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhooksConfig {
    /// When false the /webhooks route returns 404.
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_outbound_capacity() -> usize {
    OUTBOUND_CAPACITY
}
fn default_max_message_bytes() -> usize {
    MAX_MESSAGE_BYTES
}
fn default_pong_timeout() -> u64 {
    PONG_WAIT_SECS
}
fn default_write_timeout() -> u64 {
    WRITE_WAIT_SECS
}

impl HubcastConfig {
    /// Load config from a TOML file with HUBCAST_* env var overrides.
    ///
    /// Nested keys use a double underscore: `HUBCAST_HEARTBEAT__PONG_TIMEOUT_SECS=30`.
    /// A missing file is not an error; defaults fill every field.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        tracing::debug!(path = %path, "loading config");

        let figment = Figment::from(Serialized::defaults(HubcastConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HUBCAST_").split("__"));
        Self::from_figment(figment)
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: HubcastConfig = figment
            .extract()
            .map_err(|e| HubcastError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hub.outbound_capacity == 0 {
            return Err(HubcastError::Config(
                "hub.outbound_capacity must be at least 1".to_string(),
            ));
        }
        if self.hub.max_message_bytes == 0 {
            return Err(HubcastError::Config(
                "hub.max_message_bytes must be at least 1".to_string(),
            ));
        }
        self.heartbeat.policy()?;
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.hubcast/hubcast.toml", home)
}
