//! Configuration for the command-line remote.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tvlink_core::{DEFAULT_PORT, EndpointConfig, RemoteOptions};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// The TV to talk to.
    pub tv: TvConfig,
    /// Protocol timings.
    pub timing: TimingConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// TV endpoint and the identity this remote pairs with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TvConfig {
    pub host: String,
    pub port: u16,
    /// Identifier shown by the TV when asking for approval.
    pub id: String,
    pub name: String,
    pub description: String,
    /// Set once the TV has accepted this remote.
    pub paired: bool,
    pub uuid: String,
}

/// Timings in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long to wait for the TV to accept each key.
    pub key_interval_ms: u64,
    /// Poll period while waiting for the TV to power off.
    pub power_poll_ms: u64,
    /// How long to wait for the connection to wind down on exit.
    pub close_timeout_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for TvConfig {
    fn default() -> Self {
        let endpoint = EndpointConfig::default();
        Self {
            host: "192.168.1.100".into(),
            port: DEFAULT_PORT,
            id: "tvlink".into(),
            name: endpoint.name,
            description: endpoint.description,
            paired: false,
            uuid: String::new(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        let options = RemoteOptions::default();
        Self {
            key_interval_ms: options.key_interval.as_millis() as u64,
            power_poll_ms: options.power_poll_interval.as_millis() as u64,
            close_timeout_ms: options.close_timeout.as_millis() as u64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write this configuration to a file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    pub fn to_endpoint(&self) -> EndpointConfig {
        EndpointConfig {
            host: self.tv.host.clone(),
            port: self.tv.port,
            id: self.tv.id.clone(),
            name: self.tv.name.clone(),
            description: self.tv.description.clone(),
            paired: self.tv.paired,
            uuid: self.tv.uuid.clone(),
        }
    }

    /// Timings, with zero intervals raised to 1 ms.
    pub fn to_options(&self) -> RemoteOptions {
        let ms = |v: u64| Duration::from_millis(v.max(1));
        RemoteOptions {
            key_interval: ms(self.timing.key_interval_ms),
            power_poll_interval: ms(self.timing.power_poll_ms),
            close_timeout: ms(self.timing.close_timeout_ms),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
