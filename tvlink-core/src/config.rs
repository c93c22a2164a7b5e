//! Endpoint configuration and connection tuning.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default TCP port of the legacy remote-control service.
pub const DEFAULT_PORT: u16 = 55000;

// ── EndpointConfig ───────────────────────────────────────────────

/// Identity of one TV and of the remote talking to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// TV host name or IP address.
    pub host: String,
    /// TV control port.
    pub port: u16,
    /// Remote identifier shown to the TV during pairing.
    pub id: String,
    /// Remote name shown in the TV's approval prompt.
    pub name: String,
    /// Free-form description sent with the handshake.
    pub description: String,
    /// Set once the TV has accepted this remote.
    pub paired: bool,
    /// Stable TV identifier used to key discovery callbacks.
    pub uuid: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            id: String::new(),
            name: "tvlink".into(),
            description: "tvlink remote".into(),
            paired: false,
            uuid: String::new(),
        }
    }
}

impl EndpointConfig {
    /// `host:port` for connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Adopt values pushed by discovery for the same TV.
    ///
    /// Pairing is a property of the TV rather than its address, so an
    /// already paired config stays paired.
    pub fn copy_from(&mut self, other: &EndpointConfig) {
        let paired = self.paired || other.paired;
        *self = other.clone();
        self.paired = paired;
    }
}

// ── SharedConfig ─────────────────────────────────────────────────

/// Cloneable handle to an [`EndpointConfig`] shared between the caller
/// and a [`RemoteLegacy`](crate::RemoteLegacy).
///
/// The remote flips `paired` and adopts discovery updates through it, so
/// the caller can persist the result.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<EndpointConfig>>,
}

impl SharedConfig {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EndpointConfig> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current values.
    pub fn snapshot(&self) -> EndpointConfig {
        self.lock().clone()
    }

    /// Mutate the config in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut EndpointConfig) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn is_paired(&self) -> bool {
        self.lock().paired
    }

    pub fn mark_paired(&self) {
        self.lock().paired = true;
    }

    pub fn uuid(&self) -> String {
        self.lock().uuid.clone()
    }
}

impl From<EndpointConfig> for SharedConfig {
    fn from(config: EndpointConfig) -> Self {
        Self::new(config)
    }
}

// ── RemoteOptions ────────────────────────────────────────────────

/// Timing knobs for a [`RemoteLegacy`](crate::RemoteLegacy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOptions {
    /// How long `control` waits for the TV to accept a key.
    pub key_interval: Duration,
    /// How often `set_power(false)` checks whether the TV went away.
    pub power_poll_interval: Duration,
    /// How long `close` waits for the response loop to exit.
    pub close_timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            key_interval: Duration::from_millis(300),
            power_poll_interval: Duration::from_secs(2),
            close_timeout: Duration::from_secs(2),
        }
    }
}
