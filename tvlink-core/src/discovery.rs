//! Discovery collaborator interface and an in-process registry.
//!
//! A discovery service watches the network for TVs and tells each
//! registered remote, keyed by TV uuid, whether its TV is powered and
//! where it currently lives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::config::EndpointConfig;

/// Invoked with the latest config and power state of a TV.
pub type DiscoveryCallback = Arc<dyn Fn(EndpointConfig, bool) + Send + Sync>;

// ── Discovery ────────────────────────────────────────────────────

/// The service a [`RemoteLegacy`](crate::RemoteLegacy) registers with.
pub trait Discovery: Send + Sync {
    /// Register `callback` for the TV identified by `uuid`, replacing any
    /// previous one. Returns the last known `(config, powered)` state.
    fn register_callback(
        &self,
        uuid: &str,
        callback: DiscoveryCallback,
    ) -> Option<(EndpointConfig, bool)>;

    fn unregister_callback(&self, uuid: &str);

    fn is_running(&self) -> bool;

    fn start(&self);

    fn stop(&self);

    /// Start the service unless it is already running.
    fn require_running(&self) {
        if !self.is_running() {
            self.start();
        }
    }
}

// ── DiscoveryRegistry ────────────────────────────────────────────

#[derive(Default)]
struct Entry {
    callback: Option<DiscoveryCallback>,
    last: Option<(EndpointConfig, bool)>,
}

/// In-process [`Discovery`] fed by [`announce`](Self::announce).
///
/// Useful when TV addresses come from configuration or from a scanner
/// living elsewhere in the application.
#[derive(Default)]
pub struct DiscoveryRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    running: AtomicBool,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the state of a TV and, while running, notify its remote.
    ///
    /// Returns `true` if a callback was invoked.
    pub fn announce(&self, config: EndpointConfig, powered: bool) -> bool {
        let callback = {
            let mut entries = self.lock();
            let entry = entries.entry(config.uuid.clone()).or_default();
            entry.last = Some((config.clone(), powered));
            entry.callback.clone()
        };

        if !self.is_running() {
            debug!(uuid = %config.uuid, "registry stopped; announcement recorded only");
            return false;
        }
        match callback {
            Some(callback) => {
                debug!(uuid = %config.uuid, powered, "notifying remote");
                callback(config, powered);
                true
            }
            None => false,
        }
    }

    /// Last announced state of a TV.
    pub fn last_state(&self, uuid: &str) -> Option<(EndpointConfig, bool)> {
        self.lock().get(uuid).and_then(|e| e.last.clone())
    }

    pub fn is_registered(&self, uuid: &str) -> bool {
        self.lock()
            .get(uuid)
            .is_some_and(|e| e.callback.is_some())
    }
}

impl Discovery for DiscoveryRegistry {
    fn register_callback(
        &self,
        uuid: &str,
        callback: DiscoveryCallback,
    ) -> Option<(EndpointConfig, bool)> {
        let mut entries = self.lock();
        let entry = entries.entry(uuid.to_string()).or_default();
        entry.callback = Some(callback);
        entry.last.clone()
    }

    fn unregister_callback(&self, uuid: &str) {
        if let Some(entry) = self.lock().get_mut(uuid) {
            entry.callback = None;
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("discovery registry started");
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("discovery registry stopped");
        }
    }
}
