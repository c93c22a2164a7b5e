//! Connection manager for a single legacy TV.
//!
//! [`RemoteLegacy`] owns at most one [`Link`]. Foreground calls
//! (`open`, `control`, `set_power`, `close`) share it with the response
//! loop spawned after each successful handshake.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError, Weak};

use futures::StreamExt;
use futures::stream::SplitStream;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::RemoteCodec;
use crate::config::{EndpointConfig, RemoteOptions, SharedConfig};
use crate::discovery::{Discovery, DiscoveryCallback};
use crate::error::TvError;
use crate::message::KEY_POWEROFF;
use crate::network::{Link, LoopExit, handshake, response_loop};
use crate::packet::Packet;
use crate::state::{HandshakePhase, PendingCommands};

type FrameStream = SplitStream<Framed<TcpStream, RemoteCodec>>;

// ── Shared ───────────────────────────────────────────────────────

struct Shared {
    config: SharedConfig,
    options: RemoteOptions,
    pending: Arc<PendingCommands>,
    /// The live link. Also guards send+register in `control`.
    link: Mutex<Option<Link>>,
    phase: std::sync::Mutex<HandshakePhase>,
    /// Serializes `open` so concurrent callers share one handshake.
    opening: Mutex<()>,
    next_link_id: AtomicU64,
}

impl Shared {
    fn phase(&self) -> MutexGuard<'_, HandshakePhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by a response loop when it stops. Only clears the link it
    /// was started for; `close` may already have replaced or removed it.
    async fn teardown(&self, id: u64, exit: LoopExit) {
        let (link, dropped) = {
            let mut slot = self.link.lock().await;
            match slot.as_ref() {
                Some(link) if link.id == id => {
                    self.phase().force_disconnect();
                    (slot.take(), self.pending.clear())
                }
                _ => (None, 0),
            }
        };

        match &exit {
            LoopExit::Closed => info!(id, "connection closed by the TV"),
            LoopExit::Shutdown => debug!(id, "response loop stopped"),
            LoopExit::Failed(e) => error!(id, "response loop failed: {e}"),
        }

        let Some(link) = link else { return };
        if dropped > 0 {
            debug!(id, dropped, "dropped pending commands");
        }
        link.release().await;
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.cancel();
        }
    }
}

async fn run_response_loop(
    shared: Weak<Shared>,
    config: SharedConfig,
    pending: Arc<PendingCommands>,
    id: u64,
    frames: FrameStream,
    shutdown: CancellationToken,
) {
    let exit = response_loop(frames, config, &pending, shutdown).await;
    match shared.upgrade() {
        Some(shared) => shared.teardown(id, exit).await,
        None => debug!(id, "remote dropped; response loop exiting"),
    }
}

// ── RemoteLegacy ─────────────────────────────────────────────────

/// Remote control for one TV speaking the legacy protocol.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct RemoteLegacy {
    shared: Arc<Shared>,
}

impl RemoteLegacy {
    pub fn new(config: impl Into<SharedConfig>) -> Self {
        Self::with_options(config, RemoteOptions::default())
    }

    pub fn with_options(config: impl Into<SharedConfig>, options: RemoteOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                config: config.into(),
                options,
                pending: Arc::new(PendingCommands::new()),
                link: Mutex::new(None),
                phase: std::sync::Mutex::new(HandshakePhase::default()),
                opening: Mutex::new(()),
                next_link_id: AtomicU64::new(0),
            }),
        }
    }

    /// Create a remote and hook it up to `discovery`.
    ///
    /// Registers for the config's uuid, makes sure the service runs and,
    /// when discovery already knows the TV is on, connects right away.
    pub async fn attach(
        config: impl Into<SharedConfig>,
        options: RemoteOptions,
        discovery: Arc<dyn Discovery>,
    ) -> Result<Self, TvError> {
        let remote = Self::with_options(config, options);
        let uuid = remote.shared.config.uuid();

        let runtime = tokio::runtime::Handle::current();
        let weak = Arc::downgrade(&remote.shared);
        let callback: DiscoveryCallback =
            Arc::new(move |config: EndpointConfig, powered: bool| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                let remote = RemoteLegacy { shared };
                runtime.spawn(async move {
                    if let Err(e) = remote.on_discovered(config, powered).await {
                        warn!("connect after discovery failed: {e}");
                    }
                });
            });

        let last = discovery.register_callback(&uuid, callback);
        discovery.require_running();

        if let Some((config, true)) = last {
            remote.on_discovered(config, true).await?;
        }
        Ok(remote)
    }

    /// Stop receiving discovery notifications.
    pub fn detach(&self, discovery: &dyn Discovery) {
        discovery.unregister_callback(&self.shared.config.uuid());
    }

    // ── Accessors ────────────────────────────────────────────────

    /// Handle to the config this remote reads and updates.
    pub fn config(&self) -> &SharedConfig {
        &self.shared.config
    }

    pub fn options(&self) -> RemoteOptions {
        self.shared.options
    }

    pub fn phase(&self) -> HandshakePhase {
        self.shared.phase().clone()
    }

    /// Number of control commands still waiting for an acknowledgement.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect and pair.
    ///
    /// Returns `Ok(true)` once connected (immediately if already
    /// connected) and `Ok(false)` when a previously paired TV cannot be
    /// reached, which usually means it is switched off. A TV that was
    /// never paired and cannot be reached is an error, as is a denied or
    /// cancelled pairing.
    pub async fn open(&self) -> Result<bool, TvError> {
        let _opening = self.shared.opening.lock().await;
        if self.shared.link.lock().await.is_some() {
            return Ok(true);
        }

        let config = self.shared.config.snapshot();
        let packet = Packet::handshake(&config)?;
        let addr = config.address();
        {
            let mut phase = self.shared.phase();
            if *phase == HandshakePhase::AwaitingAck {
                debug!("previous handshake was abandoned");
                phase.force_disconnect();
            }
            phase.begin_handshake()?;
        }

        let connected = self.connect(&addr, packet).await;
        let framed = match connected {
            Ok(framed) => framed,
            Err(TvError::AccessDenied) => {
                let _ = self.shared.phase().deny();
                warn!(%addr, "pairing refused by the TV");
                return Err(TvError::AccessDenied);
            }
            Err(TvError::Connection(source)) => {
                self.shared.phase().force_disconnect();
                if self.shared.config.is_paired() {
                    warn!(%addr, "TV not reachable: {source}");
                    return Ok(false);
                }
                return Err(TvError::Unreachable { addr, source });
            }
            Err(e) => {
                self.shared.phase().force_disconnect();
                return Err(e);
            }
        };

        self.shared.phase().complete_handshake()?;
        let (sink, frames) = framed.split();
        let id = self.shared.next_link_id.fetch_add(1, Ordering::Relaxed) + 1;
        let shutdown = CancellationToken::new();

        // Hold the slot while spawning so a loop that ends immediately
        // still finds its own link to tear down.
        let mut slot = self.shared.link.lock().await;
        let worker = tokio::spawn(run_response_loop(
            Arc::downgrade(&self.shared),
            self.shared.config.clone(),
            Arc::clone(&self.shared.pending),
            id,
            frames,
            shutdown.clone(),
        ));
        *slot = Some(Link::new(id, sink, shutdown, worker));
        self.shared.config.mark_paired();
        drop(slot);

        info!(%addr, id, "connected");
        Ok(true)
    }

    async fn connect(
        &self,
        addr: &str,
        packet: Packet,
    ) -> Result<Framed<TcpStream, RemoteCodec>, TvError> {
        let stream = TcpStream::connect(addr).await?;
        handshake(stream, packet, &self.shared.config, &self.shared.pending).await
    }

    /// Stop the response loop and shut the socket down. No-op when not
    /// connected.
    ///
    /// Waits for an `open` already in flight, so a handshake that
    /// completes concurrently is closed too rather than left running.
    pub async fn close(&self) {
        let _opening = self.shared.opening.lock().await;
        let (link, paired_for) = {
            let mut slot = self.shared.link.lock().await;
            let link = slot.take();
            let mut phase = self.shared.phase();
            let paired_for = phase.paired_duration();
            if link.is_some() {
                phase.force_disconnect();
                self.shared.pending.clear();
            }
            (link, paired_for)
        };
        let Some(link) = link else {
            return;
        };

        let id = link.id;
        link.shutdown(self.shared.options.close_timeout).await;
        info!(id, ?paired_for, "connection closed");
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Send one key and wait up to `key_interval` for the TV to accept
    /// it.
    ///
    /// Returns `Ok(false)` without sending when not connected, and
    /// `Ok(false)` when no acknowledgement arrived in time. The key may
    /// still have reached the TV in that case; an acknowledgement that
    /// arrives after the wait is dropped.
    pub async fn control(&self, key: &str) -> Result<bool, TvError> {
        let packet = Packet::control(key)?;

        let (id, done) = {
            let mut slot = self.shared.link.lock().await;
            let Some(link) = slot.as_mut() else {
                debug!(key, "not connected; key dropped");
                return Ok(false);
            };

            info!(key, "sending control command");
            let (id, done) = self.shared.pending.register(key);
            if let Err(e) = link.send(packet).await {
                self.shared.pending.deregister(id);
                warn!(key, "control send failed: {e}");
                return Ok(false);
            }
            (id, done)
        };

        let interval = self.shared.options.key_interval;
        let acked = matches!(tokio::time::timeout(interval, done).await, Ok(Ok(())));
        self.shared.pending.deregister(id);
        if !acked {
            debug!(key, "no acknowledgement within {interval:?}");
        }
        Ok(acked)
    }

    // ── Power ────────────────────────────────────────────────────

    /// `true` while a connection is open. No network round trip.
    pub async fn power(&self) -> bool {
        self.shared.link.lock().await.is_some()
    }

    /// Switch the TV off, or log that switching on is unsupported.
    ///
    /// Switching off sends `KEY_POWEROFF` once and waits until the TV
    /// drops the connection.
    pub async fn set_power(&self, on: bool) -> Result<(), TvError> {
        if on {
            if !self.power().await {
                info!("power on is not supported for legacy TVs");
            }
            return Ok(());
        }

        if !self.power().await {
            return Ok(());
        }

        if !self.control(KEY_POWEROFF).await? {
            debug!("power off not acknowledged; waiting for disconnect");
        }
        while self.power().await {
            tokio::time::sleep(self.shared.options.power_poll_interval).await;
        }
        Ok(())
    }

    // ── Discovery ────────────────────────────────────────────────

    /// React to a discovery notification.
    ///
    /// A powered TV is connected to (adopting the discovered config) if
    /// no connection is open; an unpowered one is disconnected.
    pub async fn on_discovered(
        &self,
        config: EndpointConfig,
        powered: bool,
    ) -> Result<bool, TvError> {
        if !powered {
            self.close().await;
            return Ok(false);
        }
        if self.power().await {
            return Ok(true);
        }

        self.shared.config.update(|current| current.copy_from(&config));
        self.open().await
    }
}

impl std::fmt::Debug for RemoteLegacy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLegacy")
            .field("config", &self.shared.config.snapshot())
            .field("phase", &*self.shared.phase())
            .field("pending", &self.shared.pending.len())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ACCESS_GRANTED, ResponseFrame};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn remote() -> RemoteLegacy {
        RemoteLegacy::new(EndpointConfig {
            host: "127.0.0.1".into(),
            uuid: "tv-unit".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn control_without_connection_is_noop() {
        let remote = remote();
        assert!(!remote.control("KEY_VOLUP").await.unwrap());
        assert_eq!(remote.pending_count(), 0);
    }

    #[tokio::test]
    async fn oversized_key_fails_before_io() {
        let remote = remote();
        let err = remote.control(&"K".repeat(200)).await.unwrap_err();
        assert!(matches!(err, TvError::Encoding { .. }));
    }

    #[tokio::test]
    async fn power_reflects_missing_connection() {
        let remote = remote();
        assert!(!remote.power().await);
        remote.set_power(true).await.unwrap();
        remote.set_power(false).await.unwrap();
        assert!(!remote.power().await);
    }

    #[tokio::test]
    async fn close_without_connection_is_noop() {
        let remote = remote();
        remote.close().await;
        assert!(remote.phase().is_disconnected());
    }

    #[tokio::test]
    async fn oversized_identity_fails_before_connecting() {
        let remote = RemoteLegacy::new(EndpointConfig {
            host: "127.0.0.1".into(),
            port: 9,
            name: "n".repeat(200),
            ..Default::default()
        });
        let err = remote.open().await.unwrap_err();
        assert!(matches!(err, TvError::Encoding { .. }));
        assert!(remote.phase().is_disconnected());
    }

    #[tokio::test]
    async fn unpowered_discovery_closes() {
        let remote = remote();
        let connected = remote
            .on_discovered(remote.config().snapshot(), false)
            .await
            .unwrap();
        assert!(!connected);
        assert!(!remote.power().await);
    }

    /// Accept `count` connections, granting each handshake. Returns the
    /// sockets so they stay open.
    async fn granting_tv(
        count: usize,
    ) -> (EndpointConfig, tokio::task::JoinHandle<Vec<TcpStream>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let config = EndpointConfig {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
            uuid: "tv-unit".into(),
            ..Default::default()
        };
        let granted = ResponseFrame::new(&b"iapp.samsung"[..], ACCESS_GRANTED.to_vec())
            .to_bytes()
            .unwrap();

        let tv = tokio::spawn(async move {
            let mut streams = Vec::new();
            for _ in 0..count {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut header = [0u8; 5];
                stream.read_exact(&mut header).await.unwrap();
                let mut inner = vec![0u8; header[3] as usize];
                stream.read_exact(&mut inner).await.unwrap();
                stream.write_all(&granted).await.unwrap();
                streams.push(stream);
            }
            streams
        });
        (config, tv)
    }

    async fn link_id(remote: &RemoteLegacy) -> Option<u64> {
        remote.shared.link.lock().await.as_ref().map(|link| link.id)
    }

    #[tokio::test]
    async fn stale_teardown_keeps_newer_link() {
        let (config, tv) = granting_tv(2).await;
        let remote = RemoteLegacy::new(config);

        assert!(remote.open().await.unwrap());
        let first = link_id(&remote).await.unwrap();
        remote.close().await;

        assert!(remote.open().await.unwrap());
        let second = link_id(&remote).await.unwrap();
        assert_ne!(first, second);

        // The first link's loop reporting late must not touch the new one.
        remote.shared.teardown(first, LoopExit::Closed).await;
        assert!(remote.power().await);
        assert!(remote.phase().is_paired());
        assert_eq!(link_id(&remote).await, Some(second));

        remote.shared.teardown(second, LoopExit::Closed).await;
        assert!(!remote.power().await);
        assert!(remote.phase().is_disconnected());
        drop(tv.await.unwrap());
    }

    #[tokio::test]
    async fn teardown_drops_pending_commands() {
        let (config, tv) = granting_tv(1).await;
        let remote = RemoteLegacy::new(config);
        assert!(remote.open().await.unwrap());
        let id = link_id(&remote).await.unwrap();

        let (_, mut done) = remote.shared.pending.register("KEY_MUTE");
        remote.shared.teardown(id, LoopExit::Closed).await;
        assert_eq!(remote.pending_count(), 0);
        assert!(done.try_recv().is_err());
        drop(tv.await.unwrap());
    }

    #[test]
    fn clones_share_state() {
        let remote = remote();
        let clone = remote.clone();
        clone.config().mark_paired();
        assert!(remote.config().is_paired());
        assert!(format!("{remote:?}").contains("RemoteLegacy"));
    }
}
