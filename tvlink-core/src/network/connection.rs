//! The live TV link and its background response loop.
//!
//! After the handshake the framed socket is split: the write half stays
//! in [`Link`] behind the remote's lock, the read half moves into a
//! spawned task running [`response_loop`].

use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::RemoteCodec;
use crate::config::SharedConfig;
use crate::error::TvError;
use crate::message::{Response, ResponseFrame};
use crate::packet::Packet;
use crate::state::PendingCommands;

/// Write half of a framed TV socket.
pub type FrameSink = SplitSink<Framed<TcpStream, RemoteCodec>, Packet>;

// ── read_response ────────────────────────────────────────────────

/// Read frames until one classifies to something other than
/// [`Response::WaitingForApproval`].
///
/// Side effects: `Accepted` marks the config paired, and
/// `ControlAcknowledged` completes the oldest pending command.
/// Read failures and EOF come back as `Ok(Response::Closed)`; denial,
/// cancellation and unknown payloads are errors.
pub async fn read_response<S>(
    frames: &mut S,
    config: &SharedConfig,
    pending: &PendingCommands,
    first_time: bool,
) -> Result<Response, TvError>
where
    S: Stream<Item = Result<ResponseFrame, TvError>> + Unpin,
{
    let mut first_time = first_time;

    loop {
        let frame = match frames.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                debug!("read failed: {e}");
                return Ok(Response::Closed);
            }
            None => return Ok(Response::Closed),
        };

        debug!(name = %frame.name_lossy(), payload = ?frame.payload, "frame received");
        if first_time {
            debug!("connected to '{}'", frame.name_lossy());
        }

        match frame.classify() {
            Response::Closed => return Ok(Response::Closed),
            Response::Accepted => {
                debug!("access granted");
                config.mark_paired();
                return Ok(Response::Accepted);
            }
            Response::Denied => return Err(TvError::AccessDenied),
            Response::WaitingForApproval => {
                if first_time {
                    warn!("waiting for authorization on the TV");
                }
                first_time = false;
            }
            Response::Cancelled => {
                warn!("authorization cancelled");
                return Err(TvError::AccessDenied);
            }
            Response::ControlAcknowledged => {
                match pending.complete_oldest() {
                    Some(key) => debug!(%key, "control accepted"),
                    None => debug!("control accepted with nothing pending"),
                }
                return Ok(Response::ControlAcknowledged);
            }
            Response::Unknown(raw) => return Err(TvError::UnhandledResponse(raw)),
        }
    }
}

// ── response_loop ────────────────────────────────────────────────

/// Why a response loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// The TV closed the socket or a read failed.
    Closed,
    /// `close` cancelled the loop.
    Shutdown,
    /// The TV sent something that ends the session.
    Failed(TvError),
}

/// Drain and classify frames until the socket closes, a protocol error
/// occurs, or `shutdown` is cancelled.
pub async fn response_loop<S>(
    mut frames: S,
    config: SharedConfig,
    pending: &PendingCommands,
    shutdown: CancellationToken,
) -> LoopExit
where
    S: Stream<Item = Result<ResponseFrame, TvError>> + Unpin,
{
    loop {
        let outcome = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return LoopExit::Shutdown,
            outcome = read_response(&mut frames, &config, pending, false) => outcome,
        };

        match outcome {
            Ok(Response::Closed) => return LoopExit::Closed,
            Ok(response) => trace!(%response, "response handled"),
            Err(e) => return LoopExit::Failed(e),
        }
    }
}

// ── Link ─────────────────────────────────────────────────────────

/// An open, paired connection.
#[derive(Debug)]
pub struct Link {
    /// Distinguishes this link from later ones on the same remote.
    pub id: u64,
    sink: FrameSink,
    shutdown: CancellationToken,
    worker: JoinHandle<()>,
}

impl Link {
    pub fn new(
        id: u64,
        sink: FrameSink,
        shutdown: CancellationToken,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            sink,
            shutdown,
            worker,
        }
    }

    pub async fn send(&mut self, packet: Packet) -> Result<(), TvError> {
        self.sink.send(packet).await
    }

    /// Stop the response loop, shut the socket down and wait up to
    /// `join_timeout` for the loop to exit.
    pub async fn shutdown(self, join_timeout: Duration) {
        let Link {
            id,
            mut sink,
            shutdown,
            worker,
        } = self;

        shutdown.cancel();
        if let Err(e) = sink.close().await {
            debug!(id, "socket shutdown: {e}");
        }
        if tokio::time::timeout(join_timeout, worker).await.is_err() {
            warn!(id, "response loop still running after {join_timeout:?}");
        }
    }

    /// Signal the response loop to stop without waiting for it.
    pub fn cancel(&self) {
        self.shutdown.cancel();
    }

    /// Shut the socket down from inside the response loop itself.
    pub async fn release(self) {
        let Link { id, mut sink, .. } = self;
        if let Err(e) = sink.close().await {
            debug!(id, "socket shutdown: {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::message::{ACCESS_GRANTED, CONTROL_ACCEPTED};
    use tokio_test::io::Builder;
    use tokio_util::codec::FramedRead;

    fn frame(payload: &[u8]) -> Vec<u8> {
        ResponseFrame::new(&b"iapp.samsung"[..], payload.to_vec())
            .to_bytes()
            .unwrap()
    }

    #[tokio::test]
    async fn waiting_frames_are_skipped() {
        let mock = Builder::new()
            .read(&frame(&[0x0a, 0x00, 0x02, 0x00, 0x00, 0x00]))
            .read(&frame(&[0x0a, 0x00, 0x01, 0x00, 0x00, 0x00]))
            .read(&frame(&ACCESS_GRANTED))
            .build();
        let mut frames = FramedRead::new(mock, RemoteCodec::new());
        let config = SharedConfig::new(EndpointConfig::default());
        let pending = PendingCommands::new();

        let response = read_response(&mut frames, &config, &pending, true)
            .await
            .unwrap();
        assert_eq!(response, Response::Accepted);
        assert!(config.is_paired());
    }

    #[tokio::test]
    async fn eof_reads_as_closed() {
        let mock = Builder::new().build();
        let mut frames = FramedRead::new(mock, RemoteCodec::new());
        let config = SharedConfig::default();
        let pending = PendingCommands::new();

        let response = read_response(&mut frames, &config, &pending, false)
            .await
            .unwrap();
        assert_eq!(response, Response::Closed);
    }

    #[tokio::test]
    async fn cancelled_is_access_denied() {
        let mock = Builder::new().read(&frame(&[0x65, 0x00])).build();
        let mut frames = FramedRead::new(mock, RemoteCodec::new());
        let config = SharedConfig::default();
        let pending = PendingCommands::new();

        let err = read_response(&mut frames, &config, &pending, true)
            .await
            .unwrap_err();
        assert!(matches!(err, TvError::AccessDenied));
        assert!(!config.is_paired());
    }

    #[tokio::test]
    async fn loop_completes_pending_then_closes() {
        let mock = Builder::new()
            .read(&frame(&CONTROL_ACCEPTED))
            .read(&frame(&[]))
            .build();
        let frames = FramedRead::new(mock, RemoteCodec::new());
        let pending = PendingCommands::new();
        let (_, mut done) = pending.register("KEY_VOLUP");

        let exit = response_loop(
            frames,
            SharedConfig::default(),
            &pending,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(exit, LoopExit::Closed));
        assert!(done.try_recv().is_ok());
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn loop_stops_on_unknown_payload() {
        let mock = Builder::new().read(&frame(&[0x42, 0x42])).build();
        let frames = FramedRead::new(mock, RemoteCodec::new());
        let pending = PendingCommands::new();

        let exit = response_loop(
            frames,
            SharedConfig::default(),
            &pending,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(
            exit,
            LoopExit::Failed(TvError::UnhandledResponse(_))
        ));
    }

    #[tokio::test]
    async fn link_shutdown_bounds_worker_join() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let (_server, _) = listener.accept().await.unwrap();
        let (sink, _frames) = Framed::new(client, RemoteCodec::new()).split();

        // A worker that never notices cancellation.
        let worker = tokio::spawn(std::future::pending::<()>());
        let shutdown = CancellationToken::new();
        let link = Link::new(7, sink, shutdown.clone(), worker);

        let started = std::time::Instant::now();
        link.shutdown(Duration::from_millis(50)).await;
        assert!(shutdown.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn loop_honours_shutdown() {
        let (client, _server) = tokio::io::duplex(64);
        let frames = FramedRead::new(client, RemoteCodec::new());
        let pending = PendingCommands::new();
        let shutdown = CancellationToken::new();

        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let pending = pending;
                response_loop(frames, SharedConfig::default(), &pending, shutdown).await
            }
        });

        shutdown.cancel();
        let exit = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop did not stop")
            .unwrap();
        assert!(matches!(exit, LoopExit::Shutdown));
    }
}
