//! # tvlink-core
//!
//! Client library for the legacy TV remote-control protocol.
//!
//! This crate contains:
//! - **Codec**: length-prefixed field encoding and `RemoteCodec` for
//!   framed TCP I/O via `tokio_util`
//! - **Messages**: `Packet` builders and `Response` classification
//! - **State**: `HandshakePhase` lifecycle and FIFO `PendingCommands`
//! - **Network**: the handshake and the background response loop
//! - **Remote**: `RemoteLegacy`, the per-TV connection manager
//! - **Discovery**: the `Discovery` collaborator trait and an in-process
//!   `DiscoveryRegistry`
//! - **Error**: `TvError`, a typed `thiserror` error hierarchy

pub mod codec;
pub mod config;
pub mod discovery;
pub mod error;
pub mod message;
pub mod network;
pub mod packet;
pub mod remote;
pub mod state;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{MAX_FIELD_LEN, RemoteCodec, decode_field, encode_field};
pub use config::{DEFAULT_PORT, EndpointConfig, RemoteOptions, SharedConfig};
pub use discovery::{Discovery, DiscoveryCallback, DiscoveryRegistry};
pub use error::{RawBytes, TvError};
pub use message::{KEY_POWEROFF, Response, ResponseFrame};
pub use packet::Packet;
pub use remote::RemoteLegacy;
pub use state::{HandshakePhase, PendingCommands};
