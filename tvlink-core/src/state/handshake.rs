//! Pairing lifecycle of a single TV connection.
//!
//! Provides a `HandshakePhase` enum with validated transitions that
//! return `Result` instead of panicking.

use std::time::Instant;

use crate::error::TvError;

// ── HandshakePhase ───────────────────────────────────────────────

/// The current phase of a TV connection.
///
/// ```text
///  Disconnected ──► AwaitingAck ──► Paired
///     ▲    ▲             │            │
///     │    └─────────────┤            │
///     │                  ▼            │
///     │               Denied          │
///     └───────────────────────────────┘
/// ```
///
/// `Denied` is terminal for one attempt; a new `open` may start over
/// from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HandshakePhase {
    /// No socket. Initial state, and where transport errors land.
    #[default]
    Disconnected,

    /// Handshake sent; waiting for the TV (and possibly its user).
    AwaitingAck,

    /// The TV accepted the remote and the response loop is running.
    Paired {
        /// When the handshake completed.
        since: Instant,
    },

    /// The TV refused, or the user cancelled the prompt.
    Denied,
}

impl std::fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::AwaitingAck => write!(f, "AwaitingAck"),
            Self::Paired { .. } => write!(f, "Paired"),
            Self::Denied => write!(f, "Denied"),
        }
    }
}

impl HandshakePhase {
    pub fn is_paired(&self) -> bool {
        matches!(self, Self::Paired { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// How long the connection has been paired, `None` in other phases.
    pub fn paired_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Paired { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`, `Denied`.
    pub fn begin_handshake(&mut self) -> Result<(), TvError> {
        match self {
            Self::Disconnected | Self::Denied => {
                *self = Self::AwaitingAck;
                Ok(())
            }
            _ => Err(TvError::ProtocolViolation(
                "cannot handshake: connection already active",
            )),
        }
    }

    /// Valid from: `AwaitingAck`.
    pub fn complete_handshake(&mut self) -> Result<(), TvError> {
        match self {
            Self::AwaitingAck => {
                *self = Self::Paired {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(TvError::ProtocolViolation(
                "cannot complete handshake: not awaiting an acknowledgement",
            )),
        }
    }

    /// Valid from: `AwaitingAck`.
    pub fn deny(&mut self) -> Result<(), TvError> {
        match self {
            Self::AwaitingAck => {
                *self = Self::Denied;
                Ok(())
            }
            _ => Err(TvError::ProtocolViolation(
                "cannot deny: not awaiting an acknowledgement",
            )),
        }
    }

    /// Reset to `Disconnected` regardless of the current phase.
    pub fn force_disconnect(&mut self) {
        *self = Self::Disconnected;
    }
}

// ── Tests ────────────────────────────────────────────────────────
