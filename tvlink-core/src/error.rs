//! Domain-specific error types for the legacy remote protocol.
//!
//! All fallible operations return `Result<T, TvError>`.
//! Transport failures seen by the response loop never surface here; they
//! are handled as a disconnection.

use std::fmt;

use thiserror::Error;

/// The canonical error type for the legacy remote protocol.
#[derive(Debug, Error)]
pub enum TvError {
    // ── Pairing Errors ───────────────────────────────────────────
    /// The TV rejected the pairing request, or the user cancelled it
    /// on the TV.
    #[error("access denied by the TV")]
    AccessDenied,

    /// The TV could not be reached during a first-ever pairing attempt.
    #[error("unable to pair with TV at {addr}, is the TV on?")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The TV sent a response payload this client does not understand.
    #[error("unhandled response: {0}")]
    UnhandledResponse(RawBytes),

    /// A frame was truncated or otherwise malformed.
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),

    /// A lifecycle transition was attempted from the wrong phase.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Serialization Errors ─────────────────────────────────────
    /// An encoded field does not fit the single-byte length prefix.
    #[error("encoded field too large: {size} bytes (max {max})")]
    Encoding { size: usize, max: usize },

    /// A field that should hold base64 did not.
    #[error("invalid base64 field: {0}")]
    Base64(#[from] base64::DecodeError),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),
}

impl TvError {
    /// Returns `true` for socket-level failures, which the handshake
    /// treats differently depending on the pairing history.
    pub fn is_transport(&self) -> bool {
        matches!(self, TvError::Connection(_))
    }
}

// ── RawBytes ─────────────────────────────────────────────────────

/// Unrecognized payload bytes, displayed as hex.
#[derive(Clone, PartialEq, Eq)]
pub struct RawBytes(pub Vec<u8>);

impl fmt::Display for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for RawBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBytes[{self}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = TvError::Encoding { size: 300, max: 255 };
        assert!(e.to_string().contains("300"));
        assert!(e.to_string().contains("255"));

        let e = TvError::UnhandledResponse(RawBytes(vec![0x64, 0x00, 0x02]));
        assert_eq!(e.to_string(), "unhandled response: 64 00 02");
    }

    #[test]
    fn unreachable_mentions_address() {
        let e = TvError::Unreachable {
            addr: "10.0.0.7:55000".into(),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert!(e.to_string().contains("10.0.0.7:55000"));
        assert!(!e.is_transport());
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: TvError = io_err.into();
        assert!(matches!(e, TvError::Connection(_)));
        assert!(e.is_transport());
    }
}
