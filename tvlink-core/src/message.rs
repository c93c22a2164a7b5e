//! Response frames received from the TV and their classification.
//!
//! The legacy protocol carries no message ids: a response is recognized
//! purely by its payload bytes.

use std::fmt;

use bytes::Bytes;

use crate::error::{RawBytes, TvError};

// ── Opcodes ──────────────────────────────────────────────────────

/// Opcode leading the handshake request payload.
pub const HANDSHAKE_OPCODE: [u8; 2] = [0x64, 0x00];

/// Prefix in front of every outgoing packet and control payload.
pub const PACKET_PREFIX: [u8; 3] = [0x00, 0x00, 0x00];

/// Pairing granted.
pub const ACCESS_GRANTED: [u8; 4] = [0x64, 0x00, 0x01, 0x00];

/// Pairing refused.
pub const ACCESS_DENIED: [u8; 4] = [0x64, 0x00, 0x00, 0x00];

/// Leading byte of an "approve this remote on the TV" notice.
pub const WAITING_FOR_APPROVAL: u8 = 0x0a;

/// Leading byte of a cancelled authorization.
pub const AUTHORIZATION_CANCELLED: u8 = 0x65;

/// A control command was accepted.
pub const CONTROL_ACCEPTED: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// Key sent by [`RemoteLegacy::set_power`](crate::RemoteLegacy::set_power).
pub const KEY_POWEROFF: &str = "KEY_POWEROFF";

// ── ResponseFrame ────────────────────────────────────────────────

/// One frame read off the TV socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    /// Name of the responding application, only used for logging.
    pub name: Bytes,
    /// Response payload, classified by [`Response::classify`].
    pub payload: Bytes,
}

impl ResponseFrame {
    pub fn new(name: impl Into<Bytes>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }

    /// Serialize as the TV would send it.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TvError> {
        let name_len = field_len(self.name.len())?;
        let payload_len = field_len(self.payload.len())?;

        let mut bytes = Vec::with_capacity(5 + self.name.len() + self.payload.len());
        bytes.extend_from_slice(&[0x01, name_len, 0x00]);
        bytes.extend_from_slice(&self.name);
        bytes.extend_from_slice(&[payload_len, 0x00]);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }

    /// The responder name, lossily decoded for log output.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn classify(&self) -> Response {
        Response::classify(&self.payload)
    }
}

fn field_len(len: usize) -> Result<u8, TvError> {
    u8::try_from(len).map_err(|_| TvError::Encoding {
        size: len,
        max: u8::MAX as usize,
    })
}

// ── Response ─────────────────────────────────────────────────────

/// Meaning of a response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Empty payload: the TV half-closed the socket.
    Closed,
    /// Pairing granted.
    Accepted,
    /// Pairing refused.
    Denied,
    /// The TV is showing an approval prompt; another frame will follow.
    WaitingForApproval,
    /// The user cancelled the approval prompt.
    Cancelled,
    /// The oldest pending control command was accepted.
    ControlAcknowledged,
    /// Anything else.
    Unknown(RawBytes),
}

impl Response {
    /// Classify a payload. Exact matches are checked before prefix
    /// matches, in the order the variants are declared.
    pub fn classify(payload: &[u8]) -> Self {
        match payload {
            [] => Response::Closed,
            p if p == &ACCESS_GRANTED[..] => Response::Accepted,
            p if p == &ACCESS_DENIED[..] => Response::Denied,
            [WAITING_FOR_APPROVAL, ..] => Response::WaitingForApproval,
            [AUTHORIZATION_CANCELLED, ..] => Response::Cancelled,
            p if p == &CONTROL_ACCEPTED[..] => Response::ControlAcknowledged,
            other => Response::Unknown(RawBytes(other.to_vec())),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Closed => write!(f, "Closed"),
            Response::Accepted => write!(f, "Accepted"),
            Response::Denied => write!(f, "Denied"),
            Response::WaitingForApproval => write!(f, "WaitingForApproval"),
            Response::Cancelled => write!(f, "Cancelled"),
            Response::ControlAcknowledged => write!(f, "ControlAcknowledged"),
            Response::Unknown(raw) => write!(f, "Unknown({raw})"),
        }
    }
}
