//! Length-prefixed field encoding and the `tokio_util` codec used on the
//! TV socket.
//!
//! ## Field format
//!
//! ```text
//! len:      u8   (1)   length of the encoded payload
//! filler:   u8   (1)   always 0x00
//! payload:  [u8] (len) base64 text, or raw bytes for the outer frame
//! ```
//!
//! ## Receive frame format
//!
//! ```text
//! header:   [u8; 3]    header[1] = N
//! name:     [u8; N]    name of the responding TV application
//! length:   [u8; 2]    length[0] = M, length[1] unused
//! payload:  [u8; M]
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TvError;
use crate::message::ResponseFrame;
use crate::packet::Packet;

// ── Constants ────────────────────────────────────────────────────

/// Largest payload a single-byte length prefix can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Size of the `[len][0x00]` prefix in front of every field.
pub const FIELD_PREFIX_LEN: usize = 2;

/// Fixed header in front of the name field of a receive frame.
pub const RESPONSE_HEADER_LEN: usize = 3;

/// Size of the length block in front of a response payload.
pub const RESPONSE_LENGTH_LEN: usize = 2;

// ── Field encoding ───────────────────────────────────────────────

/// Encode `payload` as `[len][0x00][payload]`.
///
/// Unless `raw` is set, the payload is base64-encoded first and the
/// length prefix describes the encoded text.
pub fn encode_field(payload: &[u8], raw: bool) -> Result<Vec<u8>, TvError> {
    let encoded = if raw {
        payload.to_vec()
    } else {
        STANDARD.encode(payload).into_bytes()
    };

    if encoded.len() > MAX_FIELD_LEN {
        return Err(TvError::Encoding {
            size: encoded.len(),
            max: MAX_FIELD_LEN,
        });
    }

    let mut field = Vec::with_capacity(FIELD_PREFIX_LEN + encoded.len());
    field.push(encoded.len() as u8);
    field.push(0x00);
    field.extend_from_slice(&encoded);
    Ok(field)
}

/// Decode one field from the front of `buf`.
///
/// Returns the decoded payload and the number of bytes consumed.
pub fn decode_field(buf: &[u8], raw: bool) -> Result<(Vec<u8>, usize), TvError> {
    if buf.len() < FIELD_PREFIX_LEN {
        return Err(TvError::InvalidFrame("field prefix truncated"));
    }
    let len = buf[0] as usize;
    let end = FIELD_PREFIX_LEN + len;
    if buf.len() < end {
        return Err(TvError::InvalidFrame("field payload truncated"));
    }

    let body = &buf[FIELD_PREFIX_LEN..end];
    let payload = if raw { body.to_vec() } else { STANDARD.decode(body)? };
    Ok((payload, end))
}

// ── RemoteCodec ──────────────────────────────────────────────────

/// Frames the TV socket: pre-built [`Packet`]s out, [`ResponseFrame`]s in.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteCodec;

impl RemoteCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RemoteCodec {
    type Item = ResponseFrame;
    type Error = TvError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < RESPONSE_HEADER_LEN {
            return Ok(None);
        }

        let name_end = RESPONSE_HEADER_LEN + src[1] as usize;
        let payload_start = name_end + RESPONSE_LENGTH_LEN;
        if src.len() < payload_start {
            return Ok(None);
        }

        let frame_len = payload_start + src[name_end] as usize;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len).freeze();
        Ok(Some(ResponseFrame {
            name: frame.slice(RESPONSE_HEADER_LEN..name_end),
            payload: frame.slice(payload_start..),
        }))
    }
}

impl Encoder<Packet> for RemoteCodec {
    type Error = TvError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(item.as_bytes());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
