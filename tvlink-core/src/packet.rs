use std::fmt::Debug;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::encode_field;
use crate::config::EndpointConfig;
use crate::error::TvError;
use crate::message::{HANDSHAKE_OPCODE, PACKET_PREFIX};

/// A fully framed outgoing packet:
/// `00 00 00` + `[len][00]` + raw inner payload.
///
/// Construction fails with [`TvError::Encoding`] before any socket is
/// touched when a field would not fit its length prefix.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Bytes,
}

impl Packet {
    /// Wrap an inner payload in the outer frame.
    pub fn wrap(inner: &[u8]) -> Result<Self, TvError> {
        let field = encode_field(inner, true)?;
        let mut bytes = BytesMut::with_capacity(PACKET_PREFIX.len() + field.len());
        bytes.put_slice(&PACKET_PREFIX);
        bytes.put_slice(&field);
        Ok(Self {
            bytes: bytes.freeze(),
        })
    }

    /// Pairing request carrying the remote's description, id and name.
    pub fn handshake(config: &EndpointConfig) -> Result<Self, TvError> {
        let mut inner = HANDSHAKE_OPCODE.to_vec();
        inner.extend(encode_field(config.description.as_bytes(), false)?);
        inner.extend(encode_field(config.id.as_bytes(), false)?);
        inner.extend(encode_field(config.name.as_bytes(), false)?);
        Self::wrap(&inner)
    }

    /// Single key press, e.g. `KEY_VOLUP`.
    pub fn control(key: &str) -> Result<Self, TvError> {
        let mut inner = PACKET_PREFIX.to_vec();
        inner.extend(encode_field(key.as_bytes(), false)?);
        Self::wrap(&inner)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.bytes.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_field;

    #[test]
    fn control_packet_layout() {
        let packet = Packet::control("KEY_POWEROFF").unwrap();
        let mut expected = vec![0x00, 0x00, 0x00, 21, 0x00, 0x00, 0x00, 0x00, 16, 0x00];
        expected.extend_from_slice(b"S0VZX1BPV0VST0ZG");
        assert_eq!(packet.as_bytes(), &expected[..]);
        assert_eq!(packet.len(), 26);
    }

    #[test]
    fn handshake_packet_fields() {
        let config = EndpointConfig {
            description: "living room pc".into(),
            id: "aa:bb".into(),
            name: "tvlink".into(),
            ..Default::default()
        };
        let packet = Packet::handshake(&config).unwrap();
        assert_eq!(&packet.as_bytes()[..3], &[0x00, 0x00, 0x00]);
        assert_eq!(packet.as_bytes()[4], 0x00);

        let inner = &packet.as_bytes()[5..];
        assert_eq!(packet.as_bytes()[3] as usize, inner.len());
        assert_eq!(&inner[..2], &HANDSHAKE_OPCODE);
        let mut offset = 2;
        for expected in ["living room pc", "aa:bb", "tvlink"] {
            let (field, used) = decode_field(&inner[offset..], false).unwrap();
            assert_eq!(field, expected.as_bytes());
            offset += used;
        }
        assert_eq!(offset, inner.len());
    }

    #[test]
    fn oversized_key_rejected() {
        let key = "K".repeat(200);
        assert!(matches!(
            Packet::control(&key),
            Err(TvError::Encoding { .. })
        ));
    }

    #[test]
    fn oversized_handshake_rejected() {
        // Each field fits on its own, the wrapped payload does not.
        let config = EndpointConfig {
            description: "d".repeat(120),
            id: "i".repeat(120),
            name: "n".repeat(120),
            ..Default::default()
        };
        assert!(matches!(
            Packet::handshake(&config),
            Err(TvError::Encoding { max: 255, .. })
        ));
    }
}
