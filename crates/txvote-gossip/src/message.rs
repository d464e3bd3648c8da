//! Tx vote gossip messages and their wire codec.
//!
//! Frames are a prost envelope carrying a message type discriminator, the
//! payload, and a protocol version. Only [`TxMessage`] is defined today; other
//! discriminators decode to [`TxVoteMessage::Unknown`] so newer peers can add
//! message kinds without being disconnected.

use prost::Message;
use std::fmt;
use txvote_pool::TxVote;

use crate::error::DecodeError;

/// Default maximum frame size (1 MiB), envelope included.
pub const DEFAULT_MAX_MSG_BYTES: usize = 1_048_576;

/// Bytes the envelope adds around a tx payload of up to 2 MiB.
pub const ENVELOPE_OVERHEAD: usize = 8;

/// Current wire protocol version.
pub const WIRE_VERSION: u32 = 1;

/// Message type constants for wire encoding.
pub mod wire_types {
    /// Tx message type.
    pub const TX: u32 = 1;
}

/// Prost-encoded envelope for gossip messages.
#[derive(Clone, PartialEq, Message)]
pub struct WireTxVoteMessage {
    /// Message type discriminator.
    #[prost(uint32, tag = "1")]
    pub msg_type: u32,
    /// Message payload.
    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,
    /// Protocol version for forward compatibility.
    #[prost(uint32, tag = "3")]
    pub version: u32,
}

/// A transaction carried over the gossip channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMessage {
    /// The transaction payload.
    pub tx: TxVote,
}

impl fmt::Display for TxMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[TxMessage {}]", self.tx.id())
    }
}

/// Messages exchanged on the tx vote channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxVoteMessage {
    /// A transaction.
    Tx(TxMessage),
    /// A well-formed message of a type this node does not know.
    Unknown {
        /// The unrecognized discriminator.
        msg_type: u32,
    },
}

impl TxVoteMessage {
    /// Creates a tx message.
    #[must_use]
    pub fn tx(tx: impl Into<TxVote>) -> Self {
        Self::Tx(TxMessage { tx: tx.into() })
    }

    /// Returns the message type as a string.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        match self {
            Self::Tx(_) => "Tx",
            Self::Unknown { .. } => "Unknown",
        }
    }
}

impl fmt::Display for TxVoteMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tx(msg) => write!(f, "{msg}"),
            Self::Unknown { msg_type } => write!(f, "[Unknown type {msg_type}]"),
        }
    }
}

/// Encodes and size-checks gossip frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxVoteCodec {
    max_msg_bytes: usize,
}

impl Default for TxVoteCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MSG_BYTES)
    }
}

impl TxVoteCodec {
    /// Creates a codec rejecting frames longer than `max_msg_bytes`.
    #[must_use]
    pub const fn new(max_msg_bytes: usize) -> Self {
        Self { max_msg_bytes }
    }

    /// Maximum accepted frame length.
    #[must_use]
    pub const fn max_msg_bytes(&self) -> usize {
        self.max_msg_bytes
    }

    /// Encodes a message. Payload size is not checked here; the pool bounds it.
    #[must_use]
    pub fn encode(message: &TxVoteMessage) -> Vec<u8> {
        let wire = match message {
            TxVoteMessage::Tx(msg) => WireTxVoteMessage {
                msg_type: wire_types::TX,
                payload: msg.tx.as_bytes().to_vec(),
                version: WIRE_VERSION,
            },
            TxVoteMessage::Unknown { msg_type } => WireTxVoteMessage {
                msg_type: *msg_type,
                payload: Vec::new(),
                version: WIRE_VERSION,
            },
        };
        wire.encode_to_vec()
    }

    /// Encodes a raw tx payload without copying it into a [`TxVote`] first.
    #[must_use]
    pub fn encode_tx(payload: &[u8]) -> Vec<u8> {
        WireTxVoteMessage {
            msg_type: wire_types::TX,
            payload: payload.to_vec(),
            version: WIRE_VERSION,
        }
        .encode_to_vec()
    }

    /// Decodes a frame.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::FrameTooLarge`] before looking at the content if
    /// the frame is too long, and [`DecodeError::UnrecognizedMessage`] if it is
    /// not a valid envelope.
    pub fn decode(&self, bytes: &[u8]) -> Result<TxVoteMessage, DecodeError> {
        if bytes.len() > self.max_msg_bytes {
            return Err(DecodeError::FrameTooLarge {
                size: bytes.len(),
                max: self.max_msg_bytes,
            });
        }

        let wire = WireTxVoteMessage::decode(bytes)
            .map_err(|e| DecodeError::UnrecognizedMessage(format!("invalid envelope: {e}")))?;

        if wire.version == 0 || wire.version > WIRE_VERSION {
            return Err(DecodeError::UnrecognizedMessage(format!(
                "unsupported wire version: {} (max supported: {WIRE_VERSION})",
                wire.version
            )));
        }

        match wire.msg_type {
            0 => Err(DecodeError::UnrecognizedMessage(
                "missing message type".to_string(),
            )),
            wire_types::TX => Ok(TxVoteMessage::tx(wire.payload)),
            msg_type => Ok(TxVoteMessage::Unknown { msg_type }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn frame(payload_len: usize) -> Vec<u8> {
        TxVoteCodec::encode(&TxVoteMessage::tx(vec![0xab; payload_len]))
    }

    #[test]
    fn tx_message_decodes() {
        let codec = TxVoteCodec::default();
        let bytes = TxVoteCodec::encode(&TxVoteMessage::tx(b"vote".to_vec()));
        assert_eq!(codec.decode(&bytes), Ok(TxVoteMessage::tx(b"vote".to_vec())));
    }

    #[test]
    fn encode_tx_matches_encode() {
        let payload = b"some vote".to_vec();
        assert_eq!(
            TxVoteCodec::encode_tx(&payload),
            TxVoteCodec::encode(&TxVoteMessage::tx(payload))
        );
    }

    #[test]
    fn empty_tx_decodes() {
        let codec = TxVoteCodec::default();
        assert_eq!(codec.decode(&frame(0)), Ok(TxVoteMessage::tx(Vec::new())));
    }

    #[test_case(0 ; "at the limit")]
    #[test_case(1 ; "one byte over")]
    #[test_case(100 ; "far over")]
    fn frame_limit_is_exact(over: usize) {
        let bytes = frame(32);
        let codec = TxVoteCodec::new(bytes.len() - over.min(bytes.len()));
        let result = codec.decode(&bytes);
        if over == 0 {
            assert!(matches!(result, Ok(TxVoteMessage::Tx(_))));
        } else {
            assert!(matches!(result, Err(DecodeError::FrameTooLarge { .. })));
        }
    }

    #[test]
    fn oversize_frame_fails_regardless_of_content() {
        let codec = TxVoteCodec::new(16);
        assert_eq!(
            codec.decode(&[0u8; 17]),
            Err(DecodeError::FrameTooLarge { size: 17, max: 16 })
        );
    }

    #[test]
    fn largest_tx_fills_default_frame_exactly() {
        let codec = TxVoteCodec::default();
        let bytes = frame(DEFAULT_MAX_MSG_BYTES - ENVELOPE_OVERHEAD);
        assert_eq!(bytes.len(), DEFAULT_MAX_MSG_BYTES);
        assert!(codec.decode(&bytes).is_ok());

        let bytes = frame(DEFAULT_MAX_MSG_BYTES - ENVELOPE_OVERHEAD + 1);
        assert!(matches!(
            codec.decode(&bytes),
            Err(DecodeError::FrameTooLarge { .. })
        ));
    }

    #[test_case(&[0xff, 0xff, 0xff] ; "truncated varint")]
    #[test_case(&[] ; "empty frame")]
    #[test_case(&[0x12, 0x10, 0x01] ; "payload length past end")]
    fn malformed_frames_are_unrecognized(bytes: &[u8]) {
        let codec = TxVoteCodec::default();
        assert!(matches!(
            codec.decode(bytes),
            Err(DecodeError::UnrecognizedMessage(_))
        ));
    }

    #[test]
    fn future_version_is_unrecognized() {
        let codec = TxVoteCodec::default();
        let bytes = WireTxVoteMessage {
            msg_type: wire_types::TX,
            payload: b"vote".to_vec(),
            version: WIRE_VERSION + 1,
        }
        .encode_to_vec();
        assert!(matches!(
            codec.decode(&bytes),
            Err(DecodeError::UnrecognizedMessage(_))
        ));
    }

    #[test]
    fn unknown_type_decodes_to_placeholder() {
        let codec = TxVoteCodec::default();
        let bytes = TxVoteCodec::encode(&TxVoteMessage::Unknown { msg_type: 42 });
        assert_eq!(codec.decode(&bytes), Ok(TxVoteMessage::Unknown { msg_type: 42 }));
    }

    #[test]
    fn tx_message_display() {
        let msg = TxMessage {
            tx: TxVote::from(&b"vote"[..]),
        };
        let shown = msg.to_string();
        assert!(shown.starts_with("[TxMessage "));
        assert!(shown.contains(&msg.tx.id().to_string()));
        assert_eq!(TxVoteMessage::Tx(msg).message_type(), "Tx");
    }
}
