//! Message serialization at the link boundary.
//!
//! A link carries bytes; which byte format those bytes use is the
//! embedder's choice. [`MessageCodec`] abstracts that choice behind
//! two methods, and [`JsonCodec`] is the format the fabric ships:
//! self-describing, so a captured exchange between worlds reads
//! directly in a log. The in-process channel transport in `tesser-rpc`
//! runs every message through the codec, keeping the wire form honest
//! even in same-process tests.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A message that could not cross the codec boundary.
#[derive(Debug)]
pub enum CodecError {
    /// The outbound message did not serialize.
    Encode(Box<dyn std::error::Error + Send + Sync>),
    /// The inbound bytes did not parse as a message.
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

impl CodecError {
    /// Wrap a serializer failure from the outbound side.
    pub fn encode(source: impl std::error::Error + Send + Sync + 'static) -> CodecError {
        CodecError::Encode(Box::new(source))
    }

    /// Wrap a parser failure from the inbound side.
    pub fn decode(source: impl std::error::Error + Send + Sync + 'static) -> CodecError {
        CodecError::Decode(Box::new(source))
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Encode(source) => write!(f, "could not encode message: {}", source),
            CodecError::Decode(source) => write!(f, "could not decode message: {}", source),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Encode(source) => Some(source.as_ref()),
            CodecError::Decode(source) => Some(source.as_ref()),
        }
    }
}

/// The byte format of a link.
///
/// A codec is held by value inside a transport, hence `Clone +
/// 'static`. Message types are serde data, so any serde-backed format
/// slots in here; implementing the two methods is the whole job.
pub trait MessageCodec: Clone + 'static {
    /// Serialize `msg` for transmission.
    ///
    /// # Errors
    ///
    /// [`CodecError::Encode`] when `msg` has no representation in this
    /// format.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Parse a received buffer back into a message.
    ///
    /// # Errors
    ///
    /// [`CodecError::Decode`] when `buf` is not a valid encoding of a
    /// `T`.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// The default format: JSON through serde_json.
///
/// Verbose on the wire but self-describing; swap it per link when
/// throughput starts to matter.
#[derive(Clone, Copy, Default, Debug)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(CodecError::encode)
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(CodecError::decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ObjectId, WorldId};
    use crate::message::{Message, WireValue};

    #[test]
    fn test_json_codec_message_roundtrip() {
        let codec = JsonCodec;
        let msg = Message::Call {
            seq: 1,
            world_id: WorldId(0),
            object_id: ObjectId(2),
            member: "sum".to_string(),
            args: vec![WireValue::Int(1), WireValue::Int(3)],
        };

        let bytes = codec.encode(&msg).expect("encode should succeed");
        let decoded: Message = codec.decode(&bytes).expect("decode should succeed");

        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<Message, CodecError> = codec.decode(b"not valid json {");

        let err = result.expect_err("decode should fail");
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().contains("could not decode message"));
    }

    #[test]
    fn test_json_codec_type_mismatch() {
        let codec = JsonCodec;
        let bytes = codec.encode(&"just a string").expect("encode should succeed");

        let result: Result<Message, CodecError> = codec.decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn test_codec_error_exposes_source() {
        let err = JsonCodec
            .decode::<Message>(b"{")
            .expect_err("decode should fail");
        assert!(std::error::Error::source(&err).is_some());
    }
}
