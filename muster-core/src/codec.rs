//! Pluggable message serialization.
//!
//! The [`MessageCodec`] trait allows users to bring their own serialization
//! format (JSON, bincode, messagepack, etc.) for call envelopes and replies.
//! [`JsonCodec`] is the default: human-readable on the wire, which makes
//! debugging broadcast traffic with tcpdump pleasant, and a natural fit for
//! `serde_json::Value` call arguments.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a message to bytes.
    #[error("encode error: {0}")]
    Encode(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// Failed to decode bytes to a message.
    #[error("decode error: {0}")]
    Decode(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pluggable message serialization format.
///
/// Implement this trait to use a custom serialization format for the call
/// envelope and reply payloads. Instances are cloned into every peer-client
/// worker and server connection task, hence the `Clone + Send + Sync`
/// requirement.
pub trait MessageCodec: Clone + Send + Sync + 'static {
    /// Encode a serializable message to bytes.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes to a deserializable message.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Decode` if deserialization fails.
    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
///
/// # Example
///
/// ```rust
/// use muster_core::{JsonCodec, MessageCodec};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, PartialEq, Debug)]
/// struct Call { name: String }
///
/// let codec = JsonCodec;
/// let call = Call { name: "Add".to_string() };
///
/// let bytes = codec.encode(&call).unwrap();
/// let decoded: Call = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, call);
/// ```
#[derive(Clone, Copy, Default, Debug)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(msg).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, buf: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(buf).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
    struct NamedCall {
        name: String,
        args: Vec<serde_json::Value>,
    }

    #[test]
    fn json_codec_roundtrip() {
        let codec = JsonCodec;
        let msg = NamedCall {
            name: "AddToCounter".to_string(),
            args: vec![serde_json::json!(3)],
        };

        let bytes = codec.encode(&msg).expect("encode should succeed");
        let decoded: NamedCall = codec.decode(&bytes).expect("decode should succeed");

        assert_eq!(msg, decoded);
    }

    #[test]
    fn json_codec_primitives() {
        let codec = JsonCodec;

        let n = 12345u64;
        let bytes = codec.encode(&n).expect("encode should succeed");
        let decoded: u64 = codec.decode(&bytes).expect("decode should succeed");
        assert_eq!(n, decoded);

        let v = vec![1, 2, 3];
        let bytes = codec.encode(&v).expect("encode should succeed");
        let decoded: Vec<i32> = codec.decode(&bytes).expect("decode should succeed");
        assert_eq!(v, decoded);
    }

    #[test]
    fn json_codec_decode_error() {
        let codec = JsonCodec;
        let invalid = b"not valid json {";

        let result: Result<NamedCall, CodecError> = codec.decode(invalid);
        let err = result.expect_err("decode should fail");
        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn json_codec_type_mismatch() {
        let codec = JsonCodec;
        let msg = NamedCall {
            name: "Add".to_string(),
            args: vec![],
        };

        let bytes = codec.encode(&msg).expect("encode should succeed");
        let result: Result<u64, CodecError> = codec.decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn json_codec_result_payload() {
        // Replies travel as Result<_, E> values; make sure both arms survive.
        let codec = JsonCodec;

        let ok: Result<Vec<i64>, String> = Ok(vec![31]);
        let bytes = codec.encode(&ok).expect("encode should succeed");
        let decoded: Result<Vec<i64>, String> =
            codec.decode(&bytes).expect("decode should succeed");
        assert_eq!(ok, decoded);

        let err: Result<Vec<i64>, String> = Err("boom".to_string());
        let bytes = codec.encode(&err).expect("encode should succeed");
        let decoded: Result<Vec<i64>, String> =
            codec.decode(&bytes).expect("decode should succeed");
        assert_eq!(err, decoded);
    }
}
