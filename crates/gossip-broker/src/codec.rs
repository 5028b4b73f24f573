use bytes::Bytes;
use gossip_types::Msg;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("could not decode message: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Encode a message for publishing.
pub fn encode_msg(msg: &Msg) -> Bytes {
    // Serializing a struct of strings, a timestamp and an integer cannot fail.
    Bytes::from(serde_json::to_vec(msg).unwrap_or_default())
}

/// Decode a delivered payload. Malformed input always yields an error, never
/// a partially filled message.
pub fn decode_msg(data: &[u8]) -> Result<Msg, DecodeError> {
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_wire_message() {
        let msg = decode_msg(br#"{"from":"alice","text":"hello","time":"2024-05-01T10:00:00Z","seq":7}"#)
            .unwrap();
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.text, "hello");
        assert_eq!(msg.seq, 7);
        assert_eq!(msg.time, chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn encoded_message_decodes() {
        let msg = Msg::new("bob", "hi there");
        let decoded = decode_msg(&encode_msg(&msg)).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_msg(b"\xff\x00not json").is_err());
        assert!(decode_msg(b"").is_err());
        // Valid JSON, missing fields.
        assert!(decode_msg(br#"{"from":"alice"}"#).is_err());
    }
}
