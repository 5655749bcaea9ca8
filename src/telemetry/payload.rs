//! Wire format of telemetry messages
//!
//! ```json
//! {"ts": 1700000000000, "val": 21.5, "cul": {"rssi": -71.5}}
//! ```
//!
//! `ts` is taken when the message is built, not when the frame was received.

use super::TelemetryEnvelope;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryPayload {
    /// Milliseconds since the Unix epoch
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub val: Option<Value>,
    pub cul: Map<String, Value>,
}

/// A telemetry message addressed to its final topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: TelemetryPayload,
    pub retain: bool,
}

impl PublishedMessage {
    pub fn new(topic: String, envelope: TelemetryEnvelope, ts: i64) -> Self {
        Self {
            topic,
            payload: TelemetryPayload {
                ts,
                val: envelope.value,
                cul: envelope.cul,
            },
            retain: envelope.retain,
        }
    }
}

/// Serializes the payload of `message` to JSON bytes.
pub fn encode_payload(message: &PublishedMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&message.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(value: Option<Value>) -> TelemetryEnvelope {
        let mut cul = Map::new();
        cul.insert("rssi".to_string(), json!(-71.5));
        TelemetryEnvelope {
            fragment: "HMS/1a2b/temp".to_string(),
            value,
            retain: true,
            cul,
        }
    }

    #[test]
    fn payload_carries_ts_val_and_cul() {
        let message = PublishedMessage::new(
            "cul/status/HMS/1a2b/temp".to_string(),
            envelope(Some(json!(21.5))),
            1_700_000_000_000,
        );
        let bytes = encode_payload(&message).expect("serializable");

        assert_eq!(
            String::from_utf8(bytes).expect("utf8"),
            r#"{"ts":1700000000000,"val":21.5,"cul":{"rssi":-71.5}}"#
        );
        assert!(message.retain);
    }

    #[test]
    fn absent_value_omits_val_key() {
        let message = PublishedMessage::new("cul/status/MORITZ/0a1b2c".to_string(), envelope(None), 1);
        let decoded: Value =
            serde_json::from_slice(&encode_payload(&message).expect("serializable")).expect("json");

        assert!(decoded.get("val").is_none());
        assert_eq!(decoded["ts"], json!(1));
    }
}
