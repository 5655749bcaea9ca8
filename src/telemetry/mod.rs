//! # Telemetry Module
//!
//! Turns decoded radio frames into MQTT-ready telemetry. Everything in here is
//! pure: no I/O, no clocks except where a caller passes a timestamp in.
//!
//! ## Module Architecture
//!
//! ```text
//! telemetry/
//! ├── normalizer.rs  - DeviceEvent ──► TelemetryEnvelope(s), one policy per protocol
//! ├── topic_map.rs   - canonical fragment ──► operator topic name
//! └── payload.rs     - envelope + timestamp ──► PublishedMessage ──► JSON bytes
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! DeviceEvent ──► normalize() ──► TelemetryEnvelope ──► TopicMap::map() ──► PublishedMessage
//!  (CUL link)       (0..N)          fragment "EM/5"      "power/meter"       "<name>/status/..."
//! ```
//!
//! Fragments are derived only from protocol, address and field name, so the
//! same device field always lands on the same fragment. That is what lets the
//! topic map be a static lookup table.

pub mod normalizer;
pub mod payload;
pub mod topic_map;

pub use normalizer::{normalize, Envelopes};
pub use payload::{encode_payload, PublishedMessage, TelemetryPayload};
pub use topic_map::TopicMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Radio protocols reported by the transceiver.
///
/// Only the first five variants have a telemetry policy. Everything else the
/// decoder recognises ends up in [`Protocol::Other`] carrying its tag, so the
/// normalizer can name it in a warning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Protocol {
    /// EM1000 energy monitors
    Em,
    /// HMS100 family sensors
    Hms,
    /// S300/KS300 weather sensors
    Ws,
    /// FS20 switches and remotes
    Fs20,
    /// MAX! (Moritz) thermostats and contacts
    Moritz,
    /// Any tag without a telemetry policy
    Other(String),
}

impl Protocol {
    pub fn tag(&self) -> &str {
        match self {
            Protocol::Em => "EM",
            Protocol::Hms => "HMS",
            Protocol::Ws => "WS",
            Protocol::Fs20 => "FS20",
            Protocol::Moritz => "MORITZ",
            Protocol::Other(tag) => tag,
        }
    }
}

impl From<&str> for Protocol {
    fn from(tag: &str) -> Self {
        match tag {
            "EM" => Protocol::Em,
            "HMS" => Protocol::Hms,
            "WS" => Protocol::Ws,
            "FS20" => Protocol::Fs20,
            "MORITZ" => Protocol::Moritz,
            other => Protocol::Other(other.to_string()),
        }
    }
}

impl From<String> for Protocol {
    fn from(tag: String) -> Self {
        Protocol::from(tag.as_str())
    }
}

impl From<Protocol> for String {
    fn from(protocol: Protocol) -> Self {
        protocol.tag().to_string()
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single decoded radio frame.
///
/// `protocol` and `data` are optional because ingest is permissive: a frame
/// missing either one is dropped by the normalizer instead of being rejected
/// further upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub address: String,
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl DeviceEvent {
    pub fn new(protocol: Protocol, address: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            protocol: Some(protocol),
            address: address.into(),
            data: Some(data),
            rssi: None,
            device: None,
        }
    }

    pub fn with_rssi(mut self, rssi: f64) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

/// One normalized telemetry unit, ready for topic mapping and publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEnvelope {
    /// Canonical topic suffix, e.g. `HMS/1a2b/temperature`
    pub fragment: String,
    /// Value for the `val` key; `None` omits the key entirely
    pub value: Option<Value>,
    pub retain: bool,
    /// Contents of the `cul` key in the published payload
    pub cul: Map<String, Value>,
}
