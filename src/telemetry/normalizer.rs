//! Per-protocol telemetry policy
//!
//! | protocol | fragment                     | `val`          | retain |
//! |----------|------------------------------|----------------|--------|
//! | EM       | `EM/<address>`               | `data.current` | yes    |
//! | HMS, WS  | `<proto>/<address>/<field>`  | `data[field]`  | yes    |
//! | FS20     | `FS20/<address>`             | `data.cmdRaw`  | no     |
//! | MORITZ   | `MORITZ/<address>`           | none           | yes    |
//!
//! FS20 frames are commands, not sensor state, so they are never retained.
//! MORITZ frames without a known `msgType` are suppressed.

use super::{DeviceEvent, Protocol, TelemetryEnvelope};
use serde_json::{map, Map, Value};
use tracing::{debug, warn};

/// Lazy sequence of envelopes produced from one [`DeviceEvent`].
///
/// Finite and single-pass. Multi-field protocols yield one envelope per data
/// field in the order the decoder produced them.
pub struct Envelopes<'a> {
    inner: Inner<'a>,
}

enum Inner<'a> {
    Single(Option<TelemetryEnvelope>),
    Fields {
        prefix: String,
        meta: Map<String, Value>,
        fields: map::Iter<'a>,
    },
}

impl Envelopes<'_> {
    fn empty() -> Self {
        Self {
            inner: Inner::Single(None),
        }
    }

    fn single(envelope: TelemetryEnvelope) -> Self {
        Self {
            inner: Inner::Single(Some(envelope)),
        }
    }
}

impl Iterator for Envelopes<'_> {
    type Item = TelemetryEnvelope;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Single(envelope) => envelope.take(),
            Inner::Fields {
                prefix,
                meta,
                fields,
            } => fields.next().map(|(field, value)| TelemetryEnvelope {
                fragment: format!("{}/{}", prefix, field),
                value: Some(value.clone()),
                retain: true,
                cul: meta.clone(),
            }),
        }
    }
}

/// Normalizes a decoded frame into zero or more telemetry envelopes.
///
/// Never fails. Frames without protocol or data are dropped with a debug
/// trace; protocols without a policy are dropped with a warning.
pub fn normalize(event: &DeviceEvent) -> Envelopes<'_> {
    let (protocol, data) = match (&event.protocol, &event.data) {
        (Some(protocol), Some(data)) => (protocol, data),
        _ => {
            debug!("Dropping incomplete frame: {:?}", event);
            return Envelopes::empty();
        }
    };

    match protocol {
        Protocol::Em => {
            let mut cul = Map::new();
            cul.insert("em".to_string(), Value::Object(data.clone()));
            Envelopes::single(TelemetryEnvelope {
                fragment: format!("EM/{}", event.address),
                value: data.get("current").cloned(),
                retain: true,
                cul: with_link_meta(cul, event),
            })
        }
        Protocol::Hms | Protocol::Ws => Envelopes {
            inner: Inner::Fields {
                prefix: format!("{}/{}", protocol.tag(), event.address),
                meta: with_link_meta(Map::new(), event),
                fields: data.iter(),
            },
        },
        Protocol::Fs20 => {
            let mut cul = Map::new();
            cul.insert("fs20".to_string(), Value::Object(data.clone()));
            Envelopes::single(TelemetryEnvelope {
                fragment: format!("FS20/{}", event.address),
                value: data.get("cmdRaw").cloned(),
                retain: false,
                cul: with_link_meta(cul, event),
            })
        }
        Protocol::Moritz => {
            if !data.get("msgType").is_some_and(is_truthy) {
                debug!("Suppressing MORITZ frame from {} without msgType", event.address);
                return Envelopes::empty();
            }
            let mut cul = Map::new();
            cul.insert("data".to_string(), Value::Object(data.clone()));
            Envelopes::single(TelemetryEnvelope {
                fragment: format!("MORITZ/{}", event.address),
                value: None,
                retain: true,
                cul: with_link_meta(cul, event),
            })
        }
        Protocol::Other(tag) => {
            warn!("unknown protocol {}", tag);
            Envelopes::empty()
        }
    }
}

fn with_link_meta(mut cul: Map<String, Value>, event: &DeviceEvent) -> Map<String, Value> {
    if let Some(rssi) = event.rssi {
        cul.insert("rssi".to_string(), Value::from(rssi));
    }
    if let Some(device) = &event.device {
        cul.insert("device".to_string(), Value::String(device.clone()));
    }
    cul
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
