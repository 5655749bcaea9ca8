//! Text frame decoder for culfw receive lines
//!
//! culfw reports every received radio frame as one line of hex text whose
//! first character names the protocol family:
//!
//! ```text
//! F hhhh aa cc [ee] [rr]              FS20
//! E tt aa cc TTTT CCCC PPPP [rr]      EM1000 (16-bit words little-endian)
//! K f t d d d d d d [rr]              S300 weather sensors
//! H hhhh s k t t f t f f [rr]         HMS (k = sensor type)
//! Z ll nn ff tt ssssss dddddd gg ...  MAX! (Moritz)
//! ```
//!
//! `rr` is the RSSI byte appended in `X21` reporting mode. This decoder only
//! lifts fields out of the text; it does not validate checksums or timing.

use super::fs20;
use crate::telemetry::{DeviceEvent, Protocol};
use serde_json::{Map, Value};

/// Result of decoding one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(DeviceEvent),
    /// Answer to the `V` query
    Version(String),
    Unparsed(String),
}

pub trait FrameDecoder: Send + 'static {
    fn decode(&self, line: &str) -> Frame;
}

#[derive(Debug, Clone, Default)]
pub struct CulDecoder {
    /// Strip and convert a trailing RSSI byte
    rssi: bool,
}

impl CulDecoder {
    pub fn new(rssi: bool) -> Self {
        Self { rssi }
    }

    fn split_rssi<'a>(&self, body: &'a str) -> Option<(&'a str, Option<f64>)> {
        if !self.rssi {
            return Some((body, None));
        }
        let split = body.len().checked_sub(2)?;
        let raw = hex_u8(&body[split..])?;
        Some((&body[..split], Some(rssi_dbm(raw))))
    }
}

impl FrameDecoder for CulDecoder {
    fn decode(&self, line: &str) -> Frame {
        let line = line.trim();
        let line = line.strip_prefix('*').unwrap_or(line);

        if let Some(version) = line.strip_prefix("V ") {
            return Frame::Version(version.trim().to_string());
        }
        if !line.is_ascii() || line.len() < 2 {
            return Frame::Unparsed(line.to_string());
        }

        let (kind, body) = line.split_at(1);
        let Some((body, rssi)) = self.split_rssi(body) else {
            return Frame::Unparsed(line.to_string());
        };

        let event = match kind {
            "F" => decode_fs20(body),
            "E" => decode_em(body),
            "K" => decode_ws(body),
            "H" => decode_hms(body),
            "Z" => decode_moritz(body),
            "T" => Some(decode_raw("FHT", body)),
            "R" => Some(decode_raw("HOERMANN", body)),
            "S" => Some(decode_raw("ESA", body)),
            "A" => Some(decode_raw("ASKSIN", body)),
            _ => None,
        };

        match event {
            Some(mut event) => {
                event.rssi = rssi;
                Frame::Event(event)
            }
            None => Frame::Unparsed(line.to_string()),
        }
    }
}

/// culfw RSSI byte to dBm.
fn rssi_dbm(raw: u8) -> f64 {
    let raw = f64::from(raw);
    if raw >= 128.0 {
        (raw - 256.0) / 2.0 - 74.0
    } else {
        raw / 2.0 - 74.0
    }
}

fn hex_u8(text: &str) -> Option<u8> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(text, 16).ok()
}

fn le_word(text: &str) -> Option<u16> {
    let low = hex_u8(text.get(0..2)?)?;
    let high = hex_u8(text.get(2..4)?)?;
    Some(u16::from(high) << 8 | u16::from(low))
}

fn digit(text: &str, index: usize) -> Option<u32> {
    text.chars().nth(index)?.to_digit(10)
}

fn decode_fs20(body: &str) -> Option<DeviceEvent> {
    if !(body.len() == 8 || body.len() == 10) || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let code = hex_u8(&body[6..8])?;

    let mut data = Map::new();
    data.insert("addressCode".into(), Value::from(&body[0..4]));
    data.insert("addressDevice".into(), Value::from(&body[4..6]));
    if let Some(name) = fs20::command_name(code) {
        data.insert("cmd".into(), Value::from(name));
    }
    data.insert("cmdRaw".into(), Value::from(&body[6..8]));
    if code & fs20::EXTENSION_FLAG != 0 && body.len() == 10 {
        data.insert("extended".into(), Value::from(&body[8..10]));
    }

    Some(DeviceEvent::new(Protocol::Fs20, &body[0..6], data))
}

fn decode_em(body: &str) -> Option<DeviceEvent> {
    if body.len() != 18 {
        return None;
    }
    let kind = hex_u8(&body[0..2])?;
    let address = hex_u8(&body[2..4])?;

    let mut data = Map::new();
    data.insert("type".into(), Value::from(kind));
    data.insert("cnt".into(), Value::from(hex_u8(&body[4..6])?));
    data.insert("total".into(), Value::from(le_word(&body[6..10])?));
    data.insert("current".into(), Value::from(le_word(&body[10..14])?));
    data.insert("peak".into(), Value::from(le_word(&body[14..18])?));

    let event = DeviceEvent::new(Protocol::Em, address.to_string(), data);
    Some(match kind {
        1 => event.with_device("EM1000-S"),
        2 => event.with_device("EM1000-EM"),
        3 => event.with_device("EM1000-GZ"),
        _ => event,
    })
}

fn decode_ws(body: &str) -> Option<DeviceEvent> {
    let first = body.chars().next()?.to_digit(16)?;
    let kind = body.chars().nth(1)?.to_digit(16)?;
    let code = (first & 7) + 1;
    let sign = if first & 8 != 0 { -1.0 } else { 1.0 };

    let temperature = || -> Option<f64> {
        let tenths = digit(body, 5)? * 100 + digit(body, 2)? * 10 + digit(body, 3)?;
        Some(sign * f64::from(tenths) / 10.0)
    };
    let humidity = || -> Option<f64> {
        let tenths = digit(body, 6)? * 100 + digit(body, 7)? * 10 + digit(body, 4)?;
        Some(f64::from(tenths) / 10.0)
    };

    let mut data = Map::new();
    let device = match kind {
        0 => {
            data.insert("temperature".into(), Value::from(temperature()?));
            None
        }
        1 => {
            data.insert("temperature".into(), Value::from(temperature()?));
            data.insert("humidity".into(), Value::from(humidity()?));
            Some("S300TH")
        }
        _ => {
            data.insert("raw".into(), Value::from(body));
            None
        }
    };

    let event = DeviceEvent::new(Protocol::Ws, code.to_string(), data);
    Some(match device {
        Some(device) => event.with_device(device),
        None => event,
    })
}

fn decode_hms(body: &str) -> Option<DeviceEvent> {
    let address = body.get(0..4)?;
    if !address.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let address = address.to_ascii_lowercase();

    match decode_hms_climate(body) {
        Some((device, data)) => {
            Some(DeviceEvent::new(Protocol::Hms, address, data).with_device(device))
        }
        None => {
            let mut data = Map::new();
            data.insert("raw".into(), Value::from(&body[4..]));
            Some(DeviceEvent::new(Protocol::Hms, address, data))
        }
    }
}

/// HMS100T and HMS100TF readings.
///
/// Digits after the status byte are `t1 t0 f0 t2 f2 f1`: temperature
/// `t2 t1 . t0`, humidity `f2 f1 . f0`. The status high nibble carries the
/// sign (8) and battery state (2 empty, 4 replaced); the low nibble is the
/// sensor type.
fn decode_hms_climate(body: &str) -> Option<(&'static str, Map<String, Value>)> {
    if body.len() < 12 {
        return None;
    }
    let status = body.chars().nth(4)?.to_digit(16)?;
    let kind = body.chars().nth(5)?.to_digit(16)?;
    let device = match kind {
        0 => "HMS100TF",
        1 => "HMS100T",
        _ => return None,
    };

    let sign = if status & 8 != 0 { -1.0 } else { 1.0 };
    let tenths = digit(body, 9)? * 100 + digit(body, 6)? * 10 + digit(body, 7)?;
    let battery = if status & 2 != 0 {
        "empty"
    } else if status & 4 != 0 {
        "replaced"
    } else {
        "ok"
    };

    let mut data = Map::new();
    data.insert("temperature".into(), Value::from(sign * f64::from(tenths) / 10.0));
    if kind == 0 {
        let humidity = digit(body, 10)? * 100 + digit(body, 11)? * 10 + digit(body, 8)?;
        data.insert("humidity".into(), Value::from(f64::from(humidity) / 10.0));
    }
    data.insert("battery".into(), Value::from(battery));
    Some((device, data))
}

fn decode_moritz(body: &str) -> Option<DeviceEvent> {
    if body.len() < 22 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let kind = hex_u8(&body[6..8])?;
    let src = body[8..14].to_ascii_lowercase();

    let mut data = Map::new();
    data.insert("len".into(), Value::from(hex_u8(&body[0..2])?));
    data.insert("msgcnt".into(), Value::from(hex_u8(&body[2..4])?));
    data.insert("msgFlag".into(), Value::from(hex_u8(&body[4..6])?));
    data.insert("msgTypeRaw".into(), Value::from(kind));
    if let Some(name) = moritz_message_type(kind) {
        data.insert("msgType".into(), Value::from(name));
    }
    data.insert("src".into(), Value::from(src.clone()));
    data.insert("dst".into(), Value::from(body[14..20].to_ascii_lowercase()));
    data.insert("groupid".into(), Value::from(hex_u8(&body[20..22])?));
    data.insert("payload".into(), Value::from(&body[22..]));

    Some(DeviceEvent::new(Protocol::Moritz, src, data))
}

fn moritz_message_type(kind: u8) -> Option<&'static str> {
    Some(match kind {
        0x00 => "PairPing",
        0x01 => "PairPong",
        0x02 => "Ack",
        0x03 => "TimeInformation",
        0x10 => "ConfigWeekProfile",
        0x11 => "ConfigTemperatures",
        0x12 => "ConfigValve",
        0x20 => "AddLinkPartner",
        0x21 => "RemoveLinkPartner",
        0x22 => "SetGroupId",
        0x23 => "RemoveGroupId",
        0x30 => "ShutterContactState",
        0x40 => "SetTemperature",
        0x42 => "WallThermostatControl",
        0x43 => "SetComfortTemperature",
        0x44 => "SetEcoTemperature",
        0x50 => "PushButtonState",
        0x60 => "ThermostatState",
        0x70 => "WallThermostatState",
        0x82 => "SetDisplayActualTemperature",
        0xf0 => "Reset",
        0xf1 => "WakeUp",
        _ => return None,
    })
}

fn decode_raw(tag: &str, body: &str) -> DeviceEvent {
    let address = body.get(0..4).unwrap_or(body).to_ascii_lowercase();
    let mut data = Map::new();
    data.insert("raw".into(), Value::from(body));
    DeviceEvent::new(Protocol::from(tag), address, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(frame: Frame) -> DeviceEvent {
        match frame {
            Frame::Event(event) => event,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn fs20_switch_on() {
        let event = event(CulDecoder::new(false).decode("F12340111\r\n"));

        assert_eq!(event.protocol, Some(Protocol::Fs20));
        assert_eq!(event.address, "123401");
        let data = event.data.expect("data");
        assert_eq!(data["cmd"], json!("on"));
        assert_eq!(data["cmdRaw"], json!("11"));
        assert_eq!(data["addressCode"], json!("1234"));
        assert_eq!(event.rssi, None);
    }

    #[test]
    fn fs20_with_extension_and_rssi() {
        let event = event(CulDecoder::new(true).decode("F123401390530"));

        let data = event.data.expect("data");
        assert_eq!(data["cmd"], json!("on-for-timer"));
        assert_eq!(data["extended"], json!("05"));
        assert_eq!(event.rssi, Some(-50.0));
    }

    #[test]
    fn rssi_above_127_is_negative() {
        let event = event(CulDecoder::new(true).decode("F12340111F0"));
        assert_eq!(event.rssi, Some(-82.0));
    }

    #[test]
    fn em_words_are_little_endian() {
        let event = event(CulDecoder::new(false).decode("E01050A341205000A00"));

        assert_eq!(event.protocol, Some(Protocol::Em));
        assert_eq!(event.address, "5");
        assert_eq!(event.device.as_deref(), Some("EM1000-S"));
        let data = event.data.expect("data");
        assert_eq!(data["cnt"], json!(10));
        assert_eq!(data["total"], json!(0x1234));
        assert_eq!(data["current"], json!(5));
        assert_eq!(data["peak"], json!(10));
    }

    #[test]
    fn s300th_temperature_and_humidity() {
        let event = event(CulDecoder::new(false).decode("K11153245"));

        assert_eq!(event.protocol, Some(Protocol::Ws));
        assert_eq!(event.address, "2");
        assert_eq!(event.device.as_deref(), Some("S300TH"));
        let data = event.data.expect("data");
        assert_eq!(data["temperature"], json!(21.5));
        assert_eq!(data["humidity"], json!(45.3));
    }

    #[test]
    fn s300th_negative_temperature() {
        let event = event(CulDecoder::new(false).decode("K91153245"));
        assert_eq!(event.data.expect("data")["temperature"], json!(-21.5));
    }

    #[test]
    fn moritz_known_message_type() {
        let event = event(CulDecoder::new(false).decode("Z0B0100420A1B2C000000001234"));

        assert_eq!(event.protocol, Some(Protocol::Moritz));
        assert_eq!(event.address, "0a1b2c");
        let data = event.data.expect("data");
        assert_eq!(data["msgType"], json!("WallThermostatControl"));
        assert_eq!(data["payload"], json!("1234"));
    }

    #[test]
    fn moritz_unknown_message_type_has_no_name() {
        let event = event(CulDecoder::new(false).decode("Z0B0100990A1B2C000000001234"));
        let data = event.data.expect("data");
        assert!(data.get("msgType").is_none());
        assert_eq!(data["msgTypeRaw"], json!(0x99));
    }

    #[test]
    fn hms100tf_climate_reading() {
        let event = event(CulDecoder::new(false).decode("H1A2B00153248"));

        assert_eq!(event.protocol, Some(Protocol::Hms));
        assert_eq!(event.address, "1a2b");
        assert_eq!(event.device.as_deref(), Some("HMS100TF"));
        let data = event.data.expect("data");
        let fields: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(fields, ["temperature", "humidity", "battery"]);
        assert_eq!(data["temperature"], json!(21.5));
        assert_eq!(data["humidity"], json!(48.3));
        assert_eq!(data["battery"], json!("ok"));
    }

    #[test]
    fn hms100t_negative_with_empty_battery() {
        let event = event(CulDecoder::new(true).decode("H1a2ba115324846"));

        assert_eq!(event.device.as_deref(), Some("HMS100T"));
        let data = event.data.expect("data");
        assert_eq!(data["temperature"], json!(-21.5));
        assert_eq!(data["battery"], json!("empty"));
        assert!(data.get("humidity").is_none());
        assert!(event.rssi.is_some());
    }

    #[test]
    fn other_hms_types_stay_raw() {
        let event = event(CulDecoder::new(false).decode("H1a2b03000000"));
        assert_eq!(event.device, None);
        assert_eq!(event.data.expect("data")["raw"], json!("03000000"));
    }

    #[test]
    fn signed_hex_is_rejected() {
        let decoder = CulDecoder::new(false);
        assert_eq!(
            decoder.decode("E+1050A341205000A00"),
            Frame::Unparsed("E+1050A341205000A00".to_string())
        );
        assert_eq!(
            CulDecoder::new(true).decode("F12340111+5"),
            Frame::Unparsed("F12340111+5".to_string())
        );
    }

    #[test]
    fn stacked_cul_prefix_is_stripped() {
        let event = event(CulDecoder::new(false).decode("*F12340100"));
        assert_eq!(event.data.expect("data")["cmd"], json!("off"));
    }

    #[test]
    fn unsupported_family_keeps_its_tag() {
        let event = event(CulDecoder::new(false).decode("T12340126"));
        assert_eq!(event.protocol, Some(Protocol::from("FHT")));
        assert_eq!(event.address, "1234");
    }

    #[test]
    fn version_answer() {
        assert_eq!(
            CulDecoder::new(true).decode("V 1.67 CUL868\r\n"),
            Frame::Version("1.67 CUL868".to_string())
        );
    }

    #[test]
    fn garbage_is_unparsed() {
        let decoder = CulDecoder::new(false);
        assert_eq!(decoder.decode("LOVF"), Frame::Unparsed("LOVF".to_string()));
        assert_eq!(decoder.decode("F12"), Frame::Unparsed("F12".to_string()));
        assert_eq!(decoder.decode(""), Frame::Unparsed(String::new()));
    }
}
