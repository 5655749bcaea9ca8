//! Bridge between a CUL 433/868 MHz transceiver and an MQTT broker.
//!
//! Decoded radio frames are published as JSON telemetry below
//! `<name>/status/`, the bridge health as a retained `0`/`1`/`2` on
//! `<name>/connected`, and FS20 commands arriving on `<prefix>/set/#` are
//! sent back out over the air.

pub mod bridge;
pub mod config;
pub mod cul;
pub mod mqtt;
pub mod telemetry;
