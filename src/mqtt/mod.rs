//! # MQTT Integration Module
//!
//! Broker side of the bridge, built on rumqttc's async client.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - broker URL, credentials and client tuning
//! ├── message_manager.rs  - received messages and broker lifecycle events
//! └── mqtt_handler.rs     - event loop task and the non-blocking publisher
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! rumqttc EventLoop ─poll()→ translate() ─[BrokerEvent]→ bridge channel
//! bridge ─→ MqttPublisher ─try_publish()→ rumqttc request queue
//! ```
//!
//! The client registers a retained last will of `"0"` on `<name>/connected`,
//! so subscribers see the bridge as down if the process dies. Everything is
//! sent at QoS 0.

pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
