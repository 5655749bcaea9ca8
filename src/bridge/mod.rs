//! # Bridge Module
//!
//! The only stateful part of cul2mqtt. It sits between the two transport
//! adapters and decides what gets published where.
//!
//! ## Module Architecture
//!
//! ```text
//! bridge/
//! ├── state.rs         - link liveness flags and the derived status code
//! ├── orchestrator.rs  - event dispatch: lifecycle, telemetry, commands
//! ├── command.rs       - `<prefix>/set/...` messages to culfw send strings
//! └── error.rs         - error taxonomy of the seams
//! ```
//!
//! ## Concurrency Model
//!
//! Both adapters push [`BridgeEvent`]s into one channel. A single task owns the
//! [`Bridge`] and handles one event at a time, so the connection flags need no
//! locking. Handlers never wait: publishing and serial writes only enqueue.
//! Events from one adapter keep their order; events from the two adapters
//! interleave freely.
//!
//! ## Transport Seams
//!
//! The bridge talks to the outside world only through [`BrokerLink`] and
//! [`RfLink`]. Production code plugs in the rumqttc client and the serial
//! writer; tests plug in recorders.

pub mod command;
pub mod error;
pub mod orchestrator;
pub mod state;

pub use command::Command;
pub use error::{CommandError, LinkError};
pub use orchestrator::{Bridge, BridgeSettings};
pub use state::{ConnectionState, StatusCode};

use crate::cul::RfEvent;
use crate::mqtt::message_manager::BrokerEvent;

/// Everything the bridge reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Broker(BrokerEvent),
    Rf(RfEvent),
}

impl From<BrokerEvent> for BridgeEvent {
    fn from(event: BrokerEvent) -> Self {
        BridgeEvent::Broker(event)
    }
}

impl From<RfEvent> for BridgeEvent {
    fn from(event: RfEvent) -> Self {
        BridgeEvent::Rf(event)
    }
}

/// Outbound half of the broker adapter.
///
/// Both calls must return without waiting for the network.
pub trait BrokerLink {
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), LinkError>;

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError>;
}

/// Outbound half of the RF adapter.
pub trait RfLink {
    /// Queues one culfw command line (without terminator).
    fn write(&mut self, command: &str) -> Result<(), LinkError>;
}
