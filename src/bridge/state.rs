//! Liveness of the two links and the status code derived from it
//!
//! ```text
//!                 broker up                 rf up
//!  Disconnected ────────────► BrokerOnly ────────────► FullyUp
//!   (0)      ◄──────────────   (1)      ◄────────────   (2)
//!    │  ▲      broker down               rf down        │
//!    │  │                                               │
//!    ▼  │ rf up/down                        broker down │
//!  RfOnly (0) ◄─────────────────────────────────────────┘
//! ```
//!
//! The code published on `<name>/connected` depends only on the two flags:
//! `0` while the broker is down (the broker-side will says the same), `1`
//! with the broker up and the transceiver down, `2` with both up.

use std::fmt;

/// Value published on the status topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StatusCode {
    Disconnected = 0,
    BrokerOnly = 1,
    Connected = 2,
}

impl StatusCode {
    pub fn from_links(rf_connected: bool, broker_connected: bool) -> Self {
        match (broker_connected, rf_connected) {
            (false, _) => StatusCode::Disconnected,
            (true, false) => StatusCode::BrokerOnly,
            (true, true) => StatusCode::Connected,
        }
    }

    pub fn as_payload(self) -> &'static str {
        match self {
            StatusCode::Disconnected => "0",
            StatusCode::BrokerOnly => "1",
            StatusCode::Connected => "2",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

/// Owned by the bridge; mutated only through the transition methods.
///
/// Every transition returns the new status code when, and only when, the
/// derived code changed. The caller publishes exactly those.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    rf_connected: bool,
    broker_connected: bool,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rf_connected(&self) -> bool {
        self.rf_connected
    }

    pub fn broker_connected(&self) -> bool {
        self.broker_connected
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_links(self.rf_connected, self.broker_connected)
    }

    pub fn broker_up(&mut self) -> Option<StatusCode> {
        self.apply(|state| state.broker_connected = true)
    }

    pub fn broker_down(&mut self) -> Option<StatusCode> {
        self.apply(|state| state.broker_connected = false)
    }

    pub fn rf_up(&mut self) -> Option<StatusCode> {
        self.apply(|state| state.rf_connected = true)
    }

    pub fn rf_down(&mut self) -> Option<StatusCode> {
        self.apply(|state| state.rf_connected = false)
    }

    fn apply(&mut self, change: impl FnOnce(&mut Self)) -> Option<StatusCode> {
        let before = self.status();
        change(self);
        let after = self.status();
        (before != after).then_some(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = ConnectionState::new();
        assert_eq!(state.status(), StatusCode::Disconnected);
    }

    #[test]
    fn broker_then_rf_then_broker_loss() {
        let mut state = ConnectionState::new();

        assert_eq!(state.broker_up(), Some(StatusCode::BrokerOnly));
        assert_eq!(state.rf_up(), Some(StatusCode::Connected));
        assert_eq!(state.broker_down(), Some(StatusCode::Disconnected));
        assert!(state.rf_connected() && !state.broker_connected());
    }

    #[test]
    fn repeated_events_do_not_report_changes() {
        let mut state = ConnectionState::new();
        state.broker_up();

        assert_eq!(state.broker_up(), None);
        assert_eq!(state.rf_down(), None);
    }

    #[test]
    fn rf_changes_without_broker_keep_code_zero() {
        let mut state = ConnectionState::new();

        assert_eq!(state.rf_up(), None);
        assert!(state.rf_connected() && !state.broker_connected());
        assert_eq!(state.broker_up(), Some(StatusCode::Connected));
    }

    #[test]
    fn payloads() {
        assert_eq!(StatusCode::Disconnected.as_payload(), "0");
        assert_eq!(StatusCode::BrokerOnly.to_string(), "1");
        assert_eq!(StatusCode::Connected.as_payload(), "2");
    }
}
