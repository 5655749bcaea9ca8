//! Error definitions for the bridge

use thiserror::Error;

/// Failures reported by the transport seams.
///
/// The bridge never propagates these; it logs them and carries on.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The broker client refused to queue a request
    #[error("Broker request failed: {0}")]
    Broker(String),

    /// The serial writer is gone
    #[error("RF link unavailable: {0}")]
    Rf(String),
}

/// Reasons an inbound `set` message is not forwarded to the radio.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// Topic below `set/` is not `<protocol>/<address>`
    #[error("Malformed command topic: {0}")]
    MalformedTopic(String),

    /// Protocol has no command encoding
    #[error("Commands are not supported for protocol {0}")]
    UnsupportedProtocol(String),

    /// Address is not valid for the protocol
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Payload is not a known command
    #[error("Invalid command payload: {0}")]
    InvalidPayload(String),
}
