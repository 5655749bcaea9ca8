//! # CUL Transceiver Module
//!
//! Owns the serial connection to the CUL stick: frame decoding, transceiver
//! initialization, reconnects and the outbound command queue.
//!
//! ```text
//! cul/
//! ├── config.rs   - serial settings and receive-mode init commands
//! ├── decoder.rs  - culfw line format to DeviceEvent
//! ├── fs20.rs     - FS20 command table
//! └── port.rs     - statum port lifecycle and the line pump
//! ```
//!
//! Serial I/O is blocking, so both halves run on dedicated OS threads:
//!
//! ```text
//! reader thread ─[RfEvent]→ bridge channel
//! CulLink ─[String]→ writer thread ─→ shared port clone
//! ```

pub mod config;
pub mod decoder;
pub mod fs20;
pub mod port;

use crate::bridge::{BridgeEvent, LinkError, RfLink};
use crate::telemetry::DeviceEvent;
use config::CulConfig;
use port::CulPort;
use serialport::SerialPort;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Lifecycle and data notifications from the transceiver.
#[derive(Debug, Clone, PartialEq)]
pub enum RfEvent {
    /// Port opened and receive mode configured
    Ready,
    Data(DeviceEvent),
    Closed,
}

/// Port clone used by the writer thread; `None` while disconnected.
pub type SharedPort = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

#[derive(Debug, thiserror::Error)]
pub enum CulError {
    #[error("Failed to open serial port: {0}")]
    Open(#[from] serialport::Error),

    #[error("Serial I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Serial port is not open")]
    NotOpen,

    #[error("Writer lock poisoned")]
    WriterPoisoned,

    #[error("Bridge channel closed")]
    BridgeGone,

    #[error("Failed to spawn thread: {0}")]
    Spawn(io::Error),
}

/// Outbound side handed to the bridge.
///
/// Commands are queued; a write while the port is closed is dropped by the
/// writer thread with a debug trace.
#[derive(Clone)]
pub struct CulLink {
    commands: mpsc::UnboundedSender<String>,
}

impl RfLink for CulLink {
    fn write(&mut self, command: &str) -> Result<(), LinkError> {
        self.commands
            .send(command.to_string())
            .map_err(|_| LinkError::Rf("writer thread stopped".to_string()))
    }
}

pub struct CulHandle {}

impl CulHandle {
    /// Starts the reader and writer threads and returns the command side.
    ///
    /// The reader keeps reopening the port every `reconnect_interval_ms` until
    /// the bridge channel closes.
    pub fn spawn(
        config: CulConfig,
        events: mpsc::Sender<BridgeEvent>,
    ) -> Result<CulLink, CulError> {
        info!("Spawning CUL adapter for {}", config.serialport);

        let shared: SharedPort = Arc::new(Mutex::new(None));
        let (commands, queue) = mpsc::unbounded_channel();

        let writer = shared.clone();
        thread::Builder::new()
            .name("cul-writer".to_string())
            .spawn(move || run_writer(queue, writer))
            .map_err(CulError::Spawn)?;

        thread::Builder::new()
            .name("cul-reader".to_string())
            .spawn(move || run_reader(config, events, shared))
            .map_err(CulError::Spawn)?;

        Ok(CulLink { commands })
    }
}

fn run_writer(mut queue: mpsc::UnboundedReceiver<String>, shared: SharedPort) {
    while let Some(command) = queue.blocking_recv() {
        let mut guard = match shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_mut() {
            Some(port) => {
                debug!("cul > {}", command);
                if let Err(e) = port::write_line(port.as_mut(), &command) {
                    warn!("Failed to write {:?} to CUL: {}", command, e);
                }
            }
            None => debug!("CUL not connected, dropping command {:?}", command),
        }
    }
    debug!("Command queue closed, writer thread exiting");
}

fn run_reader(config: CulConfig, events: mpsc::Sender<BridgeEvent>, shared: SharedPort) {
    let interval = Duration::from_millis(config.reconnect_interval_ms);

    loop {
        let attempt = CulPort::create(config.clone(), events.clone(), shared.clone())
            .open()
            .and_then(|port| port.initialize())
            .and_then(|port| port.stream());

        match attempt {
            Ok(()) => warn!("CUL connection closed"),
            Err(CulError::BridgeGone) => {
                info!("Bridge stopped, CUL reader exiting");
                return;
            }
            Err(e) => error!("CUL connection failed: {}", e),
        }

        if events.is_closed() {
            return;
        }
        debug!("Reopening {} in {:?}", config.serialport, interval);
        thread::sleep(interval);
    }
}
