//! Serial port lifecycle with statum typestates
//!
//! ```text
//! Closed ──open()──► Open ──initialize()──► Streaming ──stream()──► (port gone)
//!                                              │
//!                                   sends Ready, hands a clone of the
//!                                   port to the writer thread
//! ```
//!
//! A fresh machine is created for every connection attempt; the reconnect loop
//! lives in [`super::CulHandle`].

use super::config::CulConfig;
use super::decoder::{CulDecoder, Frame, FrameDecoder};
use super::{CulError, RfEvent, SharedPort};
use crate::bridge::BridgeEvent;
use serialport::SerialPort;
use statum::{machine, state};
use std::io::{self, BufRead, BufReader, Write};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Short enough to notice a vanished port, long enough to not spin
const READ_TIMEOUT: Duration = Duration::from_millis(500);

#[state]
#[derive(Debug, Clone)]
pub enum PortState {
    Closed,    // Nothing opened yet
    Open,      // Device node opened, transceiver not configured
    Streaming, // Receive mode set, frames flow to the bridge
}

#[machine]
pub struct CulPort<S: PortState> {
    config: CulConfig,
    decoder: CulDecoder,
    events: mpsc::Sender<BridgeEvent>,
    writer: SharedPort,
    port: Option<Box<dyn SerialPort>>,
}

impl CulPort<Closed> {
    pub fn create(config: CulConfig, events: mpsc::Sender<BridgeEvent>, writer: SharedPort) -> Self {
        let decoder = CulDecoder::new(config.rssi);
        Self::new(config, decoder, events, writer, None)
    }

    pub fn open(mut self) -> Result<CulPort<Open>, CulError> {
        debug!("Opening {} at {} baud", self.config.serialport, self.config.baudrate);
        let port = serialport::new(&self.config.serialport, self.config.baudrate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(CulError::Open)?;

        info!("Serial port {} opened", self.config.serialport);
        self.port = Some(port);
        Ok(self.transition())
    }
}

impl CulPort<Open> {
    /// Switches the transceiver into receive mode and announces readiness.
    pub fn initialize(mut self) -> Result<CulPort<Streaming>, CulError> {
        let port = self.port.as_mut().ok_or(CulError::NotOpen)?;

        for command in self.config.init_commands() {
            debug!("cul > {}", command);
            write_line(port.as_mut(), &command).map_err(CulError::Io)?;
        }
        info!("Transceiver set to {} mode", self.config.mode);

        let writer_port = port.try_clone().map_err(CulError::Open)?;
        *self.writer.lock().map_err(|_| CulError::WriterPoisoned)? = Some(writer_port);

        self.events
            .blocking_send(RfEvent::Ready.into())
            .map_err(|_| CulError::BridgeGone)?;
        Ok(self.transition())
    }
}

impl CulPort<Streaming> {
    /// Reads frames until the port fails, then reports the link closed.
    pub fn stream(mut self) -> Result<(), CulError> {
        let port = self.port.take().ok_or(CulError::NotOpen)?;
        let result = pump_lines(BufReader::new(port), &self.decoder, &self.events);

        match self.writer.lock() {
            Ok(mut writer) => *writer = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        // The bridge may already be gone; nothing left to tell then.
        let _ = self.events.blocking_send(RfEvent::Closed.into());
        result
    }
}

/// Decodes lines from `reader` and forwards events until EOF or an I/O error.
///
/// Read timeouts are not errors: the transceiver is simply quiet.
pub fn pump_lines<R, D>(
    mut reader: R,
    decoder: &D,
    events: &mpsc::Sender<BridgeEvent>,
) -> Result<(), CulError>
where
    R: BufRead,
    D: FrameDecoder,
{
    let mut line = Vec::new();
    loop {
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                info!("Serial port reached end of stream");
                return Ok(());
            }
            Ok(_) => {
                let frame = decoder.decode(&String::from_utf8_lossy(&line));
                line.clear();
                match frame {
                    Frame::Event(event) => events
                        .blocking_send(RfEvent::Data(event).into())
                        .map_err(|_| CulError::BridgeGone)?,
                    Frame::Version(version) => info!("cul firmware {}", version),
                    Frame::Unparsed(raw) if raw.is_empty() => {}
                    Frame::Unparsed(raw) => debug!("Unparsed frame: {}", raw),
                }
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::Interrupted) => {
            }
            Err(e) => return Err(CulError::Io(e)),
        }
    }
}

pub(crate) fn write_line<W: Write + ?Sized>(port: &mut W, command: &str) -> io::Result<()> {
    port.write_all(command.as_bytes())?;
    port.write_all(b"\r\n")?;
    port.flush()
}
