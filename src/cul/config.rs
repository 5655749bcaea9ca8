use serde::{Deserialize, Serialize};
use std::fmt;

/// Receive mode the transceiver is switched into after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CulMode {
    /// FS20, EM, HMS, S300 and friends
    #[default]
    SlowRF,
    #[serde(rename = "MORITZ")]
    Moritz,
    AskSin,
}

impl fmt::Display for CulMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CulMode::SlowRF => write!(f, "SlowRF"),
            CulMode::Moritz => write!(f, "MORITZ"),
            CulMode::AskSin => write!(f, "AskSin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CulConfig {
    pub serialport: String,
    pub baudrate: u32,
    pub mode: CulMode,
    /// Also initialise the stacked transceiver of an SCC
    pub scc: bool,
    /// Report and decode RSSI bytes
    pub rssi: bool,
    pub reconnect_interval_ms: u64,
}

impl Default for CulConfig {
    fn default() -> Self {
        Self {
            serialport: "/dev/ttyACM0".to_string(),
            baudrate: 9600,
            mode: CulMode::SlowRF,
            scc: false,
            rssi: true,
            reconnect_interval_ms: 5000,
        }
    }
}

impl CulConfig {
    /// Commands written right after the port opens.
    pub fn init_commands(&self) -> Vec<String> {
        let mut base = vec![if self.rssi { "X21" } else { "X01" }.to_string()];
        match self.mode {
            CulMode::SlowRF => {}
            CulMode::Moritz => base.push("Zr".to_string()),
            CulMode::AskSin => base.push("Ar".to_string()),
        }

        let mut commands = base.clone();
        if self.scc {
            commands.extend(base.iter().map(|command| format!("*{}", command)));
        }
        commands
    }
}
