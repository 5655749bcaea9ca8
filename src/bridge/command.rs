//! Inbound `set` commands
//!
//! A message on `<prefix>/set/FS20/123401` with payload `on` becomes the
//! culfw send command `F12340111`. The part after `set/` may also be a name
//! from the topic map; the bridge resolves it to its fragment before parsing.

use super::error::CommandError;
use crate::cul::fs20;

/// A command ready to be written to the transceiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fs20 { address: String, code: u8 },
}

impl Command {
    /// Parses a canonical fragment (`<protocol>/<address>`) and payload.
    pub fn parse(fragment: &str, payload: &[u8]) -> Result<Self, CommandError> {
        let (protocol, address) = fragment
            .split_once('/')
            .ok_or_else(|| CommandError::MalformedTopic(fragment.to_string()))?;

        match protocol {
            "FS20" => {
                if !fs20::is_valid_address(address) {
                    return Err(CommandError::InvalidAddress(address.to_string()));
                }
                Ok(Command::Fs20 {
                    address: address.to_ascii_uppercase(),
                    code: fs20_code(payload)?,
                })
            }
            other => Err(CommandError::UnsupportedProtocol(other.to_string())),
        }
    }

    /// culfw send string, without line terminator.
    pub fn to_wire(&self) -> String {
        match self {
            Command::Fs20 { address, code } => format!("F{}{:02X}", address, code),
        }
    }
}

fn fs20_code(payload: &[u8]) -> Result<u8, CommandError> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();

    if let Some(code) = fs20::command_code(text) {
        return Ok(code);
    }
    match text {
        "true" => return fs20::command_code("on").ok_or_else(|| invalid(text)),
        "false" => return fs20::command_code("off").ok_or_else(|| invalid(text)),
        _ => {}
    }
    if text.len() == 2 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        if let Ok(code) = u8::from_str_radix(text, 16) {
            return Ok(code);
        }
    }
    Err(invalid(text))
}

fn invalid(text: &str) -> CommandError {
    CommandError::InvalidPayload(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs20_named_command() {
        let command = Command::parse("FS20/12340a", b"on").expect("valid");
        assert_eq!(
            command,
            Command::Fs20 {
                address: "12340A".to_string(),
                code: 0x11
            }
        );
        assert_eq!(command.to_wire(), "F12340A11");
    }

    #[test]
    fn fs20_boolean_and_raw_payloads() {
        assert_eq!(
            Command::parse("FS20/123401", b"false").map(|c| c.to_wire()),
            Ok("F12340100".to_string())
        );
        assert_eq!(
            Command::parse("FS20/123401", b" 12\n").map(|c| c.to_wire()),
            Ok("F12340112".to_string())
        );
        assert_eq!(
            Command::parse("FS20/123401", b"Toggle").map(|c| c.to_wire()),
            Ok("F12340112".to_string())
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            Command::parse("FS20", b"on"),
            Err(CommandError::MalformedTopic("FS20".to_string()))
        );
        assert_eq!(
            Command::parse("MORITZ/0a1b2c", b"on"),
            Err(CommandError::UnsupportedProtocol("MORITZ".to_string()))
        );
        assert_eq!(
            Command::parse("FS20/1234", b"on"),
            Err(CommandError::InvalidAddress("1234".to_string()))
        );
        assert_eq!(
            Command::parse("FS20/123401", b"brighter"),
            Err(CommandError::InvalidPayload("brighter".to_string()))
        );
        assert_eq!(
            Command::parse("FS20/123401", b"+1"),
            Err(CommandError::InvalidPayload("+1".to_string()))
        );
    }
}
