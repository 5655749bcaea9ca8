//! FS20 command codes
//!
//! The low five bits of the command byte select the command; bit 5 flags a
//! trailing extension byte (timer value).

const COMMANDS: [&str; 32] = [
    "off",
    "dim06%",
    "dim12%",
    "dim18%",
    "dim25%",
    "dim31%",
    "dim37%",
    "dim43%",
    "dim50%",
    "dim56%",
    "dim62%",
    "dim68%",
    "dim75%",
    "dim81%",
    "dim87%",
    "dim93%",
    "dim100%",
    "on",
    "toggle",
    "dimup",
    "dimdown",
    "dimupdown",
    "timer",
    "sendstate",
    "off-for-timer",
    "on-for-timer",
    "on-old-for-timer",
    "reset",
    "ramp-on-time",
    "ramp-off-time",
    "on-old-for-timer-prev",
    "on-100-for-timer-prev",
];

pub const EXTENSION_FLAG: u8 = 0x20;

/// Name of the command encoded in `code`, ignoring the extension flag.
pub fn command_name(code: u8) -> Option<&'static str> {
    COMMANDS.get(usize::from(code & 0x1f)).copied()
}

/// Command byte for a command name (case-insensitive).
pub fn command_code(name: &str) -> Option<u8> {
    COMMANDS
        .iter()
        .position(|command| command.eq_ignore_ascii_case(name))
        .and_then(|index| u8::try_from(index).ok())
}

/// Housecode (4 hex digits) plus device address (2 hex digits).
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 6 && address.chars().all(|c| c.is_ascii_hexdigit())
}
