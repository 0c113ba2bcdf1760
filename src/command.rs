//! Parsing of the textual read command.
//!
//! The entry point that feeds command bytes in (a character device, a debug
//! file, a serial console) lives outside this crate; it forwards the text
//! verbatim and logs a [`CommandError`] on rejection.

use core::fmt;

use crate::dispatch::ListenerId;
use crate::port::PinId;

/// A parsed read command: which pin to read and who gets the result.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub pin: PinId,
    /// `None` means "report on the local sink".
    pub listener: Option<ListenerId>,
}

/// Ways a command string can be rejected.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// The command does not start with a pin number.
    NoPinNumber,
    /// The pin number does not fit the pin id range.
    PinOutOfRange,
    /// The listener id does not fit in 32 bits.
    ListenerOutOfRange,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPinNumber => write!(f, "can't read GPIO number"),
            Self::PinOutOfRange => write!(f, "GPIO number out of range"),
            Self::ListenerOutOfRange => write!(f, "listener id out of range"),
        }
    }
}

impl Command {
    /// Parses `"<pin> [<listener>]"`.
    ///
    /// Both fields are unsigned decimal numbers separated by spaces or tabs;
    /// anything after them is ignored. A listener id of `0` selects local
    /// reporting, same as leaving it out.
    pub fn parse(text: &str) -> Result<Self, CommandError> {
        let mut rest = text;

        let pin = match take_number(&mut rest) {
            Some(Ok(pin)) => u8::try_from(pin)
                .map(PinId)
                .map_err(|_| CommandError::PinOutOfRange)?,
            Some(Err(_)) => return Err(CommandError::PinOutOfRange),
            None => return Err(CommandError::NoPinNumber),
        };

        let listener = match take_number(&mut rest) {
            Some(Ok(0)) | None => None,
            Some(Ok(id)) => Some(ListenerId(id)),
            Some(Err(_)) => return Err(CommandError::ListenerOutOfRange),
        };

        Ok(Self { pin, listener })
    }
}

/// Skips spaces and tabs, then consumes a run of ASCII digits.
///
/// `None` if the next non-blank character is not a digit, `Some(Err(()))` on
/// overflow past `u32`.
fn take_number(rest: &mut &str) -> Option<Result<u32, ()>> {
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let digits = trimmed.len() - trimmed.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        *rest = trimmed;
        return None;
    }
    let (number, tail) = trimmed.split_at(digits);
    *rest = tail;
    Some(number.parse::<u32>().map_err(|_| ()))
}
