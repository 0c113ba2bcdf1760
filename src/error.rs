use core::fmt;

use crate::port::PortError;

/// Possible errors from a read cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtError {
    /// The requested GPIO pin could not be acquired.
    PinUnavailable,
    /// The pin could not be mapped to an interrupt line.
    IrqUnmappable,
    /// Registering the edge interrupt handler failed.
    IrqRequestFailed,
    /// A session is already bound to a different pin.
    AlreadyBound,
    /// Fewer than the expected 43 pulses were captured.
    IncompleteCapture,
    /// Checksum did not match the received data.
    ChecksumMismatch,
    /// All four data bytes were zero; such a frame is bogus even though its
    /// checksum matches.
    AllZeroData,
    /// The registered listener process no longer exists.
    ListenerNotFound,
}

impl From<PortError> for DhtError {
    fn from(value: PortError) -> Self {
        match value {
            PortError::PinUnavailable => Self::PinUnavailable,
            PortError::IrqUnmappable => Self::IrqUnmappable,
            PortError::IrqRequestFailed => Self::IrqRequestFailed,
        }
    }
}

impl fmt::Display for DhtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinUnavailable => write!(f, "GPIO pin could not be acquired"),
            Self::IrqUnmappable => write!(f, "pin has no interrupt line"),
            Self::IrqRequestFailed => write!(f, "edge interrupt registration failed"),
            Self::AlreadyBound => write!(f, "another pin is already being read"),
            Self::IncompleteCapture => write!(f, "sensor response was incomplete"),
            Self::ChecksumMismatch => write!(f, "checksum validation failed"),
            Self::AllZeroData => write!(f, "sensor returned all-zero data"),
            Self::ListenerNotFound => write!(f, "listener process not found"),
        }
    }
}
