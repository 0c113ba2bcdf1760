//! GPIO port contract consumed by the driver.
//!
//! The driver never touches hardware registers itself; a platform adapter
//! implements [`PinPort`] for pin housekeeping and [`RawLine`] for the
//! latency-critical level reads inside the interrupt handler. A software
//! implementation of both traits is enough to run the full protocol in tests.

use core::fmt;

/// Identifies one GPIO pin by number.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinId(pub u8);

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a GPIO pin.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Errors reported by a [`PinPort`] implementation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The pin is in use or does not exist.
    PinUnavailable,
    /// The pin cannot be mapped to an interrupt line.
    IrqUnmappable,
    /// Arming the edge trigger failed.
    IrqRequestFailed,
}

/// Pin housekeeping primitives.
///
/// [`register_edge_interrupt`] must arm a trigger on *both* edges of the pin
/// and route each transition to [`EdgeSampler::on_edge`]; how the handler is
/// wired up (vector table entry, kernel IRQ, thread) is the platform's
/// business. The returned token is handed back to
/// [`unregister_interrupt`] when the capture window closes.
///
/// [`register_edge_interrupt`]: PinPort::register_edge_interrupt
/// [`unregister_interrupt`]: PinPort::unregister_interrupt
/// [`EdgeSampler::on_edge`]: crate::session::EdgeSampler::on_edge
pub trait PinPort {
    /// Handle identifying one armed edge trigger.
    type Token;

    /// Claims the pin for exclusive use.
    fn request(&mut self, pin: PinId) -> Result<(), PortError>;

    /// Returns a claimed pin.
    fn release(&mut self, pin: PinId);

    /// Switches the pin between driving the line and listening to it.
    fn set_direction(&mut self, pin: PinId, direction: Direction);

    /// Reads the current logic level.
    fn read_level(&mut self, pin: PinId) -> bool;

    /// Drives the line high or low. The pin must be in output direction.
    fn write_level(&mut self, pin: PinId, high: bool);

    /// Arms a both-edges trigger on the pin.
    fn register_edge_interrupt(&mut self, pin: PinId) -> Result<Self::Token, PortError>;

    /// Disarms a previously registered trigger.
    fn unregister_interrupt(&mut self, token: Self::Token);
}

/// Raw access to the pin's data register, bypassing [`PinPort`].
///
/// The interrupt handler samples the line twice within a ~35 µs window; going
/// through a layered GPIO stack there would distort the timing, so platforms
/// are expected to implement this directly on the memory-mapped register.
pub trait RawLine {
    /// Reads the line level right now.
    fn level(&mut self, pin: PinId) -> bool;

    /// Sets the output latch for the pin.
    fn drive_high(&mut self, pin: PinId);

    /// Clears the output latch for the pin.
    fn drive_low(&mut self, pin: PinId);
}
