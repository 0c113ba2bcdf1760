//! Delivery of a finished read cycle to the caller or a listener process.
//!
//! A cycle always ends here, success or not. With a listener registered the
//! outcome goes out as a packed 32-bit payload through the platform's
//! [`Notifier`]; without one it is formatted onto a local text sink.

use core::fmt::{self, Write};

use crate::error::DhtError;
use crate::frame::{Reading, SensorKind};

/// Identifies a listener process registered for asynchronous delivery.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(pub u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload value reserved for "the read failed".
///
/// Unambiguous: a genuine reading encoding to zero would require all four
/// data bytes to be zero, and such frames are rejected during decoding.
pub const ERROR_SENTINEL: u32 = 0;

/// Asynchronous out-of-band delivery to a listener process.
///
/// On POSIX platforms this is typically a queued real-time signal carrying
/// the payload as its integer value; any mechanism that can hand one `u32`
/// to the process identified by [`ListenerId`] will do.
pub trait Notifier {
    /// Delivers `payload` to `listener`.
    ///
    /// Returns [`DhtError::ListenerNotFound`] if the process no longer
    /// exists at delivery time.
    fn notify(&mut self, listener: ListenerId, payload: u32) -> Result<(), DhtError>;
}

/// How a cycle's result left the driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Payload sent to the listener (readings and the error sentinel both
    /// travel this path).
    Notified { listener: ListenerId, payload: u32 },
    /// A listener was requested but its process no longer exists; noted on
    /// the local sink instead. The cycle itself did not fail.
    ListenerMissing { listener: ListenerId },
    /// No listener: the reading was written to the local sink.
    Reported(Reading),
    /// No listener: the cycle failed and the generic error line was written.
    Failed(DhtError),
}

/// Packs a reading into the notification payload: bits 0..=15 carry the
/// temperature code (tenths, sign in bit 15 for DHT22), bits 16..=31 the
/// humidity code (tenths).
pub fn encode_payload(reading: &Reading) -> u32 {
    let temperature = if reading.temperature_tenths < 0 {
        0x8000 | reading.temperature_tenths.unsigned_abs()
    } else {
        reading.temperature_tenths as u16
    };
    (u32::from(reading.humidity_tenths) << 16) | u32::from(temperature)
}

/// Routes results to the listener or the local sink.
pub struct ResultDispatcher<N, W> {
    notifier: N,
    out: W,
}

impl<N, W> ResultDispatcher<N, W>
where
    N: Notifier,
    W: Write,
{
    pub fn new(notifier: N, out: W) -> Self {
        Self { notifier, out }
    }

    /// Delivers the result of one cycle. Never delivers partial data: a
    /// failed cycle becomes the sentinel payload or the generic error line.
    pub fn deliver(
        &mut self,
        listener: Option<ListenerId>,
        result: Result<Reading, DhtError>,
    ) -> DeliveryOutcome {
        match listener {
            Some(listener) => {
                let payload = match &result {
                    Ok(reading) => encode_payload(reading),
                    Err(_) => ERROR_SENTINEL,
                };
                match self.notifier.notify(listener, payload) {
                    Ok(()) => DeliveryOutcome::Notified { listener, payload },
                    Err(_) => {
                        let _ = writeln!(self.out, "Listener {listener} not found.");
                        DeliveryOutcome::ListenerMissing { listener }
                    }
                }
            }
            None => match result {
                Ok(reading) => {
                    self.report(&reading);
                    DeliveryOutcome::Reported(reading)
                }
                Err(e) => {
                    let _ = writeln!(self.out, "Error.");
                    DeliveryOutcome::Failed(e)
                }
            },
        }
    }

    fn report(&mut self, reading: &Reading) {
        let _ = match reading.kind {
            SensorKind::Dht11 => writeln!(
                self.out,
                "T:{}\tH:{}%",
                reading.temperature_tenths / 10,
                reading.humidity_tenths / 10
            ),
            SensorKind::Dht22 => {
                let sign = if reading.temperature_tenths < 0 { "-" } else { "" };
                let t = reading.temperature_tenths.unsigned_abs();
                let h = reading.humidity_tenths;
                writeln!(
                    self.out,
                    "T:{}{}.{}\tH:{}.{}%",
                    sign,
                    t / 10,
                    t % 10,
                    h / 10,
                    h % 10
                )
            }
        };
    }
}
