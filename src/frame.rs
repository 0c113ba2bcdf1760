//! Decoding a completed capture into a validated reading.

use crate::error::DhtError;
use crate::session::{Capture, SAMPLE_COUNT};

/// Index of the first data bit in the capture; the two pulses before it are
/// the sensor's response preamble, the one after the 40 data bits is the
/// release pulse.
const DATA_START: usize = 2;

/// Number of data bits in a frame.
const DATA_BITS: usize = 40;

/// The two supported sensor encodings.
///
/// A DHT11 transmits whole units and leaves the low-order humidity and
/// temperature bytes at zero; a DHT22 uses all four data bytes for
/// tenth-of-a-unit resolution.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Dht11,
    Dht22,
}

/// The five raw bytes of one sensor response:
/// `[hum_hi, hum_lo, temp_hi, temp_lo, checksum]`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: [u8; 5],
}

/// A validated temperature and humidity reading.
///
/// Values are scaled to tenths for both sensor kinds so that callers get a
/// uniform type; a DHT11 reading always has both values divisible by ten.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub kind: SensorKind,
    /// Temperature in tenths of a degree Celsius.
    pub temperature_tenths: i16,
    /// Relative humidity in tenths of a percent.
    pub humidity_tenths: u16,
}

impl Reading {
    /// Temperature in degrees Celsius.
    pub fn temperature_celsius(&self) -> f32 {
        f32::from(self.temperature_tenths) / 10.0
    }

    /// Relative humidity in percent.
    pub fn relative_humidity(&self) -> f32 {
        f32::from(self.humidity_tenths) / 10.0
    }
}

impl RawFrame {
    /// Packs a completed capture into the five frame bytes, MSB first.
    ///
    /// Requires all [`SAMPLE_COUNT`] pulses; anything less means the transfer
    /// broke off and no partial decode is attempted.
    pub fn from_capture(capture: &Capture) -> Result<Self, DhtError> {
        if capture.len() != SAMPLE_COUNT {
            return Err(DhtError::IncompleteCapture);
        }

        let mut bytes = [0u8; 5];
        for bit in 0..DATA_BITS {
            if capture.bit(DATA_START + bit) {
                bytes[bit / 8] |= 1 << (7 - (bit % 8));
            }
        }
        Ok(Self { bytes })
    }

    /// The sensor encoding this frame uses.
    pub fn kind(&self) -> SensorKind {
        let [_, hum_lo, _, temp_lo, _] = self.bytes;
        if hum_lo == 0 && temp_lo == 0 {
            SensorKind::Dht11
        } else {
            SensorKind::Dht22
        }
    }

    /// Validates the frame and decodes it into a [`Reading`].
    pub fn decode(&self) -> Result<Reading, DhtError> {
        let [hum_hi, hum_lo, temp_hi, temp_lo, checksum] = self.bytes;

        let sum = hum_hi
            .wrapping_add(hum_lo)
            .wrapping_add(temp_hi)
            .wrapping_add(temp_lo);
        if sum != checksum {
            return Err(DhtError::ChecksumMismatch);
        }
        // A dead line yields all zeroes, which the checksum cannot catch.
        if hum_hi == 0 && hum_lo == 0 && temp_hi == 0 && temp_lo == 0 {
            return Err(DhtError::AllZeroData);
        }

        let kind = self.kind();
        let reading = match kind {
            SensorKind::Dht11 => Reading {
                kind,
                temperature_tenths: i16::from(temp_hi) * 10,
                humidity_tenths: u16::from(hum_hi) * 10,
            },
            SensorKind::Dht22 => {
                let magnitude = i16::from(temp_hi & 0x7F) * 256 + i16::from(temp_lo);
                Reading {
                    kind,
                    temperature_tenths: if temp_hi & 0x80 != 0 {
                        -magnitude
                    } else {
                        magnitude
                    },
                    humidity_tenths: u16::from(hum_hi) * 256 + u16::from(hum_lo),
                }
            }
        };
        Ok(reading)
    }
}
