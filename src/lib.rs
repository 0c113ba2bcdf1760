//! Interrupt-Driven DHT11/DHT22 Sensor Driver for Embedded Rust
//!
//! This crate reads DHT11 and DHT22 (AM2302) temperature and humidity
//! sensors over their single-wire protocol. Unlike polling drivers, the
//! response is captured by an edge-interrupt handler: the [`DhtDriver`]
//! emits the start condition and sleeps through the transfer while the
//! [`EdgeSampler`], invoked on every pin transition, turns pulse widths
//! into bits by re-reading the line a fixed 35 µs after each rising edge.
//!
//! The decoded reading is either returned and written to a local text sink
//! or packed into a 32-bit payload and pushed to a registered listener
//! process through the [`Notifier`] seam.
//!
//! # Features
//! - Blocking synchronous API, one read cycle per call (~100 ms)
//! - Capture runs in interrupt context, shared state is lock-free
//! - DHT11 and DHT22 frames decoded into one uniform tenths-based type
//! - Designed for `no_std` environments
//! - Optional logging support via `defmt`
//!
//! # Dependencies
//! Platforms plug in at three seams:
//! - [`PinPort`] and [`RawLine`] for GPIO housekeeping and the raw
//!   register reads inside the interrupt handler
//! - [`DelayNs`] for the start-condition timing, the capture-window sleep,
//!   and the sampler's re-read offset
//! - [`Notifier`] for out-of-band delivery to a listener process
//!
//! # Optional Features
//! - `defmt`: Implements `defmt::Format` for logging support
//!
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(test), no_std)]

pub mod command;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod frame;
pub mod port;
pub mod session;

pub use command::{Command, CommandError};
pub use dispatch::{DeliveryOutcome, ERROR_SENTINEL, ListenerId, Notifier, ResultDispatcher};
pub use driver::DhtDriver;
pub use error::DhtError;
pub use frame::{RawFrame, Reading, SensorKind};
pub use port::{Direction, PinId, PinPort, PortError, RawLine};
pub use session::{Capture, EdgeSampler, SensorSession};
