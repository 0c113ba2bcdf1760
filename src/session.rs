//! The capture session shared between the calling thread and the interrupt
//! handler, and the edge sampler that fills it.
//!
//! One [`SensorSession`] exists per data line slot, typically in a `static`,
//! so both the [`DhtDriver`] and the interrupt-context [`EdgeSampler`] can
//! hold a reference to it. All state is atomic: the sampler is the only
//! writer of the sample bits, and the driver reads them only after its
//! capture-window sleep has outlasted the whole transfer. The release store
//! on the counter after each appended bit, paired with the acquire load when
//! draining, publishes the bits to the draining thread.
//!
//! [`DhtDriver`]: crate::driver::DhtDriver

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicU8, AtomicU16, AtomicU64, Ordering};

use crate::error::DhtError;
use crate::port::{PinId, RawLine};

/// Number of pulses in one complete sensor response: two preamble pulses,
/// forty data bits, and one trailing pulse.
pub const SAMPLE_COUNT: usize = 43;

/// Time in microseconds between a rising edge and the level re-read that
/// decides the bit value. A zero bit's high phase (~28 µs) is over by then,
/// a one bit's (~70 µs) is not.
pub const BIT_SAMPLE_DELAY_US: u32 = 35;

/// Sentinel in the pin slot meaning "no pin bound".
const UNBOUND: u16 = u16::MAX;

/// Capture state for one read cycle.
///
/// Exactly one pin may be bound at a time; a bind attempt for a second pin
/// while a cycle is in flight is rejected rather than queued.
#[derive(Debug)]
pub struct SensorSession {
    pin: AtomicU16,
    counter: AtomicU8,
    bits: AtomicU64,
}

impl SensorSession {
    /// Creates an unbound session. `const`, so it can live in a `static`.
    pub const fn new() -> Self {
        Self {
            pin: AtomicU16::new(UNBOUND),
            counter: AtomicU8::new(0),
            bits: AtomicU64::new(0),
        }
    }

    /// Binds the session to `pin`.
    ///
    /// A fresh request for the pin that is already bound succeeds and starts
    /// over; a request while a *different* pin is bound fails with
    /// [`DhtError::AlreadyBound`] and leaves the in-flight capture untouched.
    pub fn try_bind(&self, pin: PinId) -> Result<(), DhtError> {
        let slot = u16::from(pin.0);
        match self
            .pin
            .compare_exchange(UNBOUND, slot, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(()),
            Err(current) if current == slot => Ok(()),
            Err(_) => Err(DhtError::AlreadyBound),
        }
    }

    /// The currently bound pin, if any.
    pub fn pin(&self) -> Option<PinId> {
        match self.pin.load(Ordering::Acquire) {
            UNBOUND => None,
            bound => Some(PinId(bound as u8)),
        }
    }

    /// Unbinds without touching the sample buffer.
    pub fn unbind(&self) {
        self.pin.store(UNBOUND, Ordering::Release);
    }

    /// Discards any previously captured samples.
    pub fn restart(&self) {
        self.bits.store(0, Ordering::Relaxed);
        self.counter.store(0, Ordering::Release);
    }

    /// Number of samples captured so far.
    pub fn len(&self) -> usize {
        usize::from(self.counter.load(Ordering::Acquire))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once all [`SAMPLE_COUNT`] slots are filled.
    pub fn is_full(&self) -> bool {
        self.len() >= SAMPLE_COUNT
    }

    /// Appends one sample. Producer side: called from interrupt context only,
    /// by a single producer. Samples past the last slot are dropped.
    pub fn record(&self, level: bool) {
        let n = self.counter.load(Ordering::Relaxed);
        if usize::from(n) >= SAMPLE_COUNT {
            return;
        }
        if level {
            self.bits.fetch_or(1 << n, Ordering::Relaxed);
        }
        self.counter.store(n + 1, Ordering::Release);
    }

    /// Snapshots the capture and unbinds the session.
    ///
    /// Consumer side: must only be called once the producer is quiesced, i.e.
    /// after the edge interrupt has been unregistered.
    pub fn finish(&self) -> Capture {
        let len = self.counter.load(Ordering::Acquire);
        let bits = self.bits.load(Ordering::Relaxed);
        self.unbind();
        Capture { len, bits }
    }
}

impl Default for SensorSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of one completed (or aborted) capture.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct Capture {
    len: u8,
    bits: u64,
}

impl Capture {
    /// Number of samples captured.
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The sample recorded at `index`.
    pub fn bit(&self, index: usize) -> bool {
        debug_assert!(index < SAMPLE_COUNT);
        (self.bits >> index) & 1 == 1
    }
}

/// Interrupt-context sampler turning pin transitions into bits.
///
/// The platform arranges for [`on_edge`] to run on every transition of the
/// data line, both edges. Each high pulse the sensor emits encodes one bit in
/// its duration; re-reading the level a fixed [`BIT_SAMPLE_DELAY_US`] after
/// the rising edge turns that duration into a plain level read.
///
/// [`on_edge`]: EdgeSampler::on_edge
pub struct EdgeSampler<'s, L, D> {
    session: &'s SensorSession,
    line: L,
    delay: D,
}

impl<'s, L, D> EdgeSampler<'s, L, D>
where
    L: RawLine,
    D: DelayNs,
{
    /// Creates a sampler feeding `session`.
    ///
    /// `line` is the raw register accessor and `delay` the busy-wait used for
    /// the re-read offset; both run in interrupt context, so the delay must
    /// not yield or sleep.
    pub fn new(session: &'s SensorSession, line: L, delay: D) -> Self {
        Self {
            session,
            line,
            delay,
        }
    }

    /// Handles one pin transition. Does not allocate and never blocks beyond
    /// the fixed re-read delay.
    pub fn on_edge(&mut self) {
        // Spurious interrupt with no cycle in flight.
        let Some(pin) = self.session.pin() else {
            return;
        };
        if self.session.is_full() {
            return;
        }
        // Falling edges carry no information; the pulse width is measured
        // from the rising edge.
        if !self.line.level(pin) {
            return;
        }
        self.delay.delay_us(BIT_SAMPLE_DELAY_US);
        self.session.record(self.line.level(pin));
    }
}
