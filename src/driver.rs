//! The protocol driver sequencing one complete read cycle.

use embedded_hal::delay::DelayNs;

use crate::dispatch::{DeliveryOutcome, ListenerId, Notifier, ResultDispatcher};
use crate::error::DhtError;
use crate::frame::RawFrame;
use crate::port::{Direction, PinId, PinPort};
use crate::session::SensorSession;

/// Duration of the host-driven low phase of the start condition, in
/// microseconds. Long enough for both sensor variants to notice the wake-up.
pub const START_LOW_US: u32 = 2_000;

/// Duration of the host-driven high phase before releasing the line.
pub const START_HIGH_US: u32 = 20;

/// How long the caller sleeps while the interrupt handler captures the
/// response. A full transfer takes under 5 ms; the window is a deliberately
/// conservative upper bound.
pub const CAPTURE_WINDOW_US: u32 = 100_000;

/// Drives the DHT wire protocol: start condition, interrupt-driven capture,
/// decode, delivery.
///
/// The driver shares its [`SensorSession`] with an [`EdgeSampler`] that the
/// platform invokes on pin transitions; the sampler fills the session while
/// [`read`] sleeps through the capture window. One cycle blocks the calling
/// thread for roughly 100 ms.
///
/// [`EdgeSampler`]: crate::session::EdgeSampler
/// [`read`]: DhtDriver::read
pub struct DhtDriver<'s, P, D, N, W> {
    port: P,
    delay: D,
    session: &'s SensorSession,
    dispatch: ResultDispatcher<N, W>,
}

impl<'s, P, D, N, W> DhtDriver<'s, P, D, N, W>
where
    P: PinPort,
    D: DelayNs,
    N: Notifier,
    W: core::fmt::Write,
{
    pub fn new(
        port: P,
        delay: D,
        session: &'s SensorSession,
        dispatch: ResultDispatcher<N, W>,
    ) -> Self {
        Self {
            port,
            delay,
            session,
            dispatch,
        }
    }

    /// Runs one read cycle on `pin` and delivers the result.
    ///
    /// Pin acquisition and interrupt registration failures abort the cycle
    /// immediately and leave nothing bound. From the moment both have
    /// succeeded, the interrupt is unregistered and the pin released on
    /// every path out of this function; decode failures are delivered
    /// through the dispatcher like successes, as the sentinel payload or the
    /// generic error line.
    ///
    /// No retries: each invocation is one-shot, and the sensor's minimum
    /// interval between reads is the caller's responsibility.
    pub fn read(
        &mut self,
        pin: PinId,
        listener: Option<ListenerId>,
    ) -> Result<DeliveryOutcome, DhtError> {
        self.session.try_bind(pin)?;

        if let Err(e) = self.port.request(pin) {
            self.session.unbind();
            return Err(e.into());
        }
        let token = match self.port.register_edge_interrupt(pin) {
            Ok(token) => token,
            Err(e) => {
                self.port.release(pin);
                self.session.unbind();
                return Err(e.into());
            }
        };

        self.session.restart();

        // Start condition: pull the line low, briefly drive it high, then
        // release it. The sensor takes over and clocks out its response.
        self.port.set_direction(pin, Direction::Output);
        self.port.write_level(pin, false);
        self.delay.delay_us(START_LOW_US);
        self.port.write_level(pin, true);
        self.delay.delay_us(START_HIGH_US);
        self.port.set_direction(pin, Direction::Input);

        // The edge sampler runs concurrently with this sleep and is done
        // well before it returns.
        self.delay.delay_us(CAPTURE_WINDOW_US);

        self.port.unregister_interrupt(token);
        self.port.release(pin);

        let capture = self.session.finish();
        let result = RawFrame::from_capture(&capture).and_then(|frame| frame.decode());
        Ok(self.dispatch.deliver(listener, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ERROR_SENTINEL;
    use crate::frame::{Reading, SensorKind};
    use crate::port::{PortError, RawLine};
    use crate::session::EdgeSampler;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Request(PinId),
        Release(PinId),
        SetDirection(PinId, Direction),
        WriteLevel(PinId, bool),
        RegisterIrq(PinId),
        UnregisterIrq,
        Sleep(u32),
        CaptureWindow,
    }

    type CallLog = Rc<RefCell<Vec<Call>>>;

    struct FakePort {
        calls: CallLog,
        fail_request: bool,
        fail_irq: bool,
    }

    impl PinPort for FakePort {
        type Token = PinId;

        fn request(&mut self, pin: PinId) -> Result<(), PortError> {
            if self.fail_request {
                return Err(PortError::PinUnavailable);
            }
            self.calls.borrow_mut().push(Call::Request(pin));
            Ok(())
        }

        fn release(&mut self, pin: PinId) {
            self.calls.borrow_mut().push(Call::Release(pin));
        }

        fn set_direction(&mut self, pin: PinId, direction: Direction) {
            self.calls.borrow_mut().push(Call::SetDirection(pin, direction));
        }

        fn read_level(&mut self, _pin: PinId) -> bool {
            false
        }

        fn write_level(&mut self, pin: PinId, high: bool) {
            self.calls.borrow_mut().push(Call::WriteLevel(pin, high));
        }

        fn register_edge_interrupt(&mut self, pin: PinId) -> Result<PinId, PortError> {
            if self.fail_irq {
                return Err(PortError::IrqRequestFailed);
            }
            self.calls.borrow_mut().push(Call::RegisterIrq(pin));
            Ok(pin)
        }

        fn unregister_interrupt(&mut self, _token: PinId) {
            self.calls.borrow_mut().push(Call::UnregisterIrq);
        }
    }

    /// Scripted raw line for the sampler.
    struct ScriptLine {
        expected_pin: PinId,
        levels: Vec<bool>,
        next: usize,
    }

    impl RawLine for ScriptLine {
        fn level(&mut self, pin: PinId) -> bool {
            assert_eq!(pin, self.expected_pin);
            let level = self.levels[self.next];
            self.next += 1;
            level
        }

        fn drive_high(&mut self, _pin: PinId) {}

        fn drive_low(&mut self, _pin: PinId) {}
    }

    /// Levels seen by the sampler for a full 43-pulse response carrying
    /// `bytes`, with a falling edge interleaved before every rising one.
    /// Returns the line script and the number of edge events.
    fn pulse_train(pin: PinId, bytes: [u8; 5]) -> (ScriptLine, usize) {
        let mut samples = vec![true, false]; // response preamble
        for byte in bytes {
            for bit in 0..8 {
                samples.push((byte >> (7 - bit)) & 1 == 1);
            }
        }
        samples.push(false); // release pulse

        let mut levels = Vec::new();
        let mut edges = 0;
        for sample in samples {
            levels.push(false); // falling edge, filtered out
            edges += 1;
            levels.push(true); // rising edge
            levels.push(sample); // level re-read 35 us later
            edges += 1;
        }
        (
            ScriptLine {
                expected_pin: pin,
                levels,
                next: 0,
            },
            edges,
        )
    }

    fn empty_line(pin: PinId) -> (ScriptLine, usize) {
        (
            ScriptLine {
                expected_pin: pin,
                levels: Vec::new(),
                next: 0,
            },
            0,
        )
    }

    /// Driver-side delay that plays the scripted edges into the sampler
    /// during the capture window, checking that the interrupt is armed at
    /// that point and not yet torn down.
    struct CaptureDelay<'s> {
        sampler: EdgeSampler<'s, ScriptLine, NoopDelay>,
        edges: usize,
        pin: PinId,
        calls: CallLog,
    }

    impl DelayNs for CaptureDelay<'_> {
        fn delay_ns(&mut self, _ns: u32) {
            panic!("driver sleeps are expressed in microseconds");
        }

        fn delay_us(&mut self, us: u32) {
            if us == CAPTURE_WINDOW_US {
                {
                    let calls = self.calls.borrow();
                    assert!(calls.contains(&Call::RegisterIrq(self.pin)));
                    assert!(!calls.contains(&Call::UnregisterIrq));
                }
                self.calls.borrow_mut().push(Call::CaptureWindow);
                for _ in 0..self.edges {
                    self.sampler.on_edge();
                }
            } else {
                self.calls.borrow_mut().push(Call::Sleep(us));
            }
        }
    }

    struct FakeNotifier {
        sent: Rc<RefCell<Vec<(ListenerId, u32)>>>,
    }

    impl Notifier for FakeNotifier {
        fn notify(&mut self, listener: ListenerId, payload: u32) -> Result<(), DhtError> {
            self.sent.borrow_mut().push((listener, payload));
            Ok(())
        }
    }

    struct Harness {
        calls: CallLog,
        sent: Rc<RefCell<Vec<(ListenerId, u32)>>>,
    }

    impl Harness {
        fn run(
            session: &SensorSession,
            pin: PinId,
            listener: Option<ListenerId>,
            line: (ScriptLine, usize),
            fail_request: bool,
            fail_irq: bool,
        ) -> (Result<DeliveryOutcome, DhtError>, Harness) {
            let calls: CallLog = Rc::new(RefCell::new(Vec::new()));
            let sent = Rc::new(RefCell::new(Vec::new()));
            let (line, edges) = line;

            let port = FakePort {
                calls: Rc::clone(&calls),
                fail_request,
                fail_irq,
            };
            let delay = CaptureDelay {
                sampler: EdgeSampler::new(session, line, NoopDelay),
                edges,
                pin,
                calls: Rc::clone(&calls),
            };
            let dispatch = ResultDispatcher::new(
                FakeNotifier {
                    sent: Rc::clone(&sent),
                },
                String::new(),
            );

            let mut driver = DhtDriver::new(port, delay, session, dispatch);
            let outcome = driver.read(pin, listener);
            (outcome, Harness { calls, sent })
        }

        fn count(&self, call: Call) -> usize {
            self.calls.borrow().iter().filter(|c| **c == call).count()
        }

        fn cleanup_ran_once(&self, pin: PinId) {
            assert_eq!(self.count(Call::UnregisterIrq), 1);
            assert_eq!(self.count(Call::Release(pin)), 1);
        }
    }

    #[test]
    fn full_cycle_recovers_the_encoded_reading() {
        let session = SensorSession::new();
        let pin = PinId(4);
        // 64.0% RH, 24.6 C
        let (outcome, harness) = Harness::run(
            &session,
            pin,
            None,
            pulse_train(pin, [0x02, 0x80, 0x00, 0xF6, 0x78]),
            false,
            false,
        );

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Reported(Reading {
                kind: SensorKind::Dht22,
                temperature_tenths: 246,
                humidity_tenths: 640,
            })
        );
        assert_eq!(
            *harness.calls.borrow(),
            vec![
                Call::Request(pin),
                Call::RegisterIrq(pin),
                Call::SetDirection(pin, Direction::Output),
                Call::WriteLevel(pin, false),
                Call::Sleep(START_LOW_US),
                Call::WriteLevel(pin, true),
                Call::Sleep(START_HIGH_US),
                Call::SetDirection(pin, Direction::Input),
                Call::CaptureWindow,
                Call::UnregisterIrq,
                Call::Release(pin),
            ]
        );
        assert_eq!(session.pin(), None);
    }

    #[test]
    fn full_cycle_notifies_listener_with_packed_payload() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let listener = ListenerId(1234);
        let (outcome, harness) = Harness::run(
            &session,
            pin,
            Some(listener),
            pulse_train(pin, [40, 0, 25, 0, 65]),
            false,
            false,
        );

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Notified {
                listener,
                payload: 0x0190_00FA
            }
        );
        assert_eq!(*harness.sent.borrow(), vec![(listener, 0x0190_00FA)]);
        harness.cleanup_ran_once(pin);
    }

    #[test]
    fn corrupt_frame_fails_but_still_cleans_up() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let (outcome, harness) = Harness::run(
            &session,
            pin,
            None,
            pulse_train(pin, [40, 0, 25, 0, 66]),
            false,
            false,
        );

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Failed(DhtError::ChecksumMismatch)
        );
        harness.cleanup_ran_once(pin);
        assert_eq!(session.pin(), None);
    }

    #[test]
    fn silent_sensor_yields_incomplete_capture() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let (outcome, harness) =
            Harness::run(&session, pin, None, empty_line(pin), false, false);

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Failed(DhtError::IncompleteCapture)
        );
        harness.cleanup_ran_once(pin);
    }

    #[test]
    fn failed_cycle_sends_error_sentinel_to_listener() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let listener = ListenerId(99);
        let (outcome, harness) =
            Harness::run(&session, pin, Some(listener), empty_line(pin), false, false);

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Notified {
                listener,
                payload: ERROR_SENTINEL
            }
        );
        assert_eq!(*harness.sent.borrow(), vec![(listener, ERROR_SENTINEL)]);
        harness.cleanup_ran_once(pin);
    }

    #[test]
    fn read_on_second_pin_is_rejected_while_bound() {
        let session = SensorSession::new();
        session.try_bind(PinId(4)).unwrap();
        session.record(true);

        let (outcome, harness) =
            Harness::run(&session, PinId(7), None, empty_line(PinId(7)), false, false);

        assert_eq!(outcome.unwrap_err(), DhtError::AlreadyBound);
        // The in-flight session is untouched and no hardware was poked.
        assert!(harness.calls.borrow().is_empty());
        assert_eq!(session.pin(), Some(PinId(4)));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn fresh_read_on_same_pin_discards_stale_samples() {
        let session = SensorSession::new();
        session.try_bind(PinId(4)).unwrap();
        // Leftovers from a broken-off earlier cycle.
        session.record(true);
        session.record(true);

        let pin = PinId(4);
        let (outcome, _) = Harness::run(
            &session,
            pin,
            None,
            pulse_train(pin, [40, 0, 25, 0, 65]),
            false,
            false,
        );

        assert_eq!(
            outcome.unwrap(),
            DeliveryOutcome::Reported(Reading {
                kind: SensorKind::Dht11,
                temperature_tenths: 250,
                humidity_tenths: 400,
            })
        );
    }

    #[test]
    fn pin_acquisition_failure_leaves_nothing_bound() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let (outcome, harness) =
            Harness::run(&session, pin, None, empty_line(pin), true, false);

        assert_eq!(outcome.unwrap_err(), DhtError::PinUnavailable);
        assert!(harness.calls.borrow().is_empty());
        assert_eq!(session.pin(), None);
    }

    #[test]
    fn irq_registration_failure_releases_the_pin() {
        let session = SensorSession::new();
        let pin = PinId(4);
        let (outcome, harness) =
            Harness::run(&session, pin, None, empty_line(pin), false, true);

        assert_eq!(outcome.unwrap_err(), DhtError::IrqRequestFailed);
        assert_eq!(
            *harness.calls.borrow(),
            vec![Call::Request(pin), Call::Release(pin)]
        );
        assert_eq!(session.pin(), None);
    }
}
