//! Square-wave speaker driven from the tick scheduler
//!
//! A tone is produced by toggling the output pin from a periodic timer at
//! half the tone period. Rests hold the pin low for the note length. When no
//! melody is queued the speaker polls its queue at a slow idle rate.

use embedded_hal::digital::v2::OutputPin;
use heapless::Deque;

use crate::config::{MELODY_QUEUE_LEN, SPEAKER_IDLE_POLL_MS};
use crate::error::Error;
use crate::rtos::{Callback, Scheduler, TimerId};
use crate::time::{ms, us, Ticks};

/// Musical pitches, by period in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tone {
    Rest,
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
    /// C one octave up
    Ch,
}

impl Tone {
    /// Full period of the tone in microseconds, `None` for a rest
    pub const fn period_us(self) -> Option<u32> {
        match self {
            Tone::Rest => None,
            Tone::C => Some(3822),
            Tone::Cs => Some(3677),
            Tone::D => Some(3405),
            Tone::Ds => Some(3214),
            Tone::E => Some(3033),
            Tone::F => Some(2863),
            Tone::Fs => Some(2702),
            Tone::G => Some(2551),
            Tone::Gs => Some(2407),
            Tone::A => Some(2272),
            Tone::As => Some(2145),
            Tone::B => Some(2024),
            Tone::Ch => Some(1911),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note {
    pub tone: Tone,
    pub length_us: u32,
}

impl Note {
    pub const fn new(tone: Tone, length_us: u32) -> Self {
        Self { tone, length_us }
    }
}

/// A sequence of notes played back to back
pub type Melody = &'static [Note];

/// Speaker on output pin `P`
///
/// Owns at most one scheduler handle at a time: every re-arm cancels the
/// previous timer first, so the speaker never leaks queue slots.
pub struct Speaker<P> {
    pin: P,
    high: bool,
    queue: Deque<Melody, MELODY_QUEUE_LEN>,
    current: Option<(Melody, usize)>,
    toggles_left: u32,
    timer: Option<TimerId>,
}

impl<P: OutputPin> Speaker<P> {
    pub const fn new(pin: P) -> Self {
        Self {
            pin,
            high: false,
            queue: Deque::new(),
            current: None,
            toggles_left: 0,
            timer: None,
        }
    }

    /// Silence the pin and arm the idle poll
    pub fn start<C: Copy, const N: usize>(
        &mut self,
        scheduler: &mut Scheduler<C, N>,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<(), Error> {
        self.drive(false);
        self.rearm(scheduler, ms(SPEAKER_IDLE_POLL_MS as u64), false, callback, context)
    }

    /// Queue a melody behind whatever is playing
    pub fn play(&mut self, melody: Melody) -> Result<(), Error> {
        self.queue
            .push_back(melody)
            .map_err(|_| Error::CapacityExceeded)
    }

    /// Drop the queue and the current note; the pin goes low immediately
    pub fn stop(&mut self) {
        self.queue.clear();
        self.current = None;
        self.toggles_left = 0;
        self.drive(false);
    }

    pub fn is_playing(&self) -> bool {
        self.current.is_some() || self.toggles_left > 0 || !self.queue.is_empty()
    }

    /// Handle of the timer currently driving the speaker
    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn release(self) -> P {
        self.pin
    }

    /// Timer callback body: toggle, or advance to the next note
    pub fn service<C: Copy, const N: usize>(
        &mut self,
        scheduler: &mut Scheduler<C, N>,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<(), Error> {
        if self.toggles_left > 0 {
            self.toggles_left -= 1;
            let level = !self.high;
            self.drive(level);
            return Ok(());
        }

        self.drive(false);
        match self.next_note() {
            Some(note) => match note.tone.period_us() {
                Some(period) => {
                    // Count whole half waves of the interval actually armed
                    let half = us((period / 2) as u64).max(1);
                    self.toggles_left = us(note.length_us as u64) / half;
                    self.rearm(scheduler, half, true, callback, context)
                }
                None => {
                    let length = us(note.length_us as u64);
                    self.rearm(scheduler, length, false, callback, context)
                }
            },
            None => {
                let idle = ms(SPEAKER_IDLE_POLL_MS as u64);
                self.rearm(scheduler, idle, false, callback, context)
            }
        }
    }

    fn next_note(&mut self) -> Option<Note> {
        loop {
            if let Some((melody, index)) = self.current {
                if let Some(&note) = melody.get(index) {
                    self.current = Some((melody, index + 1));
                    return Some(note);
                }
            }
            self.current = None;
            self.current = Some((self.queue.pop_front()?, 0));
        }
    }

    fn rearm<C: Copy, const N: usize>(
        &mut self,
        scheduler: &mut Scheduler<C, N>,
        interval: Ticks,
        periodic: bool,
        callback: Callback<C, N>,
        context: C,
    ) -> Result<(), Error> {
        if let Some(old) = self.timer.take() {
            scheduler.cancel(old);
        }
        let id = if periodic {
            scheduler.invoke_every(interval, interval, callback, context)?
        } else {
            scheduler.invoke_in(interval, callback, context)?
        };
        self.timer = Some(id);
        Ok(())
    }

    fn drive(&mut self, high: bool) {
        self.high = high;
        // A failing pin write only costs one half-wave of sound
        let _ = if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use critical_section::Mutex;
    use embedded_hal_mock::pin::{Mock, State, Transaction};

    fn noop(_: &mut Scheduler<(), 4>, _: ()) {}

    static LONG_C: [Note; 1] = [Note::new(Tone::C, 7644)];
    static REST: [Note; 1] = [Note::new(Tone::Rest, 5000)];

    #[test]
    fn plays_tone_then_idles() {
        let expectations = [
            Transaction::set(State::Low),
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::High),
            Transaction::set(State::Low),
            Transaction::set(State::Low),
        ];
        let mut sched: Scheduler<(), 4> = Scheduler::new();
        let mut speaker = Speaker::new(Mock::new(&expectations));

        speaker.start(&mut sched, noop, ()).unwrap();
        let idle = speaker.timer().unwrap();
        assert_eq!(sched.remaining(idle), Ok(ms(100) - 1));

        speaker.play(&LONG_C).unwrap();
        assert!(speaker.is_playing());

        speaker.service(&mut sched, noop, ()).unwrap();
        assert!(!sched.is_scheduled(idle));
        let tone = speaker.timer().unwrap();
        // 3822us period -> 1911us half period -> 19 ticks
        assert_eq!(sched.remaining(tone), Ok(18));
        assert_eq!(sched.len(), 1);

        for _ in 0..4 {
            speaker.service(&mut sched, noop, ()).unwrap();
        }
        assert_eq!(speaker.timer(), Some(tone));

        speaker.service(&mut sched, noop, ()).unwrap();
        assert!(!speaker.is_playing());
        assert_eq!(sched.len(), 1);

        speaker.release().done();
    }

    #[test]
    fn rest_holds_pin_low() {
        let expectations = [
            Transaction::set(State::Low),
            Transaction::set(State::Low),
        ];
        let mut sched: Scheduler<(), 4> = Scheduler::new();
        let mut speaker = Speaker::new(Mock::new(&expectations));
        speaker.play(&REST).unwrap();

        speaker.service(&mut sched, noop, ()).unwrap();
        let rest = speaker.timer().unwrap();
        assert_eq!(sched.remaining(rest), Ok(us(5000) - 1));

        speaker.service(&mut sched, noop, ()).unwrap();
        assert!(!speaker.is_playing());
        speaker.release().done();
    }

    #[test]
    fn queue_is_bounded() {
        let mut speaker = Speaker::new(Mock::new(&[]));
        for _ in 0..MELODY_QUEUE_LEN {
            speaker.play(&REST).unwrap();
        }
        assert_eq!(speaker.play(&REST), Err(Error::CapacityExceeded));
        speaker.release().done();
    }

    /// Output pin counting rising edges
    #[derive(Default)]
    struct EdgeCounter {
        high: bool,
        rising: u32,
    }

    impl OutputPin for EdgeCounter {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            if !self.high {
                self.rising += 1;
            }
            self.high = true;
            Ok(())
        }
    }

    static SPEAKER: Mutex<RefCell<Speaker<EdgeCounter>>> = Mutex::new(RefCell::new(Speaker::new(
        EdgeCounter {
            high: false,
            rising: 0,
        },
    )));

    fn speaker_tick(s: &mut Scheduler<(), 4>, ctx: ()) {
        critical_section::with(|cs| {
            SPEAKER
                .borrow_ref_mut(cs)
                .service(s, speaker_tick, ctx)
                .unwrap();
        });
    }

    static ONE_G: [Note; 1] = [Note::new(Tone::G, 100_000)];
    static ENDLESS_C: [Note; 1] = [Note::new(Tone::C, u32::MAX)];

    #[test]
    fn note_length_matches_armed_interval() {
        let mut sched: Scheduler<(), 4> = Scheduler::new();
        let mut speaker = Speaker::new(EdgeCounter::default());
        speaker.play(&ONE_G).unwrap();
        speaker.service(&mut sched, noop, ()).unwrap();

        // 2551us period -> 12 tick half wave; 83 of them fill 100ms to within one
        let half = sched.remaining(speaker.timer().unwrap()).unwrap() + 1;
        assert_eq!(half, 12);
        assert_eq!(speaker.toggles_left, 83);
        assert!(ms(100) - speaker.toggles_left * half < half);

        speaker.stop();
        speaker.play(&ENDLESS_C).unwrap();
        speaker.service(&mut sched, noop, ()).unwrap();
        assert_eq!(speaker.toggles_left, us(u32::MAX as u64) / 19);
    }

    static STOP_AFTER: [Note; 2] = [Note::new(Tone::G, 100_000), Note::new(Tone::G, 100_000)];

    #[test]
    fn driven_by_scheduler() {
        let mut sched: Scheduler<(), 4> = Scheduler::new();
        critical_section::with(|cs| {
            let mut speaker = SPEAKER.borrow_ref_mut(cs);
            speaker.start(&mut sched, speaker_tick, ()).unwrap();
            speaker.play(&STOP_AFTER).unwrap();
        });

        // idle poll, then 79 of the first G's 1000 / 12 = 83 half waves
        for _ in 0..ms(100) + 79 * 12 {
            sched.on_tick();
        }
        critical_section::with(|cs| {
            let mut speaker = SPEAKER.borrow_ref_mut(cs);
            assert_eq!(speaker.pin.rising, 40);
            assert!(speaker.is_playing());
            speaker.stop();
            assert!(!speaker.is_playing());
            assert!(!speaker.pin.high);
        });

        for _ in 0..ms(200) {
            sched.on_tick();
        }
        critical_section::with(|cs| {
            let speaker = SPEAKER.borrow_ref_mut(cs);
            assert_eq!(speaker.pin.rising, 40);
            assert_eq!(sched.len(), 1);
        });
    }
}
