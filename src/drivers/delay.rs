//! Blocking delays measured in scheduler ticks
//!
//! Foreground-only: inside a timer callback the tick counter cannot advance,
//! so a delay there returns at once instead of spinning forever.

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::config::TIME_BASE;
use crate::error::Error;
use crate::rtos::SharedScheduler;
use crate::time::{Instant, Ticks, TimeBase};

/// A point in tick time to wait for
pub struct Deadline<'a, C, const N: usize> {
    scheduler: &'a SharedScheduler<C, N>,
    at: Instant,
}

impl<'a, C: Copy, const N: usize> Deadline<'a, C, N> {
    /// Deadline `ticks` after the scheduler's current tick
    pub fn after(scheduler: &'a SharedScheduler<C, N>, ticks: Ticks) -> Result<Self, Error> {
        let now = scheduler.now()?;
        Ok(Self {
            scheduler,
            at: now + ticks,
        })
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    /// Non-blocking check, for use with `nb::block!`
    pub fn wait(&self) -> nb::Result<(), Error> {
        let now = self.scheduler.now().map_err(nb::Error::Other)?;
        if now >= self.at {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }
}

/// `embedded-hal` delay provider backed by the tick counter
///
/// Resolution is one tick; requests shorter than a tick still wait for one
/// tick boundary.
pub struct TickDelay<'a, C, const N: usize> {
    scheduler: &'a SharedScheduler<C, N>,
    time_base: TimeBase,
}

impl<'a, C: Copy, const N: usize> TickDelay<'a, C, N> {
    pub fn new(scheduler: &'a SharedScheduler<C, N>) -> Self {
        Self {
            scheduler,
            time_base: TIME_BASE,
        }
    }

    pub fn delay_ticks(&mut self, ticks: Ticks) -> Result<(), Error> {
        let deadline = Deadline::after(self.scheduler, ticks.max(1))?;
        nb::block!(deadline.wait())
    }
}

impl<'a, C: Copy, const N: usize> DelayMs<u16> for TickDelay<'a, C, N> {
    fn delay_ms(&mut self, ms: u16) {
        let ticks = self.time_base.millis(ms as u64);
        let _ = self.delay_ticks(ticks);
    }
}

impl<'a, C: Copy, const N: usize> DelayUs<u16> for TickDelay<'a, C, N> {
    fn delay_us(&mut self, us: u16) {
        let ticks = self.time_base.micros(us as u64);
        let _ = self.delay_ticks(ticks);
    }
}
