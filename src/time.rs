//! Tick time base
//!
//! The scheduler counts in ticks of the hardware timer. Callers write human
//! units through the `const fn` conversions below; the conversions are
//! parameterised by CPU clock, prescaler and compare top so they evaluate at
//! compile time for constants.

use core::cmp::Ordering;
use core::ops::{Add, Sub};

use crate::config::TIME_BASE;

/// A duration in scheduler ticks
pub type Ticks = u32;

/// Largest delay or period accepted by the scheduler.
///
/// Deadlines are compared modulo 2^32, which is only consistent while every
/// live deadline lies within half the counter range of `now`.
pub const MAX_DELAY: Ticks = i32::MAX as u32;

/// An absolute tick count
///
/// Comparison is wrap-aware: `a < b` iff `b - a`, taken modulo 2^32, is in
/// `1..2^31`. At 10kHz the counter wraps after ~5 days of uptime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Instant(u32);

impl Instant {
    /// Tick zero, the value of `now` after reset
    pub const ZERO: Instant = Instant(0);

    pub const fn from_ticks(ticks: u32) -> Self {
        Instant(ticks)
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }

    /// Ticks from `earlier` to `self`, zero if `earlier` is not in the past
    pub fn saturating_since(self, earlier: Instant) -> Ticks {
        let delta = self.0.wrapping_sub(earlier.0) as i32;
        if delta > 0 {
            delta as u32
        } else {
            0
        }
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.wrapping_sub(other.0) as i32).cmp(&0)
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add<Ticks> for Instant {
    type Output = Instant;

    fn add(self, rhs: Ticks) -> Instant {
        Instant(self.0.wrapping_add(rhs))
    }
}

impl Sub<Instant> for Instant {
    type Output = Ticks;

    fn sub(self, rhs: Instant) -> Ticks {
        self.0.wrapping_sub(rhs.0)
    }
}

/// Hardware tick rate description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeBase {
    cpu_hz: u32,
    prescaler: u32,
    compare_top: u32,
}

impl TimeBase {
    pub const fn new(cpu_hz: u32, prescaler: u32, compare_top: u32) -> Self {
        Self {
            cpu_hz,
            prescaler,
            compare_top,
        }
    }

    pub const fn cpu_hz(&self) -> u32 {
        self.cpu_hz
    }

    pub const fn prescaler(&self) -> u32 {
        self.prescaler
    }

    /// Timer counts per tick
    pub const fn compare_top(&self) -> u32 {
        self.compare_top
    }

    /// CPU cycles per tick
    pub const fn cycles_per_tick(&self) -> u32 {
        self.prescaler * self.compare_top
    }

    /// Ticks per second
    pub const fn tick_hz(&self) -> u32 {
        self.cpu_hz / self.cycles_per_tick()
    }

    /// Convert microseconds to ticks, truncating
    pub const fn micros(&self, us: u64) -> Ticks {
        self.to_ticks(us, 1_000_000)
    }

    /// Convert milliseconds to ticks, truncating
    pub const fn millis(&self, ms: u64) -> Ticks {
        self.to_ticks(ms, 1_000)
    }

    /// Convert seconds to ticks, truncating
    pub const fn secs(&self, s: u64) -> Ticks {
        self.to_ticks(s, 1)
    }

    /// Convert ticks back to microseconds
    pub const fn to_micros(&self, ticks: Ticks) -> u64 {
        let us = ticks as u128 * self.cycles_per_tick() as u128 * 1_000_000 / self.cpu_hz as u128;
        if us > u64::MAX as u128 {
            u64::MAX
        } else {
            us as u64
        }
    }

    /// `value / units_per_sec` seconds in ticks, with a single truncation
    const fn to_ticks(&self, value: u64, units_per_sec: u64) -> Ticks {
        // u64 * u32 always fits in u128
        let ticks = value as u128 * self.cpu_hz as u128
            / (self.cycles_per_tick() as u128 * units_per_sec as u128);
        if ticks > u32::MAX as u128 {
            u32::MAX
        } else {
            ticks as u32
        }
    }
}

/// Microseconds to ticks at the firmware time base
pub const fn us(v: u64) -> Ticks {
    TIME_BASE.micros(v)
}

/// Milliseconds to ticks at the firmware time base
pub const fn ms(v: u64) -> Ticks {
    TIME_BASE.millis(v)
}

/// Seconds to ticks at the firmware time base
pub const fn s(v: u64) -> Ticks {
    TIME_BASE.secs(v)
}
