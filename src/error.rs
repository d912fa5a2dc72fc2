//! Error taxonomy shared by the timer queue and the scheduler

use ufmt::derive::uDebug;

/// Errors surfaced by the scheduling core
///
/// None of these are fatal. They are returned to the immediate caller, who
/// decides whether to retry, drop the request or treat it as misconfiguration.
#[derive(Debug, uDebug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Insertion into a queue that already holds `MAX_TIMERS` items
    CapacityExceeded,
    /// The handle does not name a currently scheduled item
    NotFound,
    /// Root access on an empty queue
    EmptyQueue,
    /// Delay or period does not fit the wrap-aware tick window
    DelayOutOfRange,
    /// The shared scheduler is already borrowed (re-entrant use)
    Busy,
}

impl Error {
    /// Short description, suitable for a serial log line
    pub const fn as_str(&self) -> &'static str {
        match self {
            Error::CapacityExceeded => "capacity exceeded",
            Error::NotFound => "not found",
            Error::EmptyQueue => "empty queue",
            Error::DelayOutOfRange => "delay out of range",
            Error::Busy => "scheduler busy",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
