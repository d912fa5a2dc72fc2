//! Leveled line logger over any `ufmt` sink
//!
//! Lines look like `[INF] message` or `[DBG] message: value`, terminated with
//! CRLF for serial terminals.

use ufmt::{uDisplay, uWrite, uwrite};

use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }
}

pub struct Logger<W> {
    sink: W,
    max_level: Level,
}

impl<W: uWrite> Logger<W> {
    pub const fn new(sink: W, max_level: Level) -> Self {
        Self { sink, max_level }
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    pub fn set_level(&mut self, level: Level) {
        self.max_level = level;
    }

    pub fn log(&mut self, level: Level, msg: &str) {
        if !self.enabled(level) {
            return;
        }
        // Nowhere to report a failing log sink
        let _ = uwrite!(&mut self.sink, "{}{}\r\n", level.tag(), msg);
    }

    pub fn log_value<V: uDisplay + ?Sized>(&mut self, level: Level, msg: &str, value: &V) {
        if !self.enabled(level) {
            return;
        }
        let _ = uwrite!(&mut self.sink, "{}{}: {}\r\n", level.tag(), msg, value);
    }

    pub fn log_error(&mut self, msg: &str, err: Error) {
        self.log_value(Level::Error, msg, err.as_str());
    }

    pub fn info(&mut self, msg: &str) {
        self.log(Level::Info, msg);
    }

    pub fn warn(&mut self, msg: &str) {
        self.log(Level::Warn, msg);
    }

    pub fn debug<V: uDisplay + ?Sized>(&mut self, msg: &str, value: &V) {
        self.log_value(Level::Debug, msg, value);
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
