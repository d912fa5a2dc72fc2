//! Configuration constants for the gb7 firmware

use crate::logger::Level;
use crate::time::TimeBase;

/// CPU frequency in Hz
pub const CPU_FREQ_HZ: u32 = 8_000_000;

/// Timer2 clock divider used for the scheduler tick
pub const TICK_PRESCALER: u32 = 8;

/// Timer2 compare-match top (CTC mode); the tick fires every `TOP` timer counts
pub const TICK_COMPARE_TOP: u8 = 100;

/// Clock dividers Timer2 can select in TCCR2B
pub const TIMER2_PRESCALERS: [u32; 7] = [1, 8, 32, 64, 128, 256, 1024];

pub const fn is_timer2_prescaler(prescaler: u32) -> bool {
    let mut i = 0;
    while i < TIMER2_PRESCALERS.len() {
        if TIMER2_PRESCALERS[i] == prescaler {
            return true;
        }
        i += 1;
    }
    false
}

// The hardware tick must run at exactly the rate TIME_BASE describes
const _: () = assert!(
    is_timer2_prescaler(TICK_PRESCALER),
    "TICK_PRESCALER is not a Timer2 clock divider"
);
const _: () = assert!(TICK_COMPARE_TOP > 0, "TICK_COMPARE_TOP must be at least 1");

/// Tick time base: 8MHz / 8 / 100 = 10kHz, one tick every 100us
pub const TIME_BASE: TimeBase = TimeBase::new(CPU_FREQ_HZ, TICK_PRESCALER, TICK_COMPARE_TOP as u32);

/// Maximum number of simultaneously scheduled callbacks
pub const MAX_TIMERS: usize = 16;

/// UART baud rate
pub const UART_BAUD: u32 = 9600;

/// Button sampling interval in milliseconds
pub const BUTTON_POLL_MS: u32 = 5;

/// Button debounce time in milliseconds
pub const BUTTON_DEBOUNCE_MS: u32 = 20;

/// Speaker queue poll interval while nothing is playing
pub const SPEAKER_IDLE_POLL_MS: u32 = 100;

/// Melodies that can be queued behind the one currently playing
pub const MELODY_QUEUE_LEN: usize = 4;

/// Heartbeat LED half period
pub const HEARTBEAT_MS: u32 = 500;

/// Serial log verbosity
pub const LOG_LEVEL: Level = if cfg!(debug_assertions) {
    Level::Debug
} else {
    Level::Info
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_hardware_dividers_are_accepted() {
        assert!(is_timer2_prescaler(TICK_PRESCALER));
        assert!(is_timer2_prescaler(1024));
        assert!(!is_timer2_prescaler(16));
        assert!(!is_timer2_prescaler(0));
        assert_eq!(TIME_BASE.tick_hz(), 10_000);
    }
}
