use avr_device::atmega328p::TC2;

use crate::config::is_timer2_prescaler;
use crate::rtos::TickSource;
use crate::time::TimeBase;

/// Timer/Counter 2 in CTC mode, raising `TIMER2_COMPA` once per tick
pub struct TickTimer {
    tc2: TC2,
    time_base: TimeBase,
}

impl TickTimer {
    pub fn new(tc2: TC2, time_base: TimeBase) -> Self {
        debug_assert!(is_timer2_prescaler(time_base.prescaler()));
        debug_assert!((1..=256).contains(&time_base.compare_top()));
        // Stopped until start()
        tc2.tccr2b.write(|w| w.cs2().no_clock());
        tc2.tcnt2.write(|w| w.bits(0));
        Self { tc2, time_base }
    }

    pub fn time_base(&self) -> TimeBase {
        self.time_base
    }

    pub fn stop(&mut self) {
        self.tc2.timsk2.write(|w| w.ocie2a().clear_bit());
        self.tc2.tccr2b.write(|w| w.cs2().no_clock());
    }

    pub fn counter(&self) -> u8 {
        self.tc2.tcnt2.read().bits()
    }
}

impl TickSource for TickTimer {
    fn start(&mut self) {
        let tc2 = &self.tc2;
        tc2.tccr2a.write(|w| w.wgm2().ctc());
        // OCR2A = top - 1 gives exactly `compare_top` counts per period
        tc2.ocr2a
            .write(|w| w.bits((self.time_base.compare_top() - 1) as u8));
        tc2.tcnt2.write(|w| w.bits(0));
        tc2.tccr2b.write(|w| match self.time_base.prescaler() {
            1 => w.cs2().direct(),
            8 => w.cs2().prescale_8(),
            32 => w.cs2().prescale_32(),
            64 => w.cs2().prescale_64(),
            128 => w.cs2().prescale_128(),
            256 => w.cs2().prescale_256(),
            1024 => w.cs2().prescale_1024(),
            // Not a Timer2 divider; leave the timer stopped
            _ => w.cs2().no_clock(),
        });
        tc2.timsk2.write(|w| w.ocie2a().set_bit());
    }
}
