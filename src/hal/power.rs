use avr_device::atmega328p::CPU;

/// SMCR sleep mode select (SM2:0)
#[derive(Clone, Copy)]
#[repr(u8)]
pub enum SleepMode {
    /// Timers and USART keep running
    Idle = 0,
    PowerDown = 2,
    PowerSave = 3,
}

pub struct Power {
    cpu: CPU,
}

impl Power {
    pub fn new(cpu: CPU) -> Self {
        Self { cpu }
    }

    #[inline]
    pub fn set_sleep_mode(&mut self, mode: SleepMode) {
        self.cpu
            .smcr
            .write(|w| unsafe { w.bits((mode as u8) << 1) });
    }

    /// Sleep until the next interrupt
    #[inline]
    pub fn sleep(&mut self) {
        self.cpu.smcr.modify(|_, w| w.se().set_bit());
        #[allow(unused_unsafe)]
        unsafe {
            avr_device::asm::sleep()
        }
        self.cpu.smcr.modify(|_, w| w.se().clear_bit());
    }

    pub fn enter_idle_mode(&mut self) {
        self.set_sleep_mode(SleepMode::Idle);
        self.sleep();
    }
}
