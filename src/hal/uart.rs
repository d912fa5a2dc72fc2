use avr_device::atmega328p::USART0;
use core::convert::Infallible;
use embedded_hal::serial;

use crate::config::{CPU_FREQ_HZ, UART_BAUD};

/// UBRR for normal-speed asynchronous mode, rounded to nearest
const fn ubrr(cpu_hz: u32, baud: u32) -> u16 {
    ((cpu_hz + 8 * baud) / (16 * baud) - 1) as u16
}

const UBRR: u16 = ubrr(CPU_FREQ_HZ, UART_BAUD);

/// Polled USART0, 8N1
pub struct Uart {
    usart: USART0,
}

impl Uart {
    pub fn new(usart: USART0) -> Self {
        usart.ubrr0.write(|w| w.bits(UBRR));
        usart.ucsr0c.write(|w| {
            w.umsel0()
                .usart_async()
                .ucsz0()
                .chr8()
                .usbs0()
                .stop1()
                .upm0()
                .disabled()
        });
        usart.ucsr0b.write(|w| w.txen0().set_bit().rxen0().set_bit());
        Self { usart }
    }

    pub fn write_byte(&mut self, byte: u8) {
        let _ = nb::block!(serial::Write::write(self, byte));
    }

    pub fn release(self) -> USART0 {
        self.usart.ucsr0b.reset();
        self.usart
    }
}

impl serial::Write<u8> for Uart {
    type Error = Infallible;

    fn write(&mut self, byte: u8) -> nb::Result<(), Infallible> {
        if self.usart.ucsr0a.read().udre0().bit_is_clear() {
            return Err(nb::Error::WouldBlock);
        }
        self.usart.udr0.write(|w| w.bits(byte));
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Infallible> {
        if self.usart.ucsr0a.read().udre0().bit_is_clear() {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }
}

impl serial::Read<u8> for Uart {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        if self.usart.ucsr0a.read().rxc0().bit_is_clear() {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self.usart.udr0.read().bits())
    }
}

impl ufmt::uWrite for Uart {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}
