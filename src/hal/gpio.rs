use avr_device::atmega328p::{PORTB, PORTC, PORTD};
use core::convert::Infallible;
use core::marker::PhantomData;
use embedded_hal::digital::v2::{InputPin, OutputPin, StatefulOutputPin, ToggleableOutputPin};

pub trait PinMode {}
pub struct Input;
pub struct Output;
impl PinMode for Input {}
impl PinMode for Output {}

/// Pin `P` of port `PORT`, with its direction tracked in `MODE`
#[derive(Debug)]
pub struct Pin<PORT, const P: u8, MODE> {
    _port: PhantomData<PORT>,
    _mode: PhantomData<MODE>,
}

impl<PORT, const P: u8, MODE> Pin<PORT, P, MODE> {
    const MASK: u8 = 1 << P;

    const fn new() -> Self {
        Pin {
            _port: PhantomData,
            _mode: PhantomData,
        }
    }
}

macro_rules! impl_port {
    ($PORT:ident, $ddr:ident, $port:ident, $pin:ident) => {
        impl<const P: u8, MODE: PinMode> Pin<$PORT, P, MODE> {
            pub fn into_output(self) -> Pin<$PORT, P, Output> {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() | Self::MASK));
                }
                Pin::new()
            }

            /// Floating input
            pub fn into_input(self) -> Pin<$PORT, P, Input> {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() & !Self::MASK));
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() & !Self::MASK));
                }
                Pin::new()
            }

            pub fn into_pull_up_input(self) -> Pin<$PORT, P, Input> {
                unsafe {
                    (*$PORT::ptr()).$ddr.modify(|r, w| w.bits(r.bits() & !Self::MASK));
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() | Self::MASK));
                }
                Pin::new()
            }
        }

        impl<const P: u8> OutputPin for Pin<$PORT, P, Output> {
            type Error = Infallible;

            #[inline]
            fn set_high(&mut self) -> Result<(), Infallible> {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() | Self::MASK));
                }
                Ok(())
            }

            #[inline]
            fn set_low(&mut self) -> Result<(), Infallible> {
                unsafe {
                    (*$PORT::ptr()).$port.modify(|r, w| w.bits(r.bits() & !Self::MASK));
                }
                Ok(())
            }
        }

        impl<const P: u8> StatefulOutputPin for Pin<$PORT, P, Output> {
            #[inline]
            fn is_set_high(&self) -> Result<bool, Infallible> {
                Ok(unsafe { (*$PORT::ptr()).$port.read().bits() } & Self::MASK != 0)
            }

            #[inline]
            fn is_set_low(&self) -> Result<bool, Infallible> {
                self.is_set_high().map(|high| !high)
            }
        }

        impl<const P: u8> ToggleableOutputPin for Pin<$PORT, P, Output> {
            type Error = Infallible;

            /// Writing a one to PINx flips PORTx in hardware
            #[inline]
            fn toggle(&mut self) -> Result<(), Infallible> {
                unsafe {
                    (*$PORT::ptr()).$pin.write(|w| w.bits(Self::MASK));
                }
                Ok(())
            }
        }

        impl<const P: u8> InputPin for Pin<$PORT, P, Input> {
            type Error = Infallible;

            #[inline]
            fn is_high(&self) -> Result<bool, Infallible> {
                Ok(unsafe { (*$PORT::ptr()).$pin.read().bits() } & Self::MASK != 0)
            }

            #[inline]
            fn is_low(&self) -> Result<bool, Infallible> {
                self.is_high().map(|high| !high)
            }
        }
    };
}

impl_port!(PORTB, ddrb, portb, pinb);
impl_port!(PORTC, ddrc, portc, pinc);
impl_port!(PORTD, ddrd, portd, pind);

// Board pin assignment
pub mod board {
    use super::*;

    pub type Speaker = Pin<PORTB, 1, Output>;
    pub type Led = Pin<PORTB, 5, Output>;
    pub type Button = Pin<PORTD, 2, Input>;
    pub type Button1 = Pin<PORTD, 3, Input>;
    pub type Button2 = Pin<PORTD, 4, Input>;

    /// Active-low push buttons share one type so they fit in an array
    pub enum AnyButton {
        B0(Button),
        B1(Button1),
        B2(Button2),
    }

    impl InputPin for AnyButton {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            match self {
                AnyButton::B0(pin) => pin.is_high(),
                AnyButton::B1(pin) => pin.is_high(),
                AnyButton::B2(pin) => pin.is_high(),
            }
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    pub struct Pins {
        pub speaker: Speaker,
        pub led: Led,
        pub buttons: [AnyButton; 3],
    }

    impl Pins {
        /// Takes ownership of the ports so no other code touches their pins
        pub fn new(_portb: PORTB, _portd: PORTD) -> Self {
            Pins {
                speaker: Pin::<PORTB, 1, Input>::new().into_output(),
                led: Pin::<PORTB, 5, Input>::new().into_output(),
                buttons: [
                    AnyButton::B0(Pin::<PORTD, 2, Input>::new().into_pull_up_input()),
                    AnyButton::B1(Pin::<PORTD, 3, Input>::new().into_pull_up_input()),
                    AnyButton::B2(Pin::<PORTD, 4, Input>::new().into_pull_up_input()),
                ],
            }
        }
    }
}
