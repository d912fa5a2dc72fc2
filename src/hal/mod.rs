pub mod gpio;
pub mod power;
pub mod timer;
pub mod uart;

pub use gpio::board;
pub use gpio::{Input, Output, Pin};
pub use power::{Power, SleepMode};
pub use timer::TickTimer;
pub use uart::Uart;
