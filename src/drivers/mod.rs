pub mod button_handler;
pub mod delay;
pub mod sound_effect;
pub mod speaker;

pub use button_handler::{ButtonEvent, ButtonHandler};
pub use delay::{Deadline, TickDelay};
pub use sound_effect::SoundEffect;
pub use speaker::{Melody, Note, Speaker, Tone};
