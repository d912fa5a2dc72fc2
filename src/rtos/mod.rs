//! Tick-driven software timers
//!
//! A fixed-capacity indexed min-heap keyed by wake time, a scheduler that
//! drains it from the tick interrupt, and an interrupt-safe wrapper for
//! sharing one scheduler between the ISR and foreground code.

pub mod heap;
pub mod scheduler;
pub mod shared;

pub use heap::{Entry, Handle, IndexedHeap};
pub use scheduler::{Callback, Scheduler, TickSource, TimerId};
pub use shared::SharedScheduler;
