//! Runtime primitives: the event loop, timers and debug logging

pub mod debug;
pub mod event_loop;
pub mod timer;

pub use event_loop::{EventLoop, TimerId};
pub use timer::{Timer, TimerState};
