//! Delayed and repeating callbacks on top of the event loop

use super::event_loop::{EventLoop, TimerId};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Lifecycle of a [`Timer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Constructed, not started yet
    Idle,
    Running,
    /// Halted by [`Timer::pause`] with the time that was left
    Paused { remaining: Duration },
    Cancelled,
    /// The callback has run (one-shot) or been forced by [`Timer::skip`]
    Finished,
}

struct TimerInner {
    event_loop: EventLoop,
    duration: Duration,
    repeat: bool,
    callback: Rc<dyn Fn()>,
    handle: Option<TimerId>,
    scheduled_at: Duration,
    state: TimerState,
}

/// A one-shot or repeating timer.
///
/// A paused timer is not resumed in place: build a new one from
/// [`Timer::remaining`] and start it.
#[derive(Clone)]
pub struct Timer {
    inner: Rc<RefCell<TimerInner>>,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Timer")
            .field("duration", &inner.duration)
            .field("repeat", &inner.repeat)
            .field("state", &inner.state)
            .finish()
    }
}

impl Timer {
    /// One-shot timer
    pub fn new(event_loop: &EventLoop, duration: Duration, callback: impl Fn() + 'static) -> Self {
        Self::build(event_loop, duration, false, Rc::new(callback))
    }

    /// Timer that fires every `interval` until paused, cancelled or skipped
    pub fn repeating(
        event_loop: &EventLoop,
        interval: Duration,
        callback: impl Fn() + 'static,
    ) -> Self {
        Self::build(event_loop, interval, true, Rc::new(callback))
    }

    fn build(
        event_loop: &EventLoop,
        duration: Duration,
        repeat: bool,
        callback: Rc<dyn Fn()>,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(TimerInner {
                event_loop: event_loop.clone(),
                duration,
                repeat,
                callback,
                handle: None,
                scheduled_at: Duration::ZERO,
                state: TimerState::Idle,
            })),
        }
    }

    pub fn state(&self) -> TimerState {
        self.inner.borrow().state
    }

    pub fn duration(&self) -> Duration {
        self.inner.borrow().duration
    }

    /// True while the timer is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.state() == TimerState::Running
    }

    /// Time left before the next firing, if the timer is running or paused
    pub fn remaining(&self) -> Option<Duration> {
        let inner = self.inner.borrow();
        match inner.state {
            TimerState::Running => {
                let elapsed = inner.event_loop.now().saturating_sub(inner.scheduled_at);
                Some(inner.duration.saturating_sub(elapsed))
            }
            TimerState::Paused { remaining } => Some(remaining),
            _ => None,
        }
    }

    /// Schedule the timer. Starting a running timer does nothing.
    pub fn start(&self) {
        if self.is_pending() {
            return;
        }
        Self::schedule(&self.inner);
    }

    fn schedule(cell: &Rc<RefCell<TimerInner>>) {
        let handle = cell.clone();
        let mut inner = cell.borrow_mut();
        let event_loop = inner.event_loop.clone();
        inner.scheduled_at = event_loop.now();
        inner.state = TimerState::Running;
        let duration = inner.duration;
        inner.handle = Some(event_loop.set_timeout(duration, move || Self::fire(handle)));
    }

    fn fire(cell: Rc<RefCell<TimerInner>>) {
        let (callback, repeat) = {
            let mut inner = cell.borrow_mut();
            if inner.state != TimerState::Running {
                return;
            }
            inner.handle = None;
            if !inner.repeat {
                inner.state = TimerState::Finished;
            }
            (inner.callback.clone(), inner.repeat)
        };
        if repeat {
            Self::schedule(&cell);
        }
        callback();
    }

    fn clear(inner: &mut TimerInner) {
        if let Some(handle) = inner.handle.take() {
            inner.event_loop.clear_timeout(handle);
        }
    }

    /// Halt the timer and record the time left. Returns the remaining
    /// duration, or `None` if the timer was not running.
    pub fn pause(&self) -> Option<Duration> {
        let remaining = self.remaining().filter(|_| self.is_pending())?;
        let mut inner = self.inner.borrow_mut();
        Self::clear(&mut inner);
        inner.state = TimerState::Paused { remaining };
        Some(remaining)
    }

    /// Halt unconditionally; the callback will not run
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        Self::clear(&mut inner);
        if inner.state != TimerState::Finished {
            inner.state = TimerState::Cancelled;
        }
    }

    /// Drop the pending wait and run the callback at the next scheduling
    /// opportunity. Returns false if there was nothing to skip.
    pub fn skip(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            TimerState::Running | TimerState::Paused { .. } => {
                Self::clear(&mut inner);
                inner.state = TimerState::Finished;
                let callback = inner.callback.clone();
                inner.event_loop.set_timeout(Duration::ZERO, move || callback());
                true
            }
            _ => false,
        }
    }
}
