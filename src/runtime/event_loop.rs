//! Single-threaded cooperative event loop
//!
//! Every asynchronous step of the player (observer delivery, timed waits,
//! text reveal ticks) is scheduled here. Time is virtual: the host moves it
//! forward with [`EventLoop::advance`], either from a real clock or from a
//! test.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce()>;

/// Handle returned by [`EventLoop::set_timeout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Default)]
struct LoopInner {
    now: Duration,
    microtasks: VecDeque<Task>,
    /// Keyed by (deadline, sequence) so equal deadlines keep scheduling order
    timeouts: BTreeMap<(Duration, u64), Task>,
    deadlines: HashMap<u64, Duration>,
    next_seq: u64,
}

/// Cloneable handle to a shared event loop
#[derive(Clone, Default)]
pub struct EventLoop {
    inner: Rc<RefCell<LoopInner>>,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("EventLoop")
            .field("now", &inner.now)
            .field("microtasks", &inner.microtasks.len())
            .field("timeouts", &inner.timeouts.len())
            .finish()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Queue work to run once the current synchronous turn completes
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Schedule work to run after `delay` of virtual time
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let deadline = inner.now + delay;
        inner.timeouts.insert((deadline, seq), Box::new(task));
        inner.deadlines.insert(seq, deadline);
        TimerId(seq)
    }

    /// Cancel a scheduled timeout. Returns false if it already ran or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.deadlines.remove(&id.0) {
            Some(deadline) => inner.timeouts.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    /// Deadline of the earliest pending timeout
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .borrow()
            .timeouts
            .keys()
            .next()
            .map(|(deadline, _)| *deadline)
    }

    /// True when no microtask and no timeout is pending
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.microtasks.is_empty() && inner.timeouts.is_empty()
    }

    pub fn has_microtasks(&self) -> bool {
        !self.inner.borrow().microtasks.is_empty()
    }

    /// Drain the microtask queue, including microtasks queued while draining
    pub fn run_microtasks(&self) {
        loop {
            let task = self.inner.borrow_mut().microtasks.pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Move virtual time forward by `by`, running every timeout that falls
    /// due inside the window in deadline order. Microtasks are drained
    /// before the first timeout and after each one.
    pub fn advance(&self, by: Duration) {
        self.run_microtasks();
        let target = self.now() + by;
        loop {
            let due = {
                let mut inner = self.inner.borrow_mut();
                let key = match inner.timeouts.keys().next() {
                    Some(&key) if key.0 <= target => key,
                    _ => break,
                };
                let task = inner.timeouts.remove(&key);
                inner.deadlines.remove(&key.1);
                inner.now = key.0;
                task
            };
            if let Some(task) = due {
                task();
            }
            self.run_microtasks();
        }
        self.inner.borrow_mut().now = target;
    }

    /// Run everything that is due right now without moving time
    pub fn settle(&self) {
        self.advance(Duration::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, EventLoop) {
        (Rc::new(RefCell::new(Vec::new())), EventLoop::new())
    }

    #[test]
    fn microtasks_run_in_order_and_drain_nested() {
        let (log, el) = recorder();
        let (l1, l2, el2) = (log.clone(), log.clone(), el.clone());
        el.queue_microtask(move || {
            l1.borrow_mut().push("a");
            let l3 = l1.clone();
            el2.queue_microtask(move || l3.borrow_mut().push("c"));
        });
        el.queue_microtask(move || l2.borrow_mut().push("b"));

        el.run_microtasks();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn timeouts_fire_by_deadline_then_sequence() {
        let (log, el) = recorder();
        let (a, b, c) = (log.clone(), log.clone(), log.clone());
        el.set_timeout(Duration::from_millis(20), move || a.borrow_mut().push("late"));
        el.set_timeout(Duration::from_millis(10), move || b.borrow_mut().push("first"));
        el.set_timeout(Duration::from_millis(10), move || c.borrow_mut().push("second"));

        el.advance(Duration::from_millis(15));
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(el.now(), Duration::from_millis(15));

        el.advance(Duration::from_millis(5));
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
        assert!(el.is_idle());
    }

    #[test]
    fn cleared_timeout_never_runs() {
        let (log, el) = recorder();
        let l = log.clone();
        let id = el.set_timeout(Duration::from_millis(5), move || l.borrow_mut().push("x"));

        assert!(el.clear_timeout(id));
        assert!(!el.clear_timeout(id));
        el.advance(Duration::from_millis(10));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn zero_delay_timeout_runs_on_settle() {
        let (log, el) = recorder();
        let l = log.clone();
        el.set_timeout(Duration::ZERO, move || l.borrow_mut().push("now"));
        assert!(log.borrow().is_empty());

        el.settle();
        assert_eq!(*log.borrow(), vec!["now"]);
        assert_eq!(el.next_deadline(), None);
    }
}
