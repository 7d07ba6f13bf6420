//! Reactive property store
//!
//! [`Observable`] wraps one piece of state and notifies subscribers when it
//! changes. Delivery is deferred to a microtask and coalesced: any number of
//! writes during one synchronous turn produce a single notification that
//! carries the value current at delivery time.

use crate::runtime::EventLoop;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Options for [`Observable::observe_with`]
pub struct ObserveOptions<T> {
    /// Notification is suppressed when this returns false
    pub filter: Option<Rc<dyn Fn(&T) -> bool>>,
    /// Unsubscribe after the first delivered notification
    pub once: bool,
}

impl<T> Default for ObserveOptions<T> {
    fn default() -> Self {
        Self {
            filter: None,
            once: false,
        }
    }
}

impl<T> ObserveOptions<T> {
    pub fn once() -> Self {
        Self {
            filter: None,
            once: true,
        }
    }

    pub fn filter(filter: impl Fn(&T) -> bool + 'static) -> Self {
        Self {
            filter: Some(Rc::new(filter)),
            once: false,
        }
    }
}

struct Observer<T> {
    id: ObserverId,
    callback: Rc<dyn Fn(&T)>,
    filter: Option<Rc<dyn Fn(&T) -> bool>>,
    once: bool,
}

struct Slot<T> {
    value: T,
    observers: Vec<Observer<T>>,
    next_id: u64,
    scheduled: bool,
}

/// An observable value bound to an event loop.
///
/// Cloning yields another handle to the same cell.
pub struct Observable<T> {
    cell: Rc<RefCell<Slot<T>>>,
    event_loop: EventLoop,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            event_loop: self.event_loop.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cell = self.cell.borrow();
        f.debug_struct("Observable")
            .field("value", &cell.value)
            .field("observers", &cell.observers.len())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    pub fn new(event_loop: &EventLoop, value: T) -> Self {
        Self {
            cell: Rc::new(RefCell::new(Slot {
                value,
                observers: Vec::new(),
                next_id: 0,
                scheduled: false,
            })),
            event_loop: event_loop.clone(),
        }
    }

    pub fn get(&self) -> T {
        self.cell.borrow().value.clone()
    }

    /// Borrow the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.borrow().value)
    }

    /// Replace the value. Writing an equal value is a no-op.
    pub fn set(&self, value: T) {
        {
            let mut cell = self.cell.borrow_mut();
            if cell.value == value {
                return;
            }
            cell.value = value;
        }
        self.schedule();
    }

    /// Mutate the value in place; observers hear about it only if it changed
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, changed) = {
            let mut cell = self.cell.borrow_mut();
            let before = cell.value.clone();
            let result = f(&mut cell.value);
            (result, cell.value != before)
        };
        if changed {
            self.schedule();
        }
        result
    }

    /// Subscribe to changes
    pub fn observe(&self, callback: impl Fn(&T) + 'static) -> ObserverId {
        self.observe_with(callback, ObserveOptions::default())
    }

    pub fn observe_with(
        &self,
        callback: impl Fn(&T) + 'static,
        options: ObserveOptions<T>,
    ) -> ObserverId {
        let mut cell = self.cell.borrow_mut();
        let id = ObserverId(cell.next_id);
        cell.next_id += 1;
        cell.observers.push(Observer {
            id,
            callback: Rc::new(callback),
            filter: options.filter,
            once: options.once,
        });
        id
    }

    /// Remove a subscription. Returns whether it was registered.
    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut cell = self.cell.borrow_mut();
        let before = cell.observers.len();
        cell.observers.retain(|o| o.id != id);
        cell.observers.len() != before
    }

    /// Re-deliver the current value to every observer on the next microtask
    pub fn notify_observers(&self) {
        self.schedule();
    }

    pub fn observer_count(&self) -> usize {
        self.cell.borrow().observers.len()
    }

    pub fn is_observed(&self) -> bool {
        self.observer_count() > 0
    }

    fn schedule(&self) {
        {
            let mut cell = self.cell.borrow_mut();
            if cell.scheduled || cell.observers.is_empty() {
                return;
            }
            cell.scheduled = true;
        }
        let weak: Weak<RefCell<Slot<T>>> = Rc::downgrade(&self.cell);
        self.event_loop.queue_microtask(move || {
            if let Some(cell) = weak.upgrade() {
                Self::deliver(&cell);
            }
        });
    }

    fn deliver(cell: &Rc<RefCell<Slot<T>>>) {
        let (value, observers) = {
            let mut c = cell.borrow_mut();
            c.scheduled = false;
            let observers: Vec<_> = c
                .observers
                .iter()
                .map(|o| (o.id, o.callback.clone(), o.filter.clone(), o.once))
                .collect();
            (c.value.clone(), observers)
        };

        for (id, callback, filter, once) in observers {
            // An earlier callback in this delivery may have unsubscribed it
            let still_registered = cell.borrow().observers.iter().any(|o| o.id == id);
            if !still_registered {
                continue;
            }
            if let Some(filter) = &filter
                && !filter(&value)
            {
                continue;
            }
            if once {
                cell.borrow_mut().observers.retain(|o| o.id != id);
            }
            callback(&value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(obs: &Observable<i32>) -> Rc<RefCell<Vec<i32>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        obs.observe(move |v| s.borrow_mut().push(*v));
        seen
    }

    #[test]
    fn writes_in_one_turn_coalesce_to_final_value() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 0);
        let seen = recording(&obs);

        obs.set(1);
        obs.set(2);
        obs.set(3);
        assert!(seen.borrow().is_empty(), "delivery must be deferred");

        el.run_microtasks();
        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 7);
        let seen = recording(&obs);

        obs.set(7);
        el.run_microtasks();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn separate_turns_notify_separately() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 0);
        let seen = recording(&obs);

        obs.set(1);
        el.run_microtasks();
        obs.set(2);
        el.run_microtasks();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn filter_and_once_options() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 0);
        let evens = Rc::new(RefCell::new(Vec::new()));
        let first = Rc::new(RefCell::new(Vec::new()));
        let (e, f) = (evens.clone(), first.clone());
        obs.observe_with(move |v| e.borrow_mut().push(*v), ObserveOptions::filter(|v| v % 2 == 0));
        obs.observe_with(move |v| f.borrow_mut().push(*v), ObserveOptions::once());

        for v in 1..=4 {
            obs.set(v);
            el.run_microtasks();
        }
        assert_eq!(*evens.borrow(), vec![2, 4]);
        assert_eq!(*first.borrow(), vec![1]);
        assert_eq!(obs.observer_count(), 1);
    }

    #[test]
    fn unobserving_last_observer_restores_plain_cell() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let id = obs.observe(move |v: &i32| s.borrow_mut().push(*v));

        assert!(obs.unobserve(id));
        assert!(!obs.unobserve(id));
        assert!(!obs.is_observed());

        obs.set(11);
        assert_eq!(obs.get(), 11);
        assert!(!el.has_microtasks(), "plain cell must not schedule work");
        el.run_microtasks();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn notify_observers_redelivers_current_value() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 5);
        let seen = recording(&obs);

        obs.notify_observers();
        obs.set(6);
        el.run_microtasks();
        assert_eq!(*seen.borrow(), vec![6]);
    }

    #[test]
    fn observer_may_write_back_during_delivery() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, 0);
        let seen = recording(&obs);
        let writer = obs.clone();
        obs.observe(move |v| {
            if *v < 3 {
                writer.set(v + 1);
            }
        });

        obs.set(1);
        el.run_microtasks();
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn update_notifies_only_on_change() {
        let el = EventLoop::new();
        let obs = Observable::new(&el, vec![1]);
        let count = Rc::new(std::cell::Cell::new(0));
        let c = count.clone();
        obs.observe(move |_| c.set(c.get() + 1));

        obs.update(|v| v.push(2));
        el.run_microtasks();
        obs.update(|v| v.sort());
        el.run_microtasks();
        assert_eq!(count.get(), 1);
        assert_eq!(obs.get(), vec![1, 2]);
    }
}
