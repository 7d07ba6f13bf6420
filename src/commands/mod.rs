//! Command table: opcode names mapped to handler functions
//!
//! Each subsystem (graphics, audio, variables) contributes a table; the
//! interpreter merges them with its own control-flow handlers.

use crate::runtime::{EventLoop, Timer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

pub mod audio;
pub mod graphics;
pub mod variables;

/// One-shot completion callback handed to every handler.
///
/// Clones share the same callback; only the first `finish` runs it.
#[derive(Clone)]
pub struct Finish {
    callback: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl std::fmt::Debug for Finish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finish").field("done", &self.is_done()).finish()
    }
}

impl Finish {
    pub fn new(callback: impl FnOnce() + 'static) -> Self {
        Self {
            callback: Rc::new(RefCell::new(Some(Box::new(callback)))),
        }
    }

    /// A finish that does nothing
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Signal completion. Returns false if it was already signalled.
    pub fn finish(&self) -> bool {
        let callback = self.callback.borrow_mut().take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.callback.borrow().is_none()
    }
}

/// The in-progress execution of one instruction
#[derive(Clone)]
pub struct CommandHandler {
    next: Rc<dyn Fn()>,
    cancel: Option<Rc<dyn Fn()>>,
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

impl CommandHandler {
    /// `next` is called when the user asks to fast-forward this instruction
    pub fn new(next: impl Fn() + 'static) -> Self {
        Self {
            next: Rc::new(next),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: impl Fn() + 'static) -> Self {
        self.cancel = Some(Rc::new(cancel));
        self
    }

    pub fn advance(&self) {
        (self.next)();
    }

    pub fn cancel(&self) {
        if let Some(cancel) = &self.cancel {
            cancel();
        }
    }
}

/// What a handler reports back to the interpreter
#[derive(Debug)]
pub enum Completion {
    /// Done synchronously
    Completed,
    /// Still running; the interpreter waits for `Finish` or `next()`
    Pending(CommandHandler),
}

/// Handler signature: `(argument, opcode, finish)`
pub type Handler = Rc<dyn Fn(&str, &str, Finish) -> Completion>;

/// Result of looking up an opcode
pub enum Lookup {
    Handler(Handler),
    /// Recognized name with no behavior
    Reserved,
    Unknown,
}

#[derive(Default, Clone)]
pub struct CommandTable {
    entries: HashMap<String, Option<Handler>>,
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("CommandTable").field("opcodes", &names).finish()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        opcode: &str,
        handler: impl Fn(&str, &str, Finish) -> Completion + 'static,
    ) -> &mut Self {
        self.entries.insert(opcode.to_string(), Some(Rc::new(handler)));
        self
    }

    /// Reserve an opcode as a recognized no-op
    pub fn reserve(&mut self, opcode: &str) -> &mut Self {
        self.entries.insert(opcode.to_string(), None);
        self
    }

    /// Merge another subsystem's table into this one.
    ///
    /// # Panics
    /// If both tables define the same opcode.
    pub fn merge(&mut self, other: CommandTable) -> &mut Self {
        for (opcode, handler) in other.entries {
            assert!(
                !self.entries.contains_key(&opcode),
                "opcode '{opcode}' registered twice"
            );
            self.entries.insert(opcode, handler);
        }
        self
    }

    pub fn lookup(&self, opcode: &str) -> Lookup {
        match self.entries.get(opcode) {
            Some(Some(handler)) => Lookup::Handler(handler.clone()),
            Some(None) => Lookup::Reserved,
            None => Lookup::Unknown,
        }
    }

    pub fn contains(&self, opcode: &str) -> bool {
        self.entries.contains_key(opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split a comma-separated argument list. Commas inside double quotes
/// do not split; surrounding quotes are removed.
pub fn split_args(arg: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in arg.chars() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => args.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last.to_string());
    }
    args
}

/// Parse a millisecond count, tolerating a leading `%` as scripts sometimes write
pub fn parse_millis(arg: &str) -> Option<u64> {
    arg.trim().trim_start_matches('%').parse().ok()
}

/// Complete after `duration`, or immediately if it is zero. `next()` skips
/// the wait.
pub fn wait_for(event_loop: &EventLoop, duration: Duration, finish: Finish) -> Completion {
    if duration.is_zero() {
        return Completion::Completed;
    }
    let timer = Timer::new(event_loop, duration, move || {
        finish.finish();
    });
    timer.start();
    let (skip, cancel) = (timer.clone(), timer);
    Completion::Pending(
        CommandHandler::new(move || {
            skip.skip();
        })
        .with_cancel(move || cancel.cancel()),
    )
}
