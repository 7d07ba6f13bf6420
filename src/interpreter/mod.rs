//! The script interpreter
//!
//! Drives execution of a loaded scene line by line:
//!
//! ```text
//! index written -> parse line into the instruction queue -> dispatch
//!   -> handler completes (now or later) -> next queued instruction
//!   -> queue empty -> index + 1 -> ...
//! ```
//!
//! Execution is triggered by notifications on `GameState::index`, so
//! writing the index several times in one turn runs only the final line.
//! Scene changes go through a versioned load request that the host
//! fulfils with [`Interpreter::complete_load`].

mod control;
pub mod expr;
pub mod line;
mod text;

pub use line::{Instruction, parse_line};

use crate::commands::{self, CommandHandler, CommandTable, Completion, Finish, Lookup};
use crate::observe::Observable;
use crate::runtime::EventLoop;
use crate::runtime::debug::{self, DebugCategory, DebugConfig, LogLevel};
use crate::source::SourceError;
use crate::types::{Context, GameState, Progress, Settings};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Interpreter state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No scene loaded, or execution stopped at the end of one
    Idle,
    /// Waiting for the host to deliver scene lines
    Loading,
    /// Dispatching instructions
    Executing,
    /// A handler is pending on a timer or user input
    AwaitingCompletion,
}

/// A scene fetch the host must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub scene: String,
    pub version: u64,
}

/// Store-and-forward slot for a presentation callback.
///
/// The latest value emitted before a consumer is connected is kept and
/// flushed to it on connection; earlier ones are dropped.
pub(crate) struct Relay<T> {
    consumer: RefCell<Option<Rc<dyn Fn(&T)>>>,
    pending: RefCell<Option<T>>,
}

impl<T> Default for Relay<T> {
    fn default() -> Self {
        Self {
            consumer: RefCell::new(None),
            pending: RefCell::new(None),
        }
    }
}

impl<T> Relay<T> {
    pub(crate) fn connect(&self, consumer: Rc<dyn Fn(&T)>) {
        *self.consumer.borrow_mut() = Some(consumer.clone());
        let pending = self.pending.borrow_mut().take();
        if let Some(value) = pending {
            consumer(&value);
        }
    }

    pub(crate) fn emit(&self, value: T) {
        let consumer = self.consumer.borrow().clone();
        match consumer {
            Some(consumer) => consumer(&value),
            None => *self.pending.borrow_mut() = Some(value),
        }
    }
}

struct Core {
    this: Weak<Core>,
    state: GameState,
    event_loop: EventLoop,
    settings: Observable<Settings>,
    debug: DebugConfig,
    commands: RefCell<CommandTable>,
    /// `None` until the current scene has loaded
    lines: RefCell<Option<Vec<String>>>,
    phase: Cell<Phase>,
    queue: RefCell<VecDeque<Instruction>>,
    active: RefCell<Option<CommandHandler>>,
    /// Bumped on every dispatch; finishes from older instructions are ignored
    generation: Cell<u64>,
    load_version: Cell<u64>,
    load_request: RefCell<Option<LoadRequest>>,
    /// Set by `!s<ms>`, cleared by `!sd`
    speed_override: Cell<Option<Duration>>,
    text: Relay<String>,
    page: Relay<()>,
    ret: Relay<()>,
}

impl Core {
    fn log(&self, category: DebugCategory, level: LogLevel, message: &str) {
        debug::log(&self.debug, category, level, message);
    }

    fn char_delay(&self) -> Duration {
        self.speed_override
            .get()
            .unwrap_or_else(|| self.settings.with(|s| s.text_speed.char_delay()))
    }

    fn emit_text(&self, token: &str) {
        self.text.emit(token.to_string());
    }

    fn emit_page(&self) {
        self.page.emit(());
    }

    fn emit_return(&self) {
        self.ret.emit(());
    }

    /// Drop the running instruction and anything queued after it
    fn interrupt(&self) {
        self.generation.set(self.generation.get() + 1);
        self.queue.borrow_mut().clear();
        let active = self.active.borrow_mut().take();
        if let Some(handler) = active {
            handler.cancel();
        }
    }

    fn on_scene_changed(&self, scene: &str) {
        self.interrupt();
        *self.lines.borrow_mut() = None;
        if scene.is_empty() {
            *self.load_request.borrow_mut() = None;
            self.phase.set(Phase::Idle);
            return;
        }
        let version = self.load_version.get() + 1;
        self.load_version.set(version);
        *self.load_request.borrow_mut() = Some(LoadRequest {
            scene: scene.to_string(),
            version,
        });
        self.phase.set(Phase::Loading);
        self.log(
            DebugCategory::Engine,
            LogLevel::Debug,
            &format!("Loading scene '{scene}' (v{version})"),
        );
    }

    fn on_index_changed(&self, index: usize) {
        if self.phase.get() == Phase::Loading {
            self.log(
                DebugCategory::Engine,
                LogLevel::Trace,
                &format!("Line {index} deferred until the scene has loaded"),
            );
            return;
        }
        self.interrupt();

        let line = {
            let lines = self.lines.borrow();
            match lines.as_ref() {
                None => {
                    log::error!("Cannot execute line {index}: no scene loaded");
                    self.phase.set(Phase::Idle);
                    return;
                }
                Some(lines) if index >= lines.len() => {
                    log::info!("Scene '{}' reached end of file", self.state.scene.get());
                    self.phase.set(Phase::Idle);
                    return;
                }
                Some(lines) => lines[index].clone(),
            }
        };

        self.log(
            DebugCategory::Engine,
            LogLevel::Trace,
            &format!("[{index}] {line}"),
        );
        self.phase.set(Phase::Executing);
        self.queue.borrow_mut().extend(parse_line(&line));
        self.run_next();
    }

    fn run_next(&self) {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(instruction) => self.dispatch(instruction),
            None => {
                // Observers pick up the new index on the next microtask
                let index = self.state.index.get();
                self.state.index.set(index + 1);
            }
        }
    }

    fn dispatch(&self, instruction: Instruction) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        self.phase.set(Phase::Executing);

        let this = self.this.clone();
        let finish = Finish::new(move || {
            if let Some(core) = this.upgrade() {
                core.instruction_finished(generation);
            }
        });

        let lookup = self.commands.borrow().lookup(&instruction.opcode);
        match lookup {
            Lookup::Handler(handler) => {
                match handler(&instruction.argument, &instruction.opcode, finish.clone()) {
                    Completion::Completed => {
                        finish.finish();
                    }
                    // Finished synchronously despite returning a handler
                    Completion::Pending(_) if finish.is_done() => {}
                    Completion::Pending(handler) => {
                        *self.active.borrow_mut() = Some(handler);
                        self.phase.set(Phase::AwaitingCompletion);
                    }
                }
            }
            Lookup::Reserved => {
                finish.finish();
            }
            Lookup::Unknown => {
                log::error!(
                    "Unknown opcode '{}' at {}:{}",
                    instruction.opcode,
                    self.state.scene.get(),
                    self.state.index.get()
                );
                finish.finish();
            }
        }
    }

    fn instruction_finished(&self, generation: u64) {
        if generation != self.generation.get() {
            self.log(
                DebugCategory::Engine,
                LogLevel::Trace,
                &format!("Ignoring stale completion #{generation}"),
            );
            return;
        }
        self.active.borrow_mut().take();
        self.run_next();
    }
}

/// The script interpreter. Cloning yields another handle to the same
/// interpreter.
#[derive(Clone)]
pub struct Interpreter {
    core: Rc<Core>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("phase", &self.core.phase.get())
            .field("scene", &self.core.state.scene.get())
            .field("index", &self.core.state.index.get())
            .finish()
    }
}

impl Interpreter {
    /// Build an interpreter over `state` with the built-in command set
    /// (control flow, text, graphics, audio, variables).
    pub fn new(
        state: &GameState,
        event_loop: &EventLoop,
        settings: &Observable<Settings>,
        debug: DebugConfig,
    ) -> Self {
        let core = Rc::new_cyclic(|this: &Weak<Core>| {
            let mut table = control::commands(this.clone());
            table
                .merge(commands::graphics::commands(state, event_loop))
                .merge(commands::audio::commands(state))
                .merge(commands::variables::commands(state, &debug));
            Core {
                this: this.clone(),
                state: state.clone(),
                event_loop: event_loop.clone(),
                settings: settings.clone(),
                debug,
                commands: RefCell::new(table),
                lines: RefCell::new(None),
                phase: Cell::new(Phase::Idle),
                queue: RefCell::new(VecDeque::new()),
                active: RefCell::new(None),
                generation: Cell::new(0),
                load_version: Cell::new(0),
                load_request: RefCell::new(None),
                speed_override: Cell::new(None),
                text: Relay::default(),
                page: Relay::default(),
                ret: Relay::default(),
            }
        });

        let weak = Rc::downgrade(&core);
        state.scene.observe(move |scene| {
            if let Some(core) = weak.upgrade() {
                core.on_scene_changed(scene);
            }
        });
        let weak = Rc::downgrade(&core);
        state.index.observe(move |&index| {
            if let Some(core) = weak.upgrade() {
                core.on_index_changed(index);
            }
        });

        Self { core }
    }

    /// Add host-provided opcodes.
    ///
    /// # Panics
    /// If an opcode is already registered.
    pub fn register_commands(&self, table: CommandTable) {
        self.core.commands.borrow_mut().merge(table);
    }

    pub fn state(&self) -> &GameState {
        &self.core.state
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.core.event_loop
    }

    pub fn settings(&self) -> &Observable<Settings> {
        &self.core.settings
    }

    pub fn phase(&self) -> Phase {
        self.core.phase.get()
    }

    /// Number of lines in the loaded scene, if one is loaded
    pub fn line_count(&self) -> Option<usize> {
        self.core.lines.borrow().as_ref().map(Vec::len)
    }

    /// Fast-forward the active instruction. No-op when nothing is pending.
    pub fn next(&self) {
        let active = self.core.active.borrow().clone();
        if let Some(handler) = active {
            handler.advance();
        }
    }

    /// Receive each emitted text token
    pub fn set_on_text(&self, callback: impl Fn(&str) + 'static) {
        self.core.text.connect(Rc::new(move |token: &String| callback(token)));
    }

    /// Receive page breaks
    pub fn set_on_page(&self, callback: impl Fn() + 'static) {
        self.core.page.connect(Rc::new(move |_: &()| callback()));
    }

    /// Receive `return`; execution stays suspended until the host moves on
    pub fn set_on_return(&self, callback: impl Fn() + 'static) {
        self.core.ret.connect(Rc::new(move |_: &()| callback()));
    }

    /// Jump to `index` in `scene`, reloading the scene if needed.
    ///
    /// This is the only supported way to move the instruction pointer from
    /// outside the interpreter. Takes effect on the next microtask.
    pub fn goto(&self, scene: &str, index: usize) {
        let core = &self.core;
        core.interrupt();
        let state = &core.state;
        if state.scene.with(|current| current != scene) {
            state.scene.set(scene.to_string());
            state.index.set(index);
            return;
        }
        let loaded = core.lines.borrow().is_some();
        if !loaded && core.phase.get() != Phase::Loading {
            // Same scene, but the previous load failed or never happened
            state.scene.notify_observers();
        }
        state.index.set(index);
        state.index.notify_observers();
    }

    /// Apply a snapshot and resume execution at its line
    pub fn restore(&self, context: &Context, progress: &Progress) {
        let state = &self.core.state;
        state.apply_presentation(context);
        state.apply_progress(progress);
        self.goto(&context.scene, context.index);
    }

    /// Hand the pending scene fetch to the host
    pub fn take_load_request(&self) -> Option<LoadRequest> {
        self.core.load_request.borrow_mut().take()
    }

    /// Deliver the lines for `request`. Returns false if the request was
    /// superseded by a later scene change.
    pub fn complete_load(
        &self,
        request: &LoadRequest,
        result: Result<Vec<String>, SourceError>,
    ) -> bool {
        let core = &self.core;
        if request.version != core.load_version.get() || core.phase.get() != Phase::Loading {
            core.log(
                DebugCategory::Engine,
                LogLevel::Debug,
                &format!("Ignoring stale load of '{}' (v{})", request.scene, request.version),
            );
            return false;
        }
        match result {
            Ok(lines) => {
                core.log(
                    DebugCategory::Engine,
                    LogLevel::Info,
                    &format!("Scene '{}' loaded ({} lines)", request.scene, lines.len()),
                );
                *core.lines.borrow_mut() = Some(lines);
                core.phase.set(Phase::Executing);
                core.state.index.notify_observers();
            }
            Err(err) => {
                log::error!("Failed to load scene '{}': {err}", request.scene);
                core.phase.set(Phase::Idle);
            }
        }
        true
    }
}
