//! Session facade
//!
//! Wires the interpreter to a scene source, the page history and the save
//! slots, so a host only has to forward input and drive time.

use crate::interpreter::{Interpreter, Phase, Relay};
use crate::observe::Observable;
use crate::runtime::EventLoop;
use crate::runtime::debug::{self, DebugCategory, DebugConfig, LogLevel};
use crate::save::{
    History, PageContent, QUICK_SAVE_SLOT, SaveSlots, SaveState, SaveStorage, SlotId,
    StorageError,
};
use crate::source::SceneSource;
use crate::types::{GameState, Settings};
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Save slot {0} is empty")]
    EmptySlot(SlotId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub debug: DebugConfig,
}

/// A running game: interpreter, history and saves behind one handle
pub struct Session<T> {
    event_loop: EventLoop,
    state: GameState,
    settings: Observable<Settings>,
    interpreter: Interpreter,
    history: Rc<RefCell<History>>,
    /// Set at page breaks; the next executed line opens a page
    page_pending: Rc<Cell<bool>>,
    slots: SaveSlots<T>,
    source: Box<dyn SceneSource>,
    debug: DebugConfig,
    text: Rc<Relay<String>>,
    page: Rc<Relay<()>>,
    ret: Rc<Relay<()>>,
}

impl<T: SaveStorage> Session<T> {
    /// Open the save storage and build a session with its settings
    pub async fn open(
        source: impl SceneSource + 'static,
        storage: T,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let slots = SaveSlots::open(storage).await?;
        let event_loop = EventLoop::new();
        let state = GameState::new(&event_loop);
        let settings = Observable::new(&event_loop, slots.settings().clone());
        let history = Rc::new(RefCell::new(History::new(settings.with(|s| s.history_limit))));

        // A page starts on the first line executed after a page break. This
        // observer is registered before the interpreter's, so the snapshot
        // is taken before the line runs.
        let page_pending = Rc::new(Cell::new(true));
        {
            let (history, pending, snapshot_state) =
                (history.clone(), page_pending.clone(), state.clone());
            state.index.observe(move |_| {
                if pending.replace(false) {
                    let save_state = SaveState::capture(&snapshot_state);
                    history
                        .borrow_mut()
                        .on_page_break(Some(save_state), PageContent::Text);
                }
            });
        }
        {
            let history = history.clone();
            settings.observe(move |settings| {
                history.borrow_mut().set_limit(settings.history_limit);
            });
        }

        let interpreter = Interpreter::new(&state, &event_loop, &settings, config.debug.clone());
        let (text, page, ret) = (
            Rc::new(Relay::default()),
            Rc::new(Relay::default()),
            Rc::new(Relay::default()),
        );
        {
            let (history, text) = (history.clone(), text.clone());
            interpreter.set_on_text(move |token| {
                history.borrow_mut().append_text(token);
                text.emit(token.to_string());
            });
        }
        {
            let (page, pending) = (page.clone(), page_pending.clone());
            interpreter.set_on_page(move || {
                pending.set(true);
                page.emit(());
            });
        }
        {
            let ret = ret.clone();
            interpreter.set_on_return(move || ret.emit(()));
        }

        Ok(Self {
            event_loop,
            state,
            settings,
            interpreter,
            history,
            page_pending,
            slots,
            source: Box::new(source),
            debug: config.debug,
            text,
            page,
            ret,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn settings(&self) -> &Observable<Settings> {
        &self.settings
    }

    pub fn history(&self) -> Ref<'_, History> {
        self.history.borrow()
    }

    pub fn slots(&self) -> &SaveSlots<T> {
        &self.slots
    }

    pub fn phase(&self) -> Phase {
        self.interpreter.phase()
    }

    /// Nothing left to do: no scene running, no load or timer outstanding
    pub fn is_finished(&self) -> bool {
        self.phase() == Phase::Idle && self.event_loop.is_idle()
    }

    pub fn on_text(&self, callback: impl Fn(&str) + 'static) {
        self.text.connect(Rc::new(move |token: &String| callback(token)));
    }

    pub fn on_page(&self, callback: impl Fn() + 'static) {
        self.page.connect(Rc::new(move |_: &()| callback()));
    }

    pub fn on_return(&self, callback: impl Fn() + 'static) {
        self.ret.connect(Rc::new(move |_: &()| callback()));
    }

    /// Tag the current page (a choice screen, a skipped stretch, ...)
    pub fn set_page_content(&self, content: PageContent) {
        if let Some(page) = self.history.borrow_mut().last_mut() {
            page.content = content;
        }
    }

    /// Start `scene` from its first line and run until input is needed
    pub async fn start(&self, scene: &str) {
        self.page_pending.set(true);
        self.interpreter.goto(scene, 0);
        self.settle().await;
    }

    /// User input: fast-forward the active instruction
    pub async fn next(&self) {
        self.interpreter.next();
        self.settle().await;
    }

    /// Run everything that is due now, fetching scenes as they are requested
    pub async fn settle(&self) {
        loop {
            self.event_loop.settle();
            let Some(request) = self.interpreter.take_load_request() else {
                break;
            };
            let result = self.source.fetch(&request.scene).await;
            self.interpreter.complete_load(&request, result);
        }
    }

    /// Move virtual time forward by `by`
    pub async fn advance(&self, by: Duration) {
        self.settle().await;
        self.event_loop.advance(by);
        self.settle().await;
    }

    /// Time until the next timer fires, if any is pending
    pub fn next_deadline(&self) -> Option<Duration> {
        self.event_loop
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(self.event_loop.now()))
    }

    /// Bring virtual time up to `elapsed` real time since the session
    /// started. Used by hosts driving the session from a wall clock.
    pub async fn sync_clock(&self, elapsed: Duration) {
        let behind = elapsed.saturating_sub(self.event_loop.now());
        self.advance(behind).await;
    }

    /// Snapshot the current state
    pub fn create_save_state(&self) -> SaveState {
        SaveState::capture(&self.state)
    }

    /// Snapshot for a save slot: the start of the current page, so loading
    /// replays the page, with its text as preview
    fn page_save_state(&self) -> SaveState {
        let history = self.history.borrow();
        let page = history.last();
        let save_state = page
            .and_then(|page| page.save_state.clone())
            .unwrap_or_else(|| self.create_save_state());
        match page.map(|page| page.text.trim()).filter(|text| !text.is_empty()) {
            Some(text) => save_state.with_text(text),
            None => save_state,
        }
    }

    pub async fn save_to_slot(&mut self, id: SlotId) -> Result<(), SessionError> {
        let save_state = SaveState {
            date: Some(chrono::Utc::now()),
            ..self.page_save_state()
        };
        self.slots.store(id, save_state).await?;
        debug::log(
            &self.debug,
            DebugCategory::Storage,
            LogLevel::Info,
            &format!("Saved to slot {id}"),
        );
        Ok(())
    }

    pub async fn quick_save(&mut self) -> Result<(), SessionError> {
        self.save_to_slot(QUICK_SAVE_SLOT).await
    }

    pub async fn delete_slot(&mut self, id: SlotId) -> Result<bool, SessionError> {
        Ok(self.slots.delete(id).await?)
    }

    pub async fn load_slot(&self, id: SlotId) -> Result<(), SessionError> {
        let save_state = self.slots.get(id).cloned().ok_or(SessionError::EmptySlot(id))?;
        self.load_save_state(&save_state).await;
        Ok(())
    }

    pub async fn quick_load(&self) -> Result<(), SessionError> {
        self.load_slot(QUICK_SAVE_SLOT).await
    }

    /// Rewind history to `save_state` and resume from it
    pub async fn load_save_state(&self, save_state: &SaveState) {
        self.history.borrow_mut().on_save_state_loaded(save_state);
        debug::log(
            &self.debug,
            DebugCategory::Storage,
            LogLevel::Debug,
            &format!(
                "Restoring {}:{}",
                save_state.context.scene, save_state.context.index
            ),
        );
        // The restored line opens a fresh page
        self.page_pending.set(true);
        self.interpreter
            .restore(&save_state.context, &save_state.progress);
        self.settle().await;
    }

    pub async fn set_settings(&mut self, settings: Settings) -> Result<(), SessionError> {
        self.slots.set_settings(settings.clone()).await?;
        self.settings.set(settings);
        Ok(())
    }

    pub fn export_save_file(
        &self,
        with_settings: bool,
        filter: Option<&[SlotId]>,
    ) -> Result<String, SessionError> {
        Ok(self.slots.export(with_settings, filter)?)
    }

    /// Merge an exported save file; imported settings take effect at once
    pub async fn import_save_file(&mut self, json: &str) -> Result<(), SessionError> {
        self.slots.import(json).await?;
        self.settings.set(self.slots.settings().clone());
        Ok(())
    }
}
