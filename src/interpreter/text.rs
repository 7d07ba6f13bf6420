//! Character-by-character text reveal
//!
//! The text is a run of characters broken by pause points:
//!
//! - `@` waits for `next()`
//! - a newline emits a line break, then waits for `next()`
//! - `\` fires the page-break hook, then ends the instruction on `next()`;
//!   anything after it is dropped
//! - `!w<ms>` / `!d<ms>` pause for a fixed time (`next()` cuts it short)
//!
//! With a zero character delay each stretch between pause points is emitted
//! as one token; otherwise a repeating timer emits one character per tick
//! and `next()` jumps to the end of the current stretch.

use crate::commands::{CommandHandler, Completion, Finish};
use crate::runtime::debug::{self, DebugCategory, DebugConfig, LogLevel};
use crate::runtime::{EventLoop, Timer};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RevealState {
    Running,
    /// Timer-driven reveal between pause points
    Ticking,
    AwaitingInput,
    /// Page break shown; `next()` finishes
    PageEnd,
    /// Inline timed pause
    Waiting,
    Done,
}

enum Step {
    Emit(String),
    Pause,
    LineBreak,
    PageBreak,
    InlineWait(Duration),
    StartTicking,
    End,
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    delay: Duration,
    state: RevealState,
    timer: Option<Timer>,
}

/// Length and duration of an inline timer (`!w500`) starting at `at`
fn inline_timer_at(chars: &[char], at: usize) -> Option<(usize, Duration)> {
    if chars.get(at) != Some(&'!') || !matches!(chars.get(at + 1), Some('w' | 'd')) {
        return None;
    }
    let digits: String = chars[at + 2..]
        .iter()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let ms = digits.parse().ok()?;
    Some((2 + digits.len(), Duration::from_millis(ms)))
}

fn is_pause_point(chars: &[char], at: usize) -> bool {
    matches!(chars[at], '@' | '\n' | '\\') || inline_timer_at(chars, at).is_some()
}

impl Cursor {
    fn stretch_end(&self) -> usize {
        (self.pos..self.chars.len())
            .find(|&i| is_pause_point(&self.chars, i))
            .unwrap_or(self.chars.len())
    }

    fn take_stretch(&mut self) -> String {
        let end = self.stretch_end();
        let stretch = self.chars[self.pos..end].iter().collect();
        self.pos = end;
        stretch
    }

    fn step(&mut self) -> Step {
        let Some(&c) = self.chars.get(self.pos) else {
            return Step::End;
        };
        if let Some((len, wait)) = inline_timer_at(&self.chars, self.pos) {
            self.pos += len;
            return Step::InlineWait(wait);
        }
        match c {
            '@' => {
                self.pos += 1;
                Step::Pause
            }
            '\n' => {
                self.pos += 1;
                Step::LineBreak
            }
            '\\' => {
                self.pos += 1;
                Step::PageBreak
            }
            _ if self.delay.is_zero() => Step::Emit(self.take_stretch()),
            _ => Step::StartTicking,
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

pub(super) struct TextReveal {
    this: Weak<TextReveal>,
    cursor: RefCell<Cursor>,
    event_loop: EventLoop,
    debug: DebugConfig,
    emit: Rc<dyn Fn(&str)>,
    page: Rc<dyn Fn()>,
    finish: Finish,
}

impl TextReveal {
    /// Begin revealing `text`. `emit` receives each token, `page` is the
    /// page-break hook.
    pub(super) fn start(
        event_loop: &EventLoop,
        text: &str,
        delay: Duration,
        debug: &DebugConfig,
        emit: Rc<dyn Fn(&str)>,
        page: Rc<dyn Fn()>,
        finish: Finish,
    ) -> Completion {
        let reveal = Rc::new_cyclic(|this| TextReveal {
            this: this.clone(),
            cursor: RefCell::new(Cursor {
                chars: text.chars().collect(),
                pos: 0,
                delay,
                state: RevealState::Running,
                timer: None,
            }),
            event_loop: event_loop.clone(),
            debug: debug.clone(),
            emit,
            page,
            finish,
        });
        reveal.run();
        if reveal.finish.is_done() {
            return Completion::Completed;
        }
        let (next, cancel) = (reveal.clone(), reveal);
        Completion::Pending(
            CommandHandler::new(move || next.next()).with_cancel(move || cancel.cancel()),
        )
    }

    fn trace(&self, message: &str) {
        debug::log(&self.debug, DebugCategory::Text, LogLevel::Trace, message);
    }

    fn state(&self) -> RevealState {
        self.cursor.borrow().state
    }

    fn set_state(&self, state: RevealState) {
        self.cursor.borrow_mut().state = state;
    }

    /// Process the text from the cursor until something has to wait
    fn run(&self) {
        self.set_state(RevealState::Running);
        loop {
            let step = self.cursor.borrow_mut().step();
            match step {
                Step::Emit(stretch) => {
                    if !stretch.is_empty() {
                        (self.emit)(&stretch);
                    }
                    if self.state() != RevealState::Running {
                        return;
                    }
                }
                Step::Pause => {
                    self.trace("pause: waiting for input");
                    self.set_state(RevealState::AwaitingInput);
                    return;
                }
                Step::LineBreak => {
                    self.trace("line break: waiting for input");
                    self.set_state(RevealState::AwaitingInput);
                    (self.emit)("\n");
                    return;
                }
                Step::PageBreak => {
                    self.trace("page break");
                    self.set_state(RevealState::PageEnd);
                    (self.page)();
                    return;
                }
                Step::InlineWait(wait) => {
                    self.trace(&format!("inline wait {}ms", wait.as_millis()));
                    let this = self.this.clone();
                    let timer = Timer::new(&self.event_loop, wait, move || {
                        if let Some(reveal) = this.upgrade()
                            && reveal.state() == RevealState::Waiting
                        {
                            reveal.run();
                        }
                    });
                    self.start_timer(RevealState::Waiting, timer);
                    return;
                }
                Step::StartTicking => {
                    let this = self.this.clone();
                    let delay = self.cursor.borrow().delay;
                    let timer = Timer::repeating(&self.event_loop, delay, move || {
                        if let Some(reveal) = this.upgrade() {
                            reveal.tick();
                        }
                    });
                    self.start_timer(RevealState::Ticking, timer);
                    return;
                }
                Step::End => {
                    self.trace("text finished");
                    self.set_state(RevealState::Done);
                    self.finish.finish();
                    return;
                }
            }
        }
    }

    fn start_timer(&self, state: RevealState, timer: Timer) {
        {
            let mut cursor = self.cursor.borrow_mut();
            cursor.state = state;
            cursor.timer = Some(timer.clone());
        }
        timer.start();
    }

    /// Emit one character; hand over to `run` at a pause point
    fn tick(&self) {
        let next_char = {
            let mut cursor = self.cursor.borrow_mut();
            if cursor.state != RevealState::Ticking {
                return;
            }
            let pos = cursor.pos;
            if pos < cursor.chars.len() && !is_pause_point(&cursor.chars, pos) {
                cursor.pos += 1;
                Some(cursor.chars[pos])
            } else {
                None
            }
        };
        if let Some(c) = next_char {
            (self.emit)(c.encode_utf8(&mut [0; 4]));
        }
        let at_boundary = {
            let cursor = self.cursor.borrow();
            cursor.state == RevealState::Ticking
                && (cursor.pos >= cursor.chars.len() || is_pause_point(&cursor.chars, cursor.pos))
        };
        if at_boundary {
            self.cursor.borrow_mut().stop_timer();
            self.run();
        }
    }

    fn next(&self) {
        match self.state() {
            RevealState::Ticking => {
                let rest = {
                    let mut cursor = self.cursor.borrow_mut();
                    cursor.stop_timer();
                    cursor.state = RevealState::Running;
                    cursor.take_stretch()
                };
                if !rest.is_empty() {
                    (self.emit)(&rest);
                }
                self.run();
            }
            RevealState::AwaitingInput => self.run(),
            RevealState::PageEnd => {
                self.set_state(RevealState::Done);
                self.finish.finish();
            }
            RevealState::Waiting => {
                let timer = self.cursor.borrow().timer.clone();
                if let Some(timer) = timer {
                    timer.skip();
                }
            }
            RevealState::Running | RevealState::Done => {}
        }
    }

    fn cancel(&self) {
        let mut cursor = self.cursor.borrow_mut();
        cursor.stop_timer();
        cursor.state = RevealState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Harness {
        el: EventLoop,
        tokens: Rc<RefCell<Vec<String>>>,
        pages: Rc<Cell<u32>>,
        done: Rc<Cell<bool>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                el: EventLoop::new(),
                tokens: Rc::new(RefCell::new(Vec::new())),
                pages: Rc::new(Cell::new(0)),
                done: Rc::new(Cell::new(false)),
            }
        }

        fn start(&self, text: &str, delay: Duration) -> Completion {
            let tokens = self.tokens.clone();
            let pages = self.pages.clone();
            let done = self.done.clone();
            TextReveal::start(
                &self.el,
                text,
                delay,
                &DebugConfig::verbose(),
                Rc::new(move |t: &str| tokens.borrow_mut().push(t.to_string())),
                Rc::new(move || pages.set(pages.get() + 1)),
                Finish::new(move || done.set(true)),
            )
        }

        fn text(&self) -> String {
            self.tokens.borrow().concat()
        }
    }

    fn pending(completion: Completion) -> CommandHandler {
        match completion {
            Completion::Pending(handler) => handler,
            Completion::Completed => panic!("expected pending reveal"),
        }
    }

    #[test]
    fn instant_reveal_stops_at_pause_points() {
        let h = Harness::new();
        let handler = pending(h.start("Hello@World", Duration::ZERO));
        assert_eq!(*h.tokens.borrow(), vec!["Hello"]);
        assert!(!h.done.get());

        handler.advance();
        assert_eq!(*h.tokens.borrow(), vec!["Hello", "World"]);
        assert!(h.done.get());

        handler.advance();
        assert_eq!(h.tokens.borrow().len(), 2);
    }

    #[test]
    fn plain_text_completes_synchronously() {
        let h = Harness::new();
        assert!(matches!(h.start("Done.", Duration::ZERO), Completion::Completed));
        assert_eq!(h.text(), "Done.");
    }

    #[test]
    fn page_break_fires_hook_then_waits() {
        let h = Harness::new();
        let handler = pending(h.start("End\\ignored", Duration::ZERO));
        assert_eq!(h.text(), "End");
        assert_eq!(h.pages.get(), 1);
        assert!(!h.done.get());

        handler.advance();
        assert!(h.done.get());
        assert_eq!(h.text(), "End");
    }

    #[test]
    fn newline_emits_break_and_waits() {
        let h = Harness::new();
        let handler = pending(h.start("one\ntwo", Duration::ZERO));
        assert_eq!(*h.tokens.borrow(), vec!["one", "\n"]);
        handler.advance();
        assert_eq!(h.text(), "one\ntwo");
    }

    #[test]
    fn timed_reveal_emits_per_character_and_next_jumps_ahead() {
        let h = Harness::new();
        let handler = pending(h.start("abcd@ef", Duration::from_millis(10)));
        assert!(h.tokens.borrow().is_empty());

        h.el.advance(Duration::from_millis(20));
        assert_eq!(*h.tokens.borrow(), vec!["a", "b"]);

        handler.advance();
        assert_eq!(h.text(), "abcd");
        h.el.advance(Duration::from_millis(100));
        assert_eq!(h.text(), "abcd", "must hold at @ until next()");

        handler.advance();
        h.el.advance(Duration::from_millis(20));
        assert_eq!(h.text(), "abcdef");
        assert!(h.done.get());
    }

    #[test]
    fn inline_timer_pauses_then_resumes() {
        let h = Harness::new();
        let handler = pending(h.start("wait!w500done", Duration::ZERO));
        assert_eq!(h.text(), "wait");

        h.el.advance(Duration::from_millis(499));
        assert_eq!(h.text(), "wait");
        h.el.advance(Duration::from_millis(1));
        assert_eq!(h.text(), "waitdone");
        assert!(h.done.get());
        drop(handler);
    }

    #[test]
    fn next_skips_inline_timer_on_following_turn() {
        let h = Harness::new();
        let handler = pending(h.start("a!d9000b", Duration::ZERO));
        handler.advance();
        assert_eq!(h.text(), "a");
        h.el.settle();
        assert_eq!(h.text(), "ab");
    }

    #[test]
    fn cancel_stops_everything() {
        let h = Harness::new();
        let handler = pending(h.start("abc", Duration::from_millis(5)));
        handler.cancel();
        h.el.advance(Duration::from_millis(100));
        assert!(h.tokens.borrow().is_empty());
        assert!(!h.done.get());
    }
}
