//! Driving the interpreter directly, with the host doing the scene fetches

use shiori::runtime::debug::DebugConfig;
use shiori::{
    CommandHandler, CommandTable, Completion, EventLoop, Finish, GameState, Interpreter,
    Observable, Phase, Settings, SourceError, TextSpeed,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

struct Host {
    event_loop: EventLoop,
    state: GameState,
    interpreter: Interpreter,
    scenes: HashMap<&'static str, &'static str>,
}

impl Host {
    fn new(scenes: &[(&'static str, &'static str)]) -> Self {
        let event_loop = EventLoop::new();
        let state = GameState::new(&event_loop);
        let settings = Observable::new(
            &event_loop,
            Settings {
                text_speed: TextSpeed::Instant,
                ..Settings::default()
            },
        );
        let interpreter = Interpreter::new(&state, &event_loop, &settings, DebugConfig::default());
        Self {
            event_loop,
            state,
            interpreter,
            scenes: scenes.iter().copied().collect(),
        }
    }

    /// Run microtasks and serve load requests until nothing is left to do
    fn settle(&self) {
        loop {
            self.event_loop.settle();
            let Some(request) = self.interpreter.take_load_request() else {
                break;
            };
            let result = match self.scenes.get(request.scene.as_str()) {
                Some(text) => Ok(text.lines().map(str::to_string).collect()),
                None => Err(SourceError::NotFound(request.scene.clone())),
            };
            self.interpreter.complete_load(&request, result);
        }
    }
}

#[test]
fn presentation_cells_follow_the_script() {
    let host = Host::new(&[("a", "bg park\nld l,arc\nplay bgm1\nwaveloop rain\n`hi@")]);
    let backgrounds = Rc::new(RefCell::new(Vec::new()));
    let sink = backgrounds.clone();
    host.state
        .graphics
        .background
        .observe(move |bg| sink.borrow_mut().push(bg.clone()));

    host.interpreter.goto("a", 0);
    host.settle();

    assert_eq!(*backgrounds.borrow(), vec!["park".to_string()]);
    assert_eq!(host.state.graphics.left.get(), "arc");
    assert_eq!(host.state.audio.track.get(), "bgm1");
    assert_eq!(host.state.audio.looped_effect.get(), "rain");
    assert_eq!(host.interpreter.phase(), Phase::AwaitingCompletion);
}

#[test]
fn host_commands_can_hold_execution() {
    let host = Host::new(&[("a", "choose left,right\nmov %after,1")]);
    let pending: Rc<RefCell<Option<Finish>>> = Rc::new(RefCell::new(None));
    let slot = pending.clone();
    let mut table = CommandTable::new();
    table.register("choose", move |_: &str, _: &str, finish: Finish| {
        *slot.borrow_mut() = Some(finish);
        Completion::Pending(CommandHandler::new(|| {}))
    });
    host.interpreter.register_commands(table);

    host.interpreter.goto("a", 0);
    host.settle();
    assert_eq!(host.state.index.get(), 0);

    // next() on a handler that ignores it changes nothing
    host.interpreter.next();
    host.settle();
    assert_eq!(host.state.index.get(), 0);

    let finish = pending.borrow_mut().take().unwrap();
    finish.finish();
    host.settle();
    assert_eq!(host.interpreter.phase(), Phase::Idle);
    assert_eq!(
        host.state
            .read_var(&shiori::VarRef::Counter("after".into())),
        shiori::Value::Int(1)
    );
}

#[test]
fn switching_scenes_mid_line_discards_the_old_handler() {
    let host = Host::new(&[("a", "`first@\n`unreachable"), ("b", "`second@")]);
    let text = Rc::new(RefCell::new(String::new()));
    let sink = text.clone();
    host.interpreter
        .set_on_text(move |token| sink.borrow_mut().push_str(token));

    host.interpreter.goto("a", 0);
    host.settle();
    assert_eq!(*text.borrow(), "first");

    host.interpreter.goto("b", 0);
    host.settle();
    assert_eq!(*text.borrow(), "firstsecond");
    assert_eq!(host.state.scene.get(), "b");
    assert_eq!(host.interpreter.line_count(), Some(1));
}

#[test]
fn unknown_scene_leaves_the_interpreter_idle() {
    let host = Host::new(&[]);
    host.interpreter.goto("missing", 0);
    host.settle();
    assert_eq!(host.interpreter.phase(), Phase::Idle);
    assert_eq!(host.interpreter.line_count(), None);
    assert!(host.event_loop.is_idle());
}
