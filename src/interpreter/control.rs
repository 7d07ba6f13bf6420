//! Built-in text and control-flow opcodes

use super::Core;
use super::expr;
use super::line::{PAGE_OPCODE, TEXT_OPCODE, parse_line};
use super::text::TextReveal;
use crate::commands::{CommandHandler, CommandTable, Completion, Finish, parse_millis, wait_for};
use crate::runtime::debug::{DebugCategory, LogLevel};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Register `handler` with an upgraded core; a dropped interpreter
/// completes everything as a no-op
fn register(
    table: &mut CommandTable,
    core: &Weak<Core>,
    opcode: &str,
    handler: impl Fn(&Core, &str, &str, Finish) -> Completion + 'static,
) {
    let core = core.clone();
    table.register(opcode, move |arg: &str, opcode: &str, finish: Finish| {
        match core.upgrade() {
            Some(core) => handler(&core, arg, opcode, finish),
            None => Completion::Completed,
        }
    });
}

fn text(core: &Core, arg: &str, finish: Finish) -> Completion {
    let (on_text, on_page) = (core.this.clone(), core.this.clone());
    TextReveal::start(
        &core.event_loop,
        arg,
        core.char_delay(),
        &core.debug,
        Rc::new(move |token: &str| {
            if let Some(core) = on_text.upgrade() {
                core.emit_text(token);
            }
        }),
        Rc::new(move || {
            if let Some(core) = on_page.upgrade() {
                core.emit_page();
            }
        }),
        finish,
    )
}

/// Page break: notify, then hold until `next()`
fn page_break(core: &Core, finish: Finish) -> Completion {
    core.emit_page();
    Completion::Pending(CommandHandler::new(move || {
        finish.finish();
    }))
}

fn timed_wait(core: &Core, arg: &str, opcode: &str, finish: Finish) -> Completion {
    match parse_millis(arg) {
        Some(ms) => wait_for(&core.event_loop, Duration::from_millis(ms), finish),
        None => {
            log::error!("{opcode}: expected a duration in milliseconds, got '{arg}'");
            Completion::Completed
        }
    }
}

fn branch(core: &Core, arg: &str) -> Completion {
    let (condition, body) = match expr::parse_condition(arg) {
        Ok((condition, body)) => (condition, body.trim()),
        Err(err) => {
            log::error!("if {arg}: {err}");
            return Completion::Completed;
        }
    };
    if body.is_empty() {
        log::warn!("if {arg}: nothing to run");
        return Completion::Completed;
    }
    let state = &core.state;
    match condition.is_true(&|var| state.read_var(var)) {
        Ok(true) => {
            core.log(
                DebugCategory::Flow,
                LogLevel::Debug,
                &format!("if: taken, running '{body}'"),
            );
            let mut queue = core.queue.borrow_mut();
            for instruction in parse_line(body).into_iter().rev() {
                queue.push_front(instruction);
            }
        }
        Ok(false) => core.log(
            DebugCategory::Flow,
            LogLevel::Trace,
            &format!("if: not taken ({arg})"),
        ),
        Err(err) => log::error!("if {arg}: {err}"),
    }
    Completion::Completed
}

fn skip(core: &Core, arg: &str) -> Completion {
    let n: i64 = match arg.trim().parse() {
        Ok(0) | Err(_) => {
            log::error!("skip: expected a non-zero line count, got '{arg}'");
            return Completion::Completed;
        }
        Ok(n) => n,
    };
    let index = core.state.index.get() as i64;
    // The default advance adds the remaining 1
    let target = index.saturating_add(n.saturating_sub(1)).max(0) as usize;
    core.log(
        DebugCategory::Flow,
        LogLevel::Debug,
        &format!("skip {n}: {index} -> {}", target + 1),
    );
    core.state.index.set(target);
    Completion::Completed
}

fn ret(core: &Core) -> Completion {
    core.log(DebugCategory::Flow, LogLevel::Debug, "return");
    core.emit_return();
    Completion::Pending(CommandHandler::new(|| {}))
}

/// Set or clear the per-character delay override
fn text_speed(core: &Core, arg: &str, opcode: &str) -> Completion {
    if opcode == "!sd" {
        core.speed_override.set(None);
        return Completion::Completed;
    }
    match parse_millis(arg) {
        Some(ms) => core.speed_override.set(Some(Duration::from_millis(ms))),
        None => log::error!("{opcode}: expected milliseconds per character, got '{arg}'"),
    }
    Completion::Completed
}

pub(super) fn commands(core: Weak<Core>) -> CommandTable {
    let mut table = CommandTable::new();

    register(&mut table, &core, TEXT_OPCODE, |core, arg, _, finish| {
        text(core, arg, finish)
    });
    register(&mut table, &core, PAGE_OPCODE, |core, _, _, finish| {
        page_break(core, finish)
    });
    register(&mut table, &core, "br", |core, _, _, _| {
        core.emit_text("\n");
        Completion::Completed
    });
    table.register("click", |_: &str, _: &str, finish: Finish| {
        Completion::Pending(CommandHandler::new(move || {
            finish.finish();
        }))
    });
    for opcode in ["wait", "waittimer", "!w", "!d"] {
        register(&mut table, &core, opcode, timed_wait);
    }
    for opcode in ["!s", "!sd"] {
        register(&mut table, &core, opcode, |core, arg, opcode, _| {
            text_speed(core, arg, opcode)
        });
    }
    register(&mut table, &core, "if", |core, arg, _, _| branch(core, arg));
    register(&mut table, &core, "skip", |core, arg, _, _| skip(core, arg));
    register(&mut table, &core, "return", |core, _, _, _| ret(core));

    table.reserve("resettimer").reserve("setwindow");
    table
}

#[cfg(test)]
mod tests {
    use crate::interpreter::{Interpreter, Phase};
    use crate::observe::Observable;
    use crate::runtime::EventLoop;
    use crate::runtime::debug::DebugConfig;
    use crate::types::{GameState, Settings, TextSpeed, Value, VarRef};
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    struct Run {
        el: EventLoop,
        state: GameState,
        interp: Interpreter,
        text: Rc<RefCell<String>>,
        pages: Rc<Cell<u32>>,
        returns: Rc<Cell<u32>>,
    }

    fn run(lines: &[&str], index: usize) -> Run {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let settings = Observable::new(
            &el,
            Settings {
                text_speed: TextSpeed::Instant,
                ..Settings::default()
            },
        );
        let interp = Interpreter::new(&state, &el, &settings, DebugConfig::default());
        let text = Rc::new(RefCell::new(String::new()));
        let pages = Rc::new(Cell::new(0));
        let returns = Rc::new(Cell::new(0));
        let (t, p, r) = (text.clone(), pages.clone(), returns.clone());
        interp.set_on_text(move |token| t.borrow_mut().push_str(token));
        interp.set_on_page(move || p.set(p.get() + 1));
        interp.set_on_return(move || r.set(r.get() + 1));

        interp.goto("test", index);
        el.settle();
        let request = interp.take_load_request().unwrap();
        interp.complete_load(&request, Ok(lines.iter().map(|l| l.to_string()).collect()));
        el.settle();
        Run {
            el,
            state,
            interp,
            text,
            pages,
            returns,
        }
    }

    fn var(state: &GameState, name: &str) -> Value {
        state.read_var(&VarRef::parse(name).unwrap())
    }

    #[test]
    fn text_with_trailing_page_break() {
        let r = run(&["`Hello@World\\", "`Next"], 0);
        assert_eq!(*r.text.borrow(), "Hello");

        r.interp.next();
        r.el.settle();
        assert_eq!(*r.text.borrow(), "HelloWorld");
        assert_eq!(r.pages.get(), 1);
        assert_eq!(r.state.index.get(), 0, "held on the page break");

        r.interp.next();
        r.el.settle();
        assert_eq!(*r.text.borrow(), "HelloWorldNext");
    }

    #[test]
    fn skip_jumps_by_n_lines() {
        let mut lines = vec!["click"; 20];
        lines[10] = "skip 3";
        let r = run(&lines, 10);
        assert_eq!(r.state.index.get(), 13);
        assert_eq!(r.interp.phase(), Phase::AwaitingCompletion);
    }

    #[test]
    fn skip_backwards_and_invalid() {
        let r = run(&["inc %n", "click", "click", "skip -2"], 3);
        assert_eq!(r.state.index.get(), 1);

        let r = run(&["skip 0", "click"], 0);
        assert_eq!(r.state.index.get(), 1);
    }

    #[test]
    fn skip_past_the_start_lands_on_the_second_line() {
        let r = run(&["click", "click", "skip -9223372036854775808"], 2);
        assert_eq!(r.state.index.get(), 1);
        assert_eq!(r.interp.phase(), Phase::AwaitingCompletion);
    }

    #[test]
    fn false_condition_is_a_noop() {
        let r = run(&["if %flg1==1 mov $x,5", "click"], 0);
        assert_eq!(var(&r.state, "$x"), Value::Str(String::new()));
        assert_eq!(r.state.index.get(), 1);
    }

    #[test]
    fn true_condition_runs_rest_of_line() {
        let r = run(&["mov %flg1,1", "if %flg1==1 && %a<1 mov $x,5", "click"], 0);
        assert_eq!(var(&r.state, "$x"), Value::Int(5));
    }

    #[test]
    fn taken_branch_keeps_its_page_break() {
        let r = run(&["if 1==1 `Yes\\", "if 1==0 `No\\", "click"], 0);
        assert_eq!(*r.text.borrow(), "Yes");
        assert_eq!(r.pages.get(), 1);
        r.interp.next();
        r.el.settle();
        assert_eq!(*r.text.borrow(), "Yes");
        assert_eq!(r.pages.get(), 1);
        assert_eq!(r.state.index.get(), 2);
    }

    #[test]
    fn malformed_condition_is_skipped() {
        let r = run(&["if %flg1== mov $x,5", "mov $y,1"], 0);
        assert_eq!(var(&r.state, "$x"), Value::Str(String::new()));
        assert_eq!(var(&r.state, "$y"), Value::Int(1));
    }

    #[test]
    fn return_suspends_advancement() {
        let r = run(&["return", "mov $x,1"], 0);
        assert_eq!(r.returns.get(), 1);
        r.interp.next();
        r.el.settle();
        assert_eq!(r.state.index.get(), 0);
        assert_eq!(var(&r.state, "$x"), Value::Str(String::new()));
    }

    #[test]
    fn timed_wait_completes_or_is_skipped() {
        let r = run(&["wait 500", "!w1000", "mov $x,1"], 0);
        r.el.advance(Duration::from_millis(500));
        assert_eq!(r.state.index.get(), 1);

        r.interp.next();
        r.el.settle();
        assert_eq!(var(&r.state, "$x"), Value::Int(1));
    }

    #[test]
    fn br_and_click() {
        let r = run(&["`a", "br", "click", "`b"], 0);
        assert_eq!(*r.text.borrow(), "a\n");
        r.interp.next();
        r.el.settle();
        assert_eq!(*r.text.borrow(), "a\nb");
    }

    #[test]
    fn speed_override_applies_to_following_text() {
        let r = run(&["!s100", "`ab", "!sd", "`cd"], 0);
        assert_eq!(*r.text.borrow(), "");
        r.el.advance(Duration::from_millis(100));
        assert_eq!(*r.text.borrow(), "a");
        r.el.advance(Duration::from_millis(100));
        assert_eq!(*r.text.borrow(), "abcd");
    }
}
