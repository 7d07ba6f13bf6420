//! Background and sprite opcodes
//!
//! - `bg <image>[,<effect>[,<ms>]]` replaces the background and clears all sprites
//! - `ld <l|c|r>,<image>[,<effect>[,<ms>]]` shows a sprite
//! - `cl <l|c|r|a>[,<effect>[,<ms>]]` clears one sprite or all of them
//!
//! A positive duration keeps the instruction pending while the presentation
//! layer animates the change; `next()` skips the wait.

use super::{CommandTable, Completion, Finish, parse_millis, split_args, wait_for};
use crate::runtime::EventLoop;
use crate::types::{GameState, SpritePos};
use std::time::Duration;

fn transition_time(args: &[String], at: usize) -> Duration {
    args.get(at)
        .and_then(|ms| parse_millis(ms))
        .map(Duration::from_millis)
        .unwrap_or_default()
}

pub fn commands(state: &GameState, event_loop: &EventLoop) -> CommandTable {
    let mut table = CommandTable::new();

    let (st, el) = (state.clone(), event_loop.clone());
    table.register("bg", move |arg: &str, _: &str, finish: Finish| {
        let args = split_args(arg);
        let Some(image) = args.first().filter(|s| !s.is_empty()) else {
            log::error!("bg: missing image in '{arg}'");
            return Completion::Completed;
        };
        st.graphics.background.set(image.clone());
        for sprite in st.graphics.sprites() {
            sprite.set(String::new());
        }
        wait_for(&el, transition_time(&args, 2), finish)
    });

    let (st, el) = (state.clone(), event_loop.clone());
    table.register("ld", move |arg: &str, _: &str, finish: Finish| {
        let args = split_args(arg);
        let pos = args.first().and_then(|p| SpritePos::parse(p));
        let image = args.get(1).filter(|s| !s.is_empty());
        let (Some(pos), Some(image)) = (pos, image) else {
            log::error!("ld: expected '<l|c|r>,<image>', got '{arg}'");
            return Completion::Completed;
        };
        st.graphics.sprite(pos).set(image.clone());
        wait_for(&el, transition_time(&args, 3), finish)
    });

    let (st, el) = (state.clone(), event_loop.clone());
    table.register("cl", move |arg: &str, _: &str, finish: Finish| {
        let args = split_args(arg);
        let targets = match args.first().map(String::as_str) {
            Some("a") => vec![SpritePos::Left, SpritePos::Center, SpritePos::Right],
            Some(p) => SpritePos::parse(p).into_iter().collect(),
            None => Vec::new(),
        };
        if targets.is_empty() {
            log::error!("cl: expected '<l|c|r|a>', got '{arg}'");
            return Completion::Completed;
        }
        for pos in targets {
            st.graphics.sprite(pos).set(String::new());
        }
        wait_for(&el, transition_time(&args, 2), finish)
    });

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Lookup;

    fn run(table: &CommandTable, opcode: &str, arg: &str) -> Completion {
        match table.lookup(opcode) {
            Lookup::Handler(handler) => handler(arg, opcode, Finish::noop()),
            _ => panic!("{opcode} not registered"),
        }
    }

    #[test]
    fn bg_replaces_background_and_clears_sprites() {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let table = commands(&state, &el);
        state.graphics.left.set("ark".into());

        assert!(matches!(run(&table, "bg", r#""bg/park""#), Completion::Completed));
        assert_eq!(state.graphics.background.get(), "bg/park");
        assert_eq!(state.graphics.left.get(), "");
    }

    #[test]
    fn ld_and_cl_address_slots() {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let table = commands(&state, &el);

        run(&table, "ld", "c,ciel");
        run(&table, "ld", "r,akiha");
        assert_eq!(state.graphics.center.get(), "ciel");
        run(&table, "cl", "c");
        assert_eq!(state.graphics.center.get(), "");
        assert_eq!(state.graphics.right.get(), "akiha");
        run(&table, "cl", "a");
        assert_eq!(state.graphics.right.get(), "");
    }

    #[test]
    fn transition_duration_makes_command_pending() {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let table = commands(&state, &el);

        let completion = run(&table, "ld", "l,ark,%1,300");
        assert!(matches!(completion, Completion::Pending(_)));
        assert_eq!(state.graphics.left.get(), "ark");
    }

    #[test]
    fn malformed_arguments_leave_state_alone() {
        let el = EventLoop::new();
        let state = GameState::new(&el);
        let table = commands(&state, &el);

        run(&table, "ld", "x,ark");
        run(&table, "bg", "");
        assert_eq!(state.context().graphics, crate::types::GraphicsContext::default());
    }
}
