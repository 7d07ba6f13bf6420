//! Music and sound-effect opcodes
//!
//! Handlers only record what should be playing; loading and mixing are up
//! to the presentation layer observing the audio cells.

use super::{CommandTable, Completion, Finish, split_args};
use crate::types::GameState;

fn name_of(arg: &str) -> Option<String> {
    split_args(arg).into_iter().next().filter(|s| !s.is_empty())
}

pub fn commands(state: &GameState) -> CommandTable {
    let mut table = CommandTable::new();

    for opcode in ["play", "mp3loop"] {
        let st = state.clone();
        table.register(opcode, move |arg: &str, opcode: &str, _: Finish| {
            match name_of(arg) {
                Some(track) => st.audio.track.set(track),
                None => log::error!("{opcode}: missing track name"),
            }
            Completion::Completed
        });
    }

    let st = state.clone();
    table.register("playstop", move |_: &str, _: &str, _: Finish| {
        st.audio.track.set(String::new());
        Completion::Completed
    });

    let st = state.clone();
    table.register("wave", move |arg: &str, _: &str, _: Finish| {
        match name_of(arg) {
            Some(effect) => st.play_effect(&effect),
            None => log::error!("wave: missing sound name"),
        }
        Completion::Completed
    });

    let st = state.clone();
    table.register("waveloop", move |arg: &str, _: &str, _: Finish| {
        match name_of(arg) {
            Some(effect) => st.audio.looped_effect.set(effect),
            None => log::error!("waveloop: missing sound name"),
        }
        Completion::Completed
    });

    let st = state.clone();
    table.register("wavestop", move |_: &str, _: &str, _: Finish| {
        st.audio.looped_effect.set(String::new());
        Completion::Completed
    });

    table
}
