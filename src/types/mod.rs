//! Core data types
//!
//! - State: the observable game state and its serializable mirrors
//! - Settings: persisted player preferences

pub mod settings;
pub mod state;

pub use settings::{Settings, TextSpeed};
pub use state::{
    AudioContext, Context, GameState, GraphicsContext, Progress, SpritePos, Value, VarRef,
    VariableError,
};
