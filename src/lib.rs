//! # shiori
//!
//! A visual-novel script interpreter. Scenes are plain-text lines of
//! opcodes (text with pause markers, graphics and audio directives,
//! variables, branching); the interpreter executes them one line at a time
//! and publishes everything it changes through observable state cells that
//! a presentation layer subscribes to.
//!
//! ## Quick Start
//!
//! ```rust
//! use shiori::{MemorySceneSource, MemoryStorage, Session, SessionConfig};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = MemorySceneSource::new()
//!     .with_scene("prologue", "bg black\n`Hello@World\\\nreturn");
//! let session = Session::open(source, MemoryStorage::new(), SessionConfig::default()).await?;
//!
//! session.on_text(|token| print!("{token}"));
//! session.state().graphics.background.observe(|bg| println!("[bg {bg}]"));
//!
//! session.start("prologue").await;
//! // Text is revealed over (virtual) time
//! session.advance(Duration::from_secs(1)).await;
//! // Past the `@`, then past the page break
//! session.next().await;
//! session.advance(Duration::from_secs(1)).await;
//! session.next().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Layout
//!
//! - [`observe`]: `Observable<T>` cells with coalesced notifications
//! - [`runtime`]: the cooperative event loop, timers and debug logging
//! - [`types`]: game state and settings
//! - [`commands`]: the opcode table and the graphics, audio and variable handlers
//! - [`interpreter`]: line parsing, dispatch, text reveal and control flow
//! - [`source`]: where scene lines come from
//! - [`save`]: save states, page history and save slots
//! - [`session`]: everything above wired together for a host

pub mod cli;
pub mod commands;
pub mod interpreter;
pub mod observe;
pub mod runtime;
pub mod save;
pub mod session;
pub mod source;
pub mod types;

pub use commands::{CommandHandler, CommandTable, Completion, Finish};
pub use interpreter::{Interpreter, LoadRequest, Phase};
pub use observe::{ObserveOptions, Observable, ObserverId};
pub use runtime::{EventLoop, Timer, TimerState};
pub use save::{
    History, JsonFileStorage, MemoryStorage, Page, PageContent, SaveSlots, SaveState, SaveStorage,
    StorageError,
};
pub use session::{Session, SessionConfig, SessionError};
pub use source::{FileSceneSource, MemorySceneSource, SceneSource, SourceError};
pub use types::{Context, GameState, Progress, Settings, TextSpeed, Value, VarRef};
