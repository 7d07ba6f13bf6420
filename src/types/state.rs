//! Game state: the live observable cells and their plain serializable mirrors

use crate::observe::Observable;
use crate::runtime::EventLoop;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A script-visible value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
}

impl Value {
    /// Integer view; numeric strings are accepted
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum VariableError {
    #[error("Invalid variable reference '{0}'")]
    InvalidReference(String),
    #[error("Variable '{name}' expects an integer, got '{value}'")]
    NotAnInteger { name: String, value: String },
    #[error("Division by zero while updating '{0}'")]
    DivisionByZero(String),
}

/// A parsed variable reference as written in scripts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VarRef {
    /// `%flg<id>`: a boolean flag, read as 1 or 0
    Flag(String),
    /// `%<name>`: an integer counter, 0 when unset
    Counter(String),
    /// `$<name>`: a temporary string or integer, empty when unset
    Temp(String),
}

impl VarRef {
    pub fn parse(token: &str) -> Result<Self, VariableError> {
        let token = token.trim();
        let invalid = || VariableError::InvalidReference(token.to_string());
        let (sigil, name) = token.split_at_checked(1).ok_or_else(invalid)?;
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(invalid());
        }
        match sigil {
            "%" => match name.strip_prefix("flg") {
                Some(id) if !id.is_empty() => Ok(VarRef::Flag(id.to_string())),
                _ => Ok(VarRef::Counter(name.to_string())),
            },
            "$" => Ok(VarRef::Temp(name.to_string())),
            _ => Err(invalid()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            VarRef::Flag(n) | VarRef::Counter(n) | VarRef::Temp(n) => n,
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarRef::Flag(id) => write!(f, "%flg{id}"),
            VarRef::Counter(n) => write!(f, "%{n}"),
            VarRef::Temp(n) => write!(f, "${n}"),
        }
    }
}

/// Flags, affinity counters and temporaries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub flags: BTreeSet<String>,
    pub counters: BTreeMap<String, i64>,
    pub temporaries: BTreeMap<String, Value>,
}

impl Progress {
    pub fn get(&self, var: &VarRef) -> Value {
        match var {
            VarRef::Flag(id) => Value::Int(i64::from(self.flags.contains(id))),
            VarRef::Counter(name) => Value::Int(self.counters.get(name).copied().unwrap_or(0)),
            VarRef::Temp(name) => self
                .temporaries
                .get(name)
                .cloned()
                .unwrap_or_else(|| Value::Str(String::new())),
        }
    }

    pub fn set(&mut self, var: &VarRef, value: Value) -> Result<(), VariableError> {
        match var {
            VarRef::Flag(id) => {
                if Self::require_int(var, &value)? != 0 {
                    self.flags.insert(id.clone());
                } else {
                    self.flags.remove(id);
                }
            }
            VarRef::Counter(name) => {
                let n = Self::require_int(var, &value)?;
                self.counters.insert(name.clone(), n);
            }
            VarRef::Temp(name) => {
                self.temporaries.insert(name.clone(), value);
            }
        }
        Ok(())
    }

    fn require_int(var: &VarRef, value: &Value) -> Result<i64, VariableError> {
        value.as_int().ok_or_else(|| VariableError::NotAnInteger {
            name: var.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioContext {
    pub track: String,
    pub looped_effect: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsContext {
    pub background: String,
    pub left: String,
    pub center: String,
    pub right: String,
}

/// Plain copy of everything but the variables
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Context {
    pub scene: String,
    pub index: usize,
    pub audio: AudioContext,
    pub graphics: GraphicsContext,
}

/// Sprite slot addressed by `ld` and `cl`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpritePos {
    Left,
    Center,
    Right,
}

impl SpritePos {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "l" => Some(SpritePos::Left),
            "c" => Some(SpritePos::Center),
            "r" => Some(SpritePos::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioCells {
    pub track: Observable<String>,
    pub looped_effect: Observable<String>,
}

#[derive(Debug, Clone)]
pub struct GraphicsCells {
    pub background: Observable<String>,
    pub left: Observable<String>,
    pub center: Observable<String>,
    pub right: Observable<String>,
}

impl GraphicsCells {
    pub fn sprite(&self, pos: SpritePos) -> &Observable<String> {
        match pos {
            SpritePos::Left => &self.left,
            SpritePos::Center => &self.center,
            SpritePos::Right => &self.right,
        }
    }

    pub fn sprites(&self) -> [&Observable<String>; 3] {
        [&self.left, &self.center, &self.right]
    }
}

/// The live, observable game state.
///
/// `scene` and `index` are driven by the interpreter; presentation code
/// should only observe them.
#[derive(Debug, Clone)]
pub struct GameState {
    pub scene: Observable<String>,
    pub index: Observable<usize>,
    pub audio: AudioCells,
    pub graphics: GraphicsCells,
    pub variables: Observable<Progress>,
    /// One-shot sound effects; not part of saves
    pub sound_effect: Observable<Option<String>>,
}

impl GameState {
    pub fn new(event_loop: &EventLoop) -> Self {
        let text = || Observable::new(event_loop, String::new());
        Self {
            scene: text(),
            index: Observable::new(event_loop, 0),
            audio: AudioCells {
                track: text(),
                looped_effect: text(),
            },
            graphics: GraphicsCells {
                background: text(),
                left: text(),
                center: text(),
                right: text(),
            },
            variables: Observable::new(event_loop, Progress::default()),
            sound_effect: Observable::new(event_loop, None),
        }
    }

    pub fn context(&self) -> Context {
        Context {
            scene: self.scene.get(),
            index: self.index.get(),
            audio: AudioContext {
                track: self.audio.track.get(),
                looped_effect: self.audio.looped_effect.get(),
            },
            graphics: GraphicsContext {
                background: self.graphics.background.get(),
                left: self.graphics.left.get(),
                center: self.graphics.center.get(),
                right: self.graphics.right.get(),
            },
        }
    }

    pub fn progress(&self) -> Progress {
        self.variables.get()
    }

    /// Apply audio and graphics from a snapshot. Scene and index are left
    /// to the interpreter's reload path.
    pub fn apply_presentation(&self, context: &Context) {
        self.audio.track.set(context.audio.track.clone());
        self.audio.looped_effect.set(context.audio.looped_effect.clone());
        self.graphics.background.set(context.graphics.background.clone());
        self.graphics.left.set(context.graphics.left.clone());
        self.graphics.center.set(context.graphics.center.clone());
        self.graphics.right.set(context.graphics.right.clone());
    }

    pub fn apply_progress(&self, progress: &Progress) {
        self.variables.set(progress.clone());
    }

    pub fn read_var(&self, var: &VarRef) -> Value {
        self.variables.with(|p| p.get(var))
    }

    pub fn write_var(&self, var: &VarRef, value: Value) -> Result<(), VariableError> {
        self.variables.update(|p| p.set(var, value))
    }

    /// Fire a one-shot sound effect, even if it is the same as the last one
    pub fn play_effect(&self, name: &str) {
        self.sound_effect.set(Some(name.to_string()));
        self.sound_effect.notify_observers();
    }
}
