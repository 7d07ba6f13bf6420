//! Persisted player settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text reveal speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSpeed {
    /// Everything up to the next pause point appears at once
    Instant,
    Fast,
    #[default]
    Normal,
    Slow,
}

impl TextSpeed {
    /// Delay between two revealed characters
    pub fn char_delay(self) -> Duration {
        match self {
            TextSpeed::Instant => Duration::ZERO,
            TextSpeed::Fast => Duration::from_millis(10),
            TextSpeed::Normal => Duration::from_millis(30),
            TextSpeed::Slow => Duration::from_millis(60),
        }
    }
}

/// Player settings, stored alongside the save slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub text_speed: TextSpeed,
    /// Number of pages kept in the history
    pub history_limit: usize,
    /// Delay before auto-play advances past a pause point
    pub auto_play_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_speed: TextSpeed::Normal,
            history_limit: 20,
            auto_play_delay_ms: 1500,
        }
    }
}

impl Settings {
    pub fn auto_play_delay(&self) -> Duration {
        Duration::from_millis(self.auto_play_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"textSpeed":"fast"}"#).unwrap();
        assert_eq!(settings.text_speed, TextSpeed::Fast);
        assert_eq!(settings.history_limit, 20);
    }

    #[test]
    fn instant_speed_has_no_delay() {
        assert_eq!(TextSpeed::Instant.char_delay(), Duration::ZERO);
        assert!(TextSpeed::Slow.char_delay() > TextSpeed::Fast.char_delay());
    }
}
