use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::player::SLOT_COUNT;
use crate::{Result, DEFAULT_USER_PLAYERS};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub editor: EditorConfig,
    pub export: ExportConfig,
}

impl AppConfig {
    /// Parses a JSON configuration and resets invalid values to defaults.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(text)?;
        config.validate();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&mut self) {
        self.editor.validate();
    }
}

/// Editor start-up behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Selection of the player count control when the editor opens.
    pub initial_user_players: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            initial_user_players: DEFAULT_USER_PLAYERS,
        }
    }
}

impl EditorConfig {
    fn validate(&mut self) {
        if self.initial_user_players > SLOT_COUNT {
            tracing::warn!(
                initial_user_players = self.initial_user_players,
                default = DEFAULT_USER_PLAYERS,
                "invalid initial_user_players, using default"
            );
            self.initial_user_players = DEFAULT_USER_PLAYERS;
        }
    }
}

/// Where exports go when the caller does not name a destination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub default_path: Option<PathBuf>,
}
