//! Process configuration from environment variables

use crate::runtime::ControllerOptions;
use crate::session::Settings;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_LMSTUDIO_BASE_URL: &str = "http://127.0.0.1:1234/v1";
pub const DEFAULT_LMSTUDIO_API_KEY: &str = "lm-studio";
pub const DEFAULT_TTS_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_PLAYER: &str = "aplay -q";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    pub lmstudio_base_url: String,
    pub lmstudio_api_key: String,
    /// Pins the model and disables discovery
    pub pinned_model: Option<String>,
    pub tts_base_url: String,
    pub preferred_voice: String,
    pub player_command: String,
    /// Initial auto-play setting. Only seeds a brand-new session; once a
    /// session is persisted its own setting wins and is changed through
    /// the settings endpoint.
    pub auto_play: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = var("TALKBACK_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".talkback").join("session.db")
            },
            PathBuf::from,
        );

        let port = match var("TALKBACK_PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Ignoring invalid TALKBACK_PORT");
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };

        Self {
            db_path,
            port,
            lmstudio_base_url: var("LMSTUDIO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LMSTUDIO_BASE_URL.to_string()),
            lmstudio_api_key: var("LMSTUDIO_API_KEY")
                .unwrap_or_else(|| DEFAULT_LMSTUDIO_API_KEY.to_string()),
            pinned_model: var("LMSTUDIO_MODEL_NAME"),
            tts_base_url: var("TTS_BASE_URL").unwrap_or_else(|| DEFAULT_TTS_BASE_URL.to_string()),
            preferred_voice: var("KOKORO_VOICE")
                .unwrap_or_else(|| crate::runtime::FALLBACK_VOICE.to_string()),
            player_command: var("TALKBACK_PLAYER").unwrap_or_else(|| DEFAULT_PLAYER.to_string()),
            auto_play: var("TALKBACK_AUTO_PLAY")
                .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
        }
    }

    /// Settings for a brand new session. Ignored when a session is already stored.
    pub fn default_settings(&self) -> Settings {
        Settings {
            auto_play: self.auto_play,
            ..Settings::default()
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            preferred_voice: self.preferred_voice.clone(),
            pinned_model: self.pinned_model.clone(),
            ..ControllerOptions::default()
        }
    }
}
