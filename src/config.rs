use crate::db::{Database, StoreError};
use crate::llm::gemini::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use std::path::PathBuf;
use std::time::Duration;

pub const API_KEY_SETTING: &str = "gemini_api_key";
pub const BASE_URL_SETTING: &str = "gemini_base_url";
pub const MODEL_SETTING: &str = "gemini_model";
pub const TURN_TIMEOUT_SETTING: &str = "turn_timeout_secs";

/// Environment variables consulted, in order, when no API key is stored.
const API_KEY_ENV: &[&str] = &["GEMINI_API_KEY", "API_KEY"];
const DATA_DIR_ENV: &str = "STUDY_PAL_DIR";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    /// Upper bound on one assistant turn. `None` waits indefinitely.
    pub turn_timeout: Option<Duration>,
}

impl AppConfig {
    pub fn resolve(db: &Database) -> Result<Self, StoreError> {
        Self::resolve_with(db, |name| std::env::var(name).ok())
    }

    fn resolve_with(
        db: &Database,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, StoreError> {
        let api_key = match db.get_setting(API_KEY_SETTING)? {
            Some(key) => key,
            None => API_KEY_ENV
                .iter()
                .find_map(|name| env(name).filter(|v| !v.is_empty()))
                .unwrap_or_default(),
        };
        let base_url = db
            .get_setting(BASE_URL_SETTING)?
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = db
            .get_setting(MODEL_SETTING)?
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let turn_timeout = match db.get_setting(TURN_TIMEOUT_SETTING)? {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "ignoring invalid turn timeout");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            gemini: GeminiConfig {
                api_key,
                base_url,
                model,
            },
            turn_timeout,
        })
    }
}

/// `$STUDY_PAL_DIR`, else the platform data directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("study-pal")
}
