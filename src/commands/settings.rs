use super::AppError;
use crate::config::{API_KEY_SETTING, BASE_URL_SETTING, MODEL_SETTING, TURN_TIMEOUT_SETTING};
use crate::AppState;
use std::collections::BTreeMap;

const SETTING_KEYS: &[&str] = &[
    API_KEY_SETTING,
    BASE_URL_SETTING,
    MODEL_SETTING,
    TURN_TIMEOUT_SETTING,
];

pub fn get_settings(state: &AppState) -> Result<BTreeMap<String, String>, AppError> {
    let mut map = BTreeMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = state.db.get_setting(key)? {
            // Mask API keys for display
            let shown = if key.ends_with("_api_key") {
                mask(&value)
            } else {
                value
            };
            map.insert(key.to_string(), shown);
        }
    }
    Ok(map)
}

pub fn set_setting(state: &AppState, key: &str, value: &str) -> Result<(), AppError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(AppError::Settings(format!("Unknown setting key: {}", key)));
    }
    if key == TURN_TIMEOUT_SETTING && value.trim().parse::<u64>().is_err() {
        return Err(AppError::Settings(format!(
            "{} must be a whole number of seconds",
            key
        )));
    }
    state.db.set_setting(key, value.trim())?;
    tracing::info!(key, "setting updated");
    Ok(())
}

pub fn delete_setting(state: &AppState, key: &str) -> Result<(), AppError> {
    state.db.delete_setting(key)?;
    Ok(())
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_keys_are_masked() {
        let state = AppState::in_memory().unwrap();
        set_setting(&state, API_KEY_SETTING, "AIzaSyExample1234").unwrap();
        set_setting(&state, MODEL_SETTING, "gemini-2.5-pro").unwrap();

        let settings = get_settings(&state).unwrap();
        assert_eq!(settings[API_KEY_SETTING], "AIza...1234");
        assert_eq!(settings[MODEL_SETTING], "gemini-2.5-pro");
    }

    #[test]
    fn short_keys_are_fully_hidden() {
        assert_eq!(mask("abc"), "***");
    }

    #[test]
    fn unknown_and_malformed_settings_are_rejected() {
        let state = AppState::in_memory().unwrap();
        assert!(matches!(
            set_setting(&state, "theme", "dark"),
            Err(AppError::Settings(_))
        ));
        assert!(matches!(
            set_setting(&state, TURN_TIMEOUT_SETTING, "ten"),
            Err(AppError::Settings(_))
        ));
        set_setting(&state, TURN_TIMEOUT_SETTING, " 10 ").unwrap();
        assert_eq!(
            state.db.get_setting(TURN_TIMEOUT_SETTING).unwrap().as_deref(),
            Some("10")
        );

        delete_setting(&state, TURN_TIMEOUT_SETTING).unwrap();
        assert!(!get_settings(&state).unwrap().contains_key(TURN_TIMEOUT_SETTING));
    }
}
