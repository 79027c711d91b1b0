use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SETTINGS_DIR_NAME: &str = "polyglot-tutor";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variable overriding `api_base_url`.
pub const API_URL_ENV: &str = "TUTOR_API_URL";
/// Environment variable holding the backend bearer token.
pub const API_KEY_ENV: &str = "TUTOR_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Failed to create config directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Write settings {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Root URL of the tutoring backend.
    pub api_base_url: String,

    /// Deadline for ordinary calls (dialogue, synthesis, language detection).
    pub request_timeout_secs: u64,

    /// Deadline for transcription, analysis and content generation.
    pub extended_timeout_secs: u64,

    /// Language being learned; sent as the transcription hint.
    pub language: String,

    pub proficiency_level: String,

    pub scenario: String,

    /// Let detected input language drive the UI language.
    pub auto_switch_ui: bool,

    /// Vocalize every AI reply.
    pub auto_speak: bool,

    /// Input inactivity before language detection runs.
    pub detection_debounce_ms: u64,

    /// Lifetime of cached detections and translations.
    pub cache_ttl_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".to_string(),
            request_timeout_secs: 10,
            extended_timeout_secs: 60,
            language: "en".to_string(),
            proficiency_level: "intermediate".to_string(),
            scenario: "general".to_string(),
            auto_switch_ui: true,
            auto_speak: true,
            detection_debounce_ms: 1000,
            cache_ttl_secs: 5 * 60,
        }
    }
}

impl AppSettings {
    /// Apply `TUTOR_API_URL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                self.api_base_url = url;
            }
        }
        self
    }
}

/// Backend bearer token from the environment, if configured.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty())
}

/// `<config_dir>/polyglot-tutor/settings.json`
pub fn settings_path() -> Result<PathBuf, SettingsError> {
    let dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
    Ok(dir.join(SETTINGS_DIR_NAME).join(SETTINGS_FILE_NAME))
}

pub fn load_settings() -> AppSettings {
    match settings_path() {
        Ok(path) => load_settings_from(&path),
        Err(e) => {
            log::warn!("Settings: {}", e);
            AppSettings::default()
        }
    }
}

/// Read settings from `path`, falling back to defaults on any problem.
pub fn load_settings_from(path: &Path) -> AppSettings {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Settings: failed to parse {:?}: {}", path, e);
                AppSettings::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppSettings::default(),
        Err(e) => {
            log::warn!("Settings: failed to read {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn save_settings(settings: &AppSettings) -> Result<(), SettingsError> {
    save_settings_to(&settings_path()?, settings)
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SettingsError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let contents = serde_json::to_string_pretty(settings)?;

    // Write to a sibling temp file, then rename over the target.
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, &contents).map_err(|source| SettingsError::Write {
        path: tmp_path.clone(),
        source,
    })?;

    // Windows rename fails if the destination exists.
    if cfg!(windows) && path.exists() {
        if let Err(source) = std::fs::remove_file(path) {
            if source.kind() != std::io::ErrorKind::NotFound {
                return Err(SettingsError::Write {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    std::fs::rename(&tmp_path, path).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
