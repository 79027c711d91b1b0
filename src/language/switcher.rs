//! Debounced language detection driving the UI language.
//!
//! Detection runs after a period of input inactivity; each new keystroke
//! cancels the detection still waiting out its debounce. Detections and
//! translations are cached by `(source, target, text)` for a fixed TTL, and a
//! cache hit never reaches the backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::cache::{CacheKey, TtlCache};
use crate::backend::TutorBackend;
use crate::model::LanguageDetection;
use crate::settings::AppSettings;

const DETECT_SOURCE: &str = "auto";
const DETECT_TARGET: &str = "detect";

/// Languages the interface is translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UiLanguage {
    #[default]
    En,
    Zh,
}

impl UiLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            UiLanguage::En => "en",
            UiLanguage::Zh => "zh",
        }
    }
}

/// True for `zh` and any `zh-*` / `zh_*` tag, case-insensitive.
pub fn is_chinese(code: &str) -> bool {
    let primary = code
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default();
    primary.eq_ignore_ascii_case("zh")
}

/// Chinese variants map to `zh`; every other detected code maps to `en`.
pub fn ui_language_for(detected: &str) -> UiLanguage {
    if is_chinese(detected) {
        UiLanguage::Zh
    } else {
        UiLanguage::En
    }
}

#[derive(Debug, Clone)]
pub struct SwitcherConfig {
    pub debounce: Duration,
    pub ttl: Duration,
    pub auto_switch_ui: bool,
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1000),
            ttl: super::cache::DEFAULT_TTL,
            auto_switch_ui: true,
        }
    }
}

impl From<&AppSettings> for SwitcherConfig {
    fn from(settings: &AppSettings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.detection_debounce_ms),
            ttl: Duration::from_secs(settings.cache_ttl_secs),
            auto_switch_ui: settings.auto_switch_ui,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    pub detection: LanguageDetection,
    /// UI language to switch to; `None` when auto-switching is disabled.
    pub ui_language: Option<UiLanguage>,
}

struct Inner {
    backend: Arc<dyn TutorBackend>,
    config: SwitcherConfig,
    detections: Mutex<TtlCache<CacheKey, LanguageDetection>>,
    translations: Mutex<TtlCache<CacheKey, String>>,
}

impl Inner {
    fn cached_detection(&self, key: &CacheKey) -> Option<LanguageDetection> {
        self.detections.lock().ok().and_then(|cache| cache.get(key))
    }

    fn cached_translation(&self, key: &CacheKey) -> Option<String> {
        self.translations.lock().ok().and_then(|cache| cache.get(key))
    }

    async fn detect(&self, text: &str) -> LanguageDetection {
        let key = CacheKey::new(DETECT_SOURCE, DETECT_TARGET, text);
        if let Some(hit) = self.cached_detection(&key) {
            log::debug!("Language detection cache hit");
            return hit;
        }

        match self.backend.detect_language(text).await {
            Ok(detection) => {
                log::info!(
                    "Detected language {} (confidence {:.2})",
                    detection.detected_language,
                    detection.confidence
                );
                if let Ok(mut cache) = self.detections.lock() {
                    cache.insert(key, detection.clone());
                }
                detection
            }
            Err(e) => {
                log::warn!("Language detection failed, using fallback: {}", e);
                LanguageDetection::fallback()
            }
        }
    }

    fn decide(&self, detection: &LanguageDetection) -> Option<UiLanguage> {
        if !self.config.auto_switch_ui {
            return None;
        }
        Some(ui_language_for(&detection.detected_language))
    }
}

#[derive(Clone)]
pub struct LanguageAutoSwitcher {
    inner: Arc<Inner>,
    pending: Arc<Mutex<Option<CancellationToken>>>,
}

impl LanguageAutoSwitcher {
    pub fn new(backend: Arc<dyn TutorBackend>, config: SwitcherConfig) -> Self {
        let ttl = config.ttl;
        Self {
            inner: Arc::new(Inner {
                backend,
                config,
                detections: Mutex::new(TtlCache::new(ttl)),
                translations: Mutex::new(TtlCache::new(ttl)),
            }),
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue detection of `text` after the debounce period.
    ///
    /// Any detection still waiting is cancelled and its handle resolves to
    /// `None`. Blank input cancels the pending detection and schedules nothing.
    pub fn schedule_detection(&self, text: impl Into<String>) -> JoinHandle<Option<DetectionOutcome>> {
        let text = text.into();
        let token = CancellationToken::new();

        let previous = match self.pending.lock() {
            Ok(mut pending) => pending.replace(token.clone()),
            Err(poisoned) => poisoned.into_inner().replace(token.clone()),
        };
        if let Some(previous) = previous {
            previous.cancel();
        }

        let inner = self.inner.clone();
        let debounce = inner.config.debounce;

        tokio::spawn(async move {
            if text.trim().is_empty() {
                return None;
            }

            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    log::debug!("Language detection superseded by newer input");
                    None
                }

                _ = tokio::time::sleep(debounce) => {
                    let detection = inner.detect(text.trim()).await;
                    let ui_language = inner.decide(&detection);
                    Some(DetectionOutcome { detection, ui_language })
                }
            }
        })
    }

    /// Detect immediately, bypassing the debounce but not the cache.
    pub async fn detect_now(&self, text: &str) -> DetectionOutcome {
        let detection = self.inner.detect(text.trim()).await;
        let ui_language = self.inner.decide(&detection);
        DetectionOutcome {
            detection,
            ui_language,
        }
    }

    /// Translate `text`, answering from the cache when possible. On failure
    /// the original text is returned and nothing is cached.
    pub async fn translate(&self, text: &str, target: &str, source: Option<&str>) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let key = CacheKey::new(source.unwrap_or(DETECT_SOURCE), target, text);
        if let Some(hit) = self.inner.cached_translation(&key) {
            log::debug!("Translation cache hit ({} -> {})", key.source, target);
            return hit;
        }

        match self.inner.backend.translate(text, target, source).await {
            Ok(translated) => {
                if let Ok(mut cache) = self.inner.translations.lock() {
                    cache.insert(key, translated.clone());
                }
                translated
            }
            Err(e) => {
                log::warn!("Translation to {} failed, keeping original: {}", target, e);
                text.to_string()
            }
        }
    }

    pub fn auto_switch_enabled(&self) -> bool {
        self.inner.config.auto_switch_ui
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chinese_variants_are_recognized() {
        for code in ["zh", "ZH", "zh-CN", "zh-TW", "zh_Hant", "zh-hans"] {
            assert!(is_chinese(code), "{code} should be Chinese");
        }
        for code in ["en", "ja", "ko", "", "z", "zha"] {
            assert!(!is_chinese(code), "{code} should not be Chinese");
        }
    }

    #[test]
    fn ui_language_is_a_binary_reduction() {
        assert_eq!(ui_language_for("zh-CN"), UiLanguage::Zh);
        assert_eq!(ui_language_for("en"), UiLanguage::En);
        assert_eq!(ui_language_for("fr"), UiLanguage::En);
        assert_eq!(ui_language_for("ja"), UiLanguage::En);
    }

    #[test]
    fn config_from_settings() {
        let settings = AppSettings {
            detection_debounce_ms: 250,
            auto_switch_ui: false,
            ..AppSettings::default()
        };
        let config = SwitcherConfig::from(&settings);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert!(!config.auto_switch_ui);
    }
}
