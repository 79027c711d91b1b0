pub mod cache;
mod switcher;

pub use cache::{CacheKey, TtlCache, DEFAULT_TTL};
pub use switcher::{
    is_chinese, ui_language_for, DetectionOutcome, LanguageAutoSwitcher, SwitcherConfig,
    UiLanguage,
};
