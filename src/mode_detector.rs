//! Keyword-based learning mode detection for AI reply text.
//!
//! Rules are evaluated top to bottom and the first group with any matching
//! keyword wins. Keywords are matched as lower-case substrings.

use crate::model::Mode;

/// One entry of the ordered detection table.
#[derive(Debug, Clone, Copy)]
pub struct KeywordRule {
    pub mode: Mode,
    pub keywords: &'static [&'static str],
}

impl KeywordRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k))
    }
}

/// Detection table in priority order.
pub const RULES: [KeywordRule; 4] = [
    KeywordRule {
        mode: Mode::Speaking,
        keywords: &["speak", "pronunciation", "say"],
    },
    KeywordRule {
        mode: Mode::Reading,
        keywords: &["read", "passage", "text"],
    },
    KeywordRule {
        mode: Mode::Writing,
        keywords: &["write", "grammar", "email"],
    },
    KeywordRule {
        mode: Mode::Listening,
        keywords: &["listen", "audio", "hear"],
    },
];

/// Classify free-form text into a skill mode, or `Mode::None`.
pub fn detect(text: &str) -> Mode {
    detect_with(&RULES, text)
}

/// Same as [`detect`] with a caller-supplied rule table.
pub fn detect_with(rules: &[KeywordRule], text: &str) -> Mode {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Mode::None;
    }

    let lowered = trimmed.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.mode)
        .unwrap_or(Mode::None)
}
