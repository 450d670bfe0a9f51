use std::time::Duration;

use similar::TextDiff;

/// Fuzzy string similarity in `[0, 1]`.
///
/// Implementations need not score identical strings as `1.0`; callers go
/// through [`similarity`], which special-cases equality.
pub trait StringScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Score two strings, treating exact equality as a perfect match.
pub fn similarity(scorer: &dyn StringScorer, a: &str, b: &str) -> f64 {
    if a == b {
        1.0
    } else {
        scorer.score(a, b).clamp(0.0, 1.0)
    }
}

/// Token-order-insensitive ratio.
///
/// Both inputs are lowercased, stripped of punctuation, split into tokens,
/// and the sorted token lists are compared with a character-level diff
/// ratio (`2 * matches / total length`).
#[derive(Debug, Clone)]
pub struct TokenSortRatio {
    timeout: Duration,
}

impl Default for TokenSortRatio {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl TokenSortRatio {
    /// `timeout` bounds a single diff; past it the ratio is approximate.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl StringScorer for TokenSortRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = sorted_tokens(a);
        let b = sorted_tokens(b);
        if a.is_empty() || b.is_empty() {
            return if a == b { 1.0 } else { 0.0 };
        }
        let ratio = TextDiff::configure()
            .timeout(self.timeout)
            .diff_chars(a.as_str(), b.as_str())
            .ratio();
        f64::from(ratio)
    }
}

fn sorted_tokens(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
