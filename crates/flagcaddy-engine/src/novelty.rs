//! Novelty scoring: a local priority heuristic for captured events.
//!
//! The score is not a probability. It starts low for duplicates and high
//! for new content, grows with newly learned facts and sensitive keywords,
//! and is capped at a ceiling.

/// Keywords that make an event more interesting. Each distinct keyword
/// present adds one signal increment.
pub const SIGNAL_KEYWORDS: &[&str] = &[
    "password",
    "passwd",
    "credential",
    "token",
    "secret",
    "private key",
    "api key",
    "flag{",
    "htb{",
    "thm{",
    "exploit",
    "vulnerable",
    "injectable",
    "hash",
    "admin",
    "root:",
    "shell",
];

/// Tunable constants of the novelty heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct NoveltyWeights {
    pub duplicate_base: f64,
    pub novel_base: f64,
    pub new_fact_increment: f64,
    pub signal_increment: f64,
    pub signal_cap: f64,
    pub ceiling: f64,
}

impl Default for NoveltyWeights {
    fn default() -> Self {
        Self {
            duplicate_base: 0.15,
            novel_base: 0.9,
            new_fact_increment: 0.05,
            signal_increment: 0.05,
            signal_cap: 0.3,
            ceiling: 1.0,
        }
    }
}

impl NoveltyWeights {
    /// Keyword boost for `text`, capped at `signal_cap`.
    pub fn signal_boost(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        let hits = SIGNAL_KEYWORDS
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .count();
        (hits as f64 * self.signal_increment).min(self.signal_cap)
    }

    /// Combine duplicate status, new-fact count, and keyword boost.
    ///
    /// Duplicates never score above the non-duplicate base.
    pub fn estimate(&self, duplicate: bool, new_fact_hits: usize, signal_boost: f64) -> f64 {
        let base = if duplicate {
            self.duplicate_base
        } else {
            self.novel_base
        };
        let mut score = base + new_fact_hits as f64 * self.new_fact_increment + signal_boost.max(0.0);
        if duplicate {
            score = score.min(self.novel_base);
        }
        round2(score.clamp(0.0, self.ceiling))
    }
}

/// Score with the default weights.
pub fn estimate_novelty(duplicate: bool, new_fact_hits: usize, signal_boost: f64) -> f64 {
    NoveltyWeights::default().estimate(duplicate, new_fact_hits, signal_boost)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
