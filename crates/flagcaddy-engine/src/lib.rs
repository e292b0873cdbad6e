//! Event processing for flagcaddy.
//!
//! Turns finalized terminal events into stored events, facts, and
//! recommendations. Local heuristics run for every event; the external
//! advisory tool only runs when the advisory gate allows it.
//!
//! # Architecture
//!
//! - [`fingerprint::Fingerprinter`]: canonical hashing for duplicate detection
//! - [`novelty`]: local priority score
//! - [`facts`]: typed fact extraction and command categories
//! - [`rules`]: built-in rule set, all matches fire
//! - [`advisory`]: gate, prompt budget, and the advisory client
//! - [`engine::RecommendationEngine`]: the pipeline, usable as an
//!   [`flagcaddy_pilot::EventSink`]

pub mod advisory;
pub mod engine;
pub mod facts;
pub mod fingerprint;
pub mod novelty;
pub mod rules;

pub use advisory::{AdvisoryClient, CodexAdvisor, DisabledAdvisor, GateDecision};
pub use engine::{ProcessedEvent, RecommendationEngine, ADVISORY_TITLE};
pub use facts::{categorize_command, ExtractedFact, FactExtractor, RegexFactExtractor};
pub use fingerprint::Fingerprinter;
pub use novelty::{estimate_novelty, NoveltyWeights};
pub use rules::{evaluate_all, RuleContext, RuleHit, BUILTIN_RULES};
