//! Rate- and novelty-gated advisory dispatch.
//!
//! - [`gate`]: whether an event earns an advisory call
//! - [`prompt`]: prompt assembly from recent events under a budget
//! - [`client`]: the advisory tool itself

pub mod client;
pub mod gate;
pub mod prompt;

pub use client::{AdvisoryClient, CodexAdvisor, DisabledAdvisor};
pub use gate::{AdvisoryGate, GateDecision, GateInput};
pub use prompt::{build_prompt, AdvisoryPrompt, PromptBudget};
