//! Core types shared across all flagcaddy crates.
//!
//! Defines the persisted records, configuration, and error type used by the
//! record store, terminal capture, recommendation engine, and CLI.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod ids;
pub mod records;

pub use config::{
    default_data_dir, AdvisoryConfig, CaptureConfig, EngineConfig, EngineSettings,
    FlagcaddyConfig, CONFIG_FILENAME, DB_FILENAME, DEFAULT_SENTINEL, LOG_FILENAME,
};
pub use config_loader::ConfigLoader;
pub use error::FlagcaddyError;
pub use ids::{EventId, RecommendationId, SessionId, SessionName};
pub use records::{
    Event, Fact, FactKind, NewEvent, NewRecommendation, Recommendation, RecommendationSource,
    Session,
};
