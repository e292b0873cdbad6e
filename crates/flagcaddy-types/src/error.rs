//! Error type shared across all flagcaddy crates.

/// Errors that can occur across the flagcaddy runtime.
///
/// Each variant corresponds to a subsystem: record store, terminal capture,
/// configuration, or fact extraction. Advisory failures are deliberately
/// absent; the advisory client reports them as text.
#[derive(Debug, thiserror::Error)]
pub enum FlagcaddyError {
    #[error("record store error: {0}")]
    StoreError(String),

    #[error("terminal capture error: {0}")]
    CaptureError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("fact extraction error: {0}")]
    ExtractError(String),
}
