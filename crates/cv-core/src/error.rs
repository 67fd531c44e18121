use thiserror::Error;

/// Errors that can occur while synchronizing a chart view
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("no rendering surface is bound")]
    MissingSurface,

    #[error("view factory failed: {0}")]
    Factory(String),

    #[error("spec conflicts with dataset injection: {0}")]
    SpecConflict(String),

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("failed to restore selection state: {0}")]
    StateRestore(String),

    #[error("dataset '{0}' not found in view")]
    DatasetNotFound(String),

    #[error("spec parsing error: {0}")]
    Spec(#[from] serde_json::Error),
}
