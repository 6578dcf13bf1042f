use thiserror::Error;

/// Errors surfaced by the rollup core.
///
/// Bad data never ends up here: missing columns and malformed cells are
/// absorbed by the loader. Only caller mistakes and I/O failures do.
#[derive(Debug, Error)]
pub enum RollupError {
    #[error("unknown metric key: {0}")]
    UnknownMetric(String),

    #[error("malformed node path: {0}")]
    MalformedPath(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RollupError>;
