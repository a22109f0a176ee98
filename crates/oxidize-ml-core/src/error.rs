use thiserror::Error;

/// Core error type for all virtual matrix and splitter operations.
#[derive(Debug, Error)]
pub enum VMatError {
    #[error("Index out of bounds: {what} {index} not in [0, {bound})")]
    OutOfBounds {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Inconsistent configuration: {0}")]
    InconsistentConfig(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Out of range: {what} {index} not in [0, {len})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VMatError {
    pub fn row(index: usize, bound: usize) -> Self {
        VMatError::OutOfBounds {
            what: "row",
            index,
            bound,
        }
    }

    pub fn col(index: usize, bound: usize) -> Self {
        VMatError::OutOfBounds {
            what: "column",
            index,
            bound,
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        VMatError::Unsupported(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        VMatError::InconsistentConfig(msg.into())
    }
}

pub type VMatResult<T> = Result<T, VMatError>;
