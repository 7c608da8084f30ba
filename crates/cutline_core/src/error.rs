use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A raw form value that failed basic syntactic validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("{field}: not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field}: not a time offset: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("rotation preset must be 0, 90, 180 or 270, got {0}")]
    InvalidPreset(i32),
}

pub type Result<T> = std::result::Result<T, CoreError>;
