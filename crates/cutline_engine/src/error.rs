use cutline_core::FieldError;
use std::path::PathBuf;
use thiserror::Error;

/// Rejections raised while turning an operation into engine arguments.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("both start and end are required, and start must not be after end")]
    MissingRange,

    #[error("no operation selected")]
    NoOperation,

    #[error("speed factor must be a finite number greater than zero, got {0}")]
    InvalidFactor(f64),

    #[error("reverse and ping-pong cannot be combined")]
    ConflictingFilters,

    #[error("a second input is required for concatenation")]
    MissingSecondInput,

    #[error("concat list file has not been written")]
    MissingListFile,
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("ffmpeg not found at {}", .0.display())]
    EngineNotFound(PathBuf),

    #[error("ffmpeg at {} did not answer -version", .0.display())]
    EngineFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no {0} file specified")]
    MissingPath(&'static str),

    #[error("another run is already in progress")]
    Busy,

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;
