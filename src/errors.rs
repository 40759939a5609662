use crate::grid::Position;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavError {
    // Pathing/movement errors
    #[error("no path could be calculated to {destination}")]
    PathNotFound { destination: Position },

    #[error("movement timed out after {elapsed:?}")]
    MovementTimeout { elapsed: Duration },

    // Grid construction errors
    #[error("collision grid has invalid dimensions {width}x{height}")]
    InvalidGridDimensions { width: usize, height: usize },

    #[error("walkability data has {actual} cells, expected {expected}")]
    GridSizeMismatch { expected: usize, actual: usize },

    // Config-related errors
    #[error("failed to get config directory")]
    ConfigDirNotFound,

    #[error("failed to read or write config file: {0}")]
    ConfigIoFailed(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    SerializationFailed(#[from] toml::ser::Error),

    #[error("failed to deserialize config: {0}")]
    DeserializationFailed(#[from] toml::de::Error),
}

/// Result type alias for all operations
pub type NavResult<T> = Result<T, NavError>;
