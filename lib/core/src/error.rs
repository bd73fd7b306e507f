use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid result size: k must be between 1 and {max}, got {actual}")]
    InvalidK { max: usize, actual: usize },

    #[error("Invalid diversity weight: lambda must be within [0, 1], got {0}")]
    InvalidLambda(f32),

    #[error("Invalid cluster size: must be at least 1")]
    InvalidClusterSize,

    #[error("Invalid tie tolerance: must be finite and non-negative, got {0}")]
    InvalidTolerance(f32),

    #[error("Invalid segment count: must be at least 1")]
    InvalidSegmentCount,

    #[error("Weight for '{0}' must be finite and non-negative")]
    NegativeWeight(String),

    #[error("Invalid range for '{attribute}': {raw}")]
    InvalidRange { attribute: String, raw: String },

    #[error("Invalid number for '{attribute}': {raw}")]
    InvalidNumber { attribute: String, raw: String },

    #[error("Empty attribute name")]
    EmptyAttribute,

    #[error("Distance constraint on '{0}' requires a location")]
    MissingLocation(String),

    #[error("Invalid avoid rule: {0}")]
    InvalidAvoidRule(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
