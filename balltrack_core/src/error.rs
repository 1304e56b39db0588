// balltrack_core/src/error.rs

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("measurement contains non-finite values")]
    NonFiniteMeasurement,
    #[error("correction produced a non-finite state")]
    NonFiniteState,
    #[error("innovation covariance is not invertible")]
    SingularInnovation,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be finite and positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("`{field}` must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("`{field}` must be at least {min}, got {value}")]
    TooSmall {
        field: &'static str,
        min: u64,
        value: u64,
    },
}

pub type Result<T> = std::result::Result<T, FilterError>;
