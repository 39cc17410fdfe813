//! Error types shared across the crate.

use thiserror::Error;

use crate::counting::Tag;

/// Invalid configuration. Always fatal at startup.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("no threshold defined for tag `{0}`")]
    MissingThreshold(Tag),
    #[error("threshold for tag `{tag}` must lie in (0, 1], got {value}")]
    InvalidThreshold { tag: Tag, value: f64 },
    #[error("{name} size range is empty or invalid: {min}..={max}")]
    InvalidSizeRange { name: &'static str, min: f64, max: f64 },
    #[error("single-bee and group size ranges overlap")]
    OverlappingSizeRanges,
    #[error("gate inward normal must be a finite, non-zero vector")]
    DegenerateGate,
    #[error("gate band half-width must be finite and non-negative, got {0}")]
    InvalidGateBand(f64),
    #[error("`{name}` must be finite and positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("`{0}` must be greater than zero")]
    ZeroCount(&'static str),
    #[error("maximum trace length must be at least 2, got {0}")]
    TraceTooShort(usize),
}

/// A blob rejected before association.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BlobError {
    #[error("blob geometry contains a non-finite value ({field} = {value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("blob geometry is negative ({field} = {value})")]
    Negative { field: &'static str, value: f64 },
}

/// Numerical failures inside the tracker.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TrackerError {
    #[error("innovation covariance of track {0} is singular")]
    SingularInnovation(u64),
}

/// Failure that ends a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError<E> {
    #[error("frame source failed: {0}")]
    Source(E),
}
