//! Error types for fallible conversions.
//!
//! Condition merging and reference projections are total; only parsing
//! values that come from outside this crate can fail.

use thiserror::Error;

/// Errors returned when converting external values into model types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A field required by the target type is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// apiVersion is not of the form `version` or `group/version`
    #[error("Invalid apiVersion: {0:?}")]
    InvalidApiVersion(String),

    /// Condition status is not one of True, False, Unknown or ""
    #[error("Invalid condition status: {0:?}")]
    InvalidConditionStatus(String),
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
