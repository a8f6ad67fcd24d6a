//! Error types for the vigil core library.
//!
//! The pipeline itself never fails during steady-state operation — bad input
//! degrades to a zero score or an empty result. Errors exist only at the
//! configuration-loading boundary and as a carrier for collaborator callback
//! failures, which the sensor logs and swallows per tick.

use thiserror::Error;

/// Top-level error type for all vigil operations.
#[derive(Error, Debug)]
pub enum VigilError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A behavior-collaborator callback failed for this tick.
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, VigilError>;
