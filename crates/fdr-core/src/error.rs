//! Unified error type for the feeder simulation workspace
//!
//! Every library crate returns [`FdrResult`]. Failures that happen while the
//! time-series loop is running are wrapped in [`FdrError::Step`] so the
//! diagnostic always names the step that broke the run.
//!
//! # Example
//!
//! ```
//! use fdr_core::{FdrError, FdrResult};
//!
//! fn check_scale(scale: f64) -> FdrResult<f64> {
//!     if scale < 0.0 {
//!         return Err(FdrError::Config(format!("negative load scale {scale}")));
//!     }
//!     Ok(scale)
//! }
//!
//! assert!(check_scale(-0.1).is_err());
//! ```

use thiserror::Error;

/// Error type shared by all `fdr-*` crates.
#[derive(Error, Debug)]
pub enum FdrError {
    /// I/O errors (file access, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Linear algebra failures inside a solver (singular Jacobian, bad dimensions)
    #[error("Solver error: {0}")]
    Solver(String),

    /// The power flow iteration did not reach the mismatch tolerance
    #[error(
        "power flow did not converge after {iterations} iterations (max mismatch {max_mismatch:.3e} p.u.)"
    )]
    Convergence { iterations: usize, max_mismatch: f64 },

    /// A result sink (time-series database, file system) could not be written
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// Invalid configuration (profile parameters, unknown feeder, bad option)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network structure errors
    #[error("Network error: {0}")]
    Network(String),

    /// A failure while executing a particular simulation step
    #[error("step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<FdrError>,
    },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl FdrError {
    /// Attach the index of the simulation step that produced this error.
    pub fn at_step(self, step: usize) -> Self {
        FdrError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// Step index carried by a [`FdrError::Step`] error, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            FdrError::Step { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// The innermost error, looking through any step wrappers.
    pub fn root(&self) -> &FdrError {
        match self {
            FdrError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_convergence_failure(&self) -> bool {
        matches!(self.root(), FdrError::Convergence { .. })
    }
}

/// Convenience type alias for Results using FdrError.
pub type FdrResult<T> = Result<T, FdrError>;

impl From<String> for FdrError {
    fn from(s: String) -> Self {
        FdrError::Other(s)
    }
}

impl From<&str> for FdrError {
    fn from(s: &str) -> Self {
        FdrError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for FdrError {
    fn from(err: serde_json::Error) -> Self {
        FdrError::Parse(err.to_string())
    }
}
