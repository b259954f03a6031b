//! Error types for bound-constrained optimization.
//!
//! This module defines the error type shared by the optimizer framework,
//! the algorithm implementations and the model crates built on top of them.
//! Expected optimization outcomes (convergence, exhausted budgets, numerical
//! failures detected while iterating) are *not* errors: they are reported
//! through [`TerminationReason`](crate::optimizer::TerminationReason).

use thiserror::Error;

/// Errors that can occur while configuring or running an optimization.
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// The requested algorithm name is not one of the supported identifiers.
    ///
    /// This is a configuration error and is always detected before the
    /// objective is evaluated.
    #[error("Invalid algorithm: '{name}' is not a supported algorithm identifier")]
    InvalidAlgorithm {
        /// The name that failed to resolve
        name: String,
    },

    /// Invalid optimizer configuration.
    ///
    /// This error occurs when the optimizer is configured with invalid
    /// parameters (e.g., a negative tolerance).
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
        /// Name of the invalid parameter
        parameter: String,
        /// Value that was invalid
        value: String,
    },

    /// Dimension mismatch between vectors or matrices.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions
        expected: String,
        /// Actual dimensions
        actual: String,
    },

    /// Numerical failure inside an objective or an algorithm.
    ///
    /// Raised for example when a matrix that must be positive definite
    /// cannot be factorized.
    #[error("Numerical instability detected: {reason}")]
    NumericalError {
        /// Description of the numerical issue
        reason: String,
    },

    /// Line search failed to find an acceptable step.
    #[error("Line search failed: {reason}")]
    LineSearchFailed {
        /// Description of why the line search failed
        reason: String,
        /// Number of trial steps attempted
        iterations: usize,
        /// Last step size tried
        last_step_size: f64,
    },
}

impl OptimizerError {
    /// Create an InvalidAlgorithm error for an unresolved name.
    pub fn invalid_algorithm<S: Into<String>>(name: S) -> Self {
        Self::InvalidAlgorithm { name: name.into() }
    }

    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S1, S2, S3>(reason: S1, parameter: S2, value: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidConfiguration {
            reason: reason.into(),
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch<S1, S2>(expected: S1, actual: S2) -> Self
    where
        S1: std::fmt::Display,
        S2: std::fmt::Display,
    {
        Self::DimensionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a NumericalError with a custom reason.
    pub fn numerical_error<S: Into<String>>(reason: S) -> Self {
        Self::NumericalError {
            reason: reason.into(),
        }
    }

    /// Create a LineSearchFailed error with detailed context.
    pub fn line_search_failed<S: Into<String>>(
        reason: S,
        iterations: usize,
        last_step_size: f64,
    ) -> Self {
        Self::LineSearchFailed {
            reason: reason.into(),
            iterations,
            last_step_size,
        }
    }

    /// Returns true if this error is a configuration problem rather than a
    /// runtime failure.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidAlgorithm { .. } | Self::InvalidConfiguration { .. }
        )
    }
}

/// Result type alias for optimizer operations.
pub type Result<T> = std::result::Result<T, OptimizerError>;
