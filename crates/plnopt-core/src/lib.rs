//! Core traits and types for bound-constrained gradient optimization.
//!
//! This crate provides the framework shared by the optimizers of the
//! workspace: the cost function interface, box constraints, stopping
//! criteria, termination reasons, evaluation bookkeeping, line searches
//! and iteration callbacks.
//!
//! # Modules
//!
//! - [`bounds`]: Box constraints and projections
//! - [`callback`]: Iteration callbacks
//! - [`cost_function`]: Cost function interface and derivative checks
//! - [`error`]: Error types
//! - [`line_search`]: Line search algorithms
//! - [`optimizer`]: Optimizer trait, stopping criteria and results
//! - [`session`]: Evaluation budget and best-point tracking for one run
//! - [`types`]: Type aliases and numerical constants

pub mod bounds;
pub mod callback;
pub mod cost_function;
pub mod error;
pub mod line_search;
pub mod optimizer;
pub mod session;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used items at the crate root
pub use error::{OptimizerError, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use plnopt_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bounds::BoxConstraints;
    pub use crate::callback::{
        HistoryCallback, IterationInfo, LogProgressCallback, NoOpCallback, OptimizationCallback,
    };
    pub use crate::cost_function::{
        CostFunction, DerivativeChecker, FnCostFunction, QuadraticCost,
    };
    pub use crate::error::{OptimizerError, Result};
    pub use crate::line_search::{
        BacktrackingLineSearch, LineSearch, LineSearchParams, LineSearchResult,
        StrongWolfeLineSearch,
    };
    pub use crate::optimizer::{
        validate_problem, ConvergenceChecker, OptimizationResult, Optimizer, StoppingCriterion,
        TerminationReason,
    };
    pub use crate::session::{Interrupt, Iterate, Session};
    pub use crate::types::{constants, DMatrix, DVector, Matrix, Real, Vector};
}
