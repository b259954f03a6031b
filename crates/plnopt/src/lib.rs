//! Variational Poisson-lognormal (PLN) fitting.
//!
//! This crate evaluates the variational objective of the PLN count model and
//! its analytic gradient, and drives a bound-constrained optimizer from
//! [`plnopt_optim`] to a minimum.
//!
//! The parameters are packed in one flat vector holding Θ (p × d), the
//! variational means M (n × p) and the variational variances S (n × p),
//! each block stored row by row. S is kept positive by a lower bound.
//!
//! # Modules
//!
//! - [`layout`]: Flat vector ↔ (Θ, M, S) mapping
//! - [`data`]: Counts, covariates and offsets
//! - [`context`]: Per-run evaluation bookkeeping
//! - [`evaluator`]: Objective and gradient
//! - [`registry`]: Algorithm names
//! - [`config`]: Tolerances, budget and variance floor
//! - [`driver`]: Running a fit
//!
//! # Example
//!
//! ```
//! use plnopt::prelude::*;
//!
//! let data = PlnData::new(
//!     Matrix::from_row_slice(3, 2, &[0.0, 2.0, 1.0, 3.0, 4.0, 0.0]),
//!     Matrix::from_element(3, 1, 1.0),
//!     Matrix::zeros(3, 2),
//!     0.0,
//! )?;
//! let layout = data.layout();
//! let mut start = vec![0.0; layout.n_param()];
//! for i in layout.s_range() {
//!     start[i] = 1.0;
//! }
//!
//! let config = PlnConfig::new().with_algorithm("CCSAQ").with_lbvar(1e-3);
//! let result = OptimizationDriver::new(config)?.run(&start, &data)?;
//! assert!(layout.s(&result.solution)?.iter().all(|s| *s >= 1e-3));
//! # Ok::<(), plnopt::OptimizerError>(())
//! ```

pub mod config;
pub mod context;
pub mod data;
pub mod driver;
pub mod evaluator;
pub mod layout;
pub mod registry;

pub use config::PlnConfig;
pub use context::EvaluationContext;
pub use data::PlnData;
pub use driver::{optimize_pln, OptimizationDriver, PlnResult};
pub use evaluator::{Evaluation, ObjectiveEvaluator, PlnObjective};
pub use layout::{ParameterBlocks, ParameterLayout};
pub use plnopt_core::{OptimizerError, Result};
pub use registry::{Algorithm, AlgorithmFamily};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::PlnConfig;
    pub use crate::context::EvaluationContext;
    pub use crate::data::PlnData;
    pub use crate::driver::{optimize_pln, OptimizationDriver, PlnResult};
    pub use crate::evaluator::{Evaluation, ObjectiveEvaluator, PlnObjective};
    pub use crate::layout::{ParameterBlocks, ParameterLayout};
    pub use crate::registry::{Algorithm, AlgorithmFamily};
    pub use plnopt_core::prelude::*;
}
