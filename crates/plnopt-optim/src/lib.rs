//! PLNopt Optimization - bound-constrained gradient optimizers.
//!
//! This crate provides the algorithms driven by the PLN fitting code. All of
//! them minimize a smooth objective under box constraints `l ≤ x ≤ u`, using
//! only values and gradients, and report their outcome through the
//! [`TerminationReason`](plnopt_core::optimizer::TerminationReason) codes of
//! `plnopt-core`.
//!
//! # Available Optimizers
//!
//! - **L-BFGS**: limited-memory BFGS, projected or in the classic Nocedal form
//! - **Variable metric**: shifted limited-memory methods with rank-1 or rank-2
//!   corrections
//! - **Truncated Newton**: inexact Newton steps from finite-difference Hessian
//!   products, optionally preconditioned and restarted
//! - **CCSA**: conservative convex separable approximations (MMA and CCSAQ)
//!
//! # Examples
//!
//! ```rust
//! use plnopt_optim::{LBFGS, LBFGSConfig};
//! use plnopt_core::prelude::*;
//!
//! let mut cost = QuadraticCost::simple(3);
//! let bounds = BoxConstraints::lower_only(Vector::from_element(3, 0.5)).unwrap();
//! let criterion = StoppingCriterion::new()
//!     .with_ftol_rel(1e-12)
//!     .with_max_evaluations(100);
//!
//! let mut optimizer = LBFGS::new(LBFGSConfig::new());
//! let result = optimizer
//!     .minimize(&mut cost, &bounds, &Vector::from_element(3, 2.0), &criterion)
//!     .unwrap();
//! assert!(result.termination_reason.is_success());
//! assert!(bounds.contains(&result.point));
//! ```

pub mod ccsa;
pub mod lbfgs;
pub mod truncated_newton;
pub mod variable_metric;

mod utils;

// Re-export main optimizers for convenience
pub use ccsa::{Ccsa, CcsaApproximation, CcsaConfig};
pub use lbfgs::{LBFGSConfig, LBFGSState, LBFGSVariant, LBFGS};
pub use truncated_newton::{TruncatedNewton, TruncatedNewtonConfig};
pub use variable_metric::{ShiftedMemory, VariableMetric, VariableMetricConfig, VariableMetricUpdate};
