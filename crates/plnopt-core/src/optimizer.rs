//! Core optimizer traits and types for bound-constrained minimization.
//!
//! This module provides the interface all optimizers implement, together
//! with the structures describing a run: stopping criteria, the reason a
//! run terminated and the result it produced.
//!
//! # Key Components
//!
//! - **Optimizer trait**: Core interface for all optimization algorithms
//! - **OptimizationResult**: Encapsulates the result of an optimization run
//! - **StoppingCriterion**: Tolerances and budgets for terminating a run
//! - **ConvergenceChecker**: Relative/absolute tolerance tests
//!
//! Termination reasons carry the integer status codes conventionally used
//! by bound-constrained optimization libraries: positive codes are
//! successful terminations, negative codes are failures.

use crate::{
    bounds::BoxConstraints,
    callback::{NoOpCallback, OptimizationCallback},
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::Vector,
};
use std::fmt::{self, Debug};
use std::time::Duration;

/// Result of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// The best point found by the optimizer
    pub point: Vector,

    /// The objective value at that point
    pub value: f64,

    /// Number of accepted iterates
    pub iterations: usize,

    /// Number of objective evaluations
    pub evaluations: usize,

    /// Total optimization time
    pub duration: Duration,

    /// Reason for termination
    pub termination_reason: TerminationReason,

    /// Whether the run ended on a convergence test
    pub converged: bool,
}

impl OptimizationResult {
    /// Creates a new optimization result.
    pub fn new(
        point: Vector,
        value: f64,
        iterations: usize,
        duration: Duration,
        termination_reason: TerminationReason,
    ) -> Self {
        Self {
            point,
            value,
            iterations,
            evaluations: 0,
            duration,
            converged: termination_reason.is_convergence(),
            termination_reason,
        }
    }

    /// Sets the objective evaluation count.
    pub fn with_evaluations(mut self, count: usize) -> Self {
        self.evaluations = count;
        self
    }
}

/// Reason for termination of the optimization algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TerminationReason {
    /// Generic success (e.g. a stationary point was reached exactly)
    Success,
    /// Objective value fell below the requested stop value
    StopValueReached,
    /// Relative or absolute objective change fell below tolerance
    FtolReached,
    /// Relative or absolute point change fell below tolerance
    XtolReached,
    /// Evaluation budget exhausted
    MaxEvalReached,
    /// Time budget exhausted
    MaxTimeReached,
    /// Generic failure (objective error, non-finite start)
    Failure,
    /// Invalid arguments (bad tolerances, wrong dimensions)
    InvalidArgs,
    /// Ran out of memory
    OutOfMemory,
    /// No further progress possible because of rounding errors
    RoundoffLimited,
    /// Stopped on request of a callback
    ForcedStop,
}

impl TerminationReason {
    /// All termination reasons, successes first.
    pub const ALL: [TerminationReason; 11] = [
        Self::Success,
        Self::StopValueReached,
        Self::FtolReached,
        Self::XtolReached,
        Self::MaxEvalReached,
        Self::MaxTimeReached,
        Self::Failure,
        Self::InvalidArgs,
        Self::OutOfMemory,
        Self::RoundoffLimited,
        Self::ForcedStop,
    ];

    /// Integer status code.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::StopValueReached => 2,
            Self::FtolReached => 3,
            Self::XtolReached => 4,
            Self::MaxEvalReached => 5,
            Self::MaxTimeReached => 6,
            Self::Failure => -1,
            Self::InvalidArgs => -2,
            Self::OutOfMemory => -3,
            Self::RoundoffLimited => -4,
            Self::ForcedStop => -5,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    /// Positive status codes are successful terminations.
    pub fn is_success(self) -> bool {
        self.code() > 0
    }

    /// True for the tolerance-based terminations.
    pub fn is_convergence(self) -> bool {
        matches!(
            self,
            Self::Success | Self::StopValueReached | Self::FtolReached | Self::XtolReached
        )
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Success => "success",
            Self::StopValueReached => "stop value reached",
            Self::FtolReached => "function tolerance reached",
            Self::XtolReached => "parameter tolerance reached",
            Self::MaxEvalReached => "maximum number of evaluations reached",
            Self::MaxTimeReached => "maximum time reached",
            Self::Failure => "failure",
            Self::InvalidArgs => "invalid arguments",
            Self::OutOfMemory => "out of memory",
            Self::RoundoffLimited => "roundoff errors limited progress",
            Self::ForcedStop => "forced stop",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Stopping criteria for optimization algorithms.
///
/// A tolerance of zero disables the corresponding test. `xtol_abs` is given
/// per coordinate so that different blocks of the variable can be held to
/// different absolute accuracies.
#[derive(Debug, Clone, Default)]
pub struct StoppingCriterion {
    /// Relative objective change tolerance
    pub ftol_rel: f64,

    /// Absolute objective change tolerance
    pub ftol_abs: f64,

    /// Relative point change tolerance (on the Euclidean norm)
    pub xtol_rel: f64,

    /// Per-coordinate absolute point change tolerance
    pub xtol_abs: Option<Vector>,

    /// Maximum number of objective evaluations
    pub max_evaluations: Option<usize>,

    /// Maximum optimization time
    pub max_time: Option<Duration>,

    /// Stop as soon as an evaluated objective is at or below this value
    pub stop_value: Option<f64>,
}

impl StoppingCriterion {
    /// Creates a new stopping criterion with every test disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relative objective tolerance.
    pub fn with_ftol_rel(mut self, tol: f64) -> Self {
        self.ftol_rel = tol;
        self
    }

    /// Sets the absolute objective tolerance.
    pub fn with_ftol_abs(mut self, tol: f64) -> Self {
        self.ftol_abs = tol;
        self
    }

    /// Sets the relative point tolerance.
    pub fn with_xtol_rel(mut self, tol: f64) -> Self {
        self.xtol_rel = tol;
        self
    }

    /// Sets the per-coordinate absolute point tolerance.
    pub fn with_xtol_abs(mut self, tol: Vector) -> Self {
        self.xtol_abs = Some(tol);
        self
    }

    /// Sets the same absolute point tolerance on all `n` coordinates.
    pub fn with_uniform_xtol_abs(self, n: usize, tol: f64) -> Self {
        self.with_xtol_abs(Vector::from_element(n, tol))
    }

    /// Sets the maximum number of objective evaluations.
    pub fn with_max_evaluations(mut self, max_evals: usize) -> Self {
        self.max_evaluations = Some(max_evals);
        self
    }

    /// Sets the maximum optimization time.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Sets the stop value.
    pub fn with_stop_value(mut self, value: f64) -> Self {
        self.stop_value = Some(value);
        self
    }

    /// Validates the criterion for a problem of dimension `n`.
    pub fn validate(&self, n: usize) -> Result<()> {
        for (name, value) in [
            ("ftol_rel", self.ftol_rel),
            ("ftol_abs", self.ftol_abs),
            ("xtol_rel", self.xtol_rel),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(OptimizerError::invalid_configuration(
                    "tolerance must be a non-negative number",
                    name,
                    value.to_string(),
                ));
            }
        }

        if let Some(xtol_abs) = &self.xtol_abs {
            if xtol_abs.len() != n {
                return Err(OptimizerError::dimension_mismatch(n, xtol_abs.len()));
            }
            if let Some(i) = xtol_abs.iter().position(|v| v.is_nan() || *v < 0.0) {
                return Err(OptimizerError::invalid_configuration(
                    "tolerance must be a non-negative number",
                    format!("xtol_abs[{}]", i),
                    xtol_abs[i].to_string(),
                ));
            }
        }

        if let Some(stop) = self.stop_value {
            if stop.is_nan() {
                return Err(OptimizerError::invalid_configuration(
                    "stop value must not be NaN",
                    "stop_value",
                    "NaN",
                ));
            }
        }

        Ok(())
    }
}

/// Trait for bound-constrained optimization algorithms.
///
/// Implementations minimize a [`CostFunction`] over a [`BoxConstraints`]
/// region starting from `initial_point`, which is projected into the box
/// before the first evaluation.
pub trait Optimizer: Debug {
    /// Returns the name of the optimizer.
    fn name(&self) -> &str;

    /// Minimizes the cost function, reporting accepted iterates to `callback`.
    ///
    /// # Errors
    ///
    /// Only argument errors (dimension mismatches, invalid tolerances) are
    /// returned as `Err`. Failures during the run are reported through the
    /// result's [`TerminationReason`].
    fn minimize_with_callback(
        &mut self,
        cost_fn: &mut dyn CostFunction,
        bounds: &BoxConstraints,
        initial_point: &Vector,
        stopping_criterion: &StoppingCriterion,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<OptimizationResult>;

    /// Minimizes the cost function without a callback.
    fn minimize(
        &mut self,
        cost_fn: &mut dyn CostFunction,
        bounds: &BoxConstraints,
        initial_point: &Vector,
        stopping_criterion: &StoppingCriterion,
    ) -> Result<OptimizationResult> {
        self.minimize_with_callback(
            cost_fn,
            bounds,
            initial_point,
            stopping_criterion,
            &mut NoOpCallback,
        )
    }
}

/// Checks the arguments shared by every optimizer.
pub fn validate_problem(
    bounds: &BoxConstraints,
    initial_point: &Vector,
    stopping_criterion: &StoppingCriterion,
) -> Result<()> {
    if initial_point.len() != bounds.dim() {
        return Err(OptimizerError::dimension_mismatch(
            bounds.dim(),
            initial_point.len(),
        ));
    }
    if initial_point.is_empty() {
        return Err(OptimizerError::invalid_configuration(
            "problem dimension must be positive",
            "initial_point",
            "[]",
        ));
    }
    stopping_criterion.validate(bounds.dim())
}

/// Convergence checker for optimization algorithms.
pub struct ConvergenceChecker;

impl ConvergenceChecker {
    /// Relative/absolute closeness test between two successive values.
    ///
    /// Never true if the old value is infinite. A positive relative
    /// tolerance also accepts values that did not change at all.
    pub fn relstop(old: f64, new: f64, rel_tol: f64, abs_tol: f64) -> bool {
        if old.is_infinite() {
            return false;
        }
        let change = (new - old).abs();
        change < abs_tol
            || change < rel_tol * (new.abs() + old.abs()) * 0.5
            || (rel_tol > 0.0 && new == old)
    }

    /// Objective change test.
    pub fn function_converged(criterion: &StoppingCriterion, old: f64, new: f64) -> bool {
        Self::relstop(old, new, criterion.ftol_rel, criterion.ftol_abs)
    }

    /// Point change test.
    ///
    /// Converged when `‖x_new − x_old‖ < xtol_rel·‖x_new‖`, or when every
    /// coordinate moved by less than its absolute tolerance.
    pub fn point_converged(criterion: &StoppingCriterion, old: &Vector, new: &Vector) -> bool {
        let diff = new - old;
        if diff.norm() < criterion.xtol_rel * new.norm() {
            return true;
        }
        match &criterion.xtol_abs {
            Some(xtol_abs) => diff
                .iter()
                .zip(xtol_abs.iter())
                .all(|(d, tol)| d.abs() < *tol),
            None => false,
        }
    }

    /// Checks the tolerance-based stopping criteria after an accepted step.
    ///
    /// # Returns
    ///
    /// The termination reason if any criterion is met, otherwise None.
    pub fn check(
        criterion: &StoppingCriterion,
        old_value: f64,
        new_value: f64,
        old_point: &Vector,
        new_point: &Vector,
    ) -> Option<TerminationReason> {
        if let Some(stop) = criterion.stop_value {
            if new_value <= stop {
                return Some(TerminationReason::StopValueReached);
            }
        }

        if Self::function_converged(criterion, old_value, new_value) {
            return Some(TerminationReason::FtolReached);
        }

        if Self::point_converged(criterion, old_point, new_point) {
            return Some(TerminationReason::XtolReached);
        }

        None
    }
}
