//! Evaluation bookkeeping for a single optimization run.
//!
//! A [`Session`] sits between an optimizer and its cost function. Every
//! objective evaluation goes through [`Session::evaluate`], which enforces
//! the evaluation and time budgets, remembers the best point seen so far and
//! turns objective errors into an [`Interrupt`]. Accepted iterates go through
//! [`Session::accept`], which notifies the callback and applies the
//! tolerance tests of the [`StoppingCriterion`].
//!
//! Optimizers write their main loop as a function returning
//! `Result<TerminationReason, Interrupt>` so that budget exhaustion and
//! failures propagate with `?`, and hand the outcome to [`Session::finish`].

use crate::{
    bounds::BoxConstraints,
    callback::{IterationInfo, OptimizationCallback},
    cost_function::CostFunction,
    error::OptimizerError,
    optimizer::{ConvergenceChecker, OptimizationResult, StoppingCriterion, TerminationReason},
    types::{all_finite, Vector},
};
use log::{debug, info, trace, warn};
use std::time::Instant;

/// A point together with its objective value and gradient.
#[derive(Debug, Clone)]
pub struct Iterate {
    pub point: Vector,
    pub value: f64,
    pub gradient: Vector,
}

impl Iterate {
    /// True if the value and every gradient component are finite.
    pub fn is_finite(&self) -> bool {
        self.value.is_finite() && all_finite(&self.gradient)
    }
}

/// Reasons a run stops before the optimizer's own logic decides to.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// The evaluation budget is exhausted
    MaxEvaluations,
    /// The time budget is exhausted
    MaxTime,
    /// An evaluated objective reached the stop value
    StopValue,
    /// The callback asked to stop
    ForcedStop,
    /// No acceptable step could be found
    LineSearch(OptimizerError),
    /// The objective or the callback returned an error
    Error(OptimizerError),
}

impl Interrupt {
    /// Termination reason reported for this interrupt.
    pub fn termination_reason(&self) -> TerminationReason {
        match self {
            Self::MaxEvaluations => TerminationReason::MaxEvalReached,
            Self::MaxTime => TerminationReason::MaxTimeReached,
            Self::StopValue => TerminationReason::StopValueReached,
            Self::ForcedStop => TerminationReason::ForcedStop,
            Self::LineSearch(_) => TerminationReason::RoundoffLimited,
            Self::Error(_) => TerminationReason::Failure,
        }
    }
}

impl From<Interrupt> for TerminationReason {
    fn from(interrupt: Interrupt) -> Self {
        interrupt.termination_reason()
    }
}

/// Evaluation tracker for one optimization run.
pub struct Session<'a> {
    cost_fn: &'a mut dyn CostFunction,
    callback: &'a mut dyn OptimizationCallback,
    bounds: &'a BoxConstraints,
    criterion: &'a StoppingCriterion,
    origin: Vector,
    best: Option<(Vector, f64)>,
    evaluations: usize,
    iterations: usize,
    start_time: Instant,
}

impl<'a> Session<'a> {
    /// Creates a session starting from `initial_point` projected into the box.
    pub fn new(
        cost_fn: &'a mut dyn CostFunction,
        bounds: &'a BoxConstraints,
        criterion: &'a StoppingCriterion,
        callback: &'a mut dyn OptimizationCallback,
        initial_point: &Vector,
    ) -> Self {
        Self {
            cost_fn,
            callback,
            bounds,
            criterion,
            origin: bounds.project(initial_point),
            best: None,
            evaluations: 0,
            iterations: 0,
            start_time: Instant::now(),
        }
    }

    pub fn bounds(&self) -> &BoxConstraints {
        self.bounds
    }

    pub fn criterion(&self) -> &StoppingCriterion {
        self.criterion
    }

    /// Number of objective evaluations performed so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Number of accepted iterates so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Evaluations still allowed by the budget (`None` if unlimited).
    pub fn remaining_evaluations(&self) -> Option<usize> {
        self.criterion
            .max_evaluations
            .map(|max| max.saturating_sub(self.evaluations))
    }

    /// Evaluates the (projected) starting point.
    ///
    /// A non-finite value or gradient at the start is a failure.
    pub fn start(&mut self) -> Result<Iterate, Interrupt> {
        self.callback
            .on_optimization_start()
            .map_err(Interrupt::Error)?;

        let iterate = self.evaluate(self.origin.clone())?;
        if !iterate.is_finite() {
            return Err(Interrupt::Error(OptimizerError::numerical_error(
                "non-finite objective or gradient at the starting point",
            )));
        }
        Ok(iterate)
    }

    /// Evaluates the objective and gradient at `point`.
    pub fn evaluate(&mut self, point: Vector) -> Result<Iterate, Interrupt> {
        if let Some(max) = self.criterion.max_evaluations {
            if self.evaluations >= max {
                return Err(Interrupt::MaxEvaluations);
            }
        }
        if let Some(max_time) = self.criterion.max_time {
            if self.start_time.elapsed() >= max_time {
                return Err(Interrupt::MaxTime);
            }
        }

        self.evaluations += 1;
        let (value, gradient) = self
            .cost_fn
            .cost_and_gradient(&point)
            .map_err(Interrupt::Error)?;
        trace!(
            "evaluation {}: f = {:.12e}, |g| = {:.6e}",
            self.evaluations,
            value,
            gradient.norm()
        );

        if value.is_finite() && self.best.as_ref().map_or(true, |(_, best)| value < *best) {
            self.best = Some((point.clone(), value));
        }

        if let Some(stop) = self.criterion.stop_value {
            if value <= stop {
                return Err(Interrupt::StopValue);
            }
        }

        Ok(Iterate {
            point,
            value,
            gradient,
        })
    }

    /// Records the move from `previous` to `current` as an accepted iterate.
    ///
    /// Returns the termination reason if a tolerance test is satisfied.
    pub fn accept(
        &mut self,
        previous: &Iterate,
        current: &Iterate,
    ) -> Result<Option<TerminationReason>, Interrupt> {
        self.iterations += 1;
        debug!(
            "iteration {}: f = {:.12e} (change {:.3e}), evaluations = {}",
            self.iterations,
            current.value,
            current.value - previous.value,
            self.evaluations
        );

        let info = IterationInfo {
            iteration: self.iterations,
            value: current.value,
            point: &current.point,
            evaluations: self.evaluations,
            elapsed: self.start_time.elapsed(),
        };
        if !self
            .callback
            .on_iteration_end(&info)
            .map_err(Interrupt::Error)?
        {
            return Err(Interrupt::ForcedStop);
        }

        Ok(ConvergenceChecker::check(
            self.criterion,
            previous.value,
            current.value,
            &previous.point,
            &current.point,
        ))
    }

    /// Builds the result of the run.
    ///
    /// The reported point is the best finite evaluation seen; if there was
    /// none, the projected starting point with a NaN value.
    pub fn finish(
        self,
        optimizer: &str,
        outcome: Result<TerminationReason, Interrupt>,
    ) -> OptimizationResult {
        let reason = match outcome {
            Ok(reason) => reason,
            Err(interrupt) => {
                match &interrupt {
                    Interrupt::Error(err) => warn!("{}: run aborted: {}", optimizer, err),
                    Interrupt::LineSearch(err) => {
                        debug!("{}: no further progress: {}", optimizer, err)
                    }
                    _ => {}
                }
                interrupt.termination_reason()
            }
        };

        let (point, value) = match self.best {
            Some(best) => best,
            None => (self.origin, f64::NAN),
        };

        let result = OptimizationResult::new(
            point,
            value,
            self.iterations,
            self.start_time.elapsed(),
            reason,
        )
        .with_evaluations(self.evaluations);

        info!(
            "{} finished: {} after {} iterations and {} evaluations, f = {:.12e}",
            optimizer, reason, result.iterations, result.evaluations, result.value
        );
        if let Err(err) = self.callback.on_optimization_end(&result) {
            warn!("{}: callback failed at the end of the run: {}", optimizer, err);
        }
        result
    }
}
