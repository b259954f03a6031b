//! Optimization driver.
//!
//! The driver turns a [`PlnConfig`] into box constraints and a stopping
//! criterion, binds the objective to a fresh evaluation context and runs the
//! selected algorithm once.

use crate::{
    config::PlnConfig,
    context::EvaluationContext,
    data::PlnData,
    evaluator::{ObjectiveEvaluator, PlnObjective},
    registry::Algorithm,
};
use log::{debug, info, warn};
use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    error::{OptimizerError, Result},
    optimizer::TerminationReason,
    types::{Matrix, Vector},
};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Final state of a PLN fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlnResult {
    /// Integer status code of the termination reason
    pub status: i32,
    /// Objective value at `solution`
    pub objective: f64,
    /// Flat parameter vector (Θ, M, S)
    pub solution: Vec<f64>,
    /// Number of objective evaluations
    pub iterations: usize,
    /// Why the run stopped
    pub termination: TerminationReason,
}

impl PlnResult {
    fn from_termination(
        termination: TerminationReason,
        objective: f64,
        solution: Vec<f64>,
        iterations: usize,
    ) -> Self {
        Self {
            status: termination.code(),
            objective,
            solution,
            iterations,
            termination,
        }
    }

    /// Result of a run that was refused before the first evaluation.
    fn invalid_args(initial: &[f64]) -> Self {
        Self::from_termination(TerminationReason::InvalidArgs, f64::NAN, initial.to_vec(), 0)
    }

    /// True if the run ended on a positive status code.
    pub fn is_success(&self) -> bool {
        self.termination.is_success()
    }
}

/// Runs one PLN fit with a resolved algorithm.
pub struct OptimizationDriver<'cb> {
    config: PlnConfig,
    algorithm: Algorithm,
    callback: Option<&'cb mut dyn OptimizationCallback>,
}

impl<'cb> OptimizationDriver<'cb> {
    /// Creates a driver for `config`.
    ///
    /// # Errors
    /// `InvalidAlgorithm` if `config.algorithm` is not a supported name.
    pub fn new(config: PlnConfig) -> Result<Self> {
        let algorithm = Algorithm::resolve(&config.algorithm)?;
        Ok(Self {
            config,
            algorithm,
            callback: None,
        })
    }

    /// Reports every accepted iterate to `callback`.
    pub fn with_callback(mut self, callback: &'cb mut dyn OptimizationCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn config(&self) -> &PlnConfig {
        &self.config
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Minimizes the PLN objective of `data` starting from `initial`.
    ///
    /// The starting point is clamped into the bounds before the first
    /// evaluation. Invalid tolerances or a starting vector of the wrong
    /// length give an [`InvalidArgs`](TerminationReason::InvalidArgs) result
    /// without evaluating the objective.
    pub fn run(self, initial: &[f64], data: &PlnData) -> Result<PlnResult> {
        let layout = data.layout();
        if let Err(err) = self.config.validate() {
            warn!("PLN fit refused: {}", err);
            return Ok(PlnResult::invalid_args(initial));
        }
        if initial.len() != layout.n_param() {
            warn!(
                "PLN fit refused: {}",
                OptimizerError::dimension_mismatch(layout.n_param(), initial.len())
            );
            return Ok(PlnResult::invalid_args(initial));
        }
        let bounds = match BoxConstraints::lower_only(layout.lower_bounds(self.config.lbvar)) {
            Ok(bounds) => bounds,
            Err(err) => {
                warn!("PLN fit refused: {}", err);
                return Ok(PlnResult::invalid_args(initial));
            }
        };
        let criterion = self.config.stopping_criterion(&layout);

        debug!(
            "PLN fit with {}: n = {}, p = {}, d = {}, {} parameters",
            self.algorithm,
            layout.n(),
            layout.p(),
            layout.d(),
            layout.n_param()
        );

        let evaluator = ObjectiveEvaluator::new(data);
        let mut context = EvaluationContext::new(data);
        let mut optimizer = self.algorithm.build();
        let x0 = Vector::from_column_slice(initial);

        let outcome = {
            let mut objective = PlnObjective::new(&evaluator, &mut context);
            match self.callback {
                Some(callback) => optimizer.minimize_with_callback(
                    &mut objective,
                    &bounds,
                    &x0,
                    &criterion,
                    callback,
                ),
                None => optimizer.minimize(&mut objective, &bounds, &x0, &criterion),
            }
        };

        let result = match outcome {
            Ok(result) => PlnResult::from_termination(
                result.termination_reason,
                result.value,
                result.point.as_slice().to_vec(),
                context.evaluation_count(),
            ),
            Err(err) => {
                warn!("{} refused the problem: {}", self.algorithm, err);
                PlnResult::from_termination(
                    TerminationReason::InvalidArgs,
                    f64::NAN,
                    initial.to_vec(),
                    context.evaluation_count(),
                )
            }
        };

        info!(
            "PLN fit with {} finished: {} after {} evaluations, objective = {:.12e}",
            self.algorithm, result.termination, result.iterations, result.objective
        );
        Ok(result)
    }
}

impl fmt::Debug for OptimizationDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimizationDriver")
            .field("config", &self.config)
            .field("algorithm", &self.algorithm)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// Fits a PLN model: the single entry point of the crate.
///
/// `par` is the flat starting vector (Θ, M, S), `y` the n × p counts, `x`
/// the n × d covariates, `o` the n × p offsets and `ky` the constant added
/// to the objective.
///
/// # Errors
/// `InvalidAlgorithm` if `config.algorithm` is unknown. Every other problem
/// is reported through the status of the returned [`PlnResult`].
///
/// # Example
/// ```
/// use plnopt::prelude::*;
///
/// let y = Matrix::from_row_slice(2, 1, &[1.0, 3.0]);
/// let x = Matrix::from_element(2, 1, 1.0);
/// let o = Matrix::zeros(2, 1);
/// // Θ, then M, then S
/// let par = [0.0, 0.0, 0.0, 1.0, 1.0];
///
/// let config = PlnConfig::new().with_algorithm("LBFGS");
/// let result = optimize_pln(&par, &y, &x, &o, 0.0, &config).unwrap();
/// assert_eq!(result.solution.len(), 5);
/// assert!(result.iterations > 0);
/// ```
pub fn optimize_pln(
    par: &[f64],
    y: &Matrix,
    x: &Matrix,
    o: &Matrix,
    ky: f64,
    config: &PlnConfig,
) -> Result<PlnResult> {
    let driver = OptimizationDriver::new(config.clone())?;
    let data = match PlnData::new(y.clone(), x.clone(), o.clone(), ky) {
        Ok(data) => data,
        Err(err) => {
            warn!("PLN fit refused: {}", err);
            return Ok(PlnResult::invalid_args(par));
        }
    };
    driver.run(par, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plnopt_core::callback::HistoryCallback;
    use pretty_assertions::assert_eq;

    fn data() -> PlnData {
        PlnData::new(
            Matrix::from_row_slice(3, 2, &[0.0, 2.0, 1.0, 3.0, 4.0, 0.0]),
            Matrix::from_element(3, 1, 1.0),
            Matrix::zeros(3, 2),
            0.0,
        )
        .unwrap()
    }

    fn start(data: &PlnData) -> Vec<f64> {
        let layout = data.layout();
        let mut x = vec![0.0; layout.n_param()];
        for i in layout.s_range() {
            x[i] = 1.0;
        }
        x
    }

    #[test]
    fn test_unknown_algorithm_is_rejected_at_construction() {
        let err = OptimizationDriver::new(PlnConfig::new().with_algorithm("NELDERMEAD")).unwrap_err();
        assert!(matches!(err, OptimizerError::InvalidAlgorithm { .. }));
    }

    #[test]
    fn test_wrong_length_gives_invalid_args() {
        let data = data();
        let initial = vec![0.5; 4];
        let result = OptimizationDriver::new(PlnConfig::new())
            .unwrap()
            .run(&initial, &data)
            .unwrap();
        assert_eq!(result.status, -2);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.solution, initial);
        assert!(result.objective.is_nan());
    }

    #[test]
    fn test_invalid_tolerance_gives_invalid_args() {
        let data = data();
        let initial = start(&data);
        let result = OptimizationDriver::new(PlnConfig::new().with_ftol_rel(-1.0))
            .unwrap()
            .run(&initial, &data)
            .unwrap();
        assert_eq!(result.termination, TerminationReason::InvalidArgs);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_run_decreases_objective() {
        let data = data();
        let initial = start(&data);
        let evaluator = ObjectiveEvaluator::new(&data);
        let mut ctx = EvaluationContext::new(&data);
        let initial_objective = evaluator.evaluate(&initial, false, &mut ctx).unwrap().objective;

        let config = PlnConfig::new().with_algorithm("LBFGS").with_maxeval(50);
        let result = OptimizationDriver::new(config).unwrap().run(&initial, &data).unwrap();
        assert!((1..=4).contains(&result.status), "{}", result.termination);
        assert!(result.objective < initial_objective);
        assert!(result.iterations <= 50);
        assert_eq!(result.status, result.termination.code());
    }

    #[test]
    fn test_non_positive_variance_floor_gives_invalid_args() {
        let data = data();
        let initial = start(&data);
        for lbvar in [0.0, -1e-3] {
            let result = OptimizationDriver::new(PlnConfig::new().with_lbvar(lbvar))
                .unwrap()
                .run(&initial, &data)
                .unwrap();
            assert_eq!(result.termination, TerminationReason::InvalidArgs);
            assert_eq!(result.iterations, 0);
            assert_eq!(result.solution, initial);
        }
    }

    #[test]
    fn test_callback_sees_accepted_iterates() {
        let data = data();
        let initial = start(&data);
        let mut history = HistoryCallback::new();
        let result = OptimizationDriver::new(PlnConfig::new().with_algorithm("VAR2"))
            .unwrap()
            .with_callback(&mut history)
            .run(&initial, &data)
            .unwrap();
        assert!(!history.values.is_empty());
        assert!(history.is_monotone());
        assert!(result.iterations > history.values.len());
    }

    #[test]
    fn test_callback_can_stop_the_run() {
        let data = data();
        let initial = start(&data);
        let mut history = HistoryCallback::new().with_stop_after(2);
        let result = OptimizationDriver::new(PlnConfig::new().with_algorithm("MMA"))
            .unwrap()
            .with_callback(&mut history)
            .run(&initial, &data)
            .unwrap();
        assert_eq!(result.termination, TerminationReason::ForcedStop);
        assert_eq!(result.status, -5);
        assert_eq!(history.values.len(), 2);
    }

    #[test]
    fn test_bad_data_gives_invalid_args() {
        let y = Matrix::from_element(2, 2, 1.0);
        let x = Matrix::from_element(3, 1, 1.0);
        let o = Matrix::zeros(2, 2);
        let result = optimize_pln(&[0.0; 10], &y, &x, &o, 0.0, &PlnConfig::new()).unwrap();
        assert_eq!(result.termination, TerminationReason::InvalidArgs);
    }
}
