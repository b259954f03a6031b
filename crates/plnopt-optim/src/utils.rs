//! Utility functions for optimizers.
//!
//! This module provides common functionality used across different optimizers
//! to reduce code duplication.

use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    cost_function::CostFunction,
    error::Result,
    optimizer::{validate_problem, OptimizationResult, StoppingCriterion, TerminationReason},
    session::{Interrupt, Session},
    types::Vector,
};

/// Runs `body` inside a fresh [`Session`] and assembles the result.
///
/// Argument errors are returned before the first evaluation.
pub(crate) fn run_session<F>(
    name: &str,
    cost_fn: &mut dyn CostFunction,
    bounds: &BoxConstraints,
    initial_point: &Vector,
    stopping_criterion: &StoppingCriterion,
    callback: &mut dyn OptimizationCallback,
    body: F,
) -> Result<OptimizationResult>
where
    F: FnOnce(&mut Session<'_>) -> std::result::Result<TerminationReason, Interrupt>,
{
    validate_problem(bounds, initial_point, stopping_criterion)?;
    log::debug!(
        "{}: starting on {} variables (max evaluations: {:?})",
        name,
        initial_point.len(),
        stopping_criterion.max_evaluations
    );

    let mut session = Session::new(cost_fn, bounds, stopping_criterion, callback, initial_point);
    let outcome = body(&mut session);
    Ok(session.finish(name, outcome))
}

/// Free-variable mask: `true` for coordinates not held at a bound.
pub(crate) fn free_variables(bounds: &BoxConstraints, x: &Vector, gradient: &Vector) -> Vec<bool> {
    bounds
        .active_set(x, gradient)
        .into_iter()
        .map(|active| !active)
        .collect()
}

/// Zeroes the components of `v` outside the free set.
pub(crate) fn restrict(v: &mut Vector, free: &[bool]) {
    for (i, is_free) in free.iter().enumerate() {
        if !is_free {
            v[i] = 0.0;
        }
    }
}

/// Dot product over the free coordinates only.
pub(crate) fn masked_dot(a: &Vector, b: &Vector, free: &[bool]) -> f64 {
    free.iter()
        .enumerate()
        .filter(|(_, is_free)| **is_free)
        .map(|(i, _)| a[i] * b[i])
        .sum()
}

/// True if the vector is exactly zero.
pub(crate) fn is_zero(v: &Vector) -> bool {
    v.iter().all(|x| *x == 0.0)
}

/// First trial step along a steepest descent direction: moves at most a unit
/// distance.
pub(crate) fn steepest_descent_step(gradient_norm: f64) -> f64 {
    if gradient_norm > 0.0 {
        (1.0 / gradient_norm).min(1.0)
    } else {
        1.0
    }
}

/// True if `direction` is a finite descent direction for `gradient`.
pub(crate) fn is_descent(direction: &Vector, gradient: &Vector) -> bool {
    let slope = direction.dot(gradient);
    slope.is_finite() && slope < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_free_variables_and_restrict() {
        let bounds = BoxConstraints::lower_only(Vector::from_vec(vec![0.0, 0.0])).unwrap();
        let x = Vector::from_vec(vec![0.0, 1.0]);
        let g = Vector::from_vec(vec![1.0, 1.0]);
        let free = free_variables(&bounds, &x, &g);
        assert_eq!(free, vec![false, true]);

        let mut v = Vector::from_vec(vec![3.0, 4.0]);
        restrict(&mut v, &free);
        assert_eq!(v, Vector::from_vec(vec![0.0, 4.0]));
        assert_relative_eq!(masked_dot(&g, &Vector::from_vec(vec![5.0, 2.0]), &free), 2.0);
    }

    #[test]
    fn test_descent_helpers() {
        let g = Vector::from_vec(vec![1.0, -1.0]);
        assert!(is_descent(&-&g, &g));
        assert!(!is_descent(&g, &g));
        assert!(!is_descent(&Vector::from_vec(vec![f64::NAN, 0.0]), &g));
        assert_relative_eq!(steepest_descent_step(4.0), 0.25);
        assert_relative_eq!(steepest_descent_step(0.5), 1.0);
        assert!(is_zero(&Vector::zeros(3)));
    }
}
