//! Integration tests for plnopt-optim
//!
//! Every algorithm variant is run on small smooth problems with bounds and
//! checked for feasibility, accuracy, budget handling and monotone progress.

use approx::assert_relative_eq;
use plnopt_core::prelude::*;
use plnopt_core::test_utils::{ExpSum, Rosenbrock, ShiftedQuadratic};
use plnopt_optim::{
    Ccsa, CcsaConfig, LBFGSConfig, TruncatedNewton, TruncatedNewtonConfig, VariableMetric,
    VariableMetricConfig, LBFGS,
};
use pretty_assertions::assert_eq;

fn all_optimizers() -> Vec<Box<dyn Optimizer>> {
    vec![
        Box::new(LBFGS::new(LBFGSConfig::nocedal())),
        Box::new(LBFGS::new(LBFGSConfig::new())),
        Box::new(VariableMetric::new(VariableMetricConfig::rank_one())),
        Box::new(VariableMetric::new(VariableMetricConfig::rank_two())),
        Box::new(TruncatedNewton::new(TruncatedNewtonConfig::new())),
        Box::new(TruncatedNewton::new(TruncatedNewtonConfig::restarting())),
        Box::new(TruncatedNewton::new(TruncatedNewtonConfig::preconditioned())),
        Box::new(TruncatedNewton::new(
            TruncatedNewtonConfig::preconditioned_restarting(),
        )),
        Box::new(Ccsa::new(CcsaConfig::mma())),
        Box::new(Ccsa::new(CcsaConfig::quadratic())),
    ]
}

#[test]
fn test_names_are_distinct() {
    let names: Vec<String> = all_optimizers()
        .iter()
        .map(|optimizer| optimizer.name().to_string())
        .collect();
    let mut unique = names.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), names.len());
}

#[test]
fn test_bounded_quadratic() {
    // The unconstrained minimum (-1, 0.5, 2) violates the first bound.
    let bounds = BoxConstraints::lower_only(Vector::from_vec(vec![0.0, 0.0, 0.0])).unwrap();
    let expected = Vector::from_vec(vec![0.0, 0.5, 2.0]);

    for mut optimizer in all_optimizers() {
        let mut cost = ShiftedQuadratic::new(
            Vector::from_vec(vec![1.0, 2.0, 0.5]),
            Vector::from_vec(vec![-1.0, 0.5, 2.0]),
        );
        let criterion = StoppingCriterion::new()
            .with_ftol_rel(1e-10)
            .with_max_evaluations(3000);
        let result = optimizer
            .minimize(&mut cost, &bounds, &Vector::from_vec(vec![1.0, 1.0, 1.0]), &criterion)
            .unwrap();

        assert!(bounds.contains(&result.point), "{} left the box", optimizer.name());
        assert_relative_eq!(result.point, expected, epsilon = 1e-3);
        assert_relative_eq!(result.value, 1.0, epsilon = 1e-5);
    }
}

#[test]
fn test_exponential_objective_with_active_bound() {
    // Minimum of exp(x) - a x is ln(a); ln(0.5) < 0 is cut off by the bound.
    let a = Vector::from_vec(vec![2.0, 0.5, 3.0]);
    let bounds = BoxConstraints::lower_only(Vector::from_element(3, 0.0)).unwrap();
    let expected = Vector::from_vec(vec![2.0_f64.ln(), 0.0, 3.0_f64.ln()]);

    for mut optimizer in all_optimizers() {
        let mut cost = ExpSum::new(a.clone());
        let criterion = StoppingCriterion::new()
            .with_ftol_rel(1e-12)
            .with_max_evaluations(3000);
        let result = optimizer
            .minimize(&mut cost, &bounds, &Vector::from_element(3, 2.0), &criterion)
            .unwrap();

        assert!(bounds.contains(&result.point));
        assert_relative_eq!(result.point, expected, epsilon = 1e-3);
    }
}

#[test]
fn test_evaluation_budget() {
    for mut optimizer in all_optimizers() {
        let mut cost = Rosenbrock::new(2);
        let criterion = StoppingCriterion::new().with_max_evaluations(7);
        let result = optimizer
            .minimize(
                &mut cost,
                &BoxConstraints::unbounded(2),
                &Vector::from_vec(vec![-1.2, 1.0]),
                &criterion,
            )
            .unwrap();

        assert_eq!(result.termination_reason, TerminationReason::MaxEvalReached);
        assert_eq!(result.evaluations, 7);
        // never worse than the start
        assert!(result.value <= 24.2 + 1e-12, "{}", optimizer.name());
    }
}

#[test]
fn test_accepted_values_are_monotone() {
    let bounds = BoxConstraints::new(
        Vector::from_vec(vec![-2.0, -2.0]),
        Vector::from_vec(vec![2.0, 0.5]),
    )
    .unwrap();

    for mut optimizer in all_optimizers() {
        let mut cost = Rosenbrock::new(2);
        let mut history = HistoryCallback::new();
        let criterion = StoppingCriterion::new()
            .with_ftol_rel(1e-10)
            .with_max_evaluations(500);
        let result = optimizer
            .minimize_with_callback(
                &mut cost,
                &bounds,
                &Vector::from_vec(vec![-1.2, 1.0]),
                &criterion,
                &mut history,
            )
            .unwrap();

        assert!(!history.values.is_empty(), "{}", optimizer.name());
        assert!(history.is_monotone(), "{}", optimizer.name());
        assert_eq!(result.iterations, history.values.len());
        assert!(bounds.contains(&result.point));
    }
}

#[test]
fn test_forced_stop() {
    for mut optimizer in all_optimizers() {
        let mut cost = Rosenbrock::new(2);
        let mut history = HistoryCallback::new().with_stop_after(3);
        let result = optimizer
            .minimize_with_callback(
                &mut cost,
                &BoxConstraints::unbounded(2),
                &Vector::from_vec(vec![-1.2, 1.0]),
                &StoppingCriterion::new(),
                &mut history,
            )
            .unwrap();

        assert_eq!(result.termination_reason, TerminationReason::ForcedStop);
        assert_eq!(result.termination_reason.code(), -5);
        assert_eq!(history.values.len(), 3);
    }
}

#[test]
fn test_invalid_arguments_fail_before_evaluation() {
    for mut optimizer in all_optimizers() {
        let mut calls = 0;
        let mut cost = FnCostFunction::new("counting", |x: &Vector| -> Result<(f64, Vector)> {
            calls += 1;
            Ok((x.norm_squared(), x * 2.0))
        });
        let outcome = optimizer.minimize(
            &mut cost,
            &BoxConstraints::unbounded(2),
            &Vector::zeros(3),
            &StoppingCriterion::new(),
        );
        assert!(outcome.is_err());
        drop(cost);
        assert_eq!(calls, 0);
    }
}
