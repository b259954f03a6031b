//! Shifted limited-memory variable metric methods.
//!
//! The inverse Hessian is approximated as a scaled identity plus a small
//! number of low-rank corrections:
//!
//! ```text
//! H_k = ζ I + Σ_i C_i
//! ```
//!
//! The shift `ζ = sᵀy / yᵀy` is taken from the first pair after each memory
//! reset. Two correction families are available:
//!
//! - **Rank one** (symmetric rank-one): `C_i = u_i u_iᵀ / (u_iᵀ y_i)` with
//!   `u_i = s_i − H_i y_i`. The approximation need not stay positive
//!   definite; non-descent directions trigger a reset.
//! - **Rank two** (BFGS in product form): each correction stores `s_i`,
//!   `H_i y_i` and two scalars, so `H_k v` costs `O(m n)` without any
//!   recursion.
//!
//! When the memory is full it is restarted from the newest pair, which keeps
//! every stored correction consistent with the matrix it was computed from.
//!
//! # References
//!
//! - Vlček & Lukšan, "Shifted limited-memory variable metric methods for
//!   large-scale unconstrained optimization" (2006)

use crate::utils::{free_variables, is_descent, is_zero, restrict, run_session, steepest_descent_step};
use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    line_search::{BacktrackingLineSearch, LineSearch, LineSearchParams},
    optimizer::{OptimizationResult, Optimizer, StoppingCriterion, TerminationReason},
    session::{Interrupt, Session},
    types::{constants, Vector},
};

/// Rank of the corrections added to the shifted identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableMetricUpdate {
    /// Symmetric rank-one corrections
    RankOne,
    /// BFGS rank-two corrections
    RankTwo,
}

/// Configuration for [`VariableMetric`].
#[derive(Debug, Clone)]
pub struct VariableMetricConfig {
    /// Correction family
    pub update: VariableMetricUpdate,
    /// Maximum number of stored corrections
    pub memory_size: usize,
    /// Relative threshold below which a correction is skipped
    pub skip_tolerance: f64,
    /// Line search parameters
    pub line_search: LineSearchParams,
}

impl Default for VariableMetricConfig {
    fn default() -> Self {
        Self {
            update: VariableMetricUpdate::RankTwo,
            memory_size: 10,
            skip_tolerance: 1e-8,
            line_search: LineSearchParams::backtracking(),
        }
    }
}

impl VariableMetricConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank-one configuration.
    pub fn rank_one() -> Self {
        Self {
            update: VariableMetricUpdate::RankOne,
            ..Self::default()
        }
    }

    /// Rank-two configuration.
    pub fn rank_two() -> Self {
        Self::default()
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    pub fn with_skip_tolerance(mut self, tol: f64) -> Self {
        self.skip_tolerance = tol;
        self
    }

    pub fn with_line_search(mut self, params: LineSearchParams) -> Self {
        self.line_search = params;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "memory size must be positive",
                "memory_size",
                "0",
            ));
        }
        if !(self.skip_tolerance >= 0.0) {
            return Err(OptimizerError::invalid_configuration(
                "skip tolerance must be non-negative",
                "skip_tolerance",
                self.skip_tolerance.to_string(),
            ));
        }
        self.line_search.validate()
    }
}

#[derive(Debug, Clone)]
enum Correction {
    RankOne { u: Vector, inv_curvature: f64 },
    RankTwo { s: Vector, hy: Vector, rho: f64, yhy: f64 },
}

impl Correction {
    /// Adds this correction's contribution to `H v` into `out`.
    fn apply(&self, v: &Vector, out: &mut Vector) {
        match self {
            Correction::RankOne { u, inv_curvature } => {
                out.axpy(u.dot(v) * inv_curvature, u, 1.0);
            }
            Correction::RankTwo { s, hy, rho, yhy } => {
                let sv = s.dot(v);
                let hyv = hy.dot(v);
                let a = -rho * hyv + rho * rho * yhy * sv + rho * sv;
                let b = -rho * sv;
                out.axpy(a, s, 1.0);
                out.axpy(b, hy, 1.0);
            }
        }
    }
}

/// Shifted identity plus low-rank corrections.
#[derive(Debug, Clone)]
pub struct ShiftedMemory {
    update: VariableMetricUpdate,
    capacity: usize,
    skip_tolerance: f64,
    zeta: Option<f64>,
    corrections: Vec<Correction>,
}

impl ShiftedMemory {
    pub fn new(update: VariableMetricUpdate, capacity: usize, skip_tolerance: f64) -> Self {
        Self {
            update,
            capacity,
            skip_tolerance,
            zeta: None,
            corrections: Vec::with_capacity(capacity),
        }
    }

    /// Number of stored corrections.
    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    /// True once a shift has been taken from a curvature pair.
    pub fn has_curvature(&self) -> bool {
        self.zeta.is_some()
    }

    /// Current shift ζ (1 before any curvature pair was seen).
    pub fn shift(&self) -> f64 {
        self.zeta.unwrap_or(1.0)
    }

    pub fn reset(&mut self) {
        self.corrections.clear();
        self.zeta = None;
    }

    /// `H v`.
    pub fn apply(&self, v: &Vector) -> Vector {
        let mut out = v * self.shift();
        for correction in &self.corrections {
            correction.apply(v, &mut out);
        }
        out
    }

    /// Incorporates the step `s` and gradient change `y`.
    ///
    /// Returns whether a correction was stored.
    pub fn update(&mut self, s: &Vector, y: &Vector) -> bool {
        let sy = s.dot(y);
        let yy = y.dot(y);
        if !(sy > constants::EPSILON * yy) || !sy.is_finite() || !yy.is_finite() {
            return false;
        }

        if self.corrections.len() >= self.capacity {
            self.reset();
        }
        if self.zeta.is_none() {
            self.zeta = Some(sy / yy);
        }

        let hy = self.apply(y);
        let correction = match self.update {
            VariableMetricUpdate::RankOne => {
                let u = s - &hy;
                let curvature = u.dot(y);
                if curvature.abs() <= self.skip_tolerance * u.norm() * y.norm() {
                    return false;
                }
                Correction::RankOne {
                    u,
                    inv_curvature: 1.0 / curvature,
                }
            }
            VariableMetricUpdate::RankTwo => {
                let yhy = y.dot(&hy);
                Correction::RankTwo {
                    s: s.clone(),
                    hy,
                    rho: 1.0 / sy,
                    yhy,
                }
            }
        };
        self.corrections.push(correction);
        true
    }
}

/// Shifted limited-memory variable metric optimizer.
#[derive(Debug)]
pub struct VariableMetric {
    config: VariableMetricConfig,
    memory: ShiftedMemory,
}

impl VariableMetric {
    pub fn new(config: VariableMetricConfig) -> Self {
        let memory = ShiftedMemory::new(config.update, config.memory_size, config.skip_tolerance);
        Self { config, memory }
    }

    pub fn config(&self) -> &VariableMetricConfig {
        &self.config
    }

    fn run(&mut self, session: &mut Session<'_>) -> std::result::Result<TerminationReason, Interrupt> {
        self.memory = ShiftedMemory::new(
            self.config.update,
            self.config.memory_size,
            self.config.skip_tolerance,
        );
        let mut line_search = BacktrackingLineSearch::new();

        let mut current = session.start()?;
        loop {
            let projected = session
                .bounds()
                .projected_gradient(&current.point, &current.gradient);
            if is_zero(&projected) {
                return Ok(TerminationReason::Success);
            }
            let free = free_variables(session.bounds(), &current.point, &current.gradient);

            let mut direction = -self.memory.apply(&projected);
            restrict(&mut direction, &free);
            let step = if !self.memory.has_curvature() || !is_descent(&direction, &projected) {
                if self.memory.has_curvature() {
                    log::debug!("{}: metric lost descent, resetting", self.name());
                    self.memory.reset();
                }
                direction = -&projected;
                steepest_descent_step(projected.norm())
            } else {
                1.0
            };

            let next = match line_search.search(
                session,
                &current,
                &direction,
                step,
                &self.config.line_search,
            ) {
                Ok(result) => result.iterate,
                Err(Interrupt::LineSearch(_)) if self.memory.has_curvature() => {
                    self.memory.reset();
                    continue;
                }
                Err(interrupt) => return Err(interrupt),
            };

            let s = &next.point - &current.point;
            let y = &next.gradient - &current.gradient;
            self.memory.update(&s, &y);

            if let Some(reason) = session.accept(&current, &next)? {
                return Ok(reason);
            }
            current = next;
        }
    }
}

impl Optimizer for VariableMetric {
    fn name(&self) -> &str {
        match self.config.update {
            VariableMetricUpdate::RankOne => "Shifted variable metric (rank 1)",
            VariableMetricUpdate::RankTwo => "Shifted variable metric (rank 2)",
        }
    }

    fn minimize_with_callback(
        &mut self,
        cost_fn: &mut dyn CostFunction,
        bounds: &BoxConstraints,
        initial_point: &Vector,
        stopping_criterion: &StoppingCriterion,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<OptimizationResult> {
        self.config.validate()?;
        let name = self.name().to_string();
        run_session(
            &name,
            cost_fn,
            bounds,
            initial_point,
            stopping_criterion,
            callback,
            |session| self.run(session),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;
    use plnopt_core::cost_function::QuadraticCost;

    fn spd() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0])
    }

    #[test]
    fn test_secant_condition() {
        let a = spd();
        let steps = [
            Vector::from_vec(vec![1.0, 0.0, 0.0]),
            Vector::from_vec(vec![0.3, -1.0, 0.2]),
        ];

        let mut memory = ShiftedMemory::new(VariableMetricUpdate::RankTwo, 5, 1e-10);
        for s in &steps {
            let y = &a * s;
            assert!(memory.update(s, &y));
            assert_relative_eq!(memory.apply(&y), s.clone(), epsilon = 1e-10);
        }
        assert_eq!(memory.len(), 2);

        // The first pair only sets the shift: its rank-one correction is
        // orthogonal to y and gets skipped.
        let mut memory = ShiftedMemory::new(VariableMetricUpdate::RankOne, 5, 1e-10);
        let y = &a * &steps[0];
        assert!(!memory.update(&steps[0], &y));
        assert!(memory.has_curvature());
        assert_relative_eq!(memory.shift(), steps[0].dot(&y) / y.dot(&y));

        let y = &a * &steps[1];
        assert!(memory.update(&steps[1], &y));
        assert_relative_eq!(memory.apply(&y), steps[1].clone(), epsilon = 1e-10);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_rank_two_matches_bfgs_matrix() {
        let a = spd();
        let s = Vector::from_vec(vec![0.5, 0.2, -0.4]);
        let y = &a * &s;
        let mut memory = ShiftedMemory::new(VariableMetricUpdate::RankTwo, 5, 1e-10);
        memory.update(&s, &y);

        let zeta = s.dot(&y) / y.dot(&y);
        let rho = 1.0 / s.dot(&y);
        let i = DMatrix::<f64>::identity(3, 3);
        let left = &i - (&s * y.transpose()) * rho;
        let right = &i - (&y * s.transpose()) * rho;
        let h = &left * (&i * zeta) * &right + (&s * s.transpose()) * rho;

        let v = Vector::from_vec(vec![1.0, -2.0, 0.5]);
        assert_relative_eq!(memory.apply(&v), &h * &v, epsilon = 1e-12);
    }

    #[test]
    fn test_memory_restarts_when_full() {
        let a = spd();
        let mut memory = ShiftedMemory::new(VariableMetricUpdate::RankTwo, 2, 1e-10);
        for k in 0..3 {
            let s = Vector::from_vec(vec![1.0, k as f64, -1.0]);
            memory.update(&s, &(&a * &s));
        }
        assert_eq!(memory.len(), 1);

        assert!(!memory.update(&Vector::from_vec(vec![1.0, 0.0, 0.0]), &Vector::from_vec(vec![-1.0, 0.0, 0.0])));
    }

    #[test]
    fn test_variable_metric_quadratic() {
        let a = spd();
        let b = Vector::from_vec(vec![-1.0, 2.0, -3.0]);
        let expected = a.clone().lu().solve(&(-&b)).unwrap();

        for config in [VariableMetricConfig::rank_one(), VariableMetricConfig::rank_two()] {
            let mut cost = QuadraticCost::new(a.clone(), b.clone(), 0.0).unwrap();
            let mut optimizer = VariableMetric::new(config);
            let criterion = StoppingCriterion::new()
                .with_ftol_rel(1e-14)
                .with_xtol_rel(1e-10)
                .with_max_evaluations(500);
            let result = optimizer
                .minimize(&mut cost, &BoxConstraints::unbounded(3), &Vector::zeros(3), &criterion)
                .unwrap();
            assert_relative_eq!(result.point, expected, epsilon = 1e-5);
        }
    }
}
