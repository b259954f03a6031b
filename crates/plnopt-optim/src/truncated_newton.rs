//! Bound-constrained truncated Newton optimizer.
//!
//! Each outer iteration approximately solves the Newton system restricted to
//! the free variables,
//!
//! ```text
//! H_FF d_F = -g_F
//! ```
//!
//! with a conjugate gradient loop that stops once the residual has dropped
//! by the forcing factor `η = min(0.5, sqrt(‖g_F‖))`. Hessian-vector products
//! are forward differences of the gradient,
//!
//! ```text
//! H v ≈ (∇f(x + h v) − ∇f(x)) / h,   h = sqrt(ε) (1 + ‖x‖) / ‖v‖
//! ```
//!
//! taken backwards when the forward point leaves the box. Every product costs
//! one objective evaluation and counts against the budget.
//!
//! Four variants are obtained from two switches:
//!
//! - `preconditioned`: the inner loop is preconditioned by a limited-memory
//!   BFGS matrix built from the outer steps.
//! - `restart`: the inner loop always starts from zero and the BFGS memory is
//!   cleared every `restart_interval` outer iterations. Without it the inner
//!   loop is warm-started from the previous step and the memory keeps its
//!   newest pairs.
//!
//! The step is taken with a projected backtracking line search starting at
//! the full Newton step.

use crate::lbfgs::LBFGSState;
use crate::utils::{free_variables, is_descent, is_zero, restrict, run_session, steepest_descent_step};
use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    line_search::{BacktrackingLineSearch, LineSearch, LineSearchParams},
    optimizer::{OptimizationResult, Optimizer, StoppingCriterion, TerminationReason},
    session::{Interrupt, Iterate, Session},
    types::{constants, Vector},
};

/// Configuration for [`TruncatedNewton`].
#[derive(Debug, Clone)]
pub struct TruncatedNewtonConfig {
    /// Precondition the inner loop with the limited-memory BFGS matrix
    pub preconditioned: bool,
    /// Restart the inner loop and the memory periodically
    pub restart: bool,
    /// Number of curvature pairs kept for preconditioning
    pub memory_size: usize,
    /// Outer iterations between two restarts
    pub restart_interval: usize,
    /// Maximum number of conjugate gradient iterations per outer iteration
    pub max_inner_iterations: usize,
    /// Line search parameters
    pub line_search: LineSearchParams,
}

impl Default for TruncatedNewtonConfig {
    fn default() -> Self {
        Self {
            preconditioned: false,
            restart: false,
            memory_size: 10,
            restart_interval: 20,
            max_inner_iterations: 50,
            line_search: LineSearchParams::backtracking(),
        }
    }
}

impl TruncatedNewtonConfig {
    /// Plain truncated Newton.
    pub fn new() -> Self {
        Self::default()
    }

    /// Truncated Newton with periodic restarts.
    pub fn restarting() -> Self {
        Self::default().with_restart(true)
    }

    /// Preconditioned truncated Newton.
    pub fn preconditioned() -> Self {
        Self::default().with_preconditioning(true)
    }

    /// Preconditioned truncated Newton with periodic restarts.
    pub fn preconditioned_restarting() -> Self {
        Self::default()
            .with_preconditioning(true)
            .with_restart(true)
    }

    pub fn with_preconditioning(mut self, preconditioned: bool) -> Self {
        self.preconditioned = preconditioned;
        self
    }

    pub fn with_restart(mut self, restart: bool) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    pub fn with_restart_interval(mut self, interval: usize) -> Self {
        self.restart_interval = interval;
        self
    }

    pub fn with_max_inner_iterations(mut self, max_iter: usize) -> Self {
        self.max_inner_iterations = max_iter;
        self
    }

    pub fn with_line_search(mut self, params: LineSearchParams) -> Self {
        self.line_search = params;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.preconditioned && self.memory_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "preconditioning needs a positive memory size",
                "memory_size",
                "0",
            ));
        }
        if self.restart && self.restart_interval == 0 {
            return Err(OptimizerError::invalid_configuration(
                "restart interval must be positive",
                "restart_interval",
                "0",
            ));
        }
        if self.max_inner_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one inner iteration is required",
                "max_inner_iterations",
                "0",
            ));
        }
        self.line_search.validate()
    }
}

/// Truncated Newton optimizer with finite-difference Hessian products.
#[derive(Debug)]
pub struct TruncatedNewton {
    config: TruncatedNewtonConfig,
    memory: LBFGSState,
    previous_step: Option<Vector>,
}

impl TruncatedNewton {
    pub fn new(config: TruncatedNewtonConfig) -> Self {
        let memory = LBFGSState::new(config.memory_size);
        Self {
            config,
            memory,
            previous_step: None,
        }
    }

    pub fn config(&self) -> &TruncatedNewtonConfig {
        &self.config
    }

    /// Applies the preconditioner `M⁻¹` on the free subspace.
    fn precondition(&self, r: &Vector, free: &[bool]) -> Vector {
        if self.config.preconditioned && !self.memory.is_empty() {
            let z = self.memory.apply_inverse_hessian_free(r, free);
            if z.dot(r) > 0.0 {
                return z;
            }
        }
        let mut z = r.clone();
        restrict(&mut z, free);
        z
    }

    /// Forward-difference product of the Hessian with `v` on the free set.
    fn hessian_product(
        session: &mut Session<'_>,
        current: &Iterate,
        v: &Vector,
        free: &[bool],
    ) -> std::result::Result<Vector, Interrupt> {
        let norm = v.norm();
        if norm == 0.0 {
            return Ok(Vector::zeros(v.len()));
        }

        let mut h = constants::SQRT_EPSILON * (1.0 + current.point.norm()) / norm;
        let forward = &current.point + v * h;
        let point = if session.bounds().contains(&forward) {
            forward
        } else {
            h = -h;
            session.bounds().project(&(&current.point + v * h))
        };

        let probe = session.evaluate(point)?;
        let mut product = (&probe.gradient - &current.gradient) / h;
        restrict(&mut product, free);
        Ok(product)
    }

    /// Approximate solution of the reduced Newton system by (preconditioned)
    /// conjugate gradients.
    fn newton_direction(
        &self,
        session: &mut Session<'_>,
        current: &Iterate,
        projected: &Vector,
        free: &[bool],
    ) -> std::result::Result<Vector, Interrupt> {
        let n = projected.len();
        let residual_norm0 = projected.norm();
        let forcing = 0.5_f64.min(residual_norm0.sqrt());

        let mut d = Vector::zeros(n);
        let mut r = -projected;

        // Warm start from the previous step when it reduces the model.
        if let Some(previous) = self.previous_step.as_ref().filter(|_| !self.config.restart) {
            let mut d0 = previous.clone();
            restrict(&mut d0, free);
            let hd0 = Self::hessian_product(session, current, &d0, free)?;
            let model = projected.dot(&d0) + 0.5 * d0.dot(&hd0);
            if model.is_finite() && model < 0.0 {
                r -= &hd0;
                d = d0;
            }
        }

        let mut z = self.precondition(&r, free);
        let fallback = z.clone();
        let mut p = z.clone();
        let mut rz = r.dot(&z);

        for k in 0..self.config.max_inner_iterations {
            if r.norm() <= forcing * residual_norm0 {
                break;
            }

            let hp = Self::hessian_product(session, current, &p, free)?;
            let curvature = p.dot(&hp);
            if !(curvature > 0.0) || !curvature.is_finite() {
                log::trace!("inner iteration {}: non-positive curvature {:.3e}", k, curvature);
                if k == 0 && is_zero(&d) {
                    return Ok(fallback);
                }
                break;
            }

            let alpha = rz / curvature;
            d.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &hp, 1.0);
            restrict(&mut r, free);

            z = self.precondition(&r, free);
            let rz_next = r.dot(&z);
            if !(rz_next > 0.0) {
                break;
            }
            let beta = rz_next / rz;
            rz = rz_next;
            p = &z + &p * beta;
        }

        Ok(d)
    }

    fn run(&mut self, session: &mut Session<'_>) -> std::result::Result<TerminationReason, Interrupt> {
        self.memory = LBFGSState::new(self.config.memory_size);
        self.previous_step = None;
        let mut line_search = BacktrackingLineSearch::new();
        let mut since_restart = 0;
        let mut force_steepest = false;

        let mut current = session.start()?;
        loop {
            let projected = session
                .bounds()
                .projected_gradient(&current.point, &current.gradient);
            if is_zero(&projected) {
                return Ok(TerminationReason::Success);
            }
            let free = free_variables(session.bounds(), &current.point, &current.gradient);

            if self.config.restart && since_restart >= self.config.restart_interval {
                log::debug!("{}: periodic restart", self.name());
                self.memory.clear();
                since_restart = 0;
            }

            let newton = if force_steepest {
                None
            } else {
                Some(self.newton_direction(session, &current, &projected, &free)?)
            };
            let (direction, step, steepest) = match newton {
                Some(d) if is_descent(&d, &projected) => (d, 1.0, false),
                _ => (
                    -&projected,
                    steepest_descent_step(projected.norm()),
                    true,
                ),
            };
            force_steepest = false;

            let result = match line_search.search(
                session,
                &current,
                &direction,
                step,
                &self.config.line_search,
            ) {
                Ok(result) => result,
                Err(Interrupt::LineSearch(err)) if !steepest => {
                    log::debug!("{}: Newton step failed ({}), trying steepest descent", self.name(), err);
                    self.memory.clear();
                    self.previous_step = None;
                    since_restart = 0;
                    force_steepest = true;
                    continue;
                }
                Err(interrupt) => return Err(interrupt),
            };
            let next = result.iterate;

            let s = &next.point - &current.point;
            let y = &next.gradient - &current.gradient;
            if self.config.preconditioned {
                self.memory.push(s, y, true);
            }
            self.previous_step = Some(direction * result.step_size);
            since_restart += 1;

            if let Some(reason) = session.accept(&current, &next)? {
                return Ok(reason);
            }
            current = next;
        }
    }
}

impl Optimizer for TruncatedNewton {
    fn name(&self) -> &str {
        match (self.config.preconditioned, self.config.restart) {
            (false, false) => "Truncated Newton",
            (false, true) => "Truncated Newton (restarting)",
            (true, false) => "Truncated Newton (preconditioned)",
            (true, true) => "Truncated Newton (preconditioned, restarting)",
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
    use plnopt_core::callback::NoOpCallback;
    use plnopt_core::cost_function::QuadraticCost;
    use plnopt_core::test_utils::Rosenbrock;

    fn variants() -> [TruncatedNewtonConfig; 4] {
        [
            TruncatedNewtonConfig::new(),
            TruncatedNewtonConfig::restarting(),
            TruncatedNewtonConfig::preconditioned(),
            TruncatedNewtonConfig::preconditioned_restarting(),
        ]
    }

    #[test]
    fn test_config() {
        let config = TruncatedNewtonConfig::preconditioned_restarting()
            .with_restart_interval(5)
            .with_max_inner_iterations(10);
        assert!(config.preconditioned && config.restart);
        assert_eq!(config.restart_interval, 5);
        assert!(config.validate().is_ok());

        assert!(TruncatedNewtonConfig::new()
            .with_max_inner_iterations(0)
            .validate()
            .is_err());
        assert!(TruncatedNewtonConfig::restarting()
            .with_restart_interval(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_distinct_names() {
        let names: Vec<String> = variants()
            .into_iter()
            .map(|config| TruncatedNewton::new(config).name().to_string())
            .collect();
        for i in 0..names.len() {
            for j in (i + 1)..names.len() {
                assert_ne!(names[i], names[j]);
            }
        }
    }

    #[test]
    fn test_hessian_product_is_counted() {
        let a = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]);
        let mut cost = QuadraticCost::new(a.clone(), Vector::zeros(2), 0.0).unwrap();
        let bounds = BoxConstraints::unbounded(2);
        let criterion = StoppingCriterion::new();
        let mut callback = NoOpCallback;
        let x0 = Vector::from_vec(vec![1.0, -1.0]);
        let mut session = Session::new(&mut cost, &bounds, &criterion, &mut callback, &x0);

        let current = session.start().unwrap();
        let v = Vector::from_vec(vec![0.5, 2.0]);
        let hv = TruncatedNewton::hessian_product(&mut session, &current, &v, &[true, true]).unwrap();
        assert_relative_eq!(hv, &a * &v, epsilon = 1e-5);
        assert_eq!(session.evaluations(), 2);
    }

    #[test]
    fn test_hessian_product_stays_feasible() {
        let mut cost = QuadraticCost::simple(1);
        let bounds = BoxConstraints::new(Vector::from_vec(vec![0.0]), Vector::from_vec(vec![1.0])).unwrap();
        let criterion = StoppingCriterion::new();
        let mut callback = NoOpCallback;
        let x0 = Vector::from_vec(vec![1.0]);
        let mut session = Session::new(&mut cost, &bounds, &criterion, &mut callback, &x0);

        let current = session.start().unwrap();
        let hv = TruncatedNewton::hessian_product(
            &mut session,
            &current,
            &Vector::from_vec(vec![1.0]),
            &[true],
        )
        .unwrap();
        assert_relative_eq!(hv[0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_truncated_newton_quadratic() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
        let b = Vector::from_vec(vec![-1.0, 2.0, -3.0]);
        let expected = a.clone().lu().solve(&(-&b)).unwrap();

        for config in variants() {
            let mut cost = QuadraticCost::new(a.clone(), b.clone(), 0.0).unwrap();
            let mut optimizer = TruncatedNewton::new(config);
            let criterion = StoppingCriterion::new()
                .with_ftol_rel(1e-14)
                .with_xtol_rel(1e-10)
                .with_max_evaluations(1000);
            let result = optimizer
                .minimize(&mut cost, &BoxConstraints::unbounded(3), &Vector::zeros(3), &criterion)
                .unwrap();
            assert_relative_eq!(result.point, expected, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_truncated_newton_rosenbrock() {
        for config in variants() {
            let mut cost = Rosenbrock::new(2);
            let mut optimizer = TruncatedNewton::new(config);
            let criterion = StoppingCriterion::new()
                .with_ftol_rel(1e-15)
                .with_max_evaluations(5000);
            let result = optimizer
                .minimize(
                    &mut cost,
                    &BoxConstraints::unbounded(2),
                    &Vector::from_vec(vec![-1.2, 1.0]),
                    &criterion,
                )
                .unwrap();
            assert!(result.value < 1e-6, "{}: f = {}", optimizer.name(), result.value);
        }
    }
}
