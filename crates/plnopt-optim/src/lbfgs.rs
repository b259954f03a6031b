//! Bound-constrained L-BFGS optimizer.
//!
//! L-BFGS (Limited-memory Broyden-Fletcher-Goldfarb-Shanno) is a quasi-Newton
//! optimization algorithm that approximates the inverse Hessian using a
//! limited history of past gradient and position updates.
//!
//! # Algorithm Overview
//!
//! 1. Stores m most recent gradient differences and position differences
//! 2. Approximates the inverse Hessian-vector product using two-loop recursion
//! 3. Computes search direction as negative approximate Newton direction
//! 4. Performs a line search to find a suitable step size
//!
//! ## Two-Loop Recursion Algorithm
//!
//! ```text
//! q = grad_f(x_k)
//! for i = k-1, k-2, ..., k-m:
//!     α_i = ρ_i * <s_i, q>
//!     q = q - α_i * y_i
//!
//! r = γ_k * q  // γ_k = <s, y> / <y, y> of the newest pair
//!
//! for i = k-m, k-m+1, ..., k-1:
//!     β = ρ_i * <y_i, r>
//!     r = r + (α_i - β) * s_i
//!
//! return -r  // Search direction
//! ```
//!
//! ## Handling bounds
//!
//! Two variants are provided:
//!
//! - [`LBFGSVariant::Projected`]: the recursion runs on the subspace of free
//!   variables (those not pushed against a bound by the gradient), starting
//!   from a diagonal estimate of the Hessian rather than a multiple of the
//!   identity. The curvature pairs survive changes of the active set. A
//!   strong Wolfe line search runs on the feasible segment and tries a
//!   fraction of the way to the boundary first when the unit step would
//!   cross it.
//! - [`LBFGSVariant::Nocedal`]: the classic recursion on the full gradient,
//!   masked against active bounds, with a strong Wolfe line search on the
//!   feasible segment of the ray.
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization" (2006)
//! - Liu & Nocedal, "On the limited memory BFGS method for large scale
//!   optimization" (1989)

use crate::utils::{
    free_variables, is_descent, is_zero, masked_dot, restrict, run_session,
    steepest_descent_step,
};
use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    line_search::{LineSearch, LineSearchParams, StrongWolfeLineSearch},
    optimizer::{OptimizationResult, Optimizer, StoppingCriterion, TerminationReason},
    session::{Interrupt, Iterate, Session},
    types::{constants, Vector},
};
use std::collections::VecDeque;

/// Limited-memory history of curvature pairs.
#[derive(Debug, Clone)]
pub struct LBFGSState {
    /// Memory size (number of vector pairs to store)
    pub memory_size: usize,

    /// Stored position differences (s_k = x_{k+1} - x_k)
    pub s_history: VecDeque<Vector>,

    /// Stored gradient differences (y_k = g_{k+1} - g_k)
    pub y_history: VecDeque<Vector>,

    /// Inner products rho_k = 1 / (y_k^T s_k)
    pub rho_history: VecDeque<f64>,

    /// Diagonal Hessian estimate, updated with every stored pair
    pub diagonal: Option<Vector>,
}

impl LBFGSState {
    /// Creates a new L-BFGS state.
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory_size,
            s_history: VecDeque::with_capacity(memory_size),
            y_history: VecDeque::with_capacity(memory_size),
            rho_history: VecDeque::with_capacity(memory_size),
            diagonal: None,
        }
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.s_history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s_history.is_empty()
    }

    /// Forgets every stored pair.
    pub fn clear(&mut self) {
        self.s_history.clear();
        self.y_history.clear();
        self.rho_history.clear();
        self.diagonal = None;
    }

    /// Stores the pair `(s, y)`, dropping the oldest one when full.
    ///
    /// With `cautious` set, pairs with `sᵀy ≤ ε·yᵀy` are skipped, which
    /// keeps the implicit inverse Hessian positive definite. Pairs with
    /// `sᵀy ≤ 0` are always skipped.
    ///
    /// Returns whether the pair was stored.
    pub fn push(&mut self, s: Vector, y: Vector, cautious: bool) -> bool {
        if self.memory_size == 0 {
            return false;
        }
        let sy = s.dot(&y);
        let yy = y.dot(&y);
        let threshold = if cautious { constants::EPSILON * yy } else { 0.0 };
        if !(sy > threshold) || !sy.is_finite() || !yy.is_finite() {
            return false;
        }

        if self.len() == self.memory_size {
            self.s_history.pop_front();
            self.y_history.pop_front();
            self.rho_history.pop_front();
        }
        self.update_diagonal(&s, &y, sy, yy);
        self.s_history.push_back(s);
        self.y_history.push_back(y);
        self.rho_history.push_back(1.0 / sy);
        true
    }

    /// Diagonal of the BFGS update of `diag(b)` with the pair `(s, y)`:
    /// `b_i + y_i²/sᵀy - (b_i s_i)²/sᵀBs`, started from `yᵀy/sᵀy`.
    /// An update that would lose positivity is skipped.
    fn update_diagonal(&mut self, s: &Vector, y: &Vector, sy: f64, yy: f64) {
        let b = self
            .diagonal
            .get_or_insert_with(|| Vector::from_element(s.len(), yy / sy));
        let sbs: f64 = b.iter().zip(s.iter()).map(|(bi, si)| bi * si * si).sum();
        if !(sbs > 0.0) {
            return;
        }
        let updated = Vector::from_iterator(
            s.len(),
            b.iter()
                .zip(s.iter().zip(y.iter()))
                .map(|(bi, (si, yi))| bi + yi * yi / sy - (bi * si).powi(2) / sbs),
        );
        if updated.iter().all(|v| *v > 0.0 && v.is_finite()) {
            *b = updated;
        }
    }

    /// Applies the inverse Hessian approximation to `v`.
    pub fn apply_inverse_hessian(&self, v: &Vector) -> Vector {
        let mut q = v.clone();
        let m = self.len();
        let mut alpha = vec![0.0; m];

        for i in (0..m).rev() {
            alpha[i] = self.rho_history[i] * self.s_history[i].dot(&q);
            q.axpy(-alpha[i], &self.y_history[i], 1.0);
        }

        if let (Some(s), Some(y)) = (self.s_history.back(), self.y_history.back()) {
            q *= s.dot(y) / y.dot(y);
        }

        for i in 0..m {
            let beta = self.rho_history[i] * self.y_history[i].dot(&q);
            q.axpy(alpha[i] - beta, &self.s_history[i], 1.0);
        }
        q
    }

    /// Applies the inverse Hessian approximation restricted to the free
    /// coordinates. Components outside the free set are zero in the result.
    ///
    /// The recursion starts from the inverse of the diagonal estimate.
    /// Pairs whose restricted curvature `s_Fᵀy_F` is not positive are
    /// ignored for this product.
    pub fn apply_inverse_hessian_free(&self, v: &Vector, free: &[bool]) -> Vector {
        let mut q = v.clone();
        restrict(&mut q, free);

        let m = self.len();
        let mut alpha = vec![0.0; m];
        let mut rho = vec![0.0; m];
        let mut scale = None;

        for i in (0..m).rev() {
            let sy = masked_dot(&self.s_history[i], &self.y_history[i], free);
            if !(sy > 0.0) {
                continue;
            }
            rho[i] = 1.0 / sy;
            if scale.is_none() {
                let yy = masked_dot(&self.y_history[i], &self.y_history[i], free);
                scale = Some(sy / yy);
            }
            alpha[i] = rho[i] * masked_dot(&self.s_history[i], &q, free);
            q.axpy(-alpha[i], &self.y_history[i], 1.0);
            restrict(&mut q, free);
        }

        match (&self.diagonal, scale) {
            (Some(b), _) => q.component_div_assign(b),
            (None, Some(gamma)) => q *= gamma,
            (None, None) => {}
        }

        for i in 0..m {
            if rho[i] == 0.0 {
                continue;
            }
            let beta = rho[i] * masked_dot(&self.y_history[i], &q, free);
            q.axpy(alpha[i] - beta, &self.s_history[i], 1.0);
            restrict(&mut q, free);
        }
        q
    }
}

/// How the L-BFGS direction and step handle the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LBFGSVariant {
    /// Diagonally scaled subspace recursion with an interior strong Wolfe search
    Projected,
    /// Classic recursion with a strong Wolfe line search
    Nocedal,
}

/// Configuration for the L-BFGS optimizer.
#[derive(Debug, Clone)]
pub struct LBFGSConfig {
    /// Number of vector pairs to store (typically 5-20)
    pub memory_size: usize,
    /// Bound handling and line search flavour
    pub variant: LBFGSVariant,
    /// Initial step size once curvature information is available
    pub initial_step_size: f64,
    /// Whether to use cautious updates (skip updates that don't satisfy positive definiteness)
    pub use_cautious_updates: bool,
    /// Line search parameters
    pub line_search: LineSearchParams,
}

impl Default for LBFGSConfig {
    fn default() -> Self {
        Self {
            memory_size: 10,
            variant: LBFGSVariant::Projected,
            initial_step_size: 1.0,
            use_cautious_updates: true,
            line_search: LineSearchParams::strong_wolfe_interior(),
        }
    }
}

impl LBFGSConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of the classic variant with strong Wolfe line search.
    pub fn nocedal() -> Self {
        Self {
            variant: LBFGSVariant::Nocedal,
            line_search: LineSearchParams::strong_wolfe(),
            ..Self::default()
        }
    }

    /// Sets the memory size (number of vector pairs to store).
    pub fn with_memory_size(mut self, size: usize) -> Self {
        self.memory_size = size;
        self
    }

    /// Sets the variant.
    pub fn with_variant(mut self, variant: LBFGSVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Sets the initial step size for line search.
    pub fn with_initial_step_size(mut self, step_size: f64) -> Self {
        self.initial_step_size = step_size;
        self
    }

    /// Enables or disables cautious updates.
    pub fn with_cautious_updates(mut self, cautious: bool) -> Self {
        self.use_cautious_updates = cautious;
        self
    }

    /// Sets the line search parameters.
    pub fn with_line_search(mut self, params: LineSearchParams) -> Self {
        self.line_search = params;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.memory_size == 0 {
            return Err(OptimizerError::invalid_configuration(
                "memory size must be positive",
                "memory_size",
                "0",
            ));
        }
        if !(self.initial_step_size > 0.0 && self.initial_step_size.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "initial step size must be positive and finite",
                "initial_step_size",
                self.initial_step_size.to_string(),
            ));
        }
        self.line_search.validate()
    }
}

/// Bound-constrained L-BFGS optimizer.
///
/// # Examples
///
/// ```rust
/// use plnopt_optim::{LBFGS, LBFGSConfig};
/// use plnopt_core::prelude::*;
///
/// let mut cost = QuadraticCost::simple(3);
/// let bounds = BoxConstraints::lower_only(DVector::from_element(3, 0.5)).unwrap();
/// let criterion = StoppingCriterion::new().with_ftol_rel(1e-10).with_max_evaluations(100);
///
/// let mut lbfgs = LBFGS::new(LBFGSConfig::new().with_memory_size(5));
/// let x0 = DVector::from_element(3, 2.0);
/// let result = lbfgs.minimize(&mut cost, &bounds, &x0, &criterion).unwrap();
/// assert!((result.point[0] - 0.5).abs() < 1e-6);
/// ```
#[derive(Debug)]
pub struct LBFGS {
    config: LBFGSConfig,
    state: LBFGSState,
}

impl LBFGS {
    /// Creates a new L-BFGS optimizer with given configuration.
    pub fn new(config: LBFGSConfig) -> Self {
        let state = LBFGSState::new(config.memory_size);
        Self { config, state }
    }

    /// Creates a new L-BFGS optimizer with default configuration.
    pub fn with_default_config() -> Self {
        Self::new(LBFGSConfig::default())
    }

    /// Returns the optimizer configuration.
    pub fn config(&self) -> &LBFGSConfig {
        &self.config
    }

    /// Search direction at `current` with the first trial step.
    fn direction(&self, bounds: &BoxConstraints, current: &Iterate) -> Option<(Vector, f64)> {
        let projected = bounds.projected_gradient(&current.point, &current.gradient);
        if is_zero(&projected) {
            return None;
        }

        let mut direction = match self.config.variant {
            LBFGSVariant::Projected => {
                let free = free_variables(bounds, &current.point, &current.gradient);
                -self.state.apply_inverse_hessian_free(&projected, &free)
            }
            LBFGSVariant::Nocedal => {
                let mut d = -self.state.apply_inverse_hessian(&current.gradient);
                bounds.mask_direction(&current.point, &mut d);
                d
            }
        };

        let step = if self.state.is_empty() || !is_descent(&direction, &current.gradient) {
            direction = -&projected;
            steepest_descent_step(projected.norm())
        } else {
            self.config.initial_step_size
        };
        Some((direction, step))
    }

    fn run(&mut self, session: &mut Session<'_>) -> std::result::Result<TerminationReason, Interrupt> {
        self.state = LBFGSState::new(self.config.memory_size);
        let mut line_search = StrongWolfeLineSearch::new();

        let mut current = session.start()?;
        loop {
            let (direction, step) = match self.direction(session.bounds(), &current) {
                Some(found) => found,
                None => return Ok(TerminationReason::Success),
            };

            let found = line_search.search(
                session,
                &current,
                &direction,
                step,
                &self.config.line_search,
            );
            let next = match found {
                Ok(result) => result.iterate,
                Err(Interrupt::LineSearch(err)) if !self.state.is_empty() => {
                    log::debug!("{}: resetting memory after line search failure: {}", self.name(), err);
                    self.state.clear();
                    continue;
                }
                Err(interrupt) => return Err(interrupt),
            };

            let s = &next.point - &current.point;
            let y = &next.gradient - &current.gradient;
            self.state.push(s, y, self.config.use_cautious_updates);

            if let Some(reason) = session.accept(&current, &next)? {
                return Ok(reason);
            }
            current = next;
        }
    }
}

impl Optimizer for LBFGS {
    fn name(&self) -> &str {
        match self.config.variant {
            LBFGSVariant::Projected => "L-BFGS",
            LBFGSVariant::Nocedal => "L-BFGS (Nocedal)",
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
    use plnopt_core::test_utils::Rosenbrock;

    #[test]
    fn test_lbfgs_config() {
        let config = LBFGSConfig::new()
            .with_memory_size(20)
            .with_initial_step_size(0.5)
            .with_cautious_updates(false);

        assert_eq!(config.memory_size, 20);
        assert_eq!(config.initial_step_size, 0.5);
        assert!(!config.use_cautious_updates);
        assert!(config.validate().is_ok());
        assert!(LBFGSConfig::new().with_memory_size(0).validate().is_err());
        assert_eq!(LBFGSConfig::nocedal().variant, LBFGSVariant::Nocedal);
        assert_eq!(LBFGSConfig::new().line_search.boundary_fraction, 0.3);
        assert_eq!(LBFGSConfig::nocedal().line_search.boundary_fraction, 1.0);
    }

    #[test]
    fn test_lbfgs_state_memory() {
        let mut state = LBFGSState::new(2);
        assert!(state.is_empty());

        assert!(state.push(Vector::from_vec(vec![1.0, 0.0]), Vector::from_vec(vec![2.0, 0.0]), true));
        assert!(state.push(Vector::from_vec(vec![0.0, 1.0]), Vector::from_vec(vec![0.0, 4.0]), true));
        assert!(state.push(Vector::from_vec(vec![1.0, 1.0]), Vector::from_vec(vec![2.0, 4.0]), true));
        assert_eq!(state.len(), 2);
        assert_relative_eq!(state.rho_history[1], 1.0 / 6.0);

        // negative curvature is rejected
        assert!(!state.push(Vector::from_vec(vec![1.0, 0.0]), Vector::from_vec(vec![-1.0, 0.0]), false));
        assert_eq!(state.len(), 2);

        state.clear();
        assert!(state.is_empty());
        assert!(state.diagonal.is_none());
    }

    #[test]
    fn test_two_loop_recovers_diagonal_inverse() {
        // Pairs from f = x1^2 + 2 x2^2 (Hessian diag(2, 4)).
        let mut state = LBFGSState::new(5);
        state.push(Vector::from_vec(vec![1.0, 0.0]), Vector::from_vec(vec![2.0, 0.0]), true);
        state.push(Vector::from_vec(vec![0.0, 1.0]), Vector::from_vec(vec![0.0, 4.0]), true);

        assert_relative_eq!(
            state.diagonal.clone().unwrap(),
            Vector::from_vec(vec![2.0, 4.0]),
            epsilon = 1e-12
        );

        let v = Vector::from_vec(vec![2.0, 4.0]);
        let hv = state.apply_inverse_hessian(&v);
        assert_relative_eq!(hv, Vector::from_vec(vec![1.0, 1.0]), epsilon = 1e-12);

        let free = vec![true, false];
        let hv = state.apply_inverse_hessian_free(&v, &free);
        assert_relative_eq!(hv[0], 1.0, epsilon = 1e-12);
        assert_eq!(hv[1], 0.0);
    }

    #[test]
    fn test_lbfgs_quadratic() {
        let a = DMatrix::from_row_slice(3, 3, &[4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0]);
        let b = Vector::from_vec(vec![-1.0, 2.0, -3.0]);
        let mut cost = QuadraticCost::new(a.clone(), b.clone(), 0.0).unwrap();
        let expected = a.lu().solve(&(-b)).unwrap();

        for config in [LBFGSConfig::new(), LBFGSConfig::nocedal()] {
            let mut lbfgs = LBFGS::new(config);
            let criterion = StoppingCriterion::new()
                .with_ftol_rel(1e-14)
                .with_xtol_rel(1e-10)
                .with_max_evaluations(200);
            let result = lbfgs
                .minimize(&mut cost, &BoxConstraints::unbounded(3), &Vector::zeros(3), &criterion)
                .unwrap();
            assert_relative_eq!(result.point, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_lbfgs_rosenbrock() {
        for config in [LBFGSConfig::new(), LBFGSConfig::nocedal()] {
            let mut lbfgs = LBFGS::new(config);
            let criterion = StoppingCriterion::new()
                .with_ftol_rel(1e-15)
                .with_xtol_rel(1e-12)
                .with_max_evaluations(2000);
            let result = lbfgs
                .minimize(
                    &mut Rosenbrock::new(2),
                    &BoxConstraints::unbounded(2),
                    &Vector::from_vec(vec![-1.2, 1.0]),
                    &criterion,
                )
                .unwrap();
            assert!(result.value < 1e-6, "{}: f = {}", lbfgs.name(), result.value);
            assert_relative_eq!(result.point, Vector::from_vec(vec![1.0, 1.0]), epsilon = 1e-2);
        }
    }

    #[test]
    fn test_lbfgs_active_bound() {
        // minimum of 0.5|x|^2 - 2 x1 + x2 over x >= 0 is (2, 0)
        let mut cost = QuadraticCost::new(
            DMatrix::identity(2, 2),
            Vector::from_vec(vec![-2.0, 1.0]),
            0.0,
        )
        .unwrap();
        let bounds = BoxConstraints::lower_only(Vector::zeros(2)).unwrap();
        let criterion = StoppingCriterion::new()
            .with_ftol_rel(1e-14)
            .with_max_evaluations(100);

        for config in [LBFGSConfig::new(), LBFGSConfig::nocedal()] {
            let mut lbfgs = LBFGS::new(config);
            let result = lbfgs
                .minimize(&mut cost, &bounds, &Vector::from_vec(vec![1.0, 3.0]), &criterion)
                .unwrap();
            assert_relative_eq!(result.point, Vector::from_vec(vec![2.0, 0.0]), epsilon = 1e-6);
            assert!(bounds.contains(&result.point));
        }
    }
}
