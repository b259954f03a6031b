//! Cost function interface for optimization algorithms.
//!
//! Optimizers only see a [`CostFunction`]: something that returns a value,
//! and a value plus gradient, at a dense point. Evaluations take `&mut self`
//! so that implementations can keep counters or other bookkeeping without
//! interior mutability.

use crate::{
    error::{OptimizerError, Result},
    types::{constants, Matrix, Vector},
};
use std::fmt::{self, Debug};

/// Trait for objective functions minimized by the optimizers.
pub trait CostFunction: Debug {
    /// Evaluates the cost function at a point.
    fn cost(&mut self, point: &Vector) -> Result<f64>;

    /// Evaluates the cost and its gradient at a point.
    fn cost_and_gradient(&mut self, point: &Vector) -> Result<(f64, Vector)>;

    /// Evaluates the gradient only.
    fn gradient(&mut self, point: &Vector) -> Result<Vector> {
        self.cost_and_gradient(point).map(|(_, g)| g)
    }

    /// Central finite-difference approximation of the gradient.
    ///
    /// Uses `2n` value evaluations with step `h·max(1, |x_i|)` where
    /// `h = ε^{1/3}`.
    fn gradient_fd(&mut self, point: &Vector) -> Result<Vector> {
        let n = point.len();
        let mut gradient = Vector::zeros(n);
        let mut shifted = point.clone();

        for i in 0..n {
            let h = constants::CBRT_EPSILON * point[i].abs().max(1.0);
            shifted[i] = point[i] + h;
            let f_plus = self.cost(&shifted)?;
            shifted[i] = point[i] - h;
            let f_minus = self.cost(&shifted)?;
            shifted[i] = point[i];
            gradient[i] = (f_plus - f_minus) / (2.0 * h);
        }

        Ok(gradient)
    }
}

impl<C: CostFunction + ?Sized> CostFunction for &mut C {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        (**self).cost(point)
    }

    fn cost_and_gradient(&mut self, point: &Vector) -> Result<(f64, Vector)> {
        (**self).cost_and_gradient(point)
    }
}

/// Cost function backed by a closure returning value and gradient.
pub struct FnCostFunction<F>
where
    F: FnMut(&Vector) -> Result<(f64, Vector)>,
{
    name: String,
    func: F,
}

impl<F> FnCostFunction<F>
where
    F: FnMut(&Vector) -> Result<(f64, Vector)>,
{
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnCostFunction<F>
where
    F: FnMut(&Vector) -> Result<(f64, Vector)>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCostFunction")
            .field("name", &self.name)
            .finish()
    }
}

impl<F> CostFunction for FnCostFunction<F>
where
    F: FnMut(&Vector) -> Result<(f64, Vector)>,
{
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        (self.func)(point).map(|(f, _)| f)
    }

    fn cost_and_gradient(&mut self, point: &Vector) -> Result<(f64, Vector)> {
        (self.func)(point)
    }
}

/// Quadratic cost `f(x) = ½ xᵀAx + bᵀx + c`.
#[derive(Debug, Clone)]
pub struct QuadraticCost {
    /// The quadratic form matrix (should be symmetric)
    pub a: Matrix,
    /// The linear term
    pub b: Vector,
    /// The constant term
    pub c: f64,
}

impl QuadraticCost {
    /// Creates a new quadratic cost function.
    pub fn new(a: Matrix, b: Vector, c: f64) -> Result<Self> {
        if a.nrows() != a.ncols() || a.nrows() != b.len() {
            return Err(OptimizerError::dimension_mismatch(
                format!("{}x{} matrix and vector of length {}", b.len(), b.len(), b.len()),
                format!("{}x{} matrix", a.nrows(), a.ncols()),
            ));
        }
        Ok(Self { a, b, c })
    }

    /// Creates a simple quadratic with identity matrix: f(x) = 0.5 * ||x||^2
    pub fn simple(dim: usize) -> Self {
        Self {
            a: Matrix::identity(dim, dim),
            b: Vector::zeros(dim),
            c: 0.0,
        }
    }

    /// Product of the quadratic form with `v`.
    pub fn hessian_vector_product(&self, v: &Vector) -> Vector {
        &self.a * v
    }
}

impl CostFunction for QuadraticCost {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        check_dimension(self.b.len(), point)?;
        let ax = &self.a * point;
        Ok(0.5 * point.dot(&ax) + self.b.dot(point) + self.c)
    }

    fn cost_and_gradient(&mut self, point: &Vector) -> Result<(f64, Vector)> {
        check_dimension(self.b.len(), point)?;
        let ax = &self.a * point;
        let cost = 0.5 * point.dot(&ax) + self.b.dot(point) + self.c;
        Ok((cost, ax + &self.b))
    }
}

fn check_dimension(expected: usize, point: &Vector) -> Result<()> {
    if point.len() != expected {
        return Err(OptimizerError::dimension_mismatch(expected, point.len()));
    }
    Ok(())
}

/// Utilities for validating analytic derivatives.
pub struct DerivativeChecker;

impl DerivativeChecker {
    /// Checks if the gradient implementation matches finite differences.
    ///
    /// # Returns
    ///
    /// A tuple of (passes, max_error) where max_error is the largest
    /// component-wise error relative to `max(1, |g_fd[i]|)`.
    pub fn check_gradient<C>(cost_fn: &mut C, point: &Vector, tol: f64) -> Result<(bool, f64)>
    where
        C: CostFunction + ?Sized,
    {
        let analytical_grad = cost_fn.gradient(point)?;
        let fd_grad = cost_fn.gradient_fd(point)?;

        let max_error = analytical_grad
            .iter()
            .zip(fd_grad.iter())
            .map(|(a, f)| (a - f).abs() / f.abs().max(1.0))
            .fold(0.0_f64, f64::max);

        Ok((max_error < tol, max_error))
    }
}
