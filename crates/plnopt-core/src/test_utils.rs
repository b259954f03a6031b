//! Test problems shared by the optimizer test suites.

use crate::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::Vector,
};

/// The n-dimensional Rosenbrock function, minimum 0 at `(1, …, 1)`.
#[derive(Debug, Clone)]
pub struct Rosenbrock {
    pub dim: usize,
}

impl Rosenbrock {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl CostFunction for Rosenbrock {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        self.cost_and_gradient(point).map(|(f, _)| f)
    }

    fn cost_and_gradient(&mut self, x: &Vector) -> Result<(f64, Vector)> {
        if x.len() != self.dim || self.dim < 2 {
            return Err(OptimizerError::dimension_mismatch(self.dim, x.len()));
        }
        let mut value = 0.0;
        let mut gradient = Vector::zeros(self.dim);
        for i in 0..self.dim - 1 {
            let a = x[i + 1] - x[i] * x[i];
            let b = 1.0 - x[i];
            value += 100.0 * a * a + b * b;
            gradient[i] += -400.0 * x[i] * a - 2.0 * b;
            gradient[i + 1] += 200.0 * a;
        }
        Ok((value, gradient))
    }
}

/// Separable quadratic `Σ wᵢ (xᵢ − cᵢ)²` whose unconstrained minimum is `c`.
///
/// Combined with bounds that exclude `c`, its constrained minimizer is the
/// projection of `c` onto the box.
#[derive(Debug, Clone)]
pub struct ShiftedQuadratic {
    pub weights: Vector,
    pub center: Vector,
}

impl ShiftedQuadratic {
    pub fn new(weights: Vector, center: Vector) -> Self {
        Self { weights, center }
    }
}

impl CostFunction for ShiftedQuadratic {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        self.cost_and_gradient(point).map(|(f, _)| f)
    }

    fn cost_and_gradient(&mut self, x: &Vector) -> Result<(f64, Vector)> {
        if x.len() != self.center.len() {
            return Err(OptimizerError::dimension_mismatch(self.center.len(), x.len()));
        }
        let diff = x - &self.center;
        let weighted = diff.component_mul(&self.weights);
        Ok((weighted.dot(&diff), weighted * 2.0))
    }
}

/// `Σ (exp(xᵢ) − aᵢ xᵢ)`, smooth and strictly convex with minimum at `ln aᵢ`.
///
/// The exponential makes large steps blow up, which exercises the
/// non-finite handling of the line searches.
#[derive(Debug, Clone)]
pub struct ExpSum {
    pub a: Vector,
}

impl ExpSum {
    pub fn new(a: Vector) -> Self {
        Self { a }
    }
}

impl CostFunction for ExpSum {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        self.cost_and_gradient(point).map(|(f, _)| f)
    }

    fn cost_and_gradient(&mut self, x: &Vector) -> Result<(f64, Vector)> {
        if x.len() != self.a.len() {
            return Err(OptimizerError::dimension_mismatch(self.a.len(), x.len()));
        }
        let e = x.map(f64::exp);
        let value = e.sum() - self.a.dot(x);
        Ok((value, e - &self.a))
    }
}
