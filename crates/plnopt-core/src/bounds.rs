//! Box constraints `l ≤ x ≤ u`.
//!
//! Bounds may be infinite on either side. Every optimizer in this workspace
//! keeps its iterates feasible by projecting onto the box, so the helpers
//! here (projection, active set, projected gradient, maximal feasible step)
//! are the only place where bound handling lives.

use crate::{
    error::{OptimizerError, Result},
    types::Vector,
};

/// Lower and upper bounds on each coordinate of the optimization variable.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxConstraints {
    lower: Vector,
    upper: Vector,
}

impl BoxConstraints {
    /// Creates box constraints from explicit lower and upper bound vectors.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if the vectors differ in length and
    /// `InvalidConfiguration` if a bound is NaN or `lower[i] > upper[i]`.
    pub fn new(lower: Vector, upper: Vector) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(OptimizerError::dimension_mismatch(lower.len(), upper.len()));
        }
        for (i, (l, u)) in lower.iter().zip(upper.iter()).enumerate() {
            if l.is_nan() || u.is_nan() {
                return Err(OptimizerError::invalid_configuration(
                    "bounds must not be NaN",
                    format!("bounds[{}]", i),
                    format!("[{}, {}]", l, u),
                ));
            }
            if l > u {
                return Err(OptimizerError::invalid_configuration(
                    "lower bound exceeds upper bound",
                    format!("bounds[{}]", i),
                    format!("[{}, {}]", l, u),
                ));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Unconstrained problem of dimension `n`.
    pub fn unbounded(n: usize) -> Self {
        Self {
            lower: Vector::from_element(n, f64::NEG_INFINITY),
            upper: Vector::from_element(n, f64::INFINITY),
        }
    }

    /// Lower bounds only; every upper bound is `+∞`.
    pub fn lower_only(lower: Vector) -> Result<Self> {
        let n = lower.len();
        Self::new(lower, Vector::from_element(n, f64::INFINITY))
    }

    /// Number of coordinates.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &Vector {
        &self.lower
    }

    pub fn upper(&self) -> &Vector {
        &self.upper
    }

    /// Width `u[i] - l[i]` of coordinate `i` (infinite if either bound is).
    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    /// Projects `x` onto the box.
    pub fn project(&self, x: &Vector) -> Vector {
        let mut y = x.clone();
        self.project_in_place(&mut y);
        y
    }

    pub fn project_in_place(&self, x: &mut Vector) {
        for i in 0..x.len() {
            x[i] = x[i].max(self.lower[i]).min(self.upper[i]);
        }
    }

    /// Returns true if `x` lies inside the box.
    pub fn contains(&self, x: &Vector) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .enumerate()
                .all(|(i, v)| *v >= self.lower[i] && *v <= self.upper[i])
    }

    /// Variables held at a bound by the gradient.
    ///
    /// Coordinate `i` is active when it sits on its lower bound with a
    /// non-negative gradient, or on its upper bound with a non-positive one.
    pub fn active_set(&self, x: &Vector, gradient: &Vector) -> Vec<bool> {
        (0..x.len())
            .map(|i| {
                (x[i] <= self.lower[i] && gradient[i] >= 0.0)
                    || (x[i] >= self.upper[i] && gradient[i] <= 0.0)
            })
            .collect()
    }

    /// Gradient with the components of active variables zeroed.
    ///
    /// Its norm vanishes exactly at first-order stationary points of the
    /// bound-constrained problem.
    pub fn projected_gradient(&self, x: &Vector, gradient: &Vector) -> Vector {
        let active = self.active_set(x, gradient);
        let mut pg = gradient.clone();
        for (i, is_active) in active.into_iter().enumerate() {
            if is_active {
                pg[i] = 0.0;
            }
        }
        pg
    }

    /// Zeroes the components of `direction` that would leave the box
    /// immediately from `x`.
    pub fn mask_direction(&self, x: &Vector, direction: &mut Vector) {
        for i in 0..x.len() {
            if (x[i] <= self.lower[i] && direction[i] < 0.0)
                || (x[i] >= self.upper[i] && direction[i] > 0.0)
            {
                direction[i] = 0.0;
            }
        }
    }

    /// The point `P(x + α·d)`.
    ///
    /// Coordinates whose bound is reached at a step `≤ α` are placed exactly
    /// on the bound, so rounding never leaves a variable a few ulps inside.
    pub fn advance(&self, x: &Vector, direction: &Vector, alpha: f64) -> Vector {
        let mut y = x + direction * alpha;
        for i in 0..x.len() {
            let d = direction[i];
            if d < 0.0 && (self.lower[i] - x[i]) / d <= alpha {
                y[i] = self.lower[i];
            } else if d > 0.0 && (self.upper[i] - x[i]) / d <= alpha {
                y[i] = self.upper[i];
            }
        }
        self.project_in_place(&mut y);
        y
    }

    /// Largest `α ≥ 0` such that `x + α·d` stays in the box.
    ///
    /// Returns `+∞` if no bound is ever hit along `d`.
    pub fn max_step(&self, x: &Vector, direction: &Vector) -> f64 {
        let mut alpha = f64::INFINITY;
        for i in 0..x.len() {
            let d = direction[i];
            let limit = if d < 0.0 {
                (self.lower[i] - x[i]) / d
            } else if d > 0.0 {
                (self.upper[i] - x[i]) / d
            } else {
                continue;
            };
            alpha = alpha.min(limit.max(0.0));
        }
        alpha
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> BoxConstraints {
        BoxConstraints::new(
            Vector::from_vec(vec![0.0, 0.0, f64::NEG_INFINITY]),
            Vector::from_vec(vec![1.0, f64::INFINITY, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_bounds() {
        let err = BoxConstraints::new(Vector::from_vec(vec![1.0]), Vector::from_vec(vec![0.0]));
        assert!(matches!(err, Err(OptimizerError::InvalidConfiguration { .. })));

        let err = BoxConstraints::new(Vector::zeros(2), Vector::zeros(3));
        assert!(matches!(err, Err(OptimizerError::DimensionMismatch { .. })));

        let err = BoxConstraints::lower_only(Vector::from_vec(vec![f64::NAN]));
        assert!(err.is_err());
    }

    #[test]
    fn test_projection() {
        let bounds = unit_box();
        let x = Vector::from_vec(vec![-0.5, 3.0, 2.0]);
        let p = bounds.project(&x);
        assert_eq!(p, Vector::from_vec(vec![0.0, 3.0, 1.0]));
        assert!(bounds.contains(&p));
        assert!(!bounds.contains(&x));
    }

    #[test]
    fn test_projected_gradient() {
        let bounds = unit_box();
        let x = Vector::from_vec(vec![0.0, 0.5, 1.0]);
        let g = Vector::from_vec(vec![2.0, -1.0, -3.0]);
        // first and last coordinates are pushed against their bounds
        assert_eq!(bounds.active_set(&x, &g), vec![true, false, true]);
        assert_eq!(
            bounds.projected_gradient(&x, &g),
            Vector::from_vec(vec![0.0, -1.0, 0.0])
        );

        let g = Vector::from_vec(vec![-2.0, 1.0, 3.0]);
        assert_eq!(bounds.projected_gradient(&x, &g), g);
    }

    #[test]
    fn test_mask_direction() {
        let bounds = unit_box();
        let x = Vector::from_vec(vec![0.0, 0.0, 1.0]);
        let mut d = Vector::from_vec(vec![-1.0, 1.0, 1.0]);
        bounds.mask_direction(&x, &mut d);
        assert_eq!(d, Vector::from_vec(vec![0.0, 1.0, 0.0]));
    }

    #[test]
    fn test_max_step() {
        let bounds = unit_box();
        let x = Vector::from_vec(vec![0.5, 1.0, 0.0]);

        let d = Vector::from_vec(vec![1.0, 0.0, 0.0]);
        assert_relative_eq!(bounds.max_step(&x, &d), 0.5);

        let d = Vector::from_vec(vec![0.0, -2.0, 0.5]);
        assert_relative_eq!(bounds.max_step(&x, &d), 0.5);

        let d = Vector::from_vec(vec![0.0, 1.0, -1.0]);
        assert!(bounds.max_step(&x, &d).is_infinite());
    }

    #[test]
    fn test_advance_lands_on_bounds() {
        let bounds = unit_box();
        let x = Vector::from_vec(vec![0.3, 0.5, 0.0]);
        let d = Vector::from_vec(vec![-0.1, 1.0, 0.7]);
        let alpha = bounds.max_step(&x, &d);
        let y = bounds.advance(&x, &d, alpha);
        assert_eq!(y[2], 1.0);
        assert_relative_eq!(y[0], 0.3 - 0.1 * alpha);
        assert_relative_eq!(y[1], 0.5 + alpha);
        assert!(bounds.contains(&y));

        let y = bounds.advance(&x, &d, 10.0);
        assert_eq!(y, Vector::from_vec(vec![0.0, 10.5, 1.0]));
    }

    #[test]
    fn test_unbounded() {
        let bounds = BoxConstraints::unbounded(2);
        assert_eq!(bounds.dim(), 2);
        assert!(bounds.width(0).is_infinite());
        let x = Vector::from_vec(vec![1e300, -1e300]);
        assert_eq!(bounds.project(&x), x);
    }
}
