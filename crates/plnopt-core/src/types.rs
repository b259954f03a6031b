//! Type definitions and aliases for bound-constrained optimization.
//!
//! All optimizers in this workspace work on dense double-precision vectors;
//! the aliases below keep signatures short and make the choice explicit.

pub use nalgebra::{DMatrix, DVector};

/// Scalar type used throughout the workspace.
pub type Real = f64;

/// Dense column vector of [`Real`].
pub type Vector = DVector<Real>;

/// Dense matrix of [`Real`].
pub type Matrix = DMatrix<Real>;

/// Numerical constants shared by the optimizers.
pub mod constants {
    use super::Real;

    /// Machine epsilon.
    pub const EPSILON: Real = Real::EPSILON;

    /// Square root of machine epsilon, the usual forward-difference step.
    pub const SQRT_EPSILON: Real = 1.490_116_119_384_765_6e-8;

    /// Cube root of machine epsilon, the usual central-difference step.
    pub const CBRT_EPSILON: Real = 6.055_454_452_393_343e-6;

    /// Smallest step a line search will try before giving up.
    pub const MIN_STEP_SIZE: Real = 1e-20;

    /// Largest step a line search will try.
    pub const MAX_STEP_SIZE: Real = 1e20;
}

/// Returns true if every entry of `v` is finite.
pub fn all_finite(v: &Vector) -> bool {
    v.iter().all(|x| x.is_finite())
}
