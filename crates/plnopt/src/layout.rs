//! Flat parameter vector layout.
//!
//! The optimizer works on a single vector of length `(2n + d)·p` holding
//! three blocks, each stored row-major:
//!
//! | block | shape | range |
//! |---|---|---|
//! | Θ | p × d | `[0, p·d)` |
//! | M | n × p | `[p·d, p·d + n·p)` |
//! | S | n × p | `[p·d + n·p, (2n + d)·p)` |

use plnopt_core::{
    error::{OptimizerError, Result},
    types::{Matrix, Vector},
};
use std::ops::Range;

/// The three parameter blocks as matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlocks {
    /// Regression coefficients (p × d)
    pub theta: Matrix,
    /// Variational means (n × p)
    pub m: Matrix,
    /// Variational variances (n × p)
    pub s: Matrix,
}

/// Mapping between the flat parameter vector and its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterLayout {
    n: usize,
    p: usize,
    d: usize,
}

impl ParameterLayout {
    /// Layout for `n` observations, `p` count variables and `d` covariates.
    pub fn new(n: usize, p: usize, d: usize) -> Self {
        Self { n, p, d }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn p(&self) -> usize {
        self.p
    }

    pub fn d(&self) -> usize {
        self.d
    }

    /// Total number of parameters, `(2n + d)·p`.
    pub fn n_param(&self) -> usize {
        (2 * self.n + self.d) * self.p
    }

    pub fn theta_range(&self) -> Range<usize> {
        0..self.p * self.d
    }

    pub fn m_range(&self) -> Range<usize> {
        let start = self.p * self.d;
        start..start + self.n * self.p
    }

    pub fn s_range(&self) -> Range<usize> {
        let start = self.p * self.d + self.n * self.p;
        start..self.n_param()
    }

    fn check_length(&self, x: &[f64]) -> Result<()> {
        if x.len() != self.n_param() {
            return Err(OptimizerError::dimension_mismatch(self.n_param(), x.len()));
        }
        Ok(())
    }

    /// The Θ block of `x`, row-major.
    pub fn theta<'a>(&self, x: &'a [f64]) -> Result<&'a [f64]> {
        self.check_length(x)?;
        Ok(&x[self.theta_range()])
    }

    /// The M block of `x`, row-major.
    pub fn m<'a>(&self, x: &'a [f64]) -> Result<&'a [f64]> {
        self.check_length(x)?;
        Ok(&x[self.m_range()])
    }

    /// The S block of `x`, row-major.
    pub fn s<'a>(&self, x: &'a [f64]) -> Result<&'a [f64]> {
        self.check_length(x)?;
        Ok(&x[self.s_range()])
    }

    /// Builds the block matrices from a flat vector.
    pub fn reconstruct(&self, x: &[f64]) -> Result<ParameterBlocks> {
        self.check_length(x)?;
        Ok(ParameterBlocks {
            theta: Matrix::from_row_slice(self.p, self.d, &x[self.theta_range()]),
            m: Matrix::from_row_slice(self.n, self.p, &x[self.m_range()]),
            s: Matrix::from_row_slice(self.n, self.p, &x[self.s_range()]),
        })
    }

    /// Concatenates the blocks into a flat vector; inverse of
    /// [`reconstruct`](Self::reconstruct).
    pub fn flatten(&self, blocks: &ParameterBlocks) -> Result<Vector> {
        let shapes = [
            (blocks.theta.shape(), (self.p, self.d)),
            (blocks.m.shape(), (self.n, self.p)),
            (blocks.s.shape(), (self.n, self.p)),
        ];
        for (actual, expected) in shapes {
            if actual != expected {
                return Err(OptimizerError::dimension_mismatch(
                    format!("{}x{}", expected.0, expected.1),
                    format!("{}x{}", actual.0, actual.1),
                ));
            }
        }

        let mut x = Vector::zeros(self.n_param());
        for (block, range) in [
            (&blocks.theta, self.theta_range()),
            (&blocks.m, self.m_range()),
            (&blocks.s, self.s_range()),
        ] {
            // nalgebra stores columns contiguously, so the transpose's
            // storage is the row-major order of the block.
            x.as_mut_slice()[range].copy_from_slice(block.transpose().as_slice());
        }
        Ok(x)
    }

    /// Lower bounds: `-∞` on Θ and M, `lbvar` on S.
    pub fn lower_bounds(&self, lbvar: f64) -> Vector {
        self.per_block(f64::NEG_INFINITY, lbvar)
    }

    /// Absolute parameter tolerances: zero on Θ and M, `xtol` on S.
    pub fn xtol_abs(&self, xtol: f64) -> Vector {
        self.per_block(0.0, xtol)
    }

    fn per_block(&self, theta_and_m: f64, s: f64) -> Vector {
        let s_start = self.s_range().start;
        Vector::from_fn(self.n_param(), |i, _| if i < s_start { theta_and_m } else { s })
    }
}
