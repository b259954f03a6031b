//! Variational PLN objective and its analytic gradient.
//!
//! For parameters Θ (p × d), M (n × p) and S (n × p) the objective is
//!
//! ```text
//! C  = MᵗM + diag(colSums(S))
//! Ω  = n C⁻¹
//! Z  = O + X Θᵗ + M
//! A  = exp(Z + S / 2)
//! J  = Σ (A − Y ⊙ Z − ½ log S) − ½ n log det Ω + KY
//! ```
//!
//! with gradient blocks
//!
//! ```text
//! ∂J/∂Θ = (A − Y)ᵗ X
//! ∂J/∂M = M Ω + A − Y
//! ∂J/∂S = ½ (1ₙ diag(Ω)ᵗ + A − 1 / S)
//! ```
//!
//! Both `Ω` and `log det Ω` come from the same Cholesky factor of `C`, so the
//! objective and the gradient always agree.

use crate::{
    context::EvaluationContext,
    data::PlnData,
    layout::{ParameterBlocks, ParameterLayout},
};
use plnopt_core::{
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    types::{Matrix, Vector},
};

/// Objective value and, if requested, its gradient.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub objective: f64,
    pub gradient: Option<Vector>,
}

/// Evaluates the variational PLN objective for a fixed data shape.
#[derive(Debug, Clone)]
pub struct ObjectiveEvaluator {
    layout: ParameterLayout,
}

impl ObjectiveEvaluator {
    pub fn new(data: &PlnData) -> Self {
        Self {
            layout: data.layout(),
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    /// Evaluates the objective at `x`, and its gradient if `need_gradient`.
    ///
    /// The evaluation counter of `ctx` is incremented before anything else,
    /// so rejected calls are counted too.
    ///
    /// # Errors
    /// `DimensionMismatch` if `x` does not have `n_param` entries,
    /// `NumericalError` if `MᵗM + diag(colSums(S))` is not positive definite.
    pub fn evaluate(
        &self,
        x: &[f64],
        need_gradient: bool,
        ctx: &mut EvaluationContext<'_>,
    ) -> Result<Evaluation> {
        ctx.record_evaluation();
        let data = ctx.data();
        let blocks = self.layout.reconstruct(x)?;
        let ParameterBlocks { theta, m, s } = &blocks;
        let n = self.layout.n() as f64;
        let p = self.layout.p();

        let mut c = m.tr_mul(m);
        let column_sums = s.row_sum_tr();
        for j in 0..p {
            c[(j, j)] += column_sums[j];
        }
        let cholesky = c.cholesky().ok_or_else(|| {
            OptimizerError::numerical_error(
                "MᵗM + diag(colSums(S)) is not positive definite",
            )
        })?;
        let log_det_c: f64 = 2.0
            * cholesky
                .l_dirty()
                .diagonal()
                .iter()
                .map(|v| v.ln())
                .sum::<f64>();
        let log_det_omega = p as f64 * n.ln() - log_det_c;

        let z = data.o() + data.x() * theta.transpose() + m;
        let a = (&z + s * 0.5).map(f64::exp);

        let mut sum = 0.0;
        for ((a_ij, z_ij), (y_ij, s_ij)) in a
            .iter()
            .zip(z.iter())
            .zip(data.y().iter().zip(s.iter()))
        {
            sum += a_ij - y_ij * z_ij - 0.5 * s_ij.ln();
        }
        let objective = sum - 0.5 * n * log_det_omega + data.ky();

        let gradient = if need_gradient {
            let omega = cholesky.inverse() * n;
            let residual = &a - data.y();
            let omega_diagonal = omega.diagonal();

            let grad_s = Matrix::from_fn(self.layout.n(), p, |i, j| {
                0.5 * (omega_diagonal[j] + a[(i, j)] - 1.0 / s[(i, j)])
            });
            let gradient_blocks = ParameterBlocks {
                theta: residual.tr_mul(data.x()),
                m: m * &omega + &residual,
                s: grad_s,
            };
            Some(self.layout.flatten(&gradient_blocks)?)
        } else {
            None
        };

        log::trace!(
            "PLN evaluation {}: objective = {:.12e}",
            ctx.evaluation_count(),
            objective
        );

        Ok(Evaluation {
            objective,
            gradient,
        })
    }
}

/// [`CostFunction`] view of an evaluator bound to an evaluation context.
///
/// A factorization failure at a trial point is reported to the optimizer as
/// an infinite objective with a NaN gradient, which the line searches treat
/// as a step that went too far.
#[derive(Debug)]
pub struct PlnObjective<'e, 'c, 'd> {
    evaluator: &'e ObjectiveEvaluator,
    context: &'c mut EvaluationContext<'d>,
}

impl<'e, 'c, 'd> PlnObjective<'e, 'c, 'd> {
    pub fn new(evaluator: &'e ObjectiveEvaluator, context: &'c mut EvaluationContext<'d>) -> Self {
        Self { evaluator, context }
    }

    /// Number of objective queries so far.
    pub fn evaluation_count(&self) -> usize {
        self.context.evaluation_count()
    }

    fn query(&mut self, point: &Vector, need_gradient: bool) -> Result<Evaluation> {
        match self
            .evaluator
            .evaluate(point.as_slice(), need_gradient, &mut *self.context)
        {
            Err(OptimizerError::NumericalError { reason }) => {
                log::warn!("PLN objective undefined at trial point: {}", reason);
                Ok(Evaluation {
                    objective: f64::INFINITY,
                    gradient: need_gradient.then(|| Vector::from_element(point.len(), f64::NAN)),
                })
            }
            other => other,
        }
    }
}

impl CostFunction for PlnObjective<'_, '_, '_> {
    fn cost(&mut self, point: &Vector) -> Result<f64> {
        self.query(point, false).map(|evaluation| evaluation.objective)
    }

    fn cost_and_gradient(&mut self, point: &Vector) -> Result<(f64, Vector)> {
        let evaluation = self.query(point, true)?;
        let gradient = evaluation.gradient.ok_or_else(|| {
            OptimizerError::numerical_error("gradient requested but not computed")
        })?;
        Ok((evaluation.objective, gradient))
    }
}
