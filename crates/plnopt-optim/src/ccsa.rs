//! Conservative convex separable approximation (CCSA) optimizer.
//!
//! At each outer iteration the objective is replaced by a separable convex
//! model around the current point `x`, valid inside a box of half-widths
//! `σ`:
//!
//! - **MMA** (method of moving asymptotes):
//!   ```text
//!   g̃(x + δ) = f + Σ_i (σ_i² g_i δ_i + σ_i |g_i| δ_i²) / (σ_i² − δ_i²) + ρ w(δ)
//!   w(δ)      = Σ_i ½ δ_i² / (σ_i² − δ_i²)
//!   ```
//! - **CCSAQ** (quadratic):
//!   ```text
//!   g̃(x + δ) = f + gᵀδ + ρ w(δ),   w(δ) = Σ_i ½ (δ_i / σ_i)²
//!   ```
//!
//! The model minimizer has a closed form per coordinate. A trial point is
//! accepted only if the model is conservative there, `f(x + δ) ≤ g̃(x + δ)`;
//! otherwise the penalty `ρ` grows and the model is solved again. After an
//! accepted step `ρ` shrinks, and each `σ_i` shrinks when coordinate `i`
//! oscillates and grows when it keeps moving in the same direction.
//!
//! Every accepted step decreases the objective, so the accepted values are
//! monotone.
//!
//! # References
//!
//! - Svanberg, "A class of globally convergent optimization methods based on
//!   conservative convex separable approximations", SIAM J. Optim. (2002)

use crate::utils::run_session;
use plnopt_core::{
    bounds::BoxConstraints,
    callback::OptimizationCallback,
    cost_function::CostFunction,
    error::{OptimizerError, Result},
    optimizer::{ConvergenceChecker, OptimizationResult, Optimizer, StoppingCriterion, TerminationReason},
    session::{Interrupt, Iterate, Session},
    types::Vector,
};

/// Fraction of `σ` an MMA step may use; keeps the model away from its poles.
const MMA_STEP_FRACTION: f64 = 0.9;

/// Separable model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcsaApproximation {
    /// Moving asymptotes
    Mma,
    /// Separable quadratic
    Quadratic,
}

/// Configuration for [`Ccsa`].
#[derive(Debug, Clone)]
pub struct CcsaConfig {
    /// Model family
    pub approximation: CcsaApproximation,
    /// Penalty at the start of the run
    pub initial_rho: f64,
    /// Smallest penalty kept after an accepted step
    pub min_rho: f64,
    /// Half-width used for coordinates with an infinite bound
    pub initial_sigma: f64,
    /// `σ` factor when a coordinate oscillates
    pub sigma_decrease: f64,
    /// `σ` factor when a coordinate moves monotonically
    pub sigma_increase: f64,
    /// Maximum number of rejected trial points per outer iteration
    pub max_inner_iterations: usize,
}

impl Default for CcsaConfig {
    fn default() -> Self {
        Self {
            approximation: CcsaApproximation::Mma,
            initial_rho: 1.0,
            min_rho: 1e-5,
            initial_sigma: 1.0,
            sigma_decrease: 0.7,
            sigma_increase: 1.2,
            max_inner_iterations: 50,
        }
    }
}

impl CcsaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Method of moving asymptotes.
    pub fn mma() -> Self {
        Self::default()
    }

    /// CCSA with separable quadratic models.
    pub fn quadratic() -> Self {
        Self {
            approximation: CcsaApproximation::Quadratic,
            ..Self::default()
        }
    }

    pub fn with_initial_rho(mut self, rho: f64) -> Self {
        self.initial_rho = rho;
        self
    }

    pub fn with_initial_sigma(mut self, sigma: f64) -> Self {
        self.initial_sigma = sigma;
        self
    }

    pub fn with_max_inner_iterations(mut self, max_iter: usize) -> Self {
        self.max_inner_iterations = max_iter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("initial_rho", self.initial_rho),
            ("min_rho", self.min_rho),
            ("initial_sigma", self.initial_sigma),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(OptimizerError::invalid_configuration(
                    "must be positive and finite",
                    name,
                    value.to_string(),
                ));
            }
        }
        if !(self.sigma_decrease > 0.0 && self.sigma_decrease < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "must lie in (0, 1)",
                "sigma_decrease",
                self.sigma_decrease.to_string(),
            ));
        }
        if !(self.sigma_increase > 1.0) || !self.sigma_increase.is_finite() {
            return Err(OptimizerError::invalid_configuration(
                "must be greater than 1",
                "sigma_increase",
                self.sigma_increase.to_string(),
            ));
        }
        if self.max_inner_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one inner iteration is required",
                "max_inner_iterations",
                "0",
            ));
        }
        Ok(())
    }
}

/// Minimizer of the model and its penalty weight.
#[derive(Debug, Clone)]
struct ModelStep {
    delta: Vector,
    /// Model value without the penalty, minus `f(x)`
    decrease: f64,
    /// `w(δ)`
    weight: f64,
}

/// CCSA optimizer (MMA or CCSAQ).
#[derive(Debug)]
pub struct Ccsa {
    config: CcsaConfig,
}

impl Ccsa {
    pub fn new(config: CcsaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CcsaConfig {
        &self.config
    }

    fn initial_sigma(&self, bounds: &BoxConstraints) -> Vector {
        Vector::from_fn(bounds.dim(), |i, _| {
            let width = bounds.width(i);
            if width.is_finite() && width > 0.0 {
                0.5 * width
            } else {
                self.config.initial_sigma
            }
        })
    }

    /// Minimizes the separable model at `current` for the given `ρ` and `σ`.
    fn solve_model(
        &self,
        bounds: &BoxConstraints,
        current: &Iterate,
        sigma: &Vector,
        rho: f64,
    ) -> ModelStep {
        let x = &current.point;
        let g = &current.gradient;
        let n = x.len();
        let mut delta = Vector::zeros(n);
        let mut decrease = 0.0;
        let mut weight = 0.0;

        for i in 0..n {
            let s = sigma[i];
            let lower = bounds.lower()[i] - x[i];
            let upper = bounds.upper()[i] - x[i];

            let d = match self.config.approximation {
                CcsaApproximation::Mma => {
                    let b = s * g[i].abs() + 0.5 * rho;
                    let discriminant = (b * b - s * s * g[i] * g[i]).max(0.0);
                    let d = -s * s * g[i] / (b + discriminant.sqrt());
                    d.clamp(
                        lower.max(-MMA_STEP_FRACTION * s),
                        upper.min(MMA_STEP_FRACTION * s),
                    )
                }
                CcsaApproximation::Quadratic => {
                    let d = -g[i] * s * s / rho;
                    d.clamp(lower.max(-s), upper.min(s))
                }
            };
            delta[i] = d;

            match self.config.approximation {
                CcsaApproximation::Mma => {
                    let denom = s * s - d * d;
                    decrease += (s * s * g[i] * d + s * g[i].abs() * d * d) / denom;
                    weight += 0.5 * d * d / denom;
                }
                CcsaApproximation::Quadratic => {
                    decrease += g[i] * d;
                    weight += 0.5 * (d / s) * (d / s);
                }
            }
        }

        ModelStep {
            delta,
            decrease,
            weight,
        }
    }

    /// Shrinks `σ` on oscillating coordinates and widens it on monotone ones.
    fn update_sigma(
        &self,
        bounds: &BoxConstraints,
        sigma: &mut Vector,
        older: &Vector,
        previous: &Vector,
        next: &Vector,
    ) {
        for i in 0..sigma.len() {
            let trend = (next[i] - previous[i]) * (previous[i] - older[i]);
            if trend < 0.0 {
                sigma[i] *= self.config.sigma_decrease;
            } else if trend > 0.0 {
                sigma[i] *= self.config.sigma_increase;
            }

            let width = bounds.width(i);
            if width.is_finite() && width > 0.0 {
                sigma[i] = sigma[i].clamp(1e-8 * width, 10.0 * width);
            } else {
                sigma[i] = sigma[i].max(1e-8);
            }
        }
    }

    fn run(&mut self, session: &mut Session<'_>) -> std::result::Result<TerminationReason, Interrupt> {
        let mut sigma = self.initial_sigma(session.bounds());
        let mut rho = self.config.initial_rho;
        let mut older: Option<Vector> = None;

        let mut current = session.start()?;
        loop {
            let mut accepted = None;
            for inner in 0..self.config.max_inner_iterations {
                let model = self.solve_model(session.bounds(), &current, &sigma, rho);
                if model.delta.iter().all(|d| *d == 0.0) {
                    return Ok(TerminationReason::Success);
                }

                let trial = session.bounds().project(&(&current.point + &model.delta));
                if ConvergenceChecker::point_converged(session.criterion(), &current.point, &trial) {
                    return Ok(TerminationReason::XtolReached);
                }

                let model_value = current.value + model.decrease + rho * model.weight;
                let candidate = session.evaluate(trial)?;
                if candidate.is_finite() && candidate.value <= model_value {
                    accepted = Some(candidate);
                    break;
                }

                rho = if candidate.value.is_finite() && model.weight > 0.0 {
                    (10.0 * rho).min(1.1 * (rho + (candidate.value - model_value) / model.weight))
                } else {
                    10.0 * rho
                };
                log::trace!(
                    "inner iteration {}: model not conservative, rho = {:.3e}",
                    inner,
                    rho
                );
            }

            let next = match accepted {
                Some(next) => next,
                None => {
                    log::debug!(
                        "{}: no conservative step after {} trials",
                        self.name(),
                        self.config.max_inner_iterations
                    );
                    return Ok(TerminationReason::RoundoffLimited);
                }
            };

            rho = (0.1 * rho).max(self.config.min_rho);
            if let Some(older) = &older {
                self.update_sigma(session.bounds(), &mut sigma, older, &current.point, &next.point);
            }

            if let Some(reason) = session.accept(&current, &next)? {
                return Ok(reason);
            }
            older = Some(std::mem::replace(&mut current, next).point);
        }
    }
}

impl Optimizer for Ccsa {
    fn name(&self) -> &str {
        match self.config.approximation {
            CcsaApproximation::Mma => "MMA",
            CcsaApproximation::Quadratic => "CCSAQ",
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
