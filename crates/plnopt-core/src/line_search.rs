//! Line search algorithms for bound-constrained optimization.
//!
//! Given a feasible point `x`, its gradient `g` and a search direction `d`,
//! a line search picks a step `α > 0` along the (possibly projected) ray
//! starting at `x`.
//!
//! # Sufficient Decrease Conditions
//!
//! ### Armijo Condition
//! f(x(α)) ≤ f(x) + c₁ ⟨g, x(α) − x⟩
//!
//! For an unprojected step `x(α) = x + αd` this is the familiar
//! `f(x + αd) ≤ f(x) + c₁ α ⟨g, d⟩`.
//!
//! ### Strong Wolfe Conditions
//! 1. Armijo as above
//! 2. |⟨∇f(x + αd), d⟩| ≤ c₂ |⟨g, d⟩|
//!
//! where 0 < c₁ < c₂ < 1.
//!
//! # Algorithm Variants
//!
//! ## Backtracking Line Search
//! Follows the projected path `x(α) = P(x + αd)`, so a step can bend along
//! the faces of the box. Shrinks `α` by safeguarded quadratic interpolation
//! until the Armijo condition holds.
//!
//! ## Strong Wolfe Line Search
//! Bracketing and zoom on the straight segment `x + αd`, `α ≤ α_max`, where
//! `α_max` is the largest feasible step. If the curvature condition cannot
//! be met before the boundary, the boundary step is taken as long as it
//! decreases the objective.
//!
//! When the initial step would leave the box, the first trial is
//! `boundary_fraction · α_max` rather than the boundary itself. Objectives
//! with barrier-like terms at a bound (`-ln s` as `s → 0`) reject the
//! boundary step.
//!
//! In both variants a trial point with a non-finite value or gradient is
//! treated as a step that went too far.

use crate::{
    error::{OptimizerError, Result},
    session::{Interrupt, Iterate, Session},
    types::{constants, Vector},
};
use std::fmt::Debug;

/// Result of a successful line search.
#[derive(Debug, Clone)]
pub struct LineSearchResult {
    /// The accepted step size
    pub step_size: f64,

    /// The accepted point with its value and gradient
    pub iterate: Iterate,

    /// Number of objective evaluations used by the search
    pub evaluations: usize,
}

/// Parameters for line search algorithms.
///
/// # Parameter Guidelines
///
/// - Strong Wolfe (quasi-Newton): c₁ = 10⁻⁴, c₂ = 0.9
/// - Backtracking: c₁ = 10⁻⁴, contraction bounds [0.1, 0.5]
/// - Strong Wolfe against barrier-like bounds: as above with a boundary
///   fraction of 0.3
#[derive(Debug, Clone)]
pub struct LineSearchParams {
    /// Armijo sufficient decrease parameter
    pub c1: f64,

    /// Curvature parameter (strong Wolfe only)
    pub c2: f64,

    /// Lower bound on the contraction factor when backtracking
    pub min_contraction: f64,

    /// Upper bound on the contraction factor when backtracking
    pub max_contraction: f64,

    /// Expansion factor while bracketing (strong Wolfe only)
    pub expansion: f64,

    /// Smallest step size tried before the search is declared failed
    pub min_step_size: f64,

    /// Largest step size ever tried
    pub max_step_size: f64,

    /// Maximum number of trial steps
    pub max_iterations: usize,

    /// Share of the largest feasible step used as first trial when the
    /// initial step would cross a bound (strong Wolfe only)
    pub boundary_fraction: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        Self::strong_wolfe()
    }
}

impl LineSearchParams {
    /// Validates the parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.c1 > 0.0 && self.c1 < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "c1 must lie in (0, 1)",
                "c1",
                self.c1.to_string(),
            ));
        }
        if !(self.c2 > self.c1 && self.c2 < 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "c2 must lie in (c1, 1)",
                "c2",
                self.c2.to_string(),
            ));
        }
        if !(self.min_contraction > 0.0
            && self.min_contraction <= self.max_contraction
            && self.max_contraction < 1.0)
        {
            return Err(OptimizerError::invalid_configuration(
                "contraction bounds must satisfy 0 < min <= max < 1",
                "contraction",
                format!("[{}, {}]", self.min_contraction, self.max_contraction),
            ));
        }
        if !(self.expansion > 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "expansion factor must exceed 1",
                "expansion",
                self.expansion.to_string(),
            ));
        }
        if !(self.min_step_size > 0.0 && self.min_step_size < self.max_step_size) {
            return Err(OptimizerError::invalid_configuration(
                "step size bounds must satisfy 0 < min < max",
                "step_size",
                format!("[{}, {}]", self.min_step_size, self.max_step_size),
            ));
        }
        if !(self.boundary_fraction > 0.0 && self.boundary_fraction <= 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "boundary fraction must lie in (0, 1]",
                "boundary_fraction",
                self.boundary_fraction.to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one trial step is required",
                "max_iterations",
                "0",
            ));
        }
        Ok(())
    }

    /// Parameters for quasi-Newton methods.
    pub fn strong_wolfe() -> Self {
        Self {
            c1: 1e-4,
            c2: 0.9,
            min_contraction: 0.1,
            max_contraction: 0.5,
            expansion: 2.0,
            min_step_size: constants::MIN_STEP_SIZE,
            max_step_size: constants::MAX_STEP_SIZE,
            max_iterations: 30,
            boundary_fraction: 1.0,
        }
    }

    /// Strong Wolfe parameters that keep the first trial away from the
    /// boundary of the box.
    pub fn strong_wolfe_interior() -> Self {
        Self::strong_wolfe().with_boundary_fraction(0.3)
    }

    /// Sets the share of the largest feasible step tried first when the
    /// initial step would cross a bound.
    pub fn with_boundary_fraction(mut self, fraction: f64) -> Self {
        self.boundary_fraction = fraction;
        self
    }

    /// Parameters for simple sufficient-decrease backtracking.
    pub fn backtracking() -> Self {
        Self {
            max_iterations: 40,
            ..Self::strong_wolfe()
        }
    }
}

/// Trait for line search algorithms.
pub trait LineSearch: Debug {
    /// Returns the name of the line search.
    fn name(&self) -> &str;

    /// Searches from `current` along `direction`, starting with `initial_step`.
    ///
    /// # Errors
    ///
    /// `Interrupt::LineSearch` if no acceptable step was found; budget and
    /// objective interrupts from the session are passed through.
    fn search(
        &mut self,
        session: &mut Session<'_>,
        current: &Iterate,
        direction: &Vector,
        initial_step: f64,
        params: &LineSearchParams,
    ) -> std::result::Result<LineSearchResult, Interrupt>;
}

fn failure(reason: &str, iterations: usize, step: f64) -> Interrupt {
    Interrupt::LineSearch(OptimizerError::line_search_failed(reason, iterations, step))
}

/// Projected backtracking line search with the Armijo condition.
#[derive(Debug, Default, Clone, Copy)]
pub struct BacktrackingLineSearch;

impl BacktrackingLineSearch {
    pub fn new() -> Self {
        Self
    }
}

impl LineSearch for BacktrackingLineSearch {
    fn name(&self) -> &str {
        "Backtracking"
    }

    fn search(
        &mut self,
        session: &mut Session<'_>,
        current: &Iterate,
        direction: &Vector,
        initial_step: f64,
        params: &LineSearchParams,
    ) -> std::result::Result<LineSearchResult, Interrupt> {
        let slope = current.gradient.dot(direction);
        if !(slope < 0.0) {
            return Err(failure("not a descent direction", 0, 0.0));
        }

        let mut alpha = initial_step.min(params.max_step_size);
        for k in 0..params.max_iterations {
            if alpha < params.min_step_size {
                return Err(failure("step size underflow", k, alpha));
            }

            let trial = session.bounds().advance(&current.point, direction, alpha);
            let step = &trial - &current.point;
            if step.iter().all(|s| *s == 0.0) {
                return Err(failure("projected step vanished", k, alpha));
            }

            let decrease = current.gradient.dot(&step).min(0.0);
            let iterate = session.evaluate(trial)?;

            if iterate.is_finite() && iterate.value <= current.value + params.c1 * decrease {
                return Ok(LineSearchResult {
                    step_size: alpha,
                    iterate,
                    evaluations: k + 1,
                });
            }

            // Minimizer of the quadratic through f(x), the slope and f(x(α)).
            let excess = iterate.value - current.value - decrease;
            let next = if iterate.value.is_finite() && decrease < 0.0 && excess > 0.0 {
                alpha * (-decrease) / (2.0 * excess)
            } else {
                alpha * params.min_contraction
            };
            alpha = next.clamp(
                alpha * params.min_contraction,
                alpha * params.max_contraction,
            );
        }

        Err(failure(
            "sufficient decrease not reached",
            params.max_iterations,
            alpha,
        ))
    }
}

/// Line search enforcing the strong Wolfe conditions.
///
/// The search is confined to the feasible part of the ray, so the direction
/// must already be masked against active bounds.
#[derive(Debug, Clone, Copy)]
pub struct StrongWolfeLineSearch {
    /// Relative bracket width below which zooming stops
    bracket_tolerance: f64,
}

impl StrongWolfeLineSearch {
    pub fn new() -> Self {
        Self {
            bracket_tolerance: 1e-10,
        }
    }

    /// Sets the relative bracket width below which zooming stops.
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.bracket_tolerance = tol;
        self
    }
}

impl Default for StrongWolfeLineSearch {
    fn default() -> Self {
        Self::new()
    }
}

/// One end of a bracket: step size, value and directional derivative.
#[derive(Debug, Clone, Copy)]
struct Probe {
    alpha: f64,
    value: f64,
    slope: f64,
}

impl StrongWolfeLineSearch {
    fn trial(
        session: &mut Session<'_>,
        current: &Iterate,
        direction: &Vector,
        alpha: f64,
    ) -> std::result::Result<Iterate, Interrupt> {
        let point = session.bounds().advance(&current.point, direction, alpha);
        session.evaluate(point)
    }

    /// Trial step inside the bracket `[lo, hi]`.
    fn interpolate(lo: &Probe, hi: &Probe) -> f64 {
        let width = hi.alpha - lo.alpha;
        let bisection = lo.alpha + 0.5 * width;
        if !hi.value.is_finite() {
            return bisection;
        }
        let curvature = hi.value - lo.value - lo.slope * width;
        if curvature <= 0.0 {
            return bisection;
        }
        let candidate = lo.alpha - lo.slope * width * width / (2.0 * curvature);
        let (a, b) = if lo.alpha < hi.alpha {
            (lo.alpha, hi.alpha)
        } else {
            (hi.alpha, lo.alpha)
        };
        let margin = 0.1 * (b - a);
        if candidate.is_finite() && candidate > a + margin && candidate < b - margin {
            candidate
        } else {
            bisection
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn zoom(
        &self,
        session: &mut Session<'_>,
        current: &Iterate,
        direction: &Vector,
        params: &LineSearchParams,
        mut lo: Probe,
        mut lo_iterate: Option<Iterate>,
        mut hi: Probe,
        mut evaluations: usize,
    ) -> std::result::Result<LineSearchResult, Interrupt> {
        let slope0 = directional_derivative(current, direction);

        for _ in 0..params.max_iterations {
            let width = (hi.alpha - lo.alpha).abs();
            if width <= self.bracket_tolerance * hi.alpha.abs().max(lo.alpha.abs())
                || width < params.min_step_size
            {
                break;
            }

            let alpha = Self::interpolate(&lo, &hi);
            let iterate = Self::trial(session, current, direction, alpha)?;
            evaluations += 1;

            if !iterate.is_finite()
                || iterate.value > current.value + params.c1 * alpha * slope0
                || iterate.value >= lo.value
            {
                hi = Probe {
                    alpha,
                    value: iterate.value,
                    slope: f64::NAN,
                };
                continue;
            }

            let slope = iterate.gradient.dot(direction);
            if slope.abs() <= -params.c2 * slope0 {
                return Ok(LineSearchResult {
                    step_size: alpha,
                    iterate,
                    evaluations,
                });
            }
            if slope * (hi.alpha - lo.alpha) >= 0.0 {
                hi = lo;
            }
            lo = Probe {
                alpha,
                value: iterate.value,
                slope,
            };
            lo_iterate = Some(iterate);
        }

        // The bracket collapsed; settle for the best Armijo point found.
        match lo_iterate {
            Some(iterate) if iterate.value < current.value => Ok(LineSearchResult {
                step_size: lo.alpha,
                iterate,
                evaluations,
            }),
            _ => Err(failure(
                "strong Wolfe conditions not satisfied",
                evaluations,
                lo.alpha,
            )),
        }
    }
}

fn directional_derivative(current: &Iterate, direction: &Vector) -> f64 {
    current.gradient.dot(direction)
}

impl LineSearch for StrongWolfeLineSearch {
    fn name(&self) -> &str {
        "StrongWolfe"
    }

    fn search(
        &mut self,
        session: &mut Session<'_>,
        current: &Iterate,
        direction: &Vector,
        initial_step: f64,
        params: &LineSearchParams,
    ) -> std::result::Result<LineSearchResult, Interrupt> {
        let slope0 = directional_derivative(current, direction);
        if !(slope0 < 0.0) {
            return Err(failure("not a descent direction", 0, 0.0));
        }

        let max_alpha = session
            .bounds()
            .max_step(&current.point, direction)
            .min(params.max_step_size);
        if !(max_alpha > 0.0) {
            return Err(failure("no feasible step along direction", 0, 0.0));
        }

        let mut prev = Probe {
            alpha: 0.0,
            value: current.value,
            slope: slope0,
        };
        let mut prev_iterate: Option<Iterate> = None;
        let mut alpha = if initial_step > max_alpha {
            params.boundary_fraction * max_alpha
        } else {
            initial_step
        };
        let mut evaluations = 0;

        for i in 0..params.max_iterations {
            let iterate = Self::trial(session, current, direction, alpha)?;
            evaluations += 1;

            if !iterate.is_finite()
                || iterate.value > current.value + params.c1 * alpha * slope0
                || (i > 0 && iterate.value >= prev.value)
            {
                let hi = Probe {
                    alpha,
                    value: iterate.value,
                    slope: f64::NAN,
                };
                return self.zoom(
                    session,
                    current,
                    direction,
                    params,
                    prev,
                    prev_iterate,
                    hi,
                    evaluations,
                );
            }

            let slope = iterate.gradient.dot(direction);
            if slope.abs() <= -params.c2 * slope0 {
                return Ok(LineSearchResult {
                    step_size: alpha,
                    iterate,
                    evaluations,
                });
            }

            let probe = Probe {
                alpha,
                value: iterate.value,
                slope,
            };
            if slope >= 0.0 {
                return self.zoom(
                    session,
                    current,
                    direction,
                    params,
                    probe,
                    Some(iterate),
                    prev,
                    evaluations,
                );
            }

            if alpha >= max_alpha {
                // Still descending at the boundary of the box.
                return Ok(LineSearchResult {
                    step_size: alpha,
                    iterate,
                    evaluations,
                });
            }

            prev = probe;
            prev_iterate = Some(iterate);
            alpha = (alpha * params.expansion).min(max_alpha);
        }

        match prev_iterate {
            Some(iterate) => Ok(LineSearchResult {
                step_size: prev.alpha,
                iterate,
                evaluations,
            }),
            None => Err(failure(
                "strong Wolfe conditions not satisfied",
                evaluations,
                alpha,
            )),
        }
    }
}
