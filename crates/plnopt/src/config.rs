//! Fitting configuration.

use crate::layout::ParameterLayout;
use plnopt_core::{
    error::{OptimizerError, Result},
    optimizer::StoppingCriterion,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerances, budget, variance floor and algorithm of a PLN fit.
///
/// Tolerances of zero disable the corresponding test. A non-positive
/// `maxeval` means no evaluation limit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlnConfig {
    /// Relative tolerance on the objective change
    pub ftol_rel: f64,
    /// Absolute tolerance on the objective change
    pub ftol_abs: f64,
    /// Relative tolerance on the parameter change
    pub xtol_rel: f64,
    /// Absolute tolerance on the change of each S entry
    pub xtol_abs: f64,
    /// Maximum number of objective evaluations
    pub maxeval: i64,
    /// Lower bound of every S entry
    pub lbvar: f64,
    /// Algorithm identifier, see [`Algorithm`](crate::registry::Algorithm)
    pub algorithm: String,
}

impl Default for PlnConfig {
    fn default() -> Self {
        Self {
            ftol_rel: 1e-6,
            ftol_abs: 0.0,
            xtol_rel: 1e-4,
            xtol_abs: 1e-4,
            maxeval: 10_000,
            lbvar: 1e-4,
            algorithm: "CCSAQ".to_string(),
        }
    }
}

impl PlnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ftol_rel(mut self, tol: f64) -> Self {
        self.ftol_rel = tol;
        self
    }

    pub fn with_ftol_abs(mut self, tol: f64) -> Self {
        self.ftol_abs = tol;
        self
    }

    pub fn with_xtol_rel(mut self, tol: f64) -> Self {
        self.xtol_rel = tol;
        self
    }

    pub fn with_xtol_abs(mut self, tol: f64) -> Self {
        self.xtol_abs = tol;
        self
    }

    pub fn with_maxeval(mut self, maxeval: i64) -> Self {
        self.maxeval = maxeval;
        self
    }

    pub fn with_lbvar(mut self, lbvar: f64) -> Self {
        self.lbvar = lbvar;
        self
    }

    pub fn with_algorithm<S: Into<String>>(mut self, algorithm: S) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    /// Evaluation budget, `None` when unlimited.
    pub fn max_evaluations(&self) -> Option<usize> {
        usize::try_from(self.maxeval).ok().filter(|max| *max > 0)
    }

    /// Checks the numeric fields.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("ftol_rel", self.ftol_rel),
            ("ftol_abs", self.ftol_abs),
            ("xtol_rel", self.xtol_rel),
            ("xtol_abs", self.xtol_abs),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(OptimizerError::invalid_configuration(
                    "tolerance must be a non-negative number",
                    name,
                    value.to_string(),
                ));
            }
        }
        if !(self.lbvar > 0.0 && self.lbvar.is_finite()) {
            return Err(OptimizerError::invalid_configuration(
                "variance lower bound must be positive and finite",
                "lbvar",
                self.lbvar.to_string(),
            ));
        }
        Ok(())
    }

    /// Stopping criterion for a problem with the given layout: the absolute
    /// parameter tolerance only applies to the S block.
    pub fn stopping_criterion(&self, layout: &ParameterLayout) -> StoppingCriterion {
        let criterion = StoppingCriterion::new()
            .with_ftol_rel(self.ftol_rel)
            .with_ftol_abs(self.ftol_abs)
            .with_xtol_rel(self.xtol_rel)
            .with_xtol_abs(layout.xtol_abs(self.xtol_abs));
        match self.max_evaluations() {
            Some(max) => criterion.with_max_evaluations(max),
            None => criterion,
        }
    }
}
