//! Supported optimization algorithms.
//!
//! Names are resolved into a closed [`Algorithm`] enum. There is no
//! catch-all variant: an unknown name is an
//! [`InvalidAlgorithm`](OptimizerError::InvalidAlgorithm) error, so an
//! unresolved algorithm can never reach optimizer construction.

use plnopt_core::{
    error::{OptimizerError, Result},
    optimizer::Optimizer,
};
use plnopt_optim::{
    Ccsa, CcsaConfig, LBFGSConfig, TruncatedNewton, TruncatedNewtonConfig, VariableMetric,
    VariableMetricConfig, LBFGS,
};
use std::fmt;
use std::str::FromStr;

/// Bound-constrained gradient algorithms available for PLN fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// L-BFGS with the classic two-loop recursion and a strong Wolfe search
    LbfgsNocedal,
    /// Projected L-BFGS
    Lbfgs,
    /// Shifted limited-memory variable metric, rank-1 corrections
    Var1,
    /// Shifted limited-memory variable metric, rank-2 corrections
    Var2,
    /// Truncated Newton
    Tnewton,
    /// Truncated Newton with restarts
    TnewtonRestart,
    /// Preconditioned truncated Newton
    TnewtonPrecond,
    /// Preconditioned truncated Newton with restarts
    TnewtonPrecondRestart,
    /// Method of moving asymptotes
    Mma,
    /// CCSA with quadratic approximations
    Ccsaq,
}

/// Groups of related algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmFamily {
    QuasiNewton,
    VariableMetric,
    TruncatedNewton,
    ConservativeConvexSeparable,
}

impl Algorithm {
    /// Every supported algorithm.
    pub const ALL: [Algorithm; 10] = [
        Self::LbfgsNocedal,
        Self::Lbfgs,
        Self::Var1,
        Self::Var2,
        Self::Tnewton,
        Self::TnewtonRestart,
        Self::TnewtonPrecond,
        Self::TnewtonPrecondRestart,
        Self::Mma,
        Self::Ccsaq,
    ];

    /// Resolves an identifier such as `"LBFGS"` or `"CCSAQ"`.
    ///
    /// Matching is exact and case-sensitive.
    pub fn resolve(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|algorithm| algorithm.name() == name)
            .ok_or_else(|| OptimizerError::invalid_algorithm(name))
    }

    /// The identifier this algorithm resolves from.
    pub fn name(self) -> &'static str {
        match self {
            Self::LbfgsNocedal => "LBFGS_NOCEDAL",
            Self::Lbfgs => "LBFGS",
            Self::Var1 => "VAR1",
            Self::Var2 => "VAR2",
            Self::Tnewton => "TNEWTON",
            Self::TnewtonRestart => "TNEWTON_RESTART",
            Self::TnewtonPrecond => "TNEWTON_PRECOND",
            Self::TnewtonPrecondRestart => "TNEWTON_PRECOND_RESTART",
            Self::Mma => "MMA",
            Self::Ccsaq => "CCSAQ",
        }
    }

    pub fn family(self) -> AlgorithmFamily {
        match self {
            Self::LbfgsNocedal | Self::Lbfgs => AlgorithmFamily::QuasiNewton,
            Self::Var1 | Self::Var2 => AlgorithmFamily::VariableMetric,
            Self::Tnewton
            | Self::TnewtonRestart
            | Self::TnewtonPrecond
            | Self::TnewtonPrecondRestart => AlgorithmFamily::TruncatedNewton,
            Self::Mma | Self::Ccsaq => AlgorithmFamily::ConservativeConvexSeparable,
        }
    }

    /// Creates an optimizer with its default configuration.
    pub fn build(self) -> Box<dyn Optimizer> {
        match self {
            Self::LbfgsNocedal => Box::new(LBFGS::new(LBFGSConfig::nocedal())),
            Self::Lbfgs => Box::new(LBFGS::new(LBFGSConfig::new())),
            Self::Var1 => Box::new(VariableMetric::new(VariableMetricConfig::rank_one())),
            Self::Var2 => Box::new(VariableMetric::new(VariableMetricConfig::rank_two())),
            Self::Tnewton => Box::new(TruncatedNewton::new(TruncatedNewtonConfig::new())),
            Self::TnewtonRestart => {
                Box::new(TruncatedNewton::new(TruncatedNewtonConfig::restarting()))
            }
            Self::TnewtonPrecond => {
                Box::new(TruncatedNewton::new(TruncatedNewtonConfig::preconditioned()))
            }
            Self::TnewtonPrecondRestart => Box::new(TruncatedNewton::new(
                TruncatedNewtonConfig::preconditioned_restarting(),
            )),
            Self::Mma => Box::new(Ccsa::new(CcsaConfig::mma())),
            Self::Ccsaq => Box::new(Ccsa::new(CcsaConfig::quadratic())),
        }
    }
}

impl FromStr for Algorithm {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    #[test]
    fn test_resolve_all_names() {
        let names = [
            "LBFGS_NOCEDAL",
            "LBFGS",
            "VAR1",
            "VAR2",
            "TNEWTON",
            "TNEWTON_RESTART",
            "TNEWTON_PRECOND",
            "TNEWTON_PRECOND_RESTART",
            "MMA",
            "CCSAQ",
        ];
        let resolved: HashSet<Algorithm> = names
            .iter()
            .map(|name| Algorithm::resolve(name).unwrap())
            .collect();
        assert_eq!(resolved.len(), names.len());

        for name in names {
            let algorithm: Algorithm = name.parse().unwrap();
            assert_eq!(algorithm.to_string(), name);
        }
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        for name in ["not_an_algorithm", "lbfgs", "", "LBFGS ", "NUM_ALGORITHMS"] {
            match Algorithm::resolve(name) {
                Err(OptimizerError::InvalidAlgorithm { name: rejected }) => assert_eq!(rejected, name),
                other => panic!("{:?} resolved to {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_families() {
        let count = |family| Algorithm::ALL.iter().filter(|a| a.family() == family).count();
        assert_eq!(count(AlgorithmFamily::QuasiNewton), 2);
        assert_eq!(count(AlgorithmFamily::VariableMetric), 2);
        assert_eq!(count(AlgorithmFamily::TruncatedNewton), 4);
        assert_eq!(count(AlgorithmFamily::ConservativeConvexSeparable), 2);
    }

    #[test]
    fn test_build_distinct_optimizers() {
        let names: HashSet<String> = Algorithm::ALL
            .iter()
            .map(|algorithm| algorithm.build().name().to_string())
            .collect();
        assert_eq!(names.len(), Algorithm::ALL.len());
    }
}
