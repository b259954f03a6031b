//! Observed data of a PLN fit.

use crate::layout::ParameterLayout;
use plnopt_core::{
    error::{OptimizerError, Result},
    types::Matrix,
};

/// Counts, covariates, offsets and the constant term of the objective.
///
/// The matrices are validated once on construction and never modified.
#[derive(Debug, Clone)]
pub struct PlnData {
    y: Matrix,
    x: Matrix,
    o: Matrix,
    ky: f64,
}

impl PlnData {
    /// Creates the data of a fit.
    ///
    /// # Arguments
    /// * `y` - Counts (n × p), finite and non-negative
    /// * `x` - Covariates (n × d)
    /// * `o` - Offsets (n × p)
    /// * `ky` - Constant added to the objective
    ///
    /// # Errors
    /// `DimensionMismatch` if the shapes disagree or `n` or `p` is zero,
    /// `InvalidConfiguration` for negative or non-finite entries.
    pub fn new(y: Matrix, x: Matrix, o: Matrix, ky: f64) -> Result<Self> {
        let (n, p) = y.shape();
        if n == 0 || p == 0 {
            return Err(OptimizerError::dimension_mismatch(
                "at least one observation and one variable",
                format!("{}x{} counts", n, p),
            ));
        }
        if x.nrows() != n {
            return Err(OptimizerError::dimension_mismatch(
                format!("{} covariate rows", n),
                x.nrows(),
            ));
        }
        if o.shape() != (n, p) {
            return Err(OptimizerError::dimension_mismatch(
                format!("{}x{} offsets", n, p),
                format!("{}x{}", o.nrows(), o.ncols()),
            ));
        }

        if let Some(value) = y.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(OptimizerError::invalid_configuration(
                "counts must be finite and non-negative",
                "Y",
                value.to_string(),
            ));
        }
        for (name, matrix) in [("X", &x), ("O", &o)] {
            if let Some(value) = matrix.iter().find(|v| !v.is_finite()) {
                return Err(OptimizerError::invalid_configuration(
                    "entries must be finite",
                    name,
                    value.to_string(),
                ));
            }
        }
        if !ky.is_finite() {
            return Err(OptimizerError::invalid_configuration(
                "constant term must be finite",
                "KY",
                ky.to_string(),
            ));
        }

        Ok(Self { y, x, o, ky })
    }

    /// Number of observations.
    pub fn n(&self) -> usize {
        self.y.nrows()
    }

    /// Number of count variables.
    pub fn p(&self) -> usize {
        self.y.ncols()
    }

    /// Number of covariates.
    pub fn d(&self) -> usize {
        self.x.ncols()
    }

    /// Parameter layout matching the data shapes.
    pub fn layout(&self) -> ParameterLayout {
        ParameterLayout::new(self.n(), self.p(), self.d())
    }

    pub fn y(&self) -> &Matrix {
        &self.y
    }

    pub fn x(&self) -> &Matrix {
        &self.x
    }

    pub fn o(&self) -> &Matrix {
        &self.o
    }

    pub fn ky(&self) -> f64 {
        self.ky
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes() {
        let data = PlnData::new(
            Matrix::from_element(4, 3, 1.0),
            Matrix::from_element(4, 2, 1.0),
            Matrix::zeros(4, 3),
            0.0,
        )
        .unwrap();
        assert_eq!((data.n(), data.p(), data.d()), (4, 3, 2));
        assert_eq!(data.layout().n_param(), 30);
    }

    #[test]
    fn test_shape_errors() {
        let y = Matrix::from_element(4, 3, 1.0);
        let bad_x = PlnData::new(y.clone(), Matrix::zeros(3, 1), Matrix::zeros(4, 3), 0.0);
        assert!(matches!(bad_x, Err(OptimizerError::DimensionMismatch { .. })));

        let bad_o = PlnData::new(y.clone(), Matrix::zeros(4, 1), Matrix::zeros(4, 2), 0.0);
        assert!(matches!(bad_o, Err(OptimizerError::DimensionMismatch { .. })));

        let empty = PlnData::new(Matrix::zeros(0, 3), Matrix::zeros(0, 1), Matrix::zeros(0, 3), 0.0);
        assert!(empty.is_err());
    }

    #[test]
    fn test_value_errors() {
        let mut y = Matrix::from_element(2, 2, 1.0);
        y[(1, 0)] = -1.0;
        let negative = PlnData::new(y, Matrix::zeros(2, 1), Matrix::zeros(2, 2), 0.0);
        assert!(matches!(negative, Err(OptimizerError::InvalidConfiguration { .. })));

        let y = Matrix::from_element(2, 2, 1.0);
        let nan_ky = PlnData::new(y, Matrix::zeros(2, 1), Matrix::zeros(2, 2), f64::NAN);
        assert!(nan_ky.is_err());
    }
}
