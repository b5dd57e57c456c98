use distrs::StudentsT;
use nalgebra::{DMatrix, DVector};
use thiserror::Error as ThisError;

#[cfg(test)]
mod test;

/// Information about an error that occurred during calculation
/// of the fit statistics.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum StatisticsError {
    /// the jacobian does not match the residual or the parameters
    #[error(
        "Jacobian has shape {:?}, but expected {} residuals and {} parameters.",
        shape,
        residuals,
        parameters
    )]
    JacobianShapeMismatch {
        /// the shape of the given jacobian
        shape: (usize, usize),
        /// number of residuals
        residuals: usize,
        /// number of parameters
        parameters: usize,
    },
    /// the parameter names do not match the parameters
    #[error("Got {} parameter names for {} parameters.", names, parameters)]
    ParameterNameCountMismatch {
        /// number of names
        names: usize,
        /// number of parameters
        parameters: usize,
    },
}

/// This structure contains some additional statistical information
/// about the fit, such as the goodness of fit and the errors of the
/// nonlinear parameters.
///
/// The statistics refer to the nonlinear parameters `$\vec{\alpha}$` only. The
/// CLPs are eliminated by the linear solver and do not count as variables.
#[derive(Debug, Clone, PartialEq)]
pub struct FitStatistics {
    /// number of evaluations of the objective, including the setup evaluation
    n_evaluations: usize,
    /// number of nonlinear parameters
    n_variables: usize,
    /// length of the residual vector
    n_data: usize,
    /// the sum of squared residuals `$\chi^2 = \lVert \vec{r} \rVert^2$`
    chi_square: f64,
    /// covariance matrix of the nonlinear parameters. `None` if `$J^T J$` is singular.
    covariance_matrix: Option<DMatrix<f64>>,
    best_parameters: DVector<f64>,
    parameter_names: Vec<String>,
}

impl FitStatistics {
    /// Calculate the statistics from the residual and its jacobian at the best fit parameters.
    ///
    /// The covariance matrix is `$C = (J^T J)^{-1} \cdot \chi^2_{red}$`.
    #[allow(non_snake_case)]
    pub fn try_calculate(
        residual: &DVector<f64>,
        jacobian: &DMatrix<f64>,
        best_parameters: DVector<f64>,
        parameter_names: Vec<String>,
        n_evaluations: usize,
    ) -> Result<Self, StatisticsError> {
        if jacobian.shape() != (residual.len(), best_parameters.len()) {
            return Err(StatisticsError::JacobianShapeMismatch {
                shape: jacobian.shape(),
                residuals: residual.len(),
                parameters: best_parameters.len(),
            });
        }
        if parameter_names.len() != best_parameters.len() {
            return Err(StatisticsError::ParameterNameCountMismatch {
                names: parameter_names.len(),
                parameters: best_parameters.len(),
            });
        }

        let mut statistics = Self {
            n_evaluations,
            n_variables: best_parameters.len(),
            n_data: residual.len(),
            chi_square: residual.norm_squared(),
            covariance_matrix: None,
            best_parameters,
            parameter_names,
        };
        let JTJ = jacobian.transpose() * jacobian;
        statistics.covariance_matrix = JTJ
            .try_inverse()
            .filter(|inverse| inverse.iter().all(|v| v.is_finite()))
            .map(|inverse| inverse * statistics.reduced_chi2());
        Ok(statistics)
    }

    /// number of objective evaluations
    pub fn n_evaluations(&self) -> usize {
        self.n_evaluations
    }

    /// number of nonlinear parameters that were varied
    pub fn n_variables(&self) -> usize {
        self.n_variables
    }

    /// number of residuals
    pub fn n_data(&self) -> usize {
        self.n_data
    }

    /// The degrees of freedom `n_data - n_variables`, which is negative for
    /// underdetermined fits.
    pub fn n_free(&self) -> isize {
        self.n_data as isize - self.n_variables as isize
    }

    /// the chi-square `$\chi^2 = \lVert \vec{r} \rVert^2$` of the residual
    pub fn chi2(&self) -> f64 {
        self.chi_square
    }

    /// The reduced chi-square `$\chi^2_{red} = \chi^2 / \max(1, n_{free})$`.
    pub fn reduced_chi2(&self) -> f64 {
        self.chi_square / self.n_free().max(1) as f64
    }

    /// The best fit parameters in the order of the parameter names of the model
    pub fn best_parameters(&self) -> &DVector<f64> {
        &self.best_parameters
    }

    /// the names of the parameters
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    /// the best fit value of the parameter with the given name
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameter_names
            .iter()
            .position(|n| n == name)
            .map(|idx| self.best_parameters[idx])
    }

    /// The covariance matrix of the nonlinear parameters, or `None` if it
    /// could not be calculated because `$J^T J$` is singular.
    ///
    /// # References
    /// See [O'Leary and Rust 2012](https://www.nist.gov/publications/variable-projection-nonlinear-least-squares-problems)
    /// for reference.
    pub fn covariance_matrix(&self) -> Option<&DMatrix<f64>> {
        self.covariance_matrix.as_ref()
    }

    /// The correlation matrix `$\rho_{ij} = c_{ij}/\sqrt{c_{ii} c_{jj}}$` of the
    /// nonlinear parameters.
    pub fn correlation_matrix(&self) -> Option<DMatrix<f64>> {
        self.covariance_matrix.as_ref().map(calc_correlation_matrix)
    }

    /// The standard errors of the parameters, i.e. the square roots of the
    /// diagonal of the covariance matrix.
    pub fn standard_errors(&self) -> Option<DVector<f64>> {
        self.covariance_matrix
            .as_ref()
            .map(|covariance| covariance.diagonal().map(f64::sqrt))
    }

    /// The radius of the confidence interval of every parameter for the given
    /// probability, e.g. `0.95`. The interval is `$\alpha_j \pm \Delta\alpha_j$`,
    /// where `$\Delta\alpha_j$` is the standard error times the quantile of the
    /// Student t distribution with `n_free` degrees of freedom.
    ///
    /// # Panics
    ///
    /// If the probability is not in the open interval `(0,1)`.
    pub fn confidence_radius(&self, probability: f64) -> Option<DVector<f64>> {
        assert!(
            probability > 0. && probability < 1.,
            "probability must be in the open interval (0,1)"
        );
        let standard_errors = self.standard_errors()?;
        let t_scale = StudentsT::ppf((1. + probability) / 2., self.n_free().max(1) as f64);
        Some(standard_errors * t_scale)
    }
}

/// helper function to calculate a correlation matrix from a covariance matrix.
fn calc_correlation_matrix(covariance: &DMatrix<f64>) -> DMatrix<f64> {
    let diagonal = covariance.diagonal();
    DMatrix::from_fn(covariance.nrows(), covariance.ncols(), |i, j| {
        covariance[(i, j)] / (diagonal[i] * diagonal[j]).sqrt()
    })
}
