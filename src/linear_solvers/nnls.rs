use super::{LinearSolution, LinearSolver};
use nalgebra::{DMatrix, DVector};

/// Solves the linear subproblem under the constraint that all CLPs are
/// non-negative, using the active set method of Lawson and Hanson.
///
/// The number of iterations is bounded. If the bound is reached, the current
/// feasible iterate is returned and the solution is marked as not converged.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NonNegativeLeastSquares {
    /// the iteration bound, defaults to three times the number of columns
    max_iterations: Option<usize>,
}

impl NonNegativeLeastSquares {
    /// use a fixed iteration bound
    pub fn with_max_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations: Some(max_iterations),
        }
    }

    /// the fixed iteration bound, if any
    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }
}

/// Unconstrained least squares solution on the passive columns. The entries of
/// the active columns are zero.
#[allow(non_snake_case)]
fn passive_least_squares(M: &DMatrix<f64>, d: &DVector<f64>, passive: &[bool]) -> DVector<f64> {
    let columns: Vec<usize> = (0..M.ncols()).filter(|&j| passive[j]).collect();
    let mut s = DVector::zeros(M.ncols());
    if columns.is_empty() {
        return s;
    }
    let M_p = M.select_columns(columns.iter());
    let max_dim = M_p.nrows().max(M_p.ncols());
    let svd = M_p.svd(true, true);
    let epsilon = svd.singular_values.max() * max_dim as f64 * f64::EPSILON;
    let s_p = svd
        .solve(d, epsilon)
        .unwrap_or_else(|_| DVector::zeros(columns.len()));
    for (&j, &value) in columns.iter().zip(s_p.iter()) {
        s[j] = value;
    }
    s
}

impl LinearSolver for NonNegativeLeastSquares {
    #[allow(non_snake_case)]
    fn solve(&self, M: &DMatrix<f64>, d: &DVector<f64>) -> LinearSolution {
        let n = M.ncols();
        if n == 0 {
            return LinearSolution::degenerate(d);
        }
        let max_iterations = self.max_iterations.unwrap_or(3 * n);
        // the tolerance of scipy's nnls: 10 * eps * ||M||_1 * max(m,n)
        let norm_1 = M.column_iter().map(|c| c.lp_norm(1)).fold(0., f64::max);
        let tolerance = 10. * f64::EPSILON * norm_1 * M.nrows().max(n) as f64;

        let mut x = DVector::<f64>::zeros(n);
        let mut passive = vec![false; n];
        let mut iterations = 0;
        let mut converged = true;

        'outer: loop {
            // dual vector, the negative gradient of the objective
            let w = M.tr_mul(&(d - M * &x));
            let candidate = (0..n)
                .filter(|&j| !passive[j] && w[j] > tolerance)
                .max_by(|&a, &b| w[a].total_cmp(&w[b]));
            let Some(j) = candidate else {
                break;
            };
            passive[j] = true;

            loop {
                if iterations >= max_iterations {
                    converged = false;
                    break 'outer;
                }
                iterations += 1;

                let s = passive_least_squares(M, d, &passive);
                let infeasible: Vec<usize> =
                    (0..n).filter(|&k| passive[k] && s[k] <= 0.).collect();
                if infeasible.is_empty() {
                    x = s;
                    break;
                }
                // step from x towards s until the first passive entry hits zero
                let alpha = infeasible
                    .iter()
                    .filter(|&&k| x[k] - s[k] > 0.)
                    .map(|&k| x[k] / (x[k] - s[k]))
                    .fold(1., f64::min);
                x += (s - &x) * alpha;
                for k in 0..n {
                    if passive[k] && x[k] <= tolerance {
                        passive[k] = false;
                        x[k] = 0.;
                    }
                }
            }
        }

        let residual = d - M * &x;
        LinearSolution {
            clp: x,
            residual,
            converged,
            iterations,
        }
    }
}
