pub use crate::dataset::{Axis, Dataset};
pub use crate::fit::{DatasetResult, FitResult};
pub use crate::linear_solvers::LinearSolverKind;
pub use crate::model::{
    ClpMatrix, Megacomplex, MegacomplexError, MegacomplexRegistry, MegacomplexSpec, Model,
    ModelBuilder,
};
pub use crate::problem::{FitConfig, GlobalProblem, GlobalProblemBuilder};
pub use crate::solvers::levmar::{FitError, GlobalFitSolver};
pub use levenberg_marquardt::LeastSquaresProblem;
