#![warn(missing_docs)]
//!
//! # Introduction
//!
//! Global analysis fits one model to several datasets at once. Every dataset
//! is a matrix that is sampled along two axes: the *calculated axis* (e.g. time)
//! along which the model is evaluated, and the *estimated axis* (e.g. wavelength)
//! along which the *conditionally linear parameters* (CLPs) of the model are
//! estimated. For a point `$i$` of the estimated axis, the model of a dataset is
//!
//! ```math
//! \vec{y}_i \approx \mathbf{M}_i(\vec{\alpha})\,\vec{c}_i,
//! ```
//!
//! where `$\vec{\alpha}$` are the nonlinear parameters that are shared by all
//! datasets, `$\mathbf{M}_i(\vec{\alpha})$` is the design matrix with one row per
//! point of the calculated axis and one column per CLP, and `$\vec{c}_i$` are
//! the CLPs at this point.
//!
//! ## Grouping
//!
//! Datasets whose estimated axes share coordinates (within a tolerance) share
//! their CLPs at these coordinates. The points of all estimated axes are
//! therefore clustered into *groups*. For every group, the design matrices of
//! the member datasets are stacked on top of each other, with the columns
//! aligned by CLP label, and a single linear problem
//!
//! ```math
//! \min_{\vec{c}} \lVert \mathbf{W}(\vec{y}-\mathbf{M}(\vec{\alpha})\vec{c}) \rVert_2^2
//! ```
//!
//! is solved per group. The CLPs are thus eliminated for fixed `$\vec{\alpha}$`
//! (variable projection) and the nonlinear optimizer only sees the residuals of
//! all groups as a function of `$\vec{\alpha}$`. The CLPs can also be constrained
//! to be non-negative.
//!
//! ## Optimization
//!
//! This crate uses the [levenberg_marquardt](https://crates.io/crates/levenberg-marquardt/)
//! crate as its optimization backend. The groups of one evaluation are solved in
//! parallel with [rayon](https://crates.io/crates/rayon).
//!
//! # Usage and Workflow
//!
//! 1. Create a [Model](crate::model::Model) with the [ModelBuilder](crate::model::ModelBuilder)
//!    from the names of the nonlinear parameters, the megacomplexes that make up
//!    the design matrices and the dataset models that combine them.
//! 2. Create a [Dataset](crate::dataset::Dataset) per dataset model.
//! 3. Cast the fitting problem into a [GlobalProblem](crate::problem::GlobalProblem)
//!    using the [GlobalProblemBuilder](crate::problem::GlobalProblemBuilder).
//! 4. Solve the problem with the [GlobalFitSolver](crate::solvers::levmar::GlobalFitSolver).
//! 5. Check the [FitResult](crate::fit::FitResult) for success and retrieve the
//!    results per dataset and the statistics.
//!
//! # Example
//!
//! ```rust
//! use globalfit::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! // two decays with rates 0.5 and 2 and their spectra at two wavelengths
//! let time: Vec<f64> = (0..50).map(|t| 0.1 * t as f64).collect();
//! let data = DMatrix::from_fn(time.len(), 2, |t, s| {
//!     let spectra = [[1., 0.5], [0.2, 2.]];
//!     spectra[s][0] * (-0.5 * time[t]).exp() + spectra[s][1] * (-2. * time[t]).exp()
//! });
//!
//! // 1. the model
//! let model = ModelBuilder::new(&["k1", "k2"])
//!     .estimated_axis("spectral")
//!     .calculated_axis("time")
//!     .megacomplex("decay", "decay", &["k1", "k2"], &["s1", "s2"])
//!     .dataset("dataset1", &["decay"])
//!     .build()
//!     .unwrap();
//! // 2. the data
//! let dataset = Dataset::new(
//!     "dataset1",
//!     Axis::new("time", time),
//!     Axis::new("spectral", vec![500., 600.]),
//!     data,
//! )
//! .unwrap();
//! // 3. the problem
//! let problem = GlobalProblemBuilder::new(model)
//!     .dataset(dataset)
//!     .initial_parameters(DVector::from_vec(vec![0.3, 3.]))
//!     .build()
//!     .unwrap();
//! // 4. the fit
//! let result = GlobalFitSolver::default().fit(problem).unwrap();
//! // 5. the results
//! assert!(result.was_successful());
//! let rates = result.best_parameters();
//! let clp = &result.dataset("dataset1").unwrap().clp;
//! # assert!((rates[0] - 0.5).abs() < 1e-6);
//! # assert_eq!(clp.shape(), (2, 2));
//! ```
//!
//! # References and Further Reading
//! (Mullen2007) Mullen, K.M., van Stokkum, I.H.M. TIMP: An R Package for Modeling Multi-way Spectroscopic Measurements. *Journal of Statistical Software* **18** (2007). DOI: [10.18637/jss.v018.i03](https://doi.org/10.18637/jss.v018.i03)
//!
//! (O'Leary2013) O’Leary, D.P., Rust, B.W. Variable projection for nonlinear least squares problems. *Comput Optim Appl* **54**, 579–593 (2013). DOI: [10.1007/s10589-012-9492-9](https://doi.org/10.1007/s10589-012-9492-9)
//!
//! (Lawson1995) Lawson, C.L., Hanson, R.J. Solving Least Squares Problems. SIAM (1995). DOI: [10.1137/1.9781611971217](https://doi.org/10.1137/1.9781611971217)

/// datasets and their named axes
pub mod dataset;
/// results of a fit per dataset
pub mod fit;
/// grouping of the estimated axes of several datasets
pub mod grouping;
pub mod linear_solvers;
/// assembly of design matrices from megacomplexes
pub mod matrix;
/// code pertaining to building and working with global models
pub mod model;
/// commonly useful imports
pub mod prelude;
/// the global problem and its objective
pub mod problem;
/// solvers for the nonlinear minimization problem
pub mod solvers;
/// statistics of the fit
pub mod statistics;

/// private module that contains weights and diagonal matrices
mod util;

#[cfg(test)]
pub(crate) mod test_helpers;
