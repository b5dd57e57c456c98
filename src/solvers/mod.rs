/// Contains the solver for the global problem using the
/// [levenberg-marquardt](https://crates.io/crates/levenberg-marquardt) crate.
///
/// The nonlinear parameters are optimized with the Levenberg-Marquardt
/// algorithm, while the CLPs are eliminated by the linear solvers of the
/// [`linear_solvers`](crate::linear_solvers) module at every evaluation.
pub mod levmar;
