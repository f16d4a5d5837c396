//! Interior point solver for real-time model predictive control.
//!
//! This crate is the numeric half of the MPC engine: a log-barrier
//! homotopy method with infeasible-start primal-dual Newton steps for
//! problems of the form
//!
//! ```text
//! minimize    phi(x)
//! subject to  A x = b
//!             g_i(x) < 0
//! ```
//!
//! where phi is twice differentiable and convex, the equality constraints
//! are affine, and the inequality constraints admit the log barrier
//! `B(x) = sum_i -log(-g_i(x))`.
//!
//! The solver is written entirely against the [`Objective`] trait, so the
//! cost function and its derivatives can come from hand-written Rust, or
//! from natively compiled evaluators through [`FunctionPointerObjective`].
//! The symbolic front end living in the companion crate produces the
//! latter.
//!
//! # Example
//!
//! ```
//! use mpc_core::{Objective, Solver};
//! use mpc_core::EvalError;
//! use nalgebra::{DMatrix, DVector};
//!
//! /// min x^2, unconstrained
//! struct Quadratic;
//!
//! impl Objective for Quadratic {
//!     fn num_variables(&self) -> usize { 1 }
//!     fn num_equality_constraints(&self) -> usize { 0 }
//!     fn num_inequality_constraints(&self) -> usize { 0 }
//!     fn value(&self, x: &DVector<f64>) -> Result<f64, EvalError> {
//!         Ok(x[0] * x[0])
//!     }
//!     fn gradient(&self, x: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
//!         Ok(2.0 * x)
//!     }
//!     fn hessian(&self, _x: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
//!         Ok(DMatrix::from_element(1, 1, 2.0))
//!     }
//! }
//!
//! let objective = Quadratic;
//! let solver = Solver::new(&objective)?;
//! let (value, x, _nu) = solver.minimize(Some(DVector::from_element(1, 9.0)), None)?;
//! assert!(value < 1e-8);
//! assert!(x[0].abs() < 1e-8);
//! # Ok::<(), mpc_core::SolverError>(())
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod function_pointer;
pub mod objective;
pub mod settings;
pub mod solver;

pub use error::{EvalError, SolverError, SolverResult};
pub use function_pointer::{FunctionPointerObjective, ParamEvalFn, StateEvalFn};
pub use objective::Objective;
pub use settings::HyperParameters;
pub use solver::Solver;
