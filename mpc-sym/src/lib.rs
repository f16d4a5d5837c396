//! Symbolic modeling front end for the MPC solver.
//!
//! This crate turns symbolic optimization models into the native
//! evaluators the numeric solver consumes. A model is an objective
//! expression plus equality and inequality constraints over symbolic
//! variables and parameters; finalization differentiates the model,
//! emits C evaluators with a fixed ABI, compiles them with the system
//! compiler, and wires the resulting function pointers into an objective
//! the solver can drive with zero symbolic work per iteration.
//!
//! The pieces, bottom up:
//!
//! - [`expr`]: the expression core — immutable, canonicalized,
//!   hash-cached symbolic trees.
//! - [`symbols`]: the variable/parameter naming convention and
//!   classification queries.
//! - [`ordered_set`]: the orderings that pin symbols to vector indices.
//! - [`calculus`]: gradients, Jacobians, Hessians, Taylor expansion.
//! - [`equality`] / [`inequality`]: constraint containers, affine
//!   extraction, and the log barrier.
//! - [`codegen`] / [`jit`]: C emission and the compile-and-load step.
//! - [`objective`]: the facade gluing it all together.
//!
//! # Example
//!
//! ```no_run
//! use mpc_core::Solver;
//! use mpc_sym::{Expr, OrderedSet, SymbolicObjective};
//! use mpc_sym::symbols::{parameter, variable};
//! use nalgebra::DVector;
//!
//! // minimize x^2 + y^2  subject to  x = 3, y >= a
//! let xs = variable("x");
//! let ys = variable("y");
//! let ps = parameter("a");
//! let (x, y, a) = (Expr::symbol(xs), Expr::symbol(ys), Expr::symbol(ps));
//!
//! let mut objective = SymbolicObjective::new();
//! objective.set_objective(&x * &x + &y * &y);
//! objective.equality_constraints.append_equation(x, Expr::integer(3));
//! objective.inequality_constraints.append_greater_than(y, a);
//!
//! let variables: OrderedSet = [xs, ys].into_iter().collect();
//! let parameters: OrderedSet = [ps].into_iter().collect();
//! objective.finalize(&variables, &parameters)?;
//! objective.set_parameters(DVector::from_element(1, 2.0));
//!
//! let solver = Solver::new(&objective)?;
//! let (value, primal, _dual) =
//!     solver.minimize(Some(DVector::from_vec(vec![20.0, 20.0])), None)?;
//! assert!((value - 13.0).abs() < 1e-2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(clippy::all)]

pub mod calculus;
pub mod codegen;
pub mod equality;
pub mod error;
pub mod expr;
pub mod inequality;
pub mod jit;
pub mod objective;
pub mod ordered_set;
pub mod symbols;

pub use equality::EqualityConstraints;
pub use error::{SymError, SymResult};
pub use expr::{Expr, ExprKind, Symbol};
pub use inequality::InequalityConstraints;
pub use jit::JitLibrary;
pub use objective::SymbolicObjective;
pub use ordered_set::OrderedSet;
