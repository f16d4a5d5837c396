//! Inequality constraints and their log barrier.
//!
//! Each stored expression `E` means `E < 0`. The convenience forms
//! `L <= R` and `L >= R` store `L - R` and `R - L` respectively. The
//! container builds the log-barrier value
//!
//! ```text
//! B(x) = sum_i -log(-E_i(x))
//! ```
//!
//! which is defined exactly on the strictly feasible set, together with
//! its symbolic gradient and Hessian over a variable ordering.

use nalgebra::DMatrix;
use rustc_hash::FxHashSet;

use crate::calculus::{gradient, hessian};
use crate::error::{SymError, SymResult};
use crate::expr::{Expr, Symbol};
use crate::ordered_set::OrderedSet;
use crate::symbols::{parameters_of, symbols_of, variables_of};

/// An ordered collection of inequality constraints in normal form.
#[derive(Debug, Clone, Default)]
pub struct InequalityConstraints {
    constraints: Vec<Expr>,
}

impl InequalityConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Append a constraint already in normal form, `e < 0`.
    pub fn append(&mut self, e: Expr) {
        self.constraints.push(e);
    }

    /// Append `lhs <= rhs`, stored as `lhs - rhs < 0`.
    pub fn append_less_than(&mut self, lhs: Expr, rhs: Expr) {
        self.append(Expr::sub(lhs, rhs));
    }

    /// Append `lhs >= rhs`, stored as `rhs - lhs < 0`.
    pub fn append_greater_than(&mut self, lhs: Expr, rhs: Expr) {
        self.append(Expr::sub(rhs, lhs));
    }

    /// Insert a normal-form constraint at `index`. Fails with
    /// [`SymError::InvalidArgument`] if `index > num_constraints`.
    pub fn insert(&mut self, index: usize, e: Expr) -> SymResult<()> {
        if index > self.constraints.len() {
            return Err(SymError::InvalidArgument(format!(
                "insert index {index} out of range for {} constraints",
                self.constraints.len()
            )));
        }
        self.constraints.insert(index, e);
        Ok(())
    }

    /// Remove the constraint at `index`.
    pub fn remove(&mut self, index: usize) -> SymResult<()> {
        if index >= self.constraints.len() {
            return Err(SymError::InvalidArgument(format!(
                "remove index {index} out of range for {} constraints",
                self.constraints.len()
            )));
        }
        self.constraints.remove(index);
        Ok(())
    }

    /// The constraint at `index`.
    pub fn get(&self, index: usize) -> SymResult<&Expr> {
        self.constraints.get(index).ok_or_else(|| {
            SymError::InvalidArgument(format!(
                "index {index} out of range for {} constraints",
                self.constraints.len()
            ))
        })
    }

    /// Every symbol appearing in any constraint.
    pub fn symbols(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        for c in &self.constraints {
            out.extend(symbols_of(c));
        }
        out
    }

    /// Every variable appearing in any constraint.
    pub fn variables(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        for c in &self.constraints {
            out.extend(variables_of(c));
        }
        out
    }

    /// Every parameter appearing in any constraint.
    pub fn parameters(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        for c in &self.constraints {
            out.extend(parameters_of(c));
        }
        out
    }

    /// The barrier value `sum_i -log(-E_i)`; the zero expression when
    /// there are no constraints.
    pub fn symbolic_barrier_value(&self) -> Expr {
        Expr::add_all(
            self.constraints
                .iter()
                .map(|c| Expr::neg(Expr::log(Expr::neg(c.clone())))),
        )
    }

    /// The gradient of the barrier value along the ordering (N x 1; zero
    /// when there are no constraints).
    pub fn symbolic_barrier_gradient(&self, ordering: &OrderedSet) -> DMatrix<Expr> {
        gradient(&self.symbolic_barrier_value(), ordering)
    }

    /// The Hessian of the barrier value along the ordering (N x N; zero
    /// when there are no constraints).
    pub fn symbolic_barrier_hessian(&self, ordering: &OrderedSet) -> DMatrix<Expr> {
        hessian(&self.symbolic_barrier_value(), ordering)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{parameter, variable};
    use rustc_hash::FxHashMap;

    #[test]
    fn test_barrier_value_scenario() {
        // x + y < 4 and z + a > 0, at (1, 1, 1) with a = 1:
        // B = -log(4 - x - y) - log(z + a) = -log(2) - log(2)
        let xs = variable("iq_x");
        let ys = variable("iq_y");
        let zs = variable("iq_z");
        let ps = parameter("iq_a");

        let mut constraints = InequalityConstraints::new();
        constraints.append_less_than(
            Expr::add(Expr::symbol(xs), Expr::symbol(ys)),
            Expr::integer(4),
        );
        constraints.append_greater_than(
            Expr::add(Expr::symbol(zs), Expr::symbol(ps)),
            Expr::zero(),
        );

        let bindings: FxHashMap<_, _> =
            [(xs, 1.0), (ys, 1.0), (zs, 1.0), (ps, 1.0)].into_iter().collect();
        let value = constraints
            .symbolic_barrier_value()
            .eval(&bindings)
            .unwrap();
        assert!((value - (-2.0 * 2.0_f64.ln())).abs() < 1e-10);
        assert!((value + 1.3862943611).abs() < 1e-9);
    }

    #[test]
    fn test_empty_barrier_is_zero() {
        let constraints = InequalityConstraints::new();
        assert!(constraints.symbolic_barrier_value().is_zero());

        let ordering: OrderedSet =
            [variable("ib_x"), variable("ib_y")].into_iter().collect();
        let grad = constraints.symbolic_barrier_gradient(&ordering);
        let hess = constraints.symbolic_barrier_hessian(&ordering);
        assert_eq!((grad.nrows(), grad.ncols()), (2, 1));
        assert_eq!((hess.nrows(), hess.ncols()), (2, 2));
        assert!(grad.iter().all(|e| e.is_zero()));
        assert!(hess.iter().all(|e| e.is_zero()));
    }

    #[test]
    fn test_barrier_gradient_matches_finite_difference() {
        // Single constraint x < 2, so B = -log(2 - x)
        let xs = variable("ig_x");
        let mut constraints = InequalityConstraints::new();
        constraints.append_less_than(Expr::symbol(xs), Expr::integer(2));

        let ordering: OrderedSet = [xs].into_iter().collect();
        let barrier = constraints.symbolic_barrier_value();
        let grad = constraints.symbolic_barrier_gradient(&ordering);

        let h = 1e-6;
        let at = |v: f64| {
            let bindings: FxHashMap<_, _> = [(xs, v)].into_iter().collect();
            barrier.eval(&bindings).unwrap()
        };
        let bindings: FxHashMap<_, _> = [(xs, 0.5)].into_iter().collect();
        let symbolic = grad[(0, 0)].eval(&bindings).unwrap();
        let numeric = (at(0.5 + h) - at(0.5 - h)) / (2.0 * h);
        assert!((symbolic - numeric).abs() < 1e-6);
        // Analytically, d/dx -log(2 - x) = 1 / (2 - x)
        assert!((symbolic - 1.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_append_then_remove_leaves_barrier_invariant() {
        let xs = variable("ir_x");
        let mut constraints = InequalityConstraints::new();
        constraints.append_less_than(Expr::symbol(xs), Expr::integer(1));

        let before = constraints.symbolic_barrier_value();
        constraints.append_greater_than(Expr::symbol(xs), Expr::integer(-5));
        constraints.remove(1).unwrap();
        let after = constraints.symbolic_barrier_value();
        assert_eq!(before, after);
    }

    #[test]
    fn test_insert_bounds_checked() {
        let mut constraints = InequalityConstraints::new();
        assert!(constraints
            .insert(1, Expr::symbol(variable("ii_x")))
            .is_err());
        assert!(constraints.remove(0).is_err());
        assert!(constraints.get(0).is_err());
    }
}
