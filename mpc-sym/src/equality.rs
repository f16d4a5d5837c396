//! Affine equality constraints.
//!
//! Each stored expression `E` means `E = 0`; a top-level equation
//! `L = R` is read as the residual `R - L`. The container preserves
//! insertion order, and [`convert_to_linear_system`] turns the whole set
//! into the matrix pair `(A, b)` with `A x = b` row-for-row equivalent to
//! the stored constraints.
//!
//! [`convert_to_linear_system`]: EqualityConstraints::convert_to_linear_system

use nalgebra::DMatrix;
use rustc_hash::FxHashSet;

use crate::error::{SymError, SymResult};
use crate::expr::{Expr, Symbol};
use crate::ordered_set::OrderedSet;
use crate::symbols::{is_variable, parameters_of, symbols_of, variables_of};

/// An ordered collection of equality constraints.
#[derive(Debug, Clone, Default)]
pub struct EqualityConstraints {
    constraints: Vec<Expr>,
}

impl EqualityConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Append a constraint `e = 0`.
    pub fn append(&mut self, e: Expr) {
        self.constraints.push(e);
    }

    /// Append a two-sided constraint `lhs = rhs`, stored as the residual
    /// `lhs - rhs`.
    pub fn append_equation(&mut self, lhs: Expr, rhs: Expr) {
        self.append(Expr::sub(lhs, rhs));
    }

    /// Insert a constraint `e = 0` at `index`. Fails with
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

    /// Extract the affine system `(A, b)` over the given variable
    /// ordering.
    ///
    /// `A` is `M x N` and `b` is `M x 1`, both with (possibly
    /// parameter-valued) expression entries, such that row `r` of
    /// `A x = b` holds exactly when constraint `r` does. Fails with
    /// [`SymError::UnknownSymbol`] if a constraint uses a variable
    /// missing from the ordering, and [`SymError::Nonlinear`] if any
    /// expanded term has total variable degree above one.
    pub fn convert_to_linear_system(
        &self,
        variable_ordering: &OrderedSet,
    ) -> SymResult<(DMatrix<Expr>, DMatrix<Expr>)> {
        // The ordering must cover every variable the constraints touch
        for symbol in self.variables() {
            if !variable_ordering.contains(symbol) {
                return Err(SymError::UnknownSymbol(symbol.name()));
            }
        }

        let num_constraints = self.num_constraints();
        let num_variables = variable_ordering.size();

        let mut matrix =
            DMatrix::from_element(num_constraints, num_variables, Expr::zero());
        let mut vector = DMatrix::from_element(num_constraints, 1, Expr::zero());

        for (row, constraint) in self.constraints.iter().enumerate() {
            let residual = constraint.residual_form().expand();

            // Constant side of the constraint, accumulated across terms
            let mut remainder = Vec::new();

            for term in residual.terms() {
                let mut variable: Option<Symbol> = None;
                let mut coefficient = Vec::new();

                for factor in term.factors() {
                    let factor_variables = variables_of(&factor);
                    if factor_variables.is_empty() {
                        coefficient.push(factor);
                        continue;
                    }
                    // A factor touching variables must be exactly one
                    // bare, first-degree variable; x^2, x*y (which
                    // canonicalizes through powers), and sin(x) all land
                    // here.
                    let linear = factor.as_symbol().filter(|&s| is_variable(s));
                    let Some(symbol) = linear else {
                        return Err(SymError::Nonlinear(format!(
                            "term `{term}` is not linear in the variables"
                        )));
                    };
                    if variable.is_some() {
                        return Err(SymError::Nonlinear(format!(
                            "term `{term}` mixes two variables"
                        )));
                    }
                    variable = Some(symbol);
                }

                match variable {
                    Some(symbol) => {
                        let column = variable_ordering.index_of(symbol)?;
                        let entry = matrix[(row, column)].clone();
                        matrix[(row, column)] =
                            Expr::add(entry, Expr::mul_all(coefficient));
                    }
                    None => remainder.push(term),
                }
            }

            vector[(row, 0)] = Expr::neg(Expr::add_all(remainder));
        }

        Ok((matrix, vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{parameter, variable};
    use rustc_hash::FxHashMap;

    #[test]
    fn test_index_operations() {
        let x = Expr::symbol(variable("eq_x"));
        let y = Expr::symbol(variable("eq_y"));
        let mut constraints = EqualityConstraints::new();

        constraints.append(x.clone());
        constraints.insert(0, y.clone()).unwrap();
        assert_eq!(constraints.num_constraints(), 2);
        assert_eq!(*constraints.get(0).unwrap(), y);
        assert_eq!(*constraints.get(1).unwrap(), x);

        constraints.remove(0).unwrap();
        assert_eq!(constraints.num_constraints(), 1);
        assert_eq!(*constraints.get(0).unwrap(), x);

        assert!(constraints.insert(5, y).is_err());
        assert!(constraints.remove(3).is_err());
        assert!(constraints.get(7).is_err());
    }

    #[test]
    fn test_affine_extraction() {
        // x = 3y + 4 and (z + a)/2 = 7 over ordering (x, y, z)
        let xs = variable("le_x");
        let ys = variable("le_y");
        let zs = variable("le_z");
        let ps = parameter("le_a");
        let (x, y, z, a) = (
            Expr::symbol(xs),
            Expr::symbol(ys),
            Expr::symbol(zs),
            Expr::symbol(ps),
        );

        let mut constraints = EqualityConstraints::new();
        constraints.append_equation(x, 3 * &y + 4);
        constraints.append_equation((&z + &a) / 2, Expr::integer(7));

        let ordering: OrderedSet = [xs, ys, zs].into_iter().collect();
        let (matrix, vector) = constraints.convert_to_linear_system(&ordering).unwrap();

        assert_eq!((matrix.nrows(), matrix.ncols()), (2, 3));
        let bindings: FxHashMap<_, _> = [(ps, 1.0)].into_iter().collect();
        let expected = [[1.0, -3.0, 0.0], [0.0, 0.0, 0.5]];
        for r in 0..2 {
            for c in 0..3 {
                assert_eq!(matrix[(r, c)].eval(&bindings).unwrap(), expected[r][c]);
            }
        }
        assert_eq!(vector[(0, 0)].eval(&bindings).unwrap(), 4.0);
        assert_eq!(vector[(1, 0)].eval(&bindings).unwrap(), 6.5);
    }

    #[test]
    fn test_top_level_equation_normalized() {
        let xs = variable("ne_x");
        let x = Expr::symbol(xs);
        let mut constraints = EqualityConstraints::new();
        constraints.append(Expr::equality(x, Expr::integer(3)));

        let ordering: OrderedSet = [xs].into_iter().collect();
        let (matrix, vector) = constraints.convert_to_linear_system(&ordering).unwrap();

        let bindings = FxHashMap::default();
        // x = 3 reads as 3 - x = 0, so the row is -x = -3
        assert_eq!(matrix[(0, 0)].eval(&bindings).unwrap(), -1.0);
        assert_eq!(vector[(0, 0)].eval(&bindings).unwrap(), -3.0);
    }

    #[test]
    fn test_repeated_variable_coefficients_sum() {
        let xs = variable("rs_x");
        let x = Expr::symbol(xs);
        let a = Expr::symbol(parameter("rs_a"));
        // x + a*x - 5 = 0: the x coefficients sum to 1 + a
        let mut constraints = EqualityConstraints::new();
        constraints.append(&x + &a * &x - 5);

        let ordering: OrderedSet = [xs].into_iter().collect();
        let (matrix, vector) = constraints.convert_to_linear_system(&ordering).unwrap();

        let bindings: FxHashMap<_, _> =
            [(parameter("rs_a"), 2.0)].into_iter().collect();
        assert_eq!(matrix[(0, 0)].eval(&bindings).unwrap(), 3.0);
        assert_eq!(vector[(0, 0)].eval(&bindings).unwrap(), 5.0);
    }

    #[test]
    fn test_nonlinear_rejected() {
        let xs = variable("nl_x");
        let ys = variable("nl_y");
        let (x, y) = (Expr::symbol(xs), Expr::symbol(ys));
        let ordering: OrderedSet = [xs, ys].into_iter().collect();

        // Quadratic in one variable
        let mut quadratic = EqualityConstraints::new();
        quadratic.append(&x * &x - 1);
        assert!(matches!(
            quadratic.convert_to_linear_system(&ordering),
            Err(SymError::Nonlinear(_))
        ));

        // Bilinear across two variables
        let mut bilinear = EqualityConstraints::new();
        bilinear.append(&x * &y - 1);
        assert!(matches!(
            bilinear.convert_to_linear_system(&ordering),
            Err(SymError::Nonlinear(_))
        ));

        // A variable inside a transcendental function
        let mut transcendental = EqualityConstraints::new();
        transcendental.append(Expr::sin(x.clone()));
        assert!(matches!(
            transcendental.convert_to_linear_system(&ordering),
            Err(SymError::Nonlinear(_))
        ));
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let xs = variable("uv_x");
        let ys = variable("uv_y");
        let mut constraints = EqualityConstraints::new();
        constraints.append(Expr::add(Expr::symbol(xs), Expr::symbol(ys)));

        let ordering: OrderedSet = [xs].into_iter().collect();
        assert!(matches!(
            constraints.convert_to_linear_system(&ordering),
            Err(SymError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_linear_system_semantics() {
        // Substituting a concrete assignment into the constraints gives
        // zero exactly when A x - b does
        let xs = variable("sm_x");
        let ys = variable("sm_y");
        let (x, y) = (Expr::symbol(xs), Expr::symbol(ys));

        let mut constraints = EqualityConstraints::new();
        constraints.append(2 * &x - &y + 3);

        let ordering: OrderedSet = [xs, ys].into_iter().collect();
        let (matrix, vector) = constraints.convert_to_linear_system(&ordering).unwrap();

        for (px, py) in [(0.0, 3.0), (1.0, 5.0), (2.0, 2.0)] {
            let bindings: FxHashMap<_, _> =
                [(xs, px), (ys, py)].into_iter().collect();
            let direct = constraints.get(0).unwrap().eval(&bindings).unwrap();
            let via_system = matrix[(0, 0)].eval(&bindings).unwrap() * px
                + matrix[(0, 1)].eval(&bindings).unwrap() * py
                - vector[(0, 0)].eval(&bindings).unwrap();
            assert!((direct - via_system).abs() < 1e-12);
            assert_eq!(direct == 0.0, via_system == 0.0);
        }
    }
}
