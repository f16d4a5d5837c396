//! Symbol roles and classification.
//!
//! A naming convention partitions symbols into two roles: decision
//! variables carry the `V:` prefix and parameters the `P:` prefix. The
//! prefix is an encoding detail; models create symbols through
//! [`variable`] and [`parameter`], which apply it.

use nalgebra::DMatrix;
use rustc_hash::FxHashSet;

use crate::expr::{Expr, ExprKind, Symbol};

/// Name prefix marking a symbol as a decision variable.
pub const VARIABLE_PREFIX: &str = "V:";

/// Name prefix marking a symbol as a parameter.
pub const PARAMETER_PREFIX: &str = "P:";

/// Create a decision variable symbol.
///
/// A variable named `x` is a symbol named `V:x`.
pub fn variable(name: &str) -> Symbol {
    Symbol::new(format!("{VARIABLE_PREFIX}{name}"))
}

/// Create a family of indexed variables `base[0] .. base[num-1]`.
pub fn variable_vector(base: &str, num: usize) -> Vec<Symbol> {
    (0..num).map(|i| variable(&format!("{base}[{i}]"))).collect()
}

/// Create a parameter symbol.
///
/// A parameter named `a` is a symbol named `P:a`.
pub fn parameter(name: &str) -> Symbol {
    Symbol::new(format!("{PARAMETER_PREFIX}{name}"))
}

/// Create a family of indexed parameters `base[0] .. base[num-1]`.
pub fn parameter_vector(base: &str, num: usize) -> Vec<Symbol> {
    (0..num).map(|i| parameter(&format!("{base}[{i}]"))).collect()
}

/// Whether the symbol carries the variable prefix.
pub fn is_variable(symbol: Symbol) -> bool {
    symbol.name().starts_with(VARIABLE_PREFIX)
}

/// Whether the symbol carries the parameter prefix.
pub fn is_parameter(symbol: Symbol) -> bool {
    symbol.name().starts_with(PARAMETER_PREFIX)
}

fn collect(e: &Expr, out: &mut FxHashSet<Symbol>) {
    match e.kind() {
        ExprKind::Integer(_) | ExprKind::Rational(_) => {}
        ExprKind::Symbol(s) => {
            out.insert(*s);
        }
        ExprKind::Add(children) | ExprKind::Mul(children) => {
            for child in children {
                collect(child, out);
            }
        }
        ExprKind::Pow(a, b) | ExprKind::Equality(a, b) => {
            collect(a, out);
            collect(b, out);
        }
        ExprKind::Sin(a)
        | ExprKind::Cos(a)
        | ExprKind::Tan(a)
        | ExprKind::Log(a)
        | ExprKind::Exp(a) => collect(a, out),
    }
}

/// Every symbol appearing in the expression.
pub fn symbols_of(e: &Expr) -> FxHashSet<Symbol> {
    let mut out = FxHashSet::default();
    collect(e, &mut out);
    out
}

/// Every variable (by prefix) appearing in the expression.
pub fn variables_of(e: &Expr) -> FxHashSet<Symbol> {
    symbols_of(e).into_iter().filter(|s| is_variable(*s)).collect()
}

/// Every parameter (by prefix) appearing in the expression.
pub fn parameters_of(e: &Expr) -> FxHashSet<Symbol> {
    symbols_of(e).into_iter().filter(|s| is_parameter(*s)).collect()
}

/// Union of [`symbols_of`] across every entry of a matrix.
pub fn symbols_of_matrix(mat: &DMatrix<Expr>) -> FxHashSet<Symbol> {
    let mut out = FxHashSet::default();
    for e in mat.iter() {
        collect(e, &mut out);
    }
    out
}

/// Union of [`variables_of`] across every entry of a matrix.
pub fn variables_of_matrix(mat: &DMatrix<Expr>) -> FxHashSet<Symbol> {
    symbols_of_matrix(mat)
        .into_iter()
        .filter(|s| is_variable(*s))
        .collect()
}

/// Union of [`parameters_of`] across every entry of a matrix.
pub fn parameters_of_matrix(mat: &DMatrix<Expr>) -> FxHashSet<Symbol> {
    symbols_of_matrix(mat)
        .into_iter()
        .filter(|s| is_parameter(*s))
        .collect()
}

//==================== Aggregate builders ====================

/// The sum of a family of symbols.
pub fn sum(symbols: &[Symbol]) -> Expr {
    Expr::add_all(symbols.iter().map(|&s| Expr::symbol(s)))
}

/// The sum of squares of a family of symbols.
pub fn squared_sum(symbols: &[Symbol]) -> Expr {
    Expr::add_all(
        symbols
            .iter()
            .map(|&s| Expr::pow(Expr::symbol(s), Expr::integer(2))),
    )
}

/// The Euclidean norm of a family of symbols.
pub fn norm(symbols: &[Symbol]) -> Expr {
    Expr::pow(squared_sum(symbols), Expr::rational(1, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_apply_prefixes() {
        let x = variable("x");
        let a = parameter("a");
        assert_eq!(x.name(), "V:x");
        assert_eq!(a.name(), "P:a");
        assert!(is_variable(x));
        assert!(!is_parameter(x));
        assert!(is_parameter(a));
        assert!(!is_variable(a));

        // A bare symbol is neither
        let bare = Symbol::new("bare");
        assert!(!is_variable(bare));
        assert!(!is_parameter(bare));
    }

    #[test]
    fn test_indexed_families() {
        let xs = variable_vector("x", 3);
        assert_eq!(xs.len(), 3);
        assert_eq!(xs[0].name(), "V:x[0]");
        assert_eq!(xs[2].name(), "V:x[2]");
        let ps = parameter_vector("p", 2);
        assert_eq!(ps[1].name(), "P:p[1]");
    }

    #[test]
    fn test_classification_over_expression() {
        let x = variable("cx");
        let y = variable("cy");
        let a = parameter("ca");
        let e = Expr::add_all([
            Expr::mul(Expr::symbol(x), Expr::symbol(a)),
            Expr::sin(Expr::symbol(y)),
        ]);

        let all = symbols_of(&e);
        assert_eq!(all.len(), 3);
        let vars = variables_of(&e);
        assert_eq!(vars.len(), 2);
        assert!(vars.contains(&x) && vars.contains(&y));
        let params = parameters_of(&e);
        assert_eq!(params.len(), 1);
        assert!(params.contains(&a));
    }

    #[test]
    fn test_classification_over_matrix() {
        let x = variable("mx");
        let a = parameter("ma");
        let mat = DMatrix::from_vec(
            1,
            2,
            vec![Expr::symbol(x), Expr::mul(Expr::symbol(a), Expr::symbol(x))],
        );
        assert_eq!(variables_of_matrix(&mat).len(), 1);
        assert_eq!(parameters_of_matrix(&mat).len(), 1);
    }

    #[test]
    fn test_aggregate_builders() {
        let xs = variable_vector("agg", 3);
        let s = sum(&xs);
        let sq = squared_sum(&xs);
        let n = norm(&xs);

        let bindings: rustc_hash::FxHashMap<_, _> =
            xs.iter().map(|&s| (s, 2.0)).collect();
        assert_eq!(s.eval(&bindings).unwrap(), 6.0);
        assert_eq!(sq.eval(&bindings).unwrap(), 12.0);
        assert!((n.eval(&bindings).unwrap() - 12.0_f64.sqrt()).abs() < 1e-15);
    }
}
