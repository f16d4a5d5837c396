//! Differentiation utilities over symbol orderings.
//!
//! Scalar differentiation lives on [`Expr::diff`]; this module assembles
//! the vector and matrix forms the solver pipeline needs, with rows and
//! columns fixed by an [`OrderedSet`], plus Taylor expansion about an
//! arbitrary point.

use nalgebra::DMatrix;
use rustc_hash::FxHashMap;

use crate::error::{SymError, SymResult};
use crate::expr::Expr;
use crate::ordered_set::OrderedSet;

/// The gradient of `e` as a column: entry `i` is the derivative with
/// respect to `ordering[i]`.
pub fn gradient(e: &Expr, ordering: &OrderedSet) -> DMatrix<Expr> {
    let symbols: Vec<_> = ordering.iter().collect();
    DMatrix::from_fn(symbols.len(), 1, |r, _| e.diff(symbols[r]))
}

/// The Jacobian of a column of expressions: row `r` is the gradient of
/// `f[r]` along the ordering.
pub fn jacobian(f: &DMatrix<Expr>, ordering: &OrderedSet) -> DMatrix<Expr> {
    let symbols: Vec<_> = ordering.iter().collect();
    DMatrix::from_fn(f.nrows(), symbols.len(), |r, c| {
        f[(r, 0)].diff(symbols[c])
    })
}

/// The Hessian of `e`: entry `(r, c)` is the second derivative with
/// respect to `ordering[r]` and `ordering[c]`.
pub fn hessian(e: &Expr, ordering: &OrderedSet) -> DMatrix<Expr> {
    let symbols: Vec<_> = ordering.iter().collect();
    let n = symbols.len();
    // Differentiate each row symbol once, then each column symbol
    let first: Vec<Expr> = symbols.iter().map(|&s| e.diff(s)).collect();
    DMatrix::from_fn(n, n, |r, c| first[r].diff(symbols[c]))
}

fn factorial(n: usize) -> i64 {
    (1..=n as i64).product()
}

/// The truncated Taylor series of `e` in the single symbol `v` about the
/// point `a`, including every term up to degree `order`:
///
/// ```text
/// T(x) = sum_{i=0}^{order} d^i e / d v^i |_{v=a} * (v - a)^i / i!
/// ```
///
/// Fails with [`SymError::InvalidArgument`] if `v` is not a symbol.
pub fn taylor_expand(e: &Expr, v: &Expr, a: &Expr, order: usize) -> SymResult<Expr> {
    let Some(symbol) = v.as_symbol() else {
        return Err(SymError::InvalidArgument(
            "the expansion variable of a taylor expansion must be a symbol".to_string(),
        ));
    };

    let mut at_point = FxHashMap::default();
    at_point.insert(v.clone(), a.clone());

    let mut terms = Vec::with_capacity(order + 1);
    let mut derivative = e.clone();
    for i in 0..=order {
        let coefficient = derivative.substitute(&at_point);
        terms.push(Expr::mul_all([
            coefficient,
            Expr::rational(1, factorial(i)),
            Expr::pow(Expr::sub(v.clone(), a.clone()), Expr::integer(i as i64)),
        ]));
        derivative = derivative.diff(symbol);
    }

    Ok(Expr::add_all(terms))
}
