//! Algebraic expansion: distribute products over sums and expand integer
//! powers of sums, producing a flat sum of monomial terms.
//!
//! The affine extractor and the code emitter both run on expanded forms,
//! so expansion is what turns "polynomial in the variables" from a
//! mathematical statement into a structural one.

use super::{Expr, ExprKind};

/// Multiply out a product whose factors may be sums.
fn distribute(factors: Vec<Expr>) -> Expr {
    let mut terms: Vec<Expr> = vec![Expr::one()];
    for factor in factors {
        let factor_terms = factor.terms();
        let mut next = Vec::with_capacity(terms.len() * factor_terms.len());
        for t in &terms {
            for ft in &factor_terms {
                next.push(Expr::mul(t.clone(), ft.clone()));
            }
        }
        terms = next;
    }
    Expr::add_all(terms)
}

impl Expr {
    /// Fully expand the expression.
    ///
    /// Function arguments and non-integer powers are expanded internally
    /// but left in place; only products and positive integer powers
    /// distribute.
    pub fn expand(&self) -> Expr {
        match self.kind() {
            ExprKind::Integer(_) | ExprKind::Rational(_) | ExprKind::Symbol(_) => self.clone(),
            ExprKind::Add(terms) => Expr::add_all(terms.iter().map(|t| t.expand())),
            ExprKind::Mul(factors) => {
                distribute(factors.iter().map(|f| f.expand()).collect())
            }
            ExprKind::Pow(base, exponent) => {
                let base = base.expand();
                let exponent = exponent.expand();
                let distributed = match (base.kind(), exponent.as_integer()) {
                    // (a + b)^k: repeated distribution
                    (ExprKind::Add(_), Some(k)) if k >= 2 => {
                        let mut acc = base.clone();
                        for _ in 1..k {
                            acc = distribute(vec![acc, base.clone()]);
                        }
                        Some(acc)
                    }
                    // (a * b)^k: the power distributes over the factors
                    (ExprKind::Mul(factors), Some(_)) => Some(distribute(
                        factors
                            .iter()
                            .map(|f| Expr::pow(f.clone(), exponent.clone()).expand())
                            .collect(),
                    )),
                    _ => None,
                };
                distributed.unwrap_or_else(|| Expr::pow(base, exponent))
            }
            ExprKind::Sin(e) => Expr::sin(e.expand()),
            ExprKind::Cos(e) => Expr::cos(e.expand()),
            ExprKind::Tan(e) => Expr::tan(e.expand()),
            ExprKind::Log(e) => Expr::log(e.expand()),
            ExprKind::Exp(e) => Expr::exp(e.expand()),
            ExprKind::Equality(lhs, rhs) => Expr::equality(lhs.expand(), rhs.expand()),
        }
    }
}
