//! Numeric evaluation and structural substitution.

use rustc_hash::FxHashMap;

use crate::error::{SymError, SymResult};

use super::{Expr, ExprKind, Symbol};

impl Expr {
    /// Evaluate the expression numerically under the given symbol
    /// bindings.
    ///
    /// Fails with [`SymError::UnknownSymbol`] on an unbound symbol and
    /// [`SymError::InvalidArgument`] on an equality node, which has no
    /// numeric value.
    pub fn eval(&self, bindings: &FxHashMap<Symbol, f64>) -> SymResult<f64> {
        match self.kind() {
            ExprKind::Integer(k) => Ok(*k as f64),
            ExprKind::Rational(r) => Ok(*r.numer() as f64 / *r.denom() as f64),
            ExprKind::Symbol(s) => bindings
                .get(s)
                .copied()
                .ok_or_else(|| SymError::UnknownSymbol(s.name())),
            ExprKind::Add(terms) => {
                let mut acc = 0.0;
                for t in terms {
                    acc += t.eval(bindings)?;
                }
                Ok(acc)
            }
            ExprKind::Mul(factors) => {
                let mut acc = 1.0;
                for f in factors {
                    acc *= f.eval(bindings)?;
                }
                Ok(acc)
            }
            ExprKind::Pow(base, exponent) => {
                Ok(base.eval(bindings)?.powf(exponent.eval(bindings)?))
            }
            ExprKind::Sin(e) => Ok(e.eval(bindings)?.sin()),
            ExprKind::Cos(e) => Ok(e.eval(bindings)?.cos()),
            ExprKind::Tan(e) => Ok(e.eval(bindings)?.tan()),
            ExprKind::Log(e) => Ok(e.eval(bindings)?.ln()),
            ExprKind::Exp(e) => Ok(e.eval(bindings)?.exp()),
            ExprKind::Equality(..) => Err(SymError::InvalidArgument(
                "an equality has no numeric value".to_string(),
            )),
        }
    }

    /// Simultaneous structural substitution: every subtree equal to a key
    /// of `map` is replaced by the corresponding value, and the result is
    /// re-canonicalized bottom-up.
    pub fn substitute(&self, map: &FxHashMap<Expr, Expr>) -> Expr {
        if let Some(replacement) = map.get(self) {
            return replacement.clone();
        }
        match self.kind() {
            ExprKind::Integer(_) | ExprKind::Rational(_) | ExprKind::Symbol(_) => self.clone(),
            ExprKind::Add(terms) => Expr::add_all(terms.iter().map(|t| t.substitute(map))),
            ExprKind::Mul(factors) => {
                Expr::mul_all(factors.iter().map(|f| f.substitute(map)))
            }
            ExprKind::Pow(base, exponent) => {
                Expr::pow(base.substitute(map), exponent.substitute(map))
            }
            ExprKind::Sin(e) => Expr::sin(e.substitute(map)),
            ExprKind::Cos(e) => Expr::cos(e.substitute(map)),
            ExprKind::Tan(e) => Expr::tan(e.substitute(map)),
            ExprKind::Log(e) => Expr::log(e.substitute(map)),
            ExprKind::Exp(e) => Expr::exp(e.substitute(map)),
            ExprKind::Equality(lhs, rhs) => {
                Expr::equality(lhs.substitute(map), rhs.substitute(map))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, f64)]) -> FxHashMap<Symbol, f64> {
        pairs
            .iter()
            .map(|(name, value)| (Symbol::new(*name), *value))
            .collect()
    }

    #[test]
    fn test_eval_polynomial() {
        let x = Expr::symbol(Symbol::new("x"));
        let e = Expr::add(
            Expr::pow(x.clone(), Expr::integer(2)),
            Expr::mul(Expr::integer(3), x),
        );
        let value = e.eval(&bindings(&[("x", 2.0)])).unwrap();
        assert_eq!(value, 10.0);
    }

    #[test]
    fn test_eval_functions() {
        let x = Expr::symbol(Symbol::new("x"));
        let e = Expr::add(Expr::sin(x.clone()), Expr::exp(x));
        let value = e.eval(&bindings(&[("x", 0.5)])).unwrap();
        assert!((value - (0.5_f64.sin() + 0.5_f64.exp())).abs() < 1e-15);
    }

    #[test]
    fn test_eval_unbound_symbol() {
        let x = Expr::symbol(Symbol::new("unbound"));
        assert!(matches!(
            x.eval(&FxHashMap::default()),
            Err(SymError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_eval_equality_rejected() {
        let eq = Expr::equality(Expr::integer(1), Expr::integer(1));
        assert!(matches!(
            eq.eval(&FxHashMap::default()),
            Err(SymError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_substitute_symbol() {
        let xs = Symbol::new("x");
        let x = Expr::symbol(xs);
        let e = Expr::pow(x.clone(), Expr::integer(2));
        let mut map = FxHashMap::default();
        map.insert(x, Expr::integer(3));
        assert_eq!(e.substitute(&map), Expr::integer(9));
    }

    #[test]
    fn test_substitute_recanonicalizes() {
        let x = Expr::symbol(Symbol::new("x"));
        let y = Expr::symbol(Symbol::new("y"));
        // x + y with x -> -y collapses to zero
        let e = Expr::add(x.clone(), y.clone());
        let mut map = FxHashMap::default();
        map.insert(x, Expr::neg(y));
        assert!(e.substitute(&map).is_zero());
    }
}
