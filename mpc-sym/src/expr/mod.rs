//! The expression core: immutable, canonicalized symbolic trees.
//!
//! An [`Expr`] is an `Arc`-shared tree whose leaves are interned symbols
//! and exact rational constants. Every construction path runs through
//! canonicalizing constructors, so two expressions that are equal up to
//! the canonical form (flattened and sorted sums/products, folded
//! constants, collected like terms, merged integer powers) compare equal
//! structurally. Each node caches its structural hash, which makes
//! expressions cheap to use as hash map keys; equality takes a pointer
//! fast path before falling back to the structural comparison.

mod eval;
mod expand;
mod ops;

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock};

use num_rational::Rational64;
use num_traits::{One, Signed, Zero};
use rustc_hash::{FxHashMap, FxHasher};

//==================== Symbols ====================

/// An interned symbol. Cheap to copy and compare; the name lives in a
/// process-wide registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

#[derive(Default)]
struct SymbolTable {
    names: Vec<String>,
    ids: FxHashMap<String, u32>,
}

fn symbol_table() -> &'static Mutex<SymbolTable> {
    static TABLE: OnceLock<Mutex<SymbolTable>> = OnceLock::new();
    TABLE.get_or_init(Mutex::default)
}

impl Symbol {
    /// Intern a symbol by name. Interning the same name twice yields the
    /// same symbol.
    pub fn new(name: impl Into<String>) -> Symbol {
        let name = name.into();
        let mut table = symbol_table().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&id) = table.ids.get(&name) {
            return Symbol(id);
        }
        let id = table.names.len() as u32;
        table.names.push(name.clone());
        table.ids.insert(name, id);
        Symbol(id)
    }

    /// The symbol's full name, including any role prefix.
    pub fn name(&self) -> String {
        let table = symbol_table().lock().unwrap_or_else(|e| e.into_inner());
        table.names[self.0 as usize].clone()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// Symbols order by name so that canonical term order is independent of
// interning order.
impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.0 == other.0 {
            return Ordering::Equal;
        }
        self.name().cmp(&other.name())
    }
}

//==================== Expression nodes ====================

/// The node kinds of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    /// Integer constant
    Integer(i64),
    /// Exact rational constant (never integral; those normalize to
    /// `Integer`)
    Rational(Rational64),
    /// Interned symbol leaf
    Symbol(Symbol),
    /// Flattened n-ary sum
    Add(Vec<Expr>),
    /// Flattened n-ary product, constant coefficient first
    Mul(Vec<Expr>),
    /// `base ^ exponent`
    Pow(Expr, Expr),
    Sin(Expr),
    Cos(Expr),
    Tan(Expr),
    Log(Expr),
    Exp(Expr),
    /// A two-sided equation `lhs = rhs`
    Equality(Expr, Expr),
}

#[derive(Debug)]
struct ExprNode {
    hash: u64,
    kind: ExprKind,
}

/// An immutable symbolic expression.
#[derive(Debug, Clone)]
pub struct Expr {
    node: Arc<ExprNode>,
}

fn intern(kind: ExprKind) -> Expr {
    let mut hasher = FxHasher::default();
    kind.hash(&mut hasher);
    Expr {
        node: Arc::new(ExprNode {
            hash: hasher.finish(),
            kind,
        }),
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
            || (self.node.hash == other.node.hash && self.node.kind == other.node.kind)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.node.hash);
    }
}

fn kind_rank(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Integer(_) => 0,
        ExprKind::Rational(_) => 1,
        ExprKind::Symbol(_) => 2,
        ExprKind::Pow(..) => 3,
        ExprKind::Mul(_) => 4,
        ExprKind::Add(_) => 5,
        ExprKind::Sin(_) => 6,
        ExprKind::Cos(_) => 7,
        ExprKind::Tan(_) => 8,
        ExprKind::Log(_) => 9,
        ExprKind::Exp(_) => 10,
        ExprKind::Equality(..) => 11,
    }
}

fn cmp_slices(a: &[Expr], b: &[Expr]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

// A deterministic structural total order, used to fix the term order
// inside sums and products. Consistent with structural equality.
impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        if Arc::ptr_eq(&self.node, &other.node) {
            return Ordering::Equal;
        }
        let (a, b) = (self.kind(), other.kind());
        match kind_rank(a).cmp(&kind_rank(b)) {
            Ordering::Equal => {}
            other => return other,
        }
        match (a, b) {
            (ExprKind::Integer(x), ExprKind::Integer(y)) => x.cmp(y),
            (ExprKind::Rational(x), ExprKind::Rational(y)) => x.cmp(y),
            (ExprKind::Symbol(x), ExprKind::Symbol(y)) => x.cmp(y),
            (ExprKind::Add(x), ExprKind::Add(y)) | (ExprKind::Mul(x), ExprKind::Mul(y)) => {
                cmp_slices(x, y)
            }
            (ExprKind::Pow(bx, ex), ExprKind::Pow(by, ey)) => {
                bx.cmp(by).then_with(|| ex.cmp(ey))
            }
            (ExprKind::Sin(x), ExprKind::Sin(y))
            | (ExprKind::Cos(x), ExprKind::Cos(y))
            | (ExprKind::Tan(x), ExprKind::Tan(y))
            | (ExprKind::Log(x), ExprKind::Log(y))
            | (ExprKind::Exp(x), ExprKind::Exp(y)) => x.cmp(y),
            (ExprKind::Equality(lx, rx), ExprKind::Equality(ly, ry)) => {
                lx.cmp(ly).then_with(|| rx.cmp(ry))
            }
            _ => unreachable!("kind ranks already compared"),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

//==================== Constructors ====================

/// Raise a rational to an integer power. Exponent magnitudes are small in
/// practice; anything that would overflow an i64 numerator is the model
/// author's problem.
fn ratio_pow(r: Rational64, k: i64) -> Rational64 {
    let mut acc = Rational64::one();
    let base = if k < 0 { r.recip() } else { r };
    for _ in 0..k.unsigned_abs() {
        acc *= base;
    }
    acc
}

impl Expr {
    /// The node kind of this expression.
    pub fn kind(&self) -> &ExprKind {
        &self.node.kind
    }

    /// The zero expression.
    pub fn zero() -> Expr {
        Expr::integer(0)
    }

    /// The one expression.
    pub fn one() -> Expr {
        Expr::integer(1)
    }

    /// An integer constant.
    pub fn integer(value: i64) -> Expr {
        intern(ExprKind::Integer(value))
    }

    /// An exact rational constant `numer / denom`.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    pub fn rational(numer: i64, denom: i64) -> Expr {
        Expr::from_rational(Rational64::new(numer, denom))
    }

    fn from_rational(value: Rational64) -> Expr {
        if value.is_integer() {
            Expr::integer(value.to_integer())
        } else {
            intern(ExprKind::Rational(value))
        }
    }

    /// A symbol leaf.
    pub fn symbol(symbol: Symbol) -> Expr {
        intern(ExprKind::Symbol(symbol))
    }

    /// The constant value of this expression, if it is one.
    pub fn as_constant(&self) -> Option<Rational64> {
        match self.kind() {
            ExprKind::Integer(k) => Some(Rational64::from_integer(*k)),
            ExprKind::Rational(r) => Some(*r),
            _ => None,
        }
    }

    /// The integer value of this expression, if it is an integer
    /// constant.
    pub fn as_integer(&self) -> Option<i64> {
        match self.kind() {
            ExprKind::Integer(k) => Some(*k),
            _ => None,
        }
    }

    /// The symbol of this expression, if it is a symbol leaf.
    pub fn as_symbol(&self) -> Option<Symbol> {
        match self.kind() {
            ExprKind::Symbol(s) => Some(*s),
            _ => None,
        }
    }

    /// Whether this is the zero expression.
    pub fn is_zero(&self) -> bool {
        matches!(self.kind(), ExprKind::Integer(0))
    }

    /// Whether this is the one expression.
    pub fn is_one(&self) -> bool {
        matches!(self.kind(), ExprKind::Integer(1))
    }

    /// Split `coeff * rest` out of a term: canonical products carry their
    /// constant coefficient as the first factor.
    fn split_coefficient(&self) -> (Rational64, Expr) {
        if let ExprKind::Mul(factors) = self.kind() {
            if let Some(c) = factors[0].as_constant() {
                let rest = if factors.len() == 2 {
                    factors[1].clone()
                } else {
                    intern(ExprKind::Mul(factors[1..].to_vec()))
                };
                return (c, rest);
            }
        }
        (Rational64::one(), self.clone())
    }

    /// Canonical sum of an arbitrary collection of terms.
    ///
    /// Flattens nested sums, folds constants, collects like terms (equal
    /// up to a constant coefficient), drops zeros, and sorts the result.
    pub fn add_all(terms: impl IntoIterator<Item = Expr>) -> Expr {
        fn absorb(
            e: Expr,
            constant: &mut Rational64,
            coeffs: &mut Vec<(Expr, Rational64)>,
            index: &mut FxHashMap<Expr, usize>,
        ) {
            if let ExprKind::Add(ts) = e.kind() {
                for t in ts {
                    absorb(t.clone(), constant, coeffs, index);
                }
                return;
            }
            if let Some(c) = e.as_constant() {
                *constant += c;
                return;
            }
            let (c, core) = e.split_coefficient();
            if let Some(&i) = index.get(&core) {
                coeffs[i].1 += c;
            } else {
                index.insert(core.clone(), coeffs.len());
                coeffs.push((core, c));
            }
        }

        let mut constant = Rational64::zero();
        let mut coeffs: Vec<(Expr, Rational64)> = Vec::new();
        let mut index = FxHashMap::default();
        for term in terms {
            absorb(term, &mut constant, &mut coeffs, &mut index);
        }

        let mut out: Vec<Expr> = Vec::with_capacity(coeffs.len() + 1);
        if !constant.is_zero() {
            out.push(Expr::from_rational(constant));
        }
        for (core, c) in coeffs {
            if c.is_zero() {
                continue;
            }
            if c.is_one() {
                out.push(core);
            } else {
                out.push(Expr::mul_all([Expr::from_rational(c), core]));
            }
        }
        out.sort();

        match out.len() {
            0 => Expr::zero(),
            1 => out.pop().expect("len checked"),
            _ => intern(ExprKind::Add(out)),
        }
    }

    /// Binary sum convenience over [`add_all`](Expr::add_all).
    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::add_all([lhs, rhs])
    }

    /// `lhs - rhs`
    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::add_all([lhs, Expr::neg(rhs)])
    }

    /// `-e`
    pub fn neg(e: Expr) -> Expr {
        Expr::mul_all([Expr::integer(-1), e])
    }

    /// Canonical product of an arbitrary collection of factors.
    ///
    /// Flattens nested products, folds constants into a single leading
    /// coefficient, merges repeated bases by adding exponents, and sorts
    /// the remaining factors.
    pub fn mul_all(factors: impl IntoIterator<Item = Expr>) -> Expr {
        fn absorb(
            e: Expr,
            coeff: &mut Rational64,
            powers: &mut Vec<(Expr, Expr)>,
            index: &mut FxHashMap<Expr, usize>,
        ) {
            match e.kind() {
                ExprKind::Mul(fs) => {
                    for f in fs {
                        absorb(f.clone(), coeff, powers, index);
                    }
                }
                _ => {
                    if let Some(c) = e.as_constant() {
                        *coeff *= c;
                        return;
                    }
                    let (base, exponent) = match e.kind() {
                        ExprKind::Pow(b, x) => (b.clone(), x.clone()),
                        _ => (e.clone(), Expr::one()),
                    };
                    if let Some(&i) = index.get(&base) {
                        let merged = Expr::add(powers[i].1.clone(), exponent);
                        powers[i].1 = merged;
                    } else {
                        index.insert(base.clone(), powers.len());
                        powers.push((base, exponent));
                    }
                }
            }
        }

        let mut coeff = Rational64::one();
        let mut powers: Vec<(Expr, Expr)> = Vec::new();
        let mut index = FxHashMap::default();
        for factor in factors {
            absorb(factor, &mut coeff, &mut powers, &mut index);
        }

        if coeff.is_zero() {
            return Expr::zero();
        }

        let mut out: Vec<Expr> = Vec::with_capacity(powers.len() + 1);
        for (base, exponent) in powers {
            let rebuilt = Expr::pow(base, exponent);
            // Merged exponents can fold back into a constant (x * x^-1)
            if let Some(c) = rebuilt.as_constant() {
                coeff *= c;
            } else if !rebuilt.is_one() {
                out.push(rebuilt);
            }
        }
        out.sort();

        if out.is_empty() {
            return Expr::from_rational(coeff);
        }
        if !coeff.is_one() {
            out.insert(0, Expr::from_rational(coeff));
        }
        match out.len() {
            1 => out.pop().expect("len checked"),
            _ => intern(ExprKind::Mul(out)),
        }
    }

    /// Binary product convenience over [`mul_all`](Expr::mul_all).
    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::mul_all([lhs, rhs])
    }

    /// `lhs / rhs`, represented as `lhs * rhs^-1`
    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::mul_all([lhs, Expr::pow(rhs, Expr::integer(-1))])
    }

    /// `base ^ exponent` with the trivial folds applied.
    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        if exponent.is_zero() {
            return Expr::one();
        }
        if exponent.is_one() {
            return base;
        }
        if let (Some(c), Some(k)) = (base.as_constant(), exponent.as_integer()) {
            // Keep 0^negative symbolic rather than dividing by zero
            if (!c.is_zero() || k > 0) && k.unsigned_abs() <= 32 {
                return Expr::from_rational(ratio_pow(c, k));
            }
        }
        if let (ExprKind::Pow(inner_base, inner_exp), Some(k)) =
            (base.kind(), exponent.as_integer())
        {
            if let Some(j) = inner_exp.as_integer() {
                return Expr::pow(inner_base.clone(), Expr::integer(j * k));
            }
        }
        intern(ExprKind::Pow(base, exponent))
    }

    pub fn sin(e: Expr) -> Expr {
        if e.is_zero() {
            return Expr::zero();
        }
        intern(ExprKind::Sin(e))
    }

    pub fn cos(e: Expr) -> Expr {
        if e.is_zero() {
            return Expr::one();
        }
        intern(ExprKind::Cos(e))
    }

    pub fn tan(e: Expr) -> Expr {
        if e.is_zero() {
            return Expr::zero();
        }
        intern(ExprKind::Tan(e))
    }

    pub fn log(e: Expr) -> Expr {
        if e.is_one() {
            return Expr::zero();
        }
        intern(ExprKind::Log(e))
    }

    pub fn exp(e: Expr) -> Expr {
        if e.is_zero() {
            return Expr::one();
        }
        intern(ExprKind::Exp(e))
    }

    /// The two-sided equation `lhs = rhs`.
    pub fn equality(lhs: Expr, rhs: Expr) -> Expr {
        intern(ExprKind::Equality(lhs, rhs))
    }

    /// Rewrite to the `expr = 0` residual form: an equality `l = r`
    /// becomes `r - l`, anything else is already a residual.
    pub fn residual_form(&self) -> Expr {
        match self.kind() {
            ExprKind::Equality(l, r) => Expr::sub(r.clone(), l.clone()),
            _ => self.clone(),
        }
    }

    /// The additive terms of this expression (the summands of a sum, or
    /// the expression itself).
    pub fn terms(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Add(ts) => ts.clone(),
            _ => vec![self.clone()],
        }
    }

    /// The multiplicative factors of this expression (the factors of a
    /// product, or the expression itself).
    pub fn factors(&self) -> Vec<Expr> {
        match self.kind() {
            ExprKind::Mul(fs) => fs.clone(),
            _ => vec![self.clone()],
        }
    }

    //==================== Differentiation ====================

    /// The partial derivative of this expression with respect to `var`.
    ///
    /// Equalities differentiate through their residual form.
    pub fn diff(&self, var: Symbol) -> Expr {
        match self.kind() {
            ExprKind::Integer(_) | ExprKind::Rational(_) => Expr::zero(),
            ExprKind::Symbol(s) => {
                if *s == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            ExprKind::Add(terms) => Expr::add_all(terms.iter().map(|t| t.diff(var))),
            ExprKind::Mul(factors) => {
                // Product rule over the n-ary product
                let mut terms = Vec::with_capacity(factors.len());
                for i in 0..factors.len() {
                    let parts = factors.iter().enumerate().map(|(j, f)| {
                        if i == j {
                            f.diff(var)
                        } else {
                            f.clone()
                        }
                    });
                    terms.push(Expr::mul_all(parts));
                }
                Expr::add_all(terms)
            }
            ExprKind::Pow(base, exponent) => {
                if exponent.as_constant().is_some() {
                    // d(b^c) = c * b^(c-1) * b'
                    Expr::mul_all([
                        exponent.clone(),
                        Expr::pow(
                            base.clone(),
                            Expr::sub(exponent.clone(), Expr::one()),
                        ),
                        base.diff(var),
                    ])
                } else {
                    // d(b^e) = b^e * (e' log b + e b'/b)
                    Expr::mul(
                        self.clone(),
                        Expr::add(
                            Expr::mul(exponent.diff(var), Expr::log(base.clone())),
                            Expr::mul(
                                exponent.clone(),
                                Expr::div(base.diff(var), base.clone()),
                            ),
                        ),
                    )
                }
            }
            ExprKind::Sin(u) => Expr::mul(Expr::cos(u.clone()), u.diff(var)),
            ExprKind::Cos(u) => Expr::neg(Expr::mul(Expr::sin(u.clone()), u.diff(var))),
            ExprKind::Tan(u) => Expr::mul(
                Expr::add(
                    Expr::one(),
                    Expr::pow(Expr::tan(u.clone()), Expr::integer(2)),
                ),
                u.diff(var),
            ),
            ExprKind::Log(u) => Expr::div(u.diff(var), u.clone()),
            ExprKind::Exp(u) => Expr::mul(self.clone(), u.diff(var)),
            ExprKind::Equality(..) => self.residual_form().diff(var),
        }
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Expr {
        Expr::symbol(symbol)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Expr {
        Expr::integer(value)
    }
}

impl From<f64> for Expr {
    /// Convert through the closest small rational. Exact for the binary
    /// fractions and the short decimals that appear in models.
    fn from(value: f64) -> Expr {
        let approx = Rational64::approximate_float(value)
            .unwrap_or_else(|| panic!("{value} has no rational representation"));
        Expr::from_rational(approx)
    }
}

//==================== Display ====================

fn fmt_factor(e: &Expr, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match e.kind() {
        ExprKind::Add(_) | ExprKind::Equality(..) => write!(f, "({e})"),
        ExprKind::Rational(_) | ExprKind::Integer(_) if e.as_constant().unwrap().is_negative() => {
            write!(f, "({e})")
        }
        _ => write!(f, "{e}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Integer(k) => write!(f, "{k}"),
            ExprKind::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            ExprKind::Symbol(s) => write!(f, "{s}"),
            ExprKind::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{term}")?;
                }
                Ok(())
            }
            ExprKind::Mul(factors) => {
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        write!(f, "*")?;
                    }
                    fmt_factor(factor, f)?;
                }
                Ok(())
            }
            ExprKind::Pow(base, exponent) => {
                fmt_factor(base, f)?;
                write!(f, "^")?;
                match exponent.kind() {
                    ExprKind::Integer(k) if *k >= 0 => write!(f, "{k}"),
                    _ => write!(f, "({exponent})"),
                }
            }
            ExprKind::Sin(e) => write!(f, "sin({e})"),
            ExprKind::Cos(e) => write!(f, "cos({e})"),
            ExprKind::Tan(e) => write!(f, "tan({e})"),
            ExprKind::Log(e) => write!(f, "log({e})"),
            ExprKind::Exp(e) => write!(f, "exp({e})"),
            ExprKind::Equality(lhs, rhs) => write!(f, "{lhs} == {rhs}"),
        }
    }
}
