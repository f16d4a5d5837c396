//! C source emission for the native evaluators.
//!
//! The emitter turns symbolic matrices into C functions with a fixed ABI:
//! every matrix is flattened column-major into the `out` buffer, variables
//! become `state[i]` reads and parameters `param[j]` reads, with the
//! indices fixed by the orderings handed to finalization. The eight
//! generated functions carry the names in the `FN_*` constants so the
//! loader can resolve them.

use nalgebra::DMatrix;
use rustc_hash::FxHashMap;

use crate::equality::EqualityConstraints;
use crate::error::{SymError, SymResult};
use crate::expr::{Expr, ExprKind, Symbol};
use crate::inequality::InequalityConstraints;
use crate::ordered_set::OrderedSet;
use crate::symbols::{is_parameter, is_variable, symbols_of_matrix};

/// Entry point names baked into the generated source.
pub const FN_VALUE: &str = "value";
pub const FN_GRADIENT: &str = "gradient";
pub const FN_HESSIAN: &str = "hessian";
pub const FN_EQUALITY_MATRIX: &str = "equalityMatrix";
pub const FN_EQUALITY_VECTOR: &str = "equalityVector";
pub const FN_INEQUALITY_VALUE: &str = "inequalityValue";
pub const FN_INEQUALITY_GRADIENT: &str = "inequalityGradient";
pub const FN_INEQUALITY_HESSIAN: &str = "inequalityHessian";

/// Build the symbol -> C lvalue map for everything appearing in a matrix.
///
/// Variables map to `state[i]` and parameters to `param[j]` through their
/// ordering index. A symbol that is neither, or that is missing from its
/// ordering, fails with [`SymError::MissingRepresentation`].
fn representation_map(
    symbols: impl IntoIterator<Item = Symbol>,
    variable_ordering: &OrderedSet,
    parameter_ordering: &OrderedSet,
) -> SymResult<FxHashMap<Symbol, String>> {
    let mut map = FxHashMap::default();
    for symbol in symbols {
        let repr = if is_variable(symbol) {
            if !variable_ordering.contains(symbol) {
                return Err(SymError::MissingRepresentation(symbol.name()));
            }
            format!("state[{}]", variable_ordering.index_of(symbol)?)
        } else if is_parameter(symbol) {
            if !parameter_ordering.contains(symbol) {
                return Err(SymError::MissingRepresentation(symbol.name()));
            }
            format!("param[{}]", parameter_ordering.index_of(symbol)?)
        } else {
            return Err(SymError::MissingRepresentation(symbol.name()));
        };
        map.insert(symbol, repr);
    }
    Ok(map)
}

/// Render an expression as a C arithmetic expression.
fn render(e: &Expr, repr: &FxHashMap<Symbol, String>) -> SymResult<String> {
    match e.kind() {
        ExprKind::Integer(k) => Ok(format!("{k}.0")),
        ExprKind::Rational(r) => Ok(format!("({}.0/{}.0)", r.numer(), r.denom())),
        ExprKind::Symbol(s) => repr
            .get(s)
            .cloned()
            .ok_or_else(|| SymError::MissingRepresentation(s.name())),
        ExprKind::Add(terms) => {
            let rendered: SymResult<Vec<String>> =
                terms.iter().map(|t| render(t, repr)).collect();
            Ok(format!("({})", rendered?.join(" + ")))
        }
        ExprKind::Mul(factors) => {
            let rendered: SymResult<Vec<String>> =
                factors.iter().map(|f| render(f, repr)).collect();
            Ok(format!("({})", rendered?.join("*")))
        }
        ExprKind::Pow(base, exponent) => Ok(format!(
            "pow({}, {})",
            render(base, repr)?,
            render(exponent, repr)?
        )),
        ExprKind::Sin(a) => Ok(format!("sin({})", render(a, repr)?)),
        ExprKind::Cos(a) => Ok(format!("cos({})", render(a, repr)?)),
        ExprKind::Tan(a) => Ok(format!("tan({})", render(a, repr)?)),
        ExprKind::Log(a) => Ok(format!("log({})", render(a, repr)?)),
        ExprKind::Exp(a) => Ok(format!("exp({})", render(a, repr)?)),
        ExprKind::Equality(..) => Err(SymError::InvalidArgument(
            "an equality cannot be emitted as a value".to_string(),
        )),
    }
}

/// Emit the `out[k] = ...;` body filling a matrix column-major.
fn matrix_body(mat: &DMatrix<Expr>, repr: &FxHashMap<Symbol, String>) -> SymResult<String> {
    // Verify every symbol is addressable before rendering anything
    for symbol in symbols_of_matrix(mat) {
        if !repr.contains_key(&symbol) {
            return Err(SymError::MissingRepresentation(symbol.name()));
        }
    }

    let mut body = String::new();
    let mut count = 0usize;
    for col in 0..mat.ncols() {
        for row in 0..mat.nrows() {
            let expanded = mat[(row, col)].expand();
            body.push_str(&format!(
                "    out[{count}] = {};\n",
                render(&expanded, repr)?
            ));
            count += 1;
        }
    }
    Ok(body)
}

/// Emit one evaluator taking `(state, param, out)`.
fn state_function(
    name: &str,
    mat: &DMatrix<Expr>,
    repr: &FxHashMap<Symbol, String>,
) -> SymResult<String> {
    Ok(format!(
        "void {name}(const double* state, const double* param, double* out) {{\n{}}}\n",
        matrix_body(mat, repr)?
    ))
}

/// Emit one evaluator taking `(param, out)`.
fn param_function(
    name: &str,
    mat: &DMatrix<Expr>,
    repr: &FxHashMap<Symbol, String>,
) -> SymResult<String> {
    Ok(format!(
        "void {name}(const double* param, double* out) {{\n{}}}\n",
        matrix_body(mat, repr)?
    ))
}

fn scalar_matrix(e: Expr) -> DMatrix<Expr> {
    DMatrix::from_element(1, 1, e)
}

/// Emit a single `(state, param, out)` evaluator filling an arbitrary
/// symbolic matrix, flattened column-major.
pub fn generate_matrix_function(
    name: &str,
    mat: &DMatrix<Expr>,
    variable_ordering: &OrderedSet,
    parameter_ordering: &OrderedSet,
) -> SymResult<String> {
    let repr = representation_map(
        symbols_of_matrix(mat),
        variable_ordering,
        parameter_ordering,
    )?;
    state_function(name, mat, &repr)
}

/// Generate the objective value, gradient, and Hessian evaluators.
pub fn generate_objective_functions(
    objective: &Expr,
    gradient: &DMatrix<Expr>,
    hessian: &DMatrix<Expr>,
    variable_ordering: &OrderedSet,
    parameter_ordering: &OrderedSet,
) -> SymResult<[String; 3]> {
    let value_mat = scalar_matrix(objective.clone());
    let mut symbols = symbols_of_matrix(&value_mat);
    symbols.extend(symbols_of_matrix(gradient));
    symbols.extend(symbols_of_matrix(hessian));
    let repr = representation_map(symbols, variable_ordering, parameter_ordering)?;

    Ok([
        state_function(FN_VALUE, &value_mat, &repr)?,
        state_function(FN_GRADIENT, gradient, &repr)?,
        state_function(FN_HESSIAN, hessian, &repr)?,
    ])
}

/// Generate the equality matrix and vector evaluators from the affine
/// form of the constraints.
pub fn generate_equality_functions(
    constraints: &EqualityConstraints,
    variable_ordering: &OrderedSet,
    parameter_ordering: &OrderedSet,
) -> SymResult<[String; 2]> {
    let (matrix, vector) = constraints.convert_to_linear_system(variable_ordering)?;

    let mut symbols = symbols_of_matrix(&matrix);
    symbols.extend(symbols_of_matrix(&vector));
    let repr = representation_map(symbols, variable_ordering, parameter_ordering)?;

    Ok([
        param_function(FN_EQUALITY_MATRIX, &matrix, &repr)?,
        param_function(FN_EQUALITY_VECTOR, &vector, &repr)?,
    ])
}

/// Generate the barrier value, gradient, and Hessian evaluators for the
/// inequality constraints.
pub fn generate_inequality_functions(
    constraints: &InequalityConstraints,
    variable_ordering: &OrderedSet,
    parameter_ordering: &OrderedSet,
) -> SymResult<[String; 3]> {
    let value_mat = scalar_matrix(constraints.symbolic_barrier_value());
    let gradient = constraints.symbolic_barrier_gradient(variable_ordering);
    let hessian = constraints.symbolic_barrier_hessian(variable_ordering);

    let mut symbols = symbols_of_matrix(&value_mat);
    symbols.extend(symbols_of_matrix(&gradient));
    symbols.extend(symbols_of_matrix(&hessian));
    let repr = representation_map(symbols, variable_ordering, parameter_ordering)?;

    Ok([
        state_function(FN_INEQUALITY_VALUE, &value_mat, &repr)?,
        state_function(FN_INEQUALITY_GRADIENT, &gradient, &repr)?,
        state_function(FN_INEQUALITY_HESSIAN, &hessian, &repr)?,
    ])
}

/// Join generated functions into a single compilable translation unit.
pub fn assemble_translation_unit(functions: &[String]) -> String {
    let mut source = String::new();
    source.push_str("#include <math.h>\n\n");
    source.push_str("#ifdef __cplusplus\nextern \"C\" {\n#endif\n\n");
    for function in functions {
        source.push_str(function);
        source.push('\n');
    }
    source.push_str("#ifdef __cplusplus\n}\n#endif\n");
    source
}
