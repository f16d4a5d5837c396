//! The symbolic objective: a complete model that compiles itself.
//!
//! [`SymbolicObjective`] gathers the objective expression and the two
//! constraint containers, and `finalize` runs the whole pipeline:
//! differentiate, emit the eight evaluators, compile, load, and wire the
//! resulting function pointers into an inner
//! [`FunctionPointerObjective`]. After finalization the instance is a
//! drop-in [`Objective`] for the numeric solver; re-finalizing after
//! further symbolic edits rebuilds the evaluators.

use mpc_core::{EvalError, FunctionPointerObjective, Objective};
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashSet;

use crate::calculus::{gradient, hessian};
use crate::codegen;
use crate::equality::EqualityConstraints;
use crate::error::{SymError, SymResult};
use crate::expr::{Expr, Symbol};
use crate::inequality::InequalityConstraints;
use crate::jit::JitLibrary;
use crate::ordered_set::OrderedSet;
use crate::symbols::{parameters_of, symbols_of, variables_of};

/// A symbolic optimization problem that finalizes into native evaluators.
#[derive(Debug, Default)]
pub struct SymbolicObjective {
    objective: Option<Expr>,

    /// Equality constraints, freely editable before finalization
    pub equality_constraints: EqualityConstraints,

    /// Inequality constraints, freely editable before finalization
    pub inequality_constraints: InequalityConstraints,

    inner: FunctionPointerObjective,
    // The evaluator pointers in `inner` alias into this library, so it
    // must live exactly as long as they do.
    library: Option<JitLibrary>,
    finalized: bool,
}

impl SymbolicObjective {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the objective expression to minimize.
    pub fn set_objective(&mut self, objective: Expr) {
        self.objective = Some(objective);
    }

    /// The objective expression, if one has been set.
    pub fn objective(&self) -> Option<&Expr> {
        self.objective.as_ref()
    }

    /// Whether `finalize` has completed on the current instance.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Set the parameter vector consumed by the compiled evaluators.
    pub fn set_parameters(&mut self, parameters: DVector<f64>) {
        self.inner.set_parameters(parameters);
    }

    /// Every symbol in the objective and both constraint containers.
    pub fn symbols(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        if let Some(ref objective) = self.objective {
            out.extend(symbols_of(objective));
        }
        out.extend(self.equality_constraints.symbols());
        out.extend(self.inequality_constraints.symbols());
        out
    }

    /// Every variable in the objective and both constraint containers.
    pub fn variables(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        if let Some(ref objective) = self.objective {
            out.extend(variables_of(objective));
        }
        out.extend(self.equality_constraints.variables());
        out.extend(self.inequality_constraints.variables());
        out
    }

    /// Every parameter in the objective and both constraint containers.
    pub fn parameters(&self) -> FxHashSet<Symbol> {
        let mut out = FxHashSet::default();
        if let Some(ref objective) = self.objective {
            out.extend(parameters_of(objective));
        }
        out.extend(self.equality_constraints.parameters());
        out.extend(self.inequality_constraints.parameters());
        out
    }

    /// Compile the model and install the evaluator pointers.
    ///
    /// Differentiates the objective, emits all eight evaluators over the
    /// given orderings, compiles and loads them, and caches the problem
    /// dimensions. Fails with [`SymError::InvalidArgument`] if no
    /// objective has been set, and with the emitter/JIT errors otherwise.
    /// Symbolic edits made after a successful call have no effect until
    /// the next `finalize`.
    pub fn finalize(
        &mut self,
        variable_ordering: &OrderedSet,
        parameter_ordering: &OrderedSet,
    ) -> SymResult<()> {
        let objective = self
            .objective
            .clone()
            .ok_or_else(|| {
                SymError::InvalidArgument(
                    "no objective expression has been set".to_string(),
                )
            })?;

        // Symbolic derivatives of the objective
        let objective_gradient = gradient(&objective, variable_ordering);
        let objective_hessian = hessian(&objective, variable_ordering);

        // Emit the eight evaluators
        let [value_fn, gradient_fn, hessian_fn] = codegen::generate_objective_functions(
            &objective,
            &objective_gradient,
            &objective_hessian,
            variable_ordering,
            parameter_ordering,
        )?;
        let [equality_matrix_fn, equality_vector_fn] = codegen::generate_equality_functions(
            &self.equality_constraints,
            variable_ordering,
            parameter_ordering,
        )?;
        let [inequality_value_fn, inequality_gradient_fn, inequality_hessian_fn] =
            codegen::generate_inequality_functions(
                &self.inequality_constraints,
                variable_ordering,
                parameter_ordering,
            )?;

        let source = codegen::assemble_translation_unit(&[
            value_fn,
            gradient_fn,
            hessian_fn,
            equality_matrix_fn,
            equality_vector_fn,
            inequality_value_fn,
            inequality_gradient_fn,
            inequality_hessian_fn,
        ]);

        let library = JitLibrary::compile_and_load(&source)?;

        // Rebuild the inner objective with the symbolic dimensions,
        // carrying over any parameter vector set earlier.
        let parameters = self.inner.parameters().cloned();
        let mut inner = FunctionPointerObjective::new(
            variable_ordering.size(),
            self.inequality_constraints.num_constraints(),
            self.equality_constraints.num_constraints(),
            parameter_ordering.size(),
        );
        if let Some(parameters) = parameters {
            inner.set_parameters(parameters);
        }

        inner.set_value_fn(library.get_state_fn(codegen::FN_VALUE)?);
        inner.set_gradient_fn(library.get_state_fn(codegen::FN_GRADIENT)?);
        inner.set_hessian_fn(library.get_state_fn(codegen::FN_HESSIAN)?);
        inner.set_equality_matrix_fn(library.get_param_fn(codegen::FN_EQUALITY_MATRIX)?);
        inner.set_equality_vector_fn(library.get_param_fn(codegen::FN_EQUALITY_VECTOR)?);
        inner.set_inequality_value_fn(library.get_state_fn(codegen::FN_INEQUALITY_VALUE)?);
        inner.set_inequality_gradient_fn(
            library.get_state_fn(codegen::FN_INEQUALITY_GRADIENT)?,
        );
        inner.set_inequality_hessian_fn(
            library.get_state_fn(codegen::FN_INEQUALITY_HESSIAN)?,
        );

        self.inner = inner;
        self.library = Some(library);
        self.finalized = true;
        Ok(())
    }
}

impl Objective for SymbolicObjective {
    fn num_variables(&self) -> usize {
        self.inner.num_variables()
    }

    fn num_equality_constraints(&self) -> usize {
        self.inner.num_equality_constraints()
    }

    fn num_inequality_constraints(&self) -> usize {
        self.inner.num_inequality_constraints()
    }

    fn value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        self.inner.value(state)
    }

    fn gradient(&self, state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
        self.inner.gradient(state)
    }

    fn hessian(&self, state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
        self.inner.hessian(state)
    }

    fn equality_constraint_matrix(&self) -> Result<Option<DMatrix<f64>>, EvalError> {
        self.inner.equality_constraint_matrix()
    }

    fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
        self.inner.equality_constraint_vector()
    }

    fn inequality_constraints_value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        self.inner.inequality_constraints_value(state)
    }

    fn inequality_constraints_gradient(
        &self,
        state: &DVector<f64>,
    ) -> Result<DVector<f64>, EvalError> {
        self.inner.inequality_constraints_gradient(state)
    }

    fn inequality_constraints_hessian(
        &self,
        state: &DVector<f64>,
    ) -> Result<DMatrix<f64>, EvalError> {
        self.inner.inequality_constraints_hessian(state)
    }

    fn validate(&self) -> Result<(), String> {
        if !self.finalized {
            return Err(SymError::NotFinalized.to_string());
        }
        self.inner.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::variable;

    #[test]
    fn test_finalize_requires_objective() {
        let mut objective = SymbolicObjective::new();
        let ordering: OrderedSet = [variable("so_x")].into_iter().collect();
        assert!(matches!(
            objective.finalize(&ordering, &OrderedSet::new()),
            Err(SymError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_refuses_non_finalized() {
        let objective = SymbolicObjective::new();
        let message = objective.validate().unwrap_err();
        assert!(message.contains("finalized"));
    }

    #[test]
    fn test_symbol_queries_union_all_parts() {
        let xs = variable("sq_x");
        let ys = variable("sq_y");
        let zs = variable("sq_z");

        let mut objective = SymbolicObjective::new();
        objective.set_objective(Expr::symbol(xs));
        objective
            .equality_constraints
            .append(Expr::symbol(ys));
        objective
            .inequality_constraints
            .append(Expr::symbol(zs));

        assert_eq!(objective.symbols().len(), 3);
        assert_eq!(objective.variables().len(), 3);
        assert!(objective.parameters().is_empty());
    }
}
