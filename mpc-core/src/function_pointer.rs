//! An objective backed by native evaluator function pointers.
//!
//! The evaluators follow a fixed C ABI: `state` has length N, `param` has
//! length P, and `out` receives the result with matrices flattened in
//! column-major order. Evaluators must not allocate or unwind across the
//! ABI boundary.

use nalgebra::{DMatrix, DVector};

use crate::error::EvalError;
use crate::objective::Objective;

/// Evaluator taking the primal state and the parameter vector.
///
/// `out` points to a buffer sized for the particular evaluator: 1 for the
/// value, N for the gradient, N*N for the Hessian (column-major).
pub type StateEvalFn =
    unsafe extern "C" fn(state: *const f64, param: *const f64, out: *mut f64);

/// Evaluator taking only the parameter vector.
///
/// Used for the equality block, which does not depend on the state: `out`
/// is M*N (column-major) for the matrix and M for the vector.
pub type ParamEvalFn = unsafe extern "C" fn(param: *const f64, out: *mut f64);

/// An [`Objective`] that dispatches every evaluation to a set of C
/// function pointers.
///
/// The pointers typically come from a shared object produced at runtime;
/// whoever installs them is responsible for keeping that artifact alive
/// for as long as this objective is in use.
///
/// The equality and inequality pointers default to unset, which is valid
/// exactly when the corresponding constraint count is zero: in that case
/// the trait's zero-quantity defaults answer and the pointer is never
/// consulted. The value, gradient, and Hessian pointers are always
/// required.
#[derive(Debug, Clone, Default)]
pub struct FunctionPointerObjective {
    num_variables: usize,
    num_inequality_constraints: usize,
    num_equality_constraints: usize,
    num_parameters: usize,

    parameters: Option<DVector<f64>>,

    value_fn: Option<StateEvalFn>,
    gradient_fn: Option<StateEvalFn>,
    hessian_fn: Option<StateEvalFn>,

    equality_matrix_fn: Option<ParamEvalFn>,
    equality_vector_fn: Option<ParamEvalFn>,

    inequality_value_fn: Option<StateEvalFn>,
    inequality_gradient_fn: Option<StateEvalFn>,
    inequality_hessian_fn: Option<StateEvalFn>,
}

impl FunctionPointerObjective {
    /// Create an objective with the given dimensions and no evaluators
    /// installed.
    pub fn new(
        num_variables: usize,
        num_inequality_constraints: usize,
        num_equality_constraints: usize,
        num_parameters: usize,
    ) -> Self {
        Self {
            num_variables,
            num_inequality_constraints,
            num_equality_constraints,
            num_parameters,
            ..Self::default()
        }
    }

    /// Number of parameters P expected by the evaluators
    pub fn num_parameters(&self) -> usize {
        self.num_parameters
    }

    /// Set the parameter vector read by every evaluator call.
    ///
    /// This is set once per problem instance and treated as immutable for
    /// the duration of a `minimize` call.
    pub fn set_parameters(&mut self, parameters: DVector<f64>) {
        self.parameters = Some(parameters);
    }

    /// The currently installed parameter vector, if any
    pub fn parameters(&self) -> Option<&DVector<f64>> {
        self.parameters.as_ref()
    }

    pub fn set_value_fn(&mut self, f: StateEvalFn) {
        self.value_fn = Some(f);
    }

    pub fn set_gradient_fn(&mut self, f: StateEvalFn) {
        self.gradient_fn = Some(f);
    }

    pub fn set_hessian_fn(&mut self, f: StateEvalFn) {
        self.hessian_fn = Some(f);
    }

    pub fn set_equality_matrix_fn(&mut self, f: ParamEvalFn) {
        self.equality_matrix_fn = Some(f);
    }

    pub fn set_equality_vector_fn(&mut self, f: ParamEvalFn) {
        self.equality_vector_fn = Some(f);
    }

    pub fn set_inequality_value_fn(&mut self, f: StateEvalFn) {
        self.inequality_value_fn = Some(f);
    }

    pub fn set_inequality_gradient_fn(&mut self, f: StateEvalFn) {
        self.inequality_gradient_fn = Some(f);
    }

    pub fn set_inequality_hessian_fn(&mut self, f: StateEvalFn) {
        self.inequality_hessian_fn = Some(f);
    }

    /// Pointer passed to evaluators as the parameter array. Null when no
    /// parameter vector has been set; evaluators for parameterless
    /// problems never dereference it.
    fn param_ptr(&self) -> *const f64 {
        self.parameters
            .as_ref()
            .map(|p| p.as_slice().as_ptr())
            .unwrap_or(std::ptr::null())
    }

    fn require(f: Option<StateEvalFn>, name: &str) -> Result<StateEvalFn, EvalError> {
        f.ok_or_else(|| EvalError::new(format!("{name} function pointer is not set")))
    }

    /// Call a state evaluator that fills a scalar.
    fn call_scalar(&self, f: StateEvalFn, state: &DVector<f64>) -> f64 {
        let mut out = 0.0;
        unsafe { f(state.as_slice().as_ptr(), self.param_ptr(), &mut out) };
        out
    }

    /// Call a state evaluator that fills `len` doubles.
    fn call_vector(&self, f: StateEvalFn, state: &DVector<f64>, len: usize) -> DVector<f64> {
        let mut out = DVector::<f64>::zeros(len);
        unsafe {
            f(
                state.as_slice().as_ptr(),
                self.param_ptr(),
                out.as_mut_slice().as_mut_ptr(),
            )
        };
        out
    }

    /// Call a state evaluator that fills a column-major `rows x cols`
    /// matrix.
    fn call_matrix(
        &self,
        f: StateEvalFn,
        state: &DVector<f64>,
        rows: usize,
        cols: usize,
    ) -> DMatrix<f64> {
        let mut out = DMatrix::<f64>::zeros(rows, cols);
        unsafe {
            f(
                state.as_slice().as_ptr(),
                self.param_ptr(),
                out.as_mut_slice().as_mut_ptr(),
            )
        };
        out
    }
}

impl Objective for FunctionPointerObjective {
    fn num_variables(&self) -> usize {
        self.num_variables
    }

    fn num_equality_constraints(&self) -> usize {
        self.num_equality_constraints
    }

    fn num_inequality_constraints(&self) -> usize {
        self.num_inequality_constraints
    }

    fn value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        let f = Self::require(self.value_fn, "value")?;
        Ok(self.call_scalar(f, state))
    }

    fn gradient(&self, state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
        let f = Self::require(self.gradient_fn, "gradient")?;
        Ok(self.call_vector(f, state, self.num_variables))
    }

    fn hessian(&self, state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
        let f = Self::require(self.hessian_fn, "hessian")?;
        Ok(self.call_matrix(f, state, self.num_variables, self.num_variables))
    }

    fn equality_constraint_matrix(&self) -> Result<Option<DMatrix<f64>>, EvalError> {
        if self.num_equality_constraints == 0 {
            return Ok(None);
        }
        let f = self
            .equality_matrix_fn
            .ok_or_else(|| EvalError::new("equality matrix function pointer is not set"))?;
        let mut out =
            DMatrix::<f64>::zeros(self.num_equality_constraints, self.num_variables);
        unsafe { f(self.param_ptr(), out.as_mut_slice().as_mut_ptr()) };
        Ok(Some(out))
    }

    fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
        if self.num_equality_constraints == 0 {
            return Ok(None);
        }
        let f = self
            .equality_vector_fn
            .ok_or_else(|| EvalError::new("equality vector function pointer is not set"))?;
        let mut out = DVector::<f64>::zeros(self.num_equality_constraints);
        unsafe { f(self.param_ptr(), out.as_mut_slice().as_mut_ptr()) };
        Ok(Some(out))
    }

    fn inequality_constraints_value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        if self.num_inequality_constraints == 0 {
            return Ok(0.0);
        }
        let f = Self::require(self.inequality_value_fn, "inequality value")?;
        Ok(self.call_scalar(f, state))
    }

    fn inequality_constraints_gradient(
        &self,
        state: &DVector<f64>,
    ) -> Result<DVector<f64>, EvalError> {
        if self.num_inequality_constraints == 0 {
            return Ok(DVector::zeros(self.num_variables));
        }
        let f = Self::require(self.inequality_gradient_fn, "inequality gradient")?;
        Ok(self.call_vector(f, state, self.num_variables))
    }

    fn inequality_constraints_hessian(
        &self,
        state: &DVector<f64>,
    ) -> Result<DMatrix<f64>, EvalError> {
        if self.num_inequality_constraints == 0 {
            return Ok(DMatrix::zeros(self.num_variables, self.num_variables));
        }
        let f = Self::require(self.inequality_hessian_fn, "inequality hessian")?;
        Ok(self.call_matrix(f, state, self.num_variables, self.num_variables))
    }

    fn validate(&self) -> Result<(), String> {
        // Every required function pointer must be installed.
        if self.value_fn.is_none() {
            return Err("value function pointer is not set".to_string());
        }
        if self.gradient_fn.is_none() {
            return Err("gradient function pointer is not set".to_string());
        }
        if self.hessian_fn.is_none() {
            return Err("hessian function pointer is not set".to_string());
        }
        if self.num_equality_constraints > 0 {
            if self.equality_matrix_fn.is_none() {
                return Err("equality matrix function pointer is not set".to_string());
            }
            if self.equality_vector_fn.is_none() {
                return Err("equality vector function pointer is not set".to_string());
            }
        }
        if self.num_inequality_constraints > 0 {
            if self.inequality_value_fn.is_none() {
                return Err("inequality value function pointer is not set".to_string());
            }
            if self.inequality_gradient_fn.is_none() {
                return Err("inequality gradient function pointer is not set".to_string());
            }
            if self.inequality_hessian_fn.is_none() {
                return Err("inequality hessian function pointer is not set".to_string());
            }
        }

        // With parameters declared, the parameter vector must exist and
        // have the declared length.
        if self.num_parameters > 0 {
            match self.parameters {
                None => {
                    return Err(format!(
                        "objective declares {} parameters but no parameter vector was set",
                        self.num_parameters
                    ))
                }
                Some(ref p) if p.nrows() != self.num_parameters => {
                    return Err(format!(
                        "parameter vector has length {}, expected {}",
                        p.nrows(),
                        self.num_parameters
                    ))
                }
                Some(_) => {}
            }
        }

        // Defer the equality block dimension checks to the shared logic.
        crate::objective::validate_dimensions(self)
    }
}
