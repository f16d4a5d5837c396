//! Constrained quadratic example driving the solver directly.
//!
//! Solves:
//!   minimize    x^2 + y^2
//!   subject to  x = 3
//!               y >= 2
//!
//! Optimal solution: x = 3, y = 2, objective = 13.

use mpc_core::{EvalError, Objective, Solver};
use nalgebra::{DMatrix, DVector};

struct ConstrainedQuadratic;

impl Objective for ConstrainedQuadratic {
    fn num_variables(&self) -> usize {
        2
    }
    fn num_equality_constraints(&self) -> usize {
        1
    }
    fn num_inequality_constraints(&self) -> usize {
        1
    }

    fn value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        Ok(state.dot(state))
    }
    fn gradient(&self, state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
        Ok(2.0 * state)
    }
    fn hessian(&self, _state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
        Ok(2.0 * DMatrix::identity(2, 2))
    }

    fn equality_constraint_matrix(&self) -> Result<Option<DMatrix<f64>>, EvalError> {
        Ok(Some(DMatrix::from_row_slice(1, 2, &[1.0, 0.0])))
    }
    fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
        Ok(Some(DVector::from_element(1, 3.0)))
    }

    // y >= 2 in normal form is 2 - y < 0, so the barrier is -log(y - 2)
    fn inequality_constraints_value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
        Ok(-(state[1] - 2.0).ln())
    }
    fn inequality_constraints_gradient(
        &self,
        state: &DVector<f64>,
    ) -> Result<DVector<f64>, EvalError> {
        Ok(DVector::from_vec(vec![0.0, -1.0 / (state[1] - 2.0)]))
    }
    fn inequality_constraints_hessian(
        &self,
        state: &DVector<f64>,
    ) -> Result<DMatrix<f64>, EvalError> {
        let mut hess = DMatrix::zeros(2, 2);
        hess[(1, 1)] = 1.0 / ((state[1] - 2.0) * (state[1] - 2.0));
        Ok(hess)
    }
}

fn main() {
    let objective = ConstrainedQuadratic;
    let mut solver = Solver::new(&objective).expect("objective is consistent");
    solver.hyper_parameters.verbose = true;

    let start = DVector::from_vec(vec![20.0, 20.0]);
    let (minimum, primal, dual) = solver
        .minimize(Some(start), None)
        .expect("solve failed");

    println!("minimum   = {minimum:.6}");
    println!("primal    = ({:.6}, {:.6})", primal[0], primal[1]);
    println!("dual      = {:.6}", dual[0]);
}
