//! The full symbolic path: model, finalize, solve.

use approx::assert_relative_eq;
use mpc_core::{EvalError, Objective, Solver};
use mpc_sym::symbols::{parameter, variable};
use mpc_sym::{Expr, OrderedSet, SymbolicObjective};
use nalgebra::{DMatrix, DVector};
use rustc_hash::FxHashMap;

/// Build the constrained quadratic model:
/// min x^2 + y^2  s.t.  x = 3,  y >= a
fn quadratic_model() -> (SymbolicObjective, OrderedSet, OrderedSet) {
    let xs = variable("sym_q_x");
    let ys = variable("sym_q_y");
    let ps = parameter("sym_q_a");
    let (x, y, a) = (Expr::symbol(xs), Expr::symbol(ys), Expr::symbol(ps));

    let mut objective = SymbolicObjective::new();
    objective.set_objective(&x * &x + &y * &y);
    objective
        .equality_constraints
        .append_equation(x, Expr::integer(3));
    objective.inequality_constraints.append_greater_than(y, a);

    let variables: OrderedSet = [xs, ys].into_iter().collect();
    let parameters: OrderedSet = [ps].into_iter().collect();
    (objective, variables, parameters)
}

#[test]
fn test_quadratic_system_end_to_end() {
    let (mut objective, variables, parameters) = quadratic_model();
    objective.finalize(&variables, &parameters).unwrap();
    objective.set_parameters(DVector::from_element(1, 2.0));

    assert_eq!(objective.num_variables(), 2);
    assert_eq!(objective.num_equality_constraints(), 1);
    assert_eq!(objective.num_inequality_constraints(), 1);

    let solver = Solver::new(&objective).unwrap();
    let start = DVector::from_vec(vec![20.0, 20.0]);
    let (minimum, primal, _dual) = solver.minimize(Some(start), None).unwrap();

    assert_relative_eq!(minimum, 13.0, epsilon = 1e-2);
    assert_relative_eq!(primal[0], 3.0, epsilon = 1e-2);
    assert_relative_eq!(primal[1], 2.0, epsilon = 1e-2);
}

#[test]
fn test_compiled_value_matches_symbolic_evaluation() {
    let (mut objective, variables, parameters) = quadratic_model();
    objective.finalize(&variables, &parameters).unwrap();
    objective.set_parameters(DVector::from_element(1, 2.0));

    let expression = objective.objective().unwrap().clone();
    for (px, py) in [(0.0, 0.0), (1.5, -2.0), (20.0, 20.0)] {
        let compiled = objective
            .value(&DVector::from_vec(vec![px, py]))
            .unwrap();
        let bindings: FxHashMap<_, _> =
            [(variable("sym_q_x"), px), (variable("sym_q_y"), py)]
                .into_iter()
                .collect();
        let symbolic = expression.eval(&bindings).unwrap();
        assert_relative_eq!(compiled, symbolic, epsilon = 1e-12);
    }
}

#[test]
fn test_symbolic_path_agrees_with_handwritten_objective() {
    /// The same problem written out by hand against the solver trait.
    struct Handwritten;
    impl Objective for Handwritten {
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
        fn inequality_constraints_value(
            &self,
            state: &DVector<f64>,
        ) -> Result<f64, EvalError> {
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

    let (mut symbolic, variables, parameters) = quadratic_model();
    symbolic.finalize(&variables, &parameters).unwrap();
    symbolic.set_parameters(DVector::from_element(1, 2.0));

    let start = DVector::from_vec(vec![20.0, 20.0]);

    let symbolic_solver = Solver::new(&symbolic).unwrap();
    let (symbolic_min, symbolic_primal, symbolic_dual) =
        symbolic_solver.minimize(Some(start.clone()), None).unwrap();

    let handwritten = Handwritten;
    let handwritten_solver = Solver::new(&handwritten).unwrap();
    let (hand_min, hand_primal, hand_dual) =
        handwritten_solver.minimize(Some(start), None).unwrap();

    // Identical problems through identical solver settings: the paths
    // must land on the same answer up to floating point noise (the
    // compiled evaluators spell 1/x as pow(x, -1), so the trajectories
    // can differ in the last bits).
    assert_relative_eq!(symbolic_min, hand_min, epsilon = 1e-6);
    assert_relative_eq!(symbolic_primal[0], hand_primal[0], epsilon = 1e-6);
    assert_relative_eq!(symbolic_primal[1], hand_primal[1], epsilon = 1e-6);
    assert_relative_eq!(symbolic_dual[0], hand_dual[0], epsilon = 1e-6);
}

#[test]
fn test_refinalize_after_editing() {
    // Re-finalizing after a constraint edit rebuilds the evaluators
    let (mut objective, variables, parameters) = quadratic_model();
    objective.finalize(&variables, &parameters).unwrap();
    objective.set_parameters(DVector::from_element(1, 2.0));

    // Drop the inequality and refinalize: now the problem is just
    // min x^2 + y^2 s.t. x = 3
    objective.inequality_constraints.remove(0).unwrap();
    objective.finalize(&variables, &parameters).unwrap();
    assert_eq!(objective.num_inequality_constraints(), 0);

    let solver = Solver::new(&objective).unwrap();
    let (minimum, primal, _dual) = solver.minimize(None, None).unwrap();
    assert_relative_eq!(minimum, 9.0, epsilon = 1e-4);
    assert_relative_eq!(primal[0], 3.0, epsilon = 1e-4);
    assert_relative_eq!(primal[1], 0.0, epsilon = 1e-4);
}

#[test]
fn test_unconstrained_symbolic_model() {
    // min (x - 4)^2 with no constraints at all
    let xs = variable("sym_u_x");
    let x = Expr::symbol(xs);

    let mut objective = SymbolicObjective::new();
    objective.set_objective((&x - 4) * (&x - 4));

    let variables: OrderedSet = [xs].into_iter().collect();
    objective.finalize(&variables, &OrderedSet::new()).unwrap();

    let solver = Solver::new(&objective).unwrap();
    let (minimum, primal, dual) = solver.minimize(None, None).unwrap();

    assert_relative_eq!(minimum, 0.0, epsilon = 1e-8);
    assert_relative_eq!(primal[0], 4.0, epsilon = 1e-8);
    assert_eq!(dual.nrows(), 0);
}
