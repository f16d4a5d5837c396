//! Symbolic end-to-end example: model, finalize, solve.
//!
//! Builds the model
//!   minimize    x^2 + y^2
//!   subject to  x = 3
//!               y >= a
//! symbolically, compiles it to native evaluators, and solves it twice
//! with different values of the parameter a — the point of the
//! parameter vector is exactly this kind of cheap re-solve.

use mpc_core::Solver;
use mpc_sym::symbols::{parameter, variable};
use mpc_sym::{Expr, OrderedSet, SymbolicObjective};
use nalgebra::DVector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let xs = variable("x");
    let ys = variable("y");
    let ps = parameter("a");
    let (x, y, a) = (Expr::symbol(xs), Expr::symbol(ys), Expr::symbol(ps));

    let mut objective = SymbolicObjective::new();
    objective.set_objective(&x * &x + &y * &y);
    objective
        .equality_constraints
        .append_equation(x, Expr::integer(3));
    objective.inequality_constraints.append_greater_than(y, a);

    let variables: OrderedSet = [xs, ys].into_iter().collect();
    let parameters: OrderedSet = [ps].into_iter().collect();
    objective.finalize(&variables, &parameters)?;

    for bound in [2.0, 5.0] {
        objective.set_parameters(DVector::from_element(1, bound));
        let solver = Solver::new(&objective)?;
        let (minimum, primal, _dual) =
            solver.minimize(Some(DVector::from_vec(vec![20.0, 20.0])), None)?;
        println!(
            "a = {bound}: minimum = {minimum:.4} at ({:.4}, {:.4})",
            primal[0], primal[1]
        );
    }

    Ok(())
}
