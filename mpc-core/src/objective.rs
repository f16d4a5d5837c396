//! The objective interface consumed by the solver.
//!
//! An [`Objective`] bundles the cost function, its derivatives, the affine
//! equality block, and the log-barrier quantities for the inequality
//! constraints. The solver only ever talks to this trait, so objectives
//! can be hand-written, generated, or adapters around native evaluators.

use nalgebra::{DMatrix, DVector};

use crate::error::{EvalError, SolverError, SolverResult};

/// A twice-differentiable objective with optional affine equality
/// constraints and a log-barrier for its inequality constraints.
///
/// The inequality trio has default implementations that return the zero
/// quantities, which is the correct behavior for an objective without
/// inequality constraints.
pub trait Objective {
    /// Number of primal variables N
    fn num_variables(&self) -> usize;

    /// Number of equality constraints M
    fn num_equality_constraints(&self) -> usize;

    /// Number of inequality constraints Q
    fn num_inequality_constraints(&self) -> usize;

    //==================== Objective ====================

    /// The value of the objective at `state`
    fn value(&self, state: &DVector<f64>) -> Result<f64, EvalError>;

    /// The gradient of the objective at `state` (length N)
    fn gradient(&self, state: &DVector<f64>) -> Result<DVector<f64>, EvalError>;

    /// The Hessian of the objective at `state` (N x N)
    fn hessian(&self, state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError>;

    //==================== Equality constraints ====================

    /// The equality constraint matrix A (M x N), or `None` when there are
    /// no equality constraints. If the equality constraints are nonlinear
    /// this has to be their linearization about the current state.
    fn equality_constraint_matrix(&self) -> Result<Option<DMatrix<f64>>, EvalError> {
        Ok(None)
    }

    /// The equality constraint vector b (the right hand side of Ax = b),
    /// or `None` when there are no equality constraints.
    fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
        Ok(None)
    }

    //==================== Inequality constraints ====================

    /// The sum of `-log(-constraint)` over the inequality constraints in
    /// normal form (`expr < 0`). Other barrier functions should work, but
    /// have not been tried.
    fn inequality_constraints_value(&self, _state: &DVector<f64>) -> Result<f64, EvalError> {
        Ok(0.0)
    }

    /// The gradient of [`inequality_constraints_value`]
    /// (length N; zero when there are no inequality constraints).
    ///
    /// [`inequality_constraints_value`]: Objective::inequality_constraints_value
    fn inequality_constraints_gradient(
        &self,
        _state: &DVector<f64>,
    ) -> Result<DVector<f64>, EvalError> {
        Ok(DVector::zeros(self.num_variables()))
    }

    /// The Hessian of [`inequality_constraints_value`]
    /// (N x N; zero when there are no inequality constraints).
    ///
    /// [`inequality_constraints_value`]: Objective::inequality_constraints_value
    fn inequality_constraints_hessian(
        &self,
        _state: &DVector<f64>,
    ) -> Result<DMatrix<f64>, EvalError> {
        let n = self.num_variables();
        Ok(DMatrix::zeros(n, n))
    }

    //==================== Newton step ====================

    /// Solve for the Newton step directions at the current iterate.
    ///
    /// With equality constraints the step comes from the KKT system
    ///
    /// ```text
    /// ┌         ┐ ┌     ┐    ┌      ┐
    /// │ ∇²f  Aᵀ │ │  v  │    │  ∇f  │
    /// │  A   0  │ │  w  │ = -│ Ax-b │
    /// └         ┘ └     ┘    └      ┘
    /// ```
    ///
    /// where v is the primal step direction and w is the *next* dual, not
    /// the dual step, so the dual direction is `w - ν`. Without equality
    /// constraints the system reduces to `∇²f v = -∇f` and the dual
    /// direction is zero.
    ///
    /// `gradient` and `hessian` are those of the barrier-augmented
    /// objective at the current iterate. The dense Householder QR used
    /// here assumes the system is nonsingular, which strong convexity
    /// guarantees; a singular system fails with
    /// [`SolverError::SingularSystem`].
    fn step_solver(
        &self,
        gradient: &DVector<f64>,
        hessian: &DMatrix<f64>,
        primal: &DVector<f64>,
        dual: &DVector<f64>,
    ) -> SolverResult<(DVector<f64>, DVector<f64>)> {
        let eq_matrix = self.equality_constraint_matrix()?;
        let eq_vector = self.equality_constraint_vector()?;

        // Split depending on whether there are equality constraints
        if let (Some(a), Some(b)) = (eq_matrix, eq_vector) {
            let n = hessian.ncols();
            let m = a.nrows();

            let mut kkt = DMatrix::<f64>::zeros(n + m, n + m);
            kkt.view_mut((0, 0), (n, n)).copy_from(hessian);
            kkt.view_mut((0, n), (n, m)).copy_from(&a.transpose());
            kkt.view_mut((n, 0), (m, n)).copy_from(&a);
            // Bottom right block stays zero

            let mut rhs = DVector::<f64>::zeros(n + m);
            rhs.rows_mut(0, n).copy_from(gradient);
            rhs.rows_mut(n, m).copy_from(&(&a * primal - &b));
            rhs.neg_mut();

            let solution = kkt.qr().solve(&rhs).ok_or(SolverError::SingularSystem)?;

            let primal_direction = solution.rows(0, n).into_owned();
            // w = ν + Δν, so subtract off the current dual
            let dual_direction = solution.rows(n, m).into_owned() - dual;

            Ok((primal_direction, dual_direction))
        } else {
            let primal_direction = hessian
                .clone()
                .qr()
                .solve(&(-gradient))
                .ok_or(SolverError::SingularSystem)?;

            Ok((primal_direction, DVector::zeros(dual.nrows())))
        }
    }

    //==================== Validation ====================

    /// Check that the reported dimensions and the equality block agree.
    ///
    /// Returns an error message describing the first inconsistency found.
    fn validate(&self) -> Result<(), String> {
        validate_dimensions(self)
    }
}

/// Shared dimension checks: with M > 0 the equality block must be present,
/// A must be M x N, and A and b must agree on M. Implementations that add
/// their own checks (pointer wiring, parameter vectors) call this after
/// them.
pub fn validate_dimensions<T: Objective + ?Sized>(objective: &T) -> Result<(), String> {
    let fetch_err = |e: EvalError| format!("equality block evaluation failed: {e}");
    let eq_matrix = objective.equality_constraint_matrix().map_err(fetch_err)?;
    let eq_vector = objective.equality_constraint_vector().map_err(fetch_err)?;

    if objective.num_equality_constraints() > 0 {
        let Some(ref a) = eq_matrix else {
            return Err(
                "no equality constraint matrix returned even though the number of \
                 equality constraints is > 0"
                    .to_string(),
            );
        };
        let Some(ref b) = eq_vector else {
            return Err(
                "no equality constraint vector returned even though the number of \
                 equality constraints is > 0"
                    .to_string(),
            );
        };

        if a.ncols() != objective.num_variables() {
            return Err(format!(
                "equality constraint matrix has {} columns, expected {}",
                a.ncols(),
                objective.num_variables()
            ));
        }
        if a.nrows() != objective.num_equality_constraints() {
            return Err(format!(
                "equality constraint matrix has {} rows, expected {}",
                a.nrows(),
                objective.num_equality_constraints()
            ));
        }
        if b.nrows() != a.nrows() {
            return Err(format!(
                "equality constraint matrix and vector have different numbers of rows \
                 ({} vs {})",
                a.nrows(),
                b.nrows()
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// min x^2 + y^2 subject to x + y = 2
    struct EqualityQuadratic;

    impl Objective for EqualityQuadratic {
        fn num_variables(&self) -> usize {
            2
        }
        fn num_equality_constraints(&self) -> usize {
            1
        }
        fn num_inequality_constraints(&self) -> usize {
            0
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
            Ok(Some(DMatrix::from_row_slice(1, 2, &[1.0, 1.0])))
        }
        fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
            Ok(Some(DVector::from_element(1, 2.0)))
        }
    }

    #[test]
    fn test_step_solver_lands_on_constraint() {
        let objective = EqualityQuadratic;
        let primal = DVector::from_vec(vec![5.0, -1.0]);
        let dual = DVector::from_element(1, 1.0);
        let gradient = objective.gradient(&primal).unwrap();
        let hessian = objective.hessian(&primal).unwrap();

        let (dp, dd) = objective
            .step_solver(&gradient, &hessian, &primal, &dual)
            .unwrap();

        // A quadratic with affine constraints is solved by a single full
        // Newton step: x + dp must satisfy the constraint and minimize.
        let next = &primal + &dp;
        assert!((next[0] + next[1] - 2.0).abs() < 1e-12);
        assert!((next[0] - 1.0).abs() < 1e-12);
        assert!((next[1] - 1.0).abs() < 1e-12);
        assert_eq!(dd.nrows(), 1);
    }

    #[test]
    fn test_step_solver_without_equalities() {
        struct Unconstrained;
        impl Objective for Unconstrained {
            fn num_variables(&self) -> usize {
                1
            }
            fn num_equality_constraints(&self) -> usize {
                0
            }
            fn num_inequality_constraints(&self) -> usize {
                0
            }
            fn value(&self, state: &DVector<f64>) -> Result<f64, EvalError> {
                Ok(state[0] * state[0])
            }
            fn gradient(&self, state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
                Ok(2.0 * state)
            }
            fn hessian(&self, _state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
                Ok(DMatrix::from_element(1, 1, 2.0))
            }
        }

        let objective = Unconstrained;
        let primal = DVector::from_element(1, 9.0);
        let dual = DVector::zeros(0);
        let gradient = objective.gradient(&primal).unwrap();
        let hessian = objective.hessian(&primal).unwrap();

        let (dp, dd) = objective
            .step_solver(&gradient, &hessian, &primal, &dual)
            .unwrap();

        // Newton on x^2 from 9 jumps straight to 0
        assert!((primal[0] + dp[0]).abs() < 1e-12);
        assert_eq!(dd.nrows(), 0);
    }

    #[test]
    fn test_validate_catches_column_mismatch() {
        struct BadColumns;
        impl Objective for BadColumns {
            fn num_variables(&self) -> usize {
                3
            }
            fn num_equality_constraints(&self) -> usize {
                1
            }
            fn num_inequality_constraints(&self) -> usize {
                0
            }
            fn value(&self, _state: &DVector<f64>) -> Result<f64, EvalError> {
                Ok(0.0)
            }
            fn gradient(&self, _state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
                Ok(DVector::zeros(3))
            }
            fn hessian(&self, _state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
                Ok(DMatrix::zeros(3, 3))
            }
            fn equality_constraint_matrix(&self) -> Result<Option<DMatrix<f64>>, EvalError> {
                // 2 columns, but 3 variables
                Ok(Some(DMatrix::from_row_slice(1, 2, &[1.0, 1.0])))
            }
            fn equality_constraint_vector(&self) -> Result<Option<DVector<f64>>, EvalError> {
                Ok(Some(DVector::from_element(1, 1.0)))
            }
        }

        assert!(BadColumns.validate().is_err());
    }

    #[test]
    fn test_validate_requires_equality_block() {
        struct MissingBlock;
        impl Objective for MissingBlock {
            fn num_variables(&self) -> usize {
                1
            }
            fn num_equality_constraints(&self) -> usize {
                1
            }
            fn num_inequality_constraints(&self) -> usize {
                0
            }
            fn value(&self, _state: &DVector<f64>) -> Result<f64, EvalError> {
                Ok(0.0)
            }
            fn gradient(&self, _state: &DVector<f64>) -> Result<DVector<f64>, EvalError> {
                Ok(DVector::zeros(1))
            }
            fn hessian(&self, _state: &DVector<f64>) -> Result<DMatrix<f64>, EvalError> {
                Ok(DMatrix::zeros(1, 1))
            }
        }

        assert!(MissingBlock.validate().is_err());
    }
}
