//! The primal-dual interior point solver.
//!
//! Log-barrier homotopy with an infeasible-start Newton method: the outer
//! loop sweeps the barrier parameter t upward, and each stage runs damped
//! Newton iterations on the barrier-augmented objective
//!
//! ```text
//! f_t(x) = t * phi(x) + B(x)
//! ```
//!
//! where phi is the user objective and B the log barrier over the
//! inequality constraints. Step lengths come from a backtracking line
//! search on the primal-dual residual norm, which lets the iterates start
//! (and travel) outside the equality-feasible set.

use nalgebra::{DMatrix, DVector};

use crate::error::{SolverError, SolverResult};
use crate::objective::Objective;
use crate::settings::HyperParameters;

/// Interior point solver over a fixed objective.
///
/// The solver borrows its objective for its whole lifetime and holds no
/// other state between [`minimize`](Solver::minimize) calls; hyper
/// parameters are public and may be adjusted between calls.
pub struct Solver<'a, O: Objective> {
    objective: &'a O,
    /// Tuning knobs for the homotopy, Newton, and line search loops
    pub hyper_parameters: HyperParameters,
}

impl<'a, O: Objective> Solver<'a, O> {
    /// Create a solver after validating the objective.
    ///
    /// Fails with [`SolverError::ValidationFailed`] if the objective's
    /// dimensions or wiring are inconsistent.
    pub fn new(objective: &'a O) -> SolverResult<Self> {
        objective.validate().map_err(SolverError::ValidationFailed)?;
        Ok(Self {
            objective,
            hyper_parameters: HyperParameters::default(),
        })
    }

    /// Create a solver with the given hyper parameters, validating the
    /// objective.
    pub fn with_hyper_parameters(
        objective: &'a O,
        hyper_parameters: HyperParameters,
    ) -> SolverResult<Self> {
        objective.validate().map_err(SolverError::ValidationFailed)?;
        Ok(Self {
            objective,
            hyper_parameters,
        })
    }

    /// Create a solver without running `validate()` on the objective.
    ///
    /// For callers that have already validated, or that knowingly run an
    /// objective failing the generic checks.
    pub fn new_unvalidated(objective: &'a O) -> Self {
        Self {
            objective,
            hyper_parameters: HyperParameters::default(),
        }
    }

    /// Minimize the objective.
    ///
    /// `primal_start` defaults to the zero vector and `dual_start` to the
    /// all-ones vector. User-supplied starts are checked against the
    /// objective dimensions and rejected with
    /// [`SolverError::DimensionMismatch`].
    ///
    /// Returns `(value, x, nu)`: the objective value at the final iterate,
    /// the final primal, and the final dual.
    pub fn minimize(
        &self,
        primal_start: Option<DVector<f64>>,
        dual_start: Option<DVector<f64>>,
    ) -> SolverResult<(f64, DVector<f64>, DVector<f64>)> {
        let objective = self.objective;
        let hp = &self.hyper_parameters;

        let n = objective.num_variables();
        let m = objective.num_equality_constraints();
        let q = objective.num_inequality_constraints();

        let mut current_point = match primal_start {
            Some(p) => {
                if p.nrows() != n {
                    return Err(SolverError::DimensionMismatch(format!(
                        "primal start has length {}, but the objective has {} variables",
                        p.nrows(),
                        n
                    )));
                }
                p
            }
            None => DVector::zeros(n),
        };
        let mut current_dual = match dual_start {
            Some(d) => {
                if d.nrows() != m {
                    return Err(SolverError::DimensionMismatch(format!(
                        "dual start has length {}, but the objective has {} equality \
                         constraints",
                        d.nrows(),
                        m
                    )));
                }
                d
            }
            None => DVector::from_element(m, 1.0),
        };

        let mut t = hp.homotopy_parameter_start;
        let mut t_steps = 0usize;
        let mut total_steps = 0usize;

        let mut value = objective.value(&current_point)?;
        let mut grad = self.barrier_gradient(&current_point, t)?;
        let mut hess = self.barrier_hessian(&current_point, t)?;
        let mut lambda;

        // With no inequality constraints a single stage is exact, so the
        // outer condition only watches the gap bound Q/t when Q > 0.
        'stages: while (q == 0 || q as f64 / t > hp.dual_gap_epsilon)
            && t_steps < hp.homotopy_stages_maximum
            && value > hp.value_threshold
        {
            let mut iterations = 0usize;

            // t changed, so the residual must be recomputed
            lambda = self.residual_norm(&current_point, &current_dual, t)?;

            if hp.verbose {
                eprintln!(
                    "stage {t_steps}: t={t:.3e} value={value:.6e} lambda={lambda:.6e}"
                );
            }

            while lambda > hp.residual_epsilon
                && iterations < hp.newton_steps_stage_maximum
                && value > hp.value_threshold
            {
                let (primal_direction, dual_direction) =
                    objective.step_solver(&grad, &hess, &current_point, &current_dual)?;

                // Not really a step length, the newton direction is not
                // normalized
                let step_length = self.infeasible_linesearch(
                    &primal_direction,
                    &dual_direction,
                    &current_point,
                    &current_dual,
                    t,
                )?;

                current_point += step_length * &primal_direction;
                current_dual += step_length * &dual_direction;

                iterations += 1;
                total_steps += 1;

                value = objective.value(&current_point)?;
                grad = self.barrier_gradient(&current_point, t)?;
                hess = self.barrier_hessian(&current_point, t)?;
                lambda = self.residual_norm(&current_point, &current_dual, t)?;

                if hp.verbose {
                    eprintln!(
                        "stage {t_steps} iter {iterations}: s={step_length:.3e} \
                         value={value:.6e} lambda={lambda:.6e}"
                    );
                }
            }

            // The first stage is exact without inequality constraints
            if q == 0 {
                break 'stages;
            }

            t *= hp.homotopy_parameter_multiplier;
            t_steps += 1;
        }

        let minimum = objective.value(&current_point)?;

        if hp.verbose {
            eprintln!(
                "finished: t={t:.3e} stages={t_steps} steps={total_steps} \
                 minimum={minimum:.6e}"
            );
        }

        Ok((minimum, current_point, current_dual))
    }

    /// Value of the barrier-augmented objective `t * phi(x) + B(x)`.
    fn barrier_value(&self, point: &DVector<f64>, t: f64) -> SolverResult<f64> {
        Ok(t * self.objective.value(point)?
            + self.objective.inequality_constraints_value(point)?)
    }

    /// Gradient of the barrier-augmented objective.
    fn barrier_gradient(&self, point: &DVector<f64>, t: f64) -> SolverResult<DVector<f64>> {
        Ok(t * self.objective.gradient(point)?
            + self.objective.inequality_constraints_gradient(point)?)
    }

    /// Hessian of the barrier-augmented objective.
    fn barrier_hessian(&self, point: &DVector<f64>, t: f64) -> SolverResult<DMatrix<f64>> {
        Ok(t * self.objective.hessian(point)?
            + self.objective.inequality_constraints_hessian(point)?)
    }

    /// Euclidean norm of the primal-dual KKT residual
    ///
    /// ```text
    /// r(x, nu, t) = [ grad f_t(x) + A' nu ; A x - b ]
    /// ```
    ///
    /// Without equality constraints the residual reduces to the gradient.
    fn residual_norm(
        &self,
        primal: &DVector<f64>,
        dual: &DVector<f64>,
        t: f64,
    ) -> SolverResult<f64> {
        let eq_matrix = self.objective.equality_constraint_matrix()?;
        let eq_vector = self.objective.equality_constraint_vector()?;

        if let (Some(a), Some(b)) = (eq_matrix, eq_vector) {
            let dual_residual = self.barrier_gradient(primal, t)? + a.transpose() * dual;
            let primal_residual = a * primal - b;

            let mut vec = DVector::zeros(dual_residual.nrows() + primal_residual.nrows());
            vec.rows_mut(0, dual_residual.nrows()).copy_from(&dual_residual);
            vec.rows_mut(dual_residual.nrows(), primal_residual.nrows())
                .copy_from(&primal_residual);
            Ok(vec.norm())
        } else {
            Ok(self.barrier_gradient(primal, t)?.norm())
        }
    }

    /// Backtracking line search on the residual norm.
    ///
    /// Starting from a full step, contract by beta until
    ///
    /// ```text
    /// ||r(x + s dx, nu + s dnu)|| <= (1 - alpha * s) * ||r(x, nu)||
    /// ```
    ///
    /// and the shifted residual norm and barrier value are both defined.
    /// The NaN guards matter: the gradient of `-log(-E)` is still finite
    /// at points where `E >= 0`, so the norm condition alone would happily
    /// jump over a barrier into the infeasible region.
    fn infeasible_linesearch(
        &self,
        primal_direction: &DVector<f64>,
        dual_direction: &DVector<f64>,
        start_primal: &DVector<f64>,
        start_dual: &DVector<f64>,
        t: f64,
    ) -> SolverResult<f64> {
        let hp = &self.hyper_parameters;
        let mut s = 1.0;

        let current_norm = self.residual_norm(start_primal, start_dual, t)?;

        let mut shifted_norm = self.residual_norm(
            &(start_primal + s * primal_direction),
            &(start_dual + s * dual_direction),
            t,
        )?;
        let mut shifted_value = self.barrier_value(&(start_primal + s * primal_direction), t)?;

        let mut num_iterations = 0usize;
        while shifted_norm > (1.0 - hp.line_search_alpha * s) * current_norm
            || shifted_norm.is_nan()
            || shifted_value.is_nan()
        {
            s *= hp.line_search_beta;
            shifted_norm = self.residual_norm(
                &(start_primal + s * primal_direction),
                &(start_dual + s * dual_direction),
                t,
            )?;
            shifted_value = self.barrier_value(&(start_primal + s * primal_direction), t)?;

            num_iterations += 1;
            if num_iterations > hp.line_search_maximum_iterations {
                return Err(SolverError::LineSearchExceeded(
                    hp.line_search_maximum_iterations,
                ));
            }
        }

        Ok(s)
    }
}
