//! Solver hyper parameters.

/// Hyper parameters controlling the homotopy loop, the inner Newton
/// iterations, and the backtracking line search.
///
/// The defaults are fairly aggressive and find a precise solution. For
/// real-time use the iteration maximums can be heavily restricted.
#[derive(Debug, Clone)]
pub struct HyperParameters {
    /// Maximum number of Newton steps per homotopy stage
    pub newton_steps_stage_maximum: usize,

    /// Maximum number of homotopy stages
    pub homotopy_stages_maximum: usize,

    /// Inner stopping threshold on the KKT residual norm
    pub residual_epsilon: f64,

    /// Outer stopping threshold on the duality gap bound Q/t
    pub dual_gap_epsilon: f64,

    /// Starting value of the homotopy barrier parameter t
    pub homotopy_parameter_start: f64,

    /// Factor applied to t after every homotopy stage
    pub homotopy_parameter_multiplier: f64,

    /// Backtracking line search slope factor, in (0, 0.5)
    pub line_search_alpha: f64,

    /// Backtracking line search contraction factor, in (0, 1)
    pub line_search_beta: f64,

    /// Maximum number of line search contractions
    pub line_search_maximum_iterations: usize,

    /// Early-exit lower bound on the objective value. The solver returns
    /// as soon as the value drops below this. Defaults to -inf, so has no
    /// effect unless set.
    pub value_threshold: f64,

    /// Print stage/iteration diagnostics to stderr
    pub verbose: bool,
}

impl Default for HyperParameters {
    fn default() -> Self {
        Self {
            newton_steps_stage_maximum: 100,
            homotopy_stages_maximum: 50,
            residual_epsilon: 1.0e-3,
            dual_gap_epsilon: 1.0e-3,
            homotopy_parameter_start: 1.0,
            homotopy_parameter_multiplier: 20.0,
            line_search_alpha: 0.25,
            line_search_beta: 0.5,
            line_search_maximum_iterations: 100,
            value_threshold: f64::NEG_INFINITY,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let hp = HyperParameters::default();
        assert_eq!(hp.newton_steps_stage_maximum, 100);
        assert_eq!(hp.homotopy_stages_maximum, 50);
        assert_eq!(hp.residual_epsilon, 1.0e-3);
        assert_eq!(hp.dual_gap_epsilon, 1.0e-3);
        assert_eq!(hp.homotopy_parameter_start, 1.0);
        assert_eq!(hp.homotopy_parameter_multiplier, 20.0);
        assert_eq!(hp.line_search_alpha, 0.25);
        assert_eq!(hp.line_search_beta, 0.5);
        assert_eq!(hp.line_search_maximum_iterations, 100);
        assert_eq!(hp.value_threshold, f64::NEG_INFINITY);
        assert!(!hp.verbose);
    }
}
