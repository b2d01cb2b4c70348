use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::error::SolveResult;
use crate::model::{self, LinearProgram};
use crate::shipment::ShipmentMatrix;
use crate::simplex::{self, Limits, Tolerances};
use crate::types::ProblemInstance;

/// Tuning knobs for [`Solver`]. Read from the `solver:` section of an input
/// file; every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverOptions {
    /// Pivots allowed across both simplex phases.
    pub max_iterations: usize,
    pub pivot_tolerance: f64,
    /// Absolute phase-one residual below which an instance counts as feasible.
    pub feasibility_tolerance: f64,
    /// Largest distance from an integer a shipped quantity may have.
    pub integrality_tolerance: f64,
    /// Reject unbalanced totals before building the tableau.
    pub fail_fast: bool,
    /// Checked once per pivot; raising it aborts the solve.
    #[serde(skip)]
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            pivot_tolerance: 1e-9,
            feasibility_tolerance: 0.5,
            integrality_tolerance: 1e-6,
            fail_fast: true,
            cancel: None,
        }
    }
}

/// Builds and solves transportation instances. Holds no per-solve state, so
/// one solver can be shared across threads.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    options: SolverOptions,
}

impl Solver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    pub fn solve(&self, instance: &ProblemInstance) -> SolveResult<ShipmentMatrix> {
        let result = model::build(instance, self.options.fail_fast)
            .and_then(|lp| self.solve_model(&lp));

        match &result {
            Ok(matrix) => log::info!(
                "solved {}x{} instance: total cost {} after {} pivots",
                instance.sources.len(),
                instance.sinks.len(),
                matrix.total_cost(),
                matrix.iterations()
            ),
            Err(failure) if failure.is_defect() => {
                log::error!("{failure}; instance: {instance:?}")
            }
            Err(failure) => log::debug!("solve failed: {failure}"),
        }

        result
    }

    /// Solve an already built model.
    pub fn solve_model(&self, lp: &LinearProgram) -> SolveResult<ShipmentMatrix> {
        let tolerances = Tolerances {
            pivot: self.options.pivot_tolerance,
            feasibility: self.options.feasibility_tolerance,
        };
        let limits = Limits {
            max_iterations: self.options.max_iterations,
            cancel: self.options.cancel.as_deref(),
        };

        let vertex = simplex::solve(lp, tolerances, &limits)?;
        ShipmentMatrix::from_vertex(lp, &vertex, self.options.integrality_tolerance)
    }

    /// Solve independent instances in parallel. Results keep input order.
    pub fn solve_all(&self, instances: &[ProblemInstance]) -> Vec<SolveResult<ShipmentMatrix>> {
        instances
            .par_iter()
            .map(|instance| self.solve(instance))
            .collect()
    }
}
