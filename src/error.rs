use thiserror::Error;

/// Every way a transportation solve can fail. A failed solve never yields a
/// partial shipment matrix.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolveFailure {
    /// Malformed input: missing sources or sinks, negative or non-finite
    /// costs, duplicate ids and so on.
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    /// Detected before any pivoting, from the supply and demand totals alone.
    #[error("infeasible by construction: total demand {demand} cannot be matched by total supply {supply}")]
    InfeasibleByConstruction { demand: u64, supply: u64 },

    /// Phase one ended with artificial variables still carrying flow.
    #[error("no shipment plan satisfies every demand within the supply limits")]
    Infeasible,

    #[error("simplex did not converge within {iterations} iterations")]
    SolverDivergence { iterations: usize },

    #[error("solver internal error: {0}")]
    SolverInternalError(String),

    #[error("solve cancelled after {iterations} iterations")]
    Cancelled { iterations: usize },
}

impl SolveFailure {
    /// True when no feasible plan exists, whichever stage found out.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            SolveFailure::Infeasible | SolveFailure::InfeasibleByConstruction { .. }
        )
    }

    /// True for failures that point at a bug rather than at the input.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            SolveFailure::SolverDivergence { .. } | SolveFailure::SolverInternalError(_)
        )
    }
}

pub type SolveResult<T> = Result<T, SolveFailure>;
