use std::fmt;

use csnd_core::CsndError;
use serde::Serialize;
use thiserror::Error;

/// Best known bounds on the optimal cost.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bounds {
    /// Relative gap `(upper - lower) / max(|upper|, 1)`, once both are known.
    pub fn gap(&self) -> Option<f64> {
        let (lower, upper) = (self.lower?, self.upper?);
        Some(((upper - lower) / upper.abs().max(1.0)).max(0.0))
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |value: Option<f64>| match value {
            Some(v) => format!("{v:.6}"),
            None => "none".to_string(),
        };
        write!(
            f,
            "lower bound {}, upper bound {}",
            show(self.lower),
            show(self.upper)
        )
    }
}

#[derive(Debug, Error)]
pub enum DddError {
    /// Invalid instance or configuration
    #[error(transparent)]
    Instance(#[from] CsndError),

    #[error("no feasible design at iteration {iteration} ({timed_nodes} timed nodes)")]
    Infeasible { iteration: usize, timed_nodes: usize },

    #[error("solver timed out at iteration {iteration} ({timed_nodes} timed nodes); {bounds}")]
    SolverTimeout {
        iteration: usize,
        timed_nodes: usize,
        bounds: Bounds,
    },

    #[error("{reason} after {iteration} iterations; {bounds}")]
    ResourceExceeded {
        iteration: usize,
        reason: String,
        bounds: Bounds,
    },

    #[error("cancelled after {iteration} iterations; {bounds}")]
    Cancelled { iteration: usize, bounds: Bounds },

    /// The loop reached a state it cannot make progress from
    #[error("internal inconsistency at iteration {iteration}: {detail}")]
    InternalInconsistency { iteration: usize, detail: String },

    #[error("solver failed at iteration {iteration} ({timed_nodes} timed nodes): {message}")]
    Solver {
        iteration: usize,
        timed_nodes: usize,
        message: String,
    },
}

impl DddError {
    /// Bounds reached before the run stopped, for variants that carry them.
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            DddError::SolverTimeout { bounds, .. }
            | DddError::ResourceExceeded { bounds, .. }
            | DddError::Cancelled { bounds, .. } => Some(*bounds),
            _ => None,
        }
    }

    pub fn iteration(&self) -> Option<usize> {
        match self {
            DddError::Instance(_) => None,
            DddError::Infeasible { iteration, .. }
            | DddError::SolverTimeout { iteration, .. }
            | DddError::ResourceExceeded { iteration, .. }
            | DddError::Cancelled { iteration, .. }
            | DddError::InternalInconsistency { iteration, .. }
            | DddError::Solver { iteration, .. } => Some(*iteration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_display_and_gap() {
        let bounds = Bounds {
            lower: Some(4.0),
            upper: Some(5.0),
        };
        assert_eq!(bounds.to_string(), "lower bound 4.000000, upper bound 5.000000");
        assert!((bounds.gap().unwrap() - 0.2).abs() < 1e-12);

        let open = Bounds {
            lower: Some(1.0),
            upper: None,
        };
        assert_eq!(open.gap(), None);
        assert!(open.to_string().ends_with("upper bound none"));
    }

    #[test]
    fn test_error_carries_context() {
        let err = DddError::ResourceExceeded {
            iteration: 3,
            reason: "iteration limit of 3 reached".into(),
            bounds: Bounds {
                lower: Some(1.0),
                upper: None,
            },
        };
        assert_eq!(err.iteration(), Some(3));
        assert_eq!(err.bounds().unwrap().lower, Some(1.0));
        assert!(err.to_string().starts_with("iteration limit of 3 reached after 3 iterations"));

        let err = DddError::from(CsndError::Config("bad".into()));
        assert_eq!(err.iteration(), None);
        assert!(err.bounds().is_none());
    }
}
