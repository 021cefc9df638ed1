//! Service network design on a fully discretized time grid.
//!
//! Every node gets the same grid `{0, δ, 2δ, ..}` and arrivals are rounded
//! up to the next grid point, so every solution of the model can be carried
//! out in continuous time. A coarse grid loses optimality or even
//! feasibility; [`crate::DddSolver`] avoids both by refining only where
//! needed.

use std::time::{Duration, Instant};

use csnd_core::{expand, ArrivalRounding, Discretization, Instance};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consistency::check;
use crate::ddd::{Bounds, DddError};
use crate::milp::{build_model, MilpSolver, ModelOptions, SolveLimits, SolveOutcome};
use crate::solution::DesignSolution;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BaselineOptions {
    /// Route each commodity on a single path
    pub unsplittable: bool,
    /// Check commodities on the rayon pool
    pub parallel: bool,
    /// Budget for the single MILP solve (seconds)
    pub solver_time_limit_secs: Option<f64>,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            unsplittable: false,
            parallel: true,
            solver_time_limit_secs: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaselineOutcome {
    pub solution: DesignSolution,
    pub delta: f64,
    pub timed_nodes: usize,
    pub timed_arcs: usize,
    pub elapsed: Duration,
}

/// Solve `instance` once over the regular grid of step `delta`.
///
/// Errors use the [`DddError`] variants of a single-iteration run; a grid
/// too coarse to route every commodity in time is `Infeasible`.
pub fn solve_full_discretization(
    instance: &Instance,
    delta: f64,
    solver: &dyn MilpSolver,
    options: &BaselineOptions,
) -> Result<BaselineOutcome, DddError> {
    let started = Instant::now();
    let disc = Discretization::regular(instance, delta)?;
    let network = expand(instance, &disc, ArrivalRounding::Up);
    let timed_nodes = network.node_count();
    info!(
        delta,
        timed_nodes,
        timed_arcs = network.arc_count(),
        "solving full discretization"
    );

    let model = build_model(
        &network,
        instance,
        ModelOptions {
            unsplittable: options.unsplittable,
        },
    );
    if let Some(k) = model.unroutable().first() {
        debug!(commodity = %k, delta, "commodity cannot meet its deadline on this grid");
        return Err(DddError::Infeasible {
            iteration: 1,
            timed_nodes,
        });
    }

    let limits = SolveLimits {
        time_limit: options.solver_time_limit_secs.map(Duration::from_secs_f64),
    };
    let solver_error = |message: String| DddError::Solver {
        iteration: 1,
        timed_nodes,
        message,
    };
    let values = match solver
        .solve(model.milp(), &limits)
        .map_err(|e| solver_error(e.to_string()))?
    {
        SolveOutcome::Optimal { values, .. } => values,
        SolveOutcome::Infeasible => {
            return Err(DddError::Infeasible {
                iteration: 1,
                timed_nodes,
            })
        }
        SolveOutcome::Unbounded => return Err(solver_error("model is unbounded".into())),
        SolveOutcome::TimedOut { best_bound } => {
            return Err(DddError::SolverTimeout {
                iteration: 1,
                timed_nodes,
                bounds: Bounds {
                    lower: best_bound,
                    upper: None,
                },
            })
        }
    };

    model
        .milp()
        .check_assignment(&values)
        .map_err(|e| solver_error(e.to_string()))?;
    let timed = model.interpret(instance, &values);
    let report = check(&timed, &network, instance, options.parallel).map_err(|e| {
        DddError::InternalInconsistency {
            iteration: 1,
            detail: e.to_string(),
        }
    })?;
    if !report.is_consistent() {
        return Err(DddError::InternalInconsistency {
            iteration: 1,
            detail: format!(
                "grid solution is not realizable for commodities {:?}",
                report.inconsistent_commodities()
            ),
        });
    }

    let solution = DesignSolution::from_report(instance, &report);
    info!(delta, objective = solution.total_cost, "full discretization solved");
    Ok(BaselineOutcome {
        solution,
        delta,
        timed_nodes,
        timed_arcs: network.arc_count(),
        elapsed: started.elapsed(),
    })
}
