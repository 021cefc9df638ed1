//! [`MilpSolver`] implementation on top of `good_lp`.

use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use good_lp::solvers::microlp::microlp;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel,
    Variable,
};
use tracing::{debug, warn};

use super::model::{MilpModel, MilpSolver, Sense, SolveLimits, SolveOutcome, SolverError, VarKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MilpBackend {
    /// Pure-Rust branch and bound
    #[default]
    Microlp,
    #[cfg(feature = "solver-highs")]
    Highs,
}

const AVAILABLE_BACKENDS: &[&str] = &[
    "microlp",
    #[cfg(feature = "solver-highs")]
    "highs",
];

impl MilpBackend {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_BACKENDS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MilpBackend::Microlp => "microlp",
            #[cfg(feature = "solver-highs")]
            MilpBackend::Highs => "highs",
        }
    }

    /// Whether the backend enforces a time limit inside its own search.
    pub fn has_native_time_limit(&self) -> bool {
        match self {
            MilpBackend::Microlp => false,
            #[cfg(feature = "solver-highs")]
            MilpBackend::Highs => true,
        }
    }
}

impl FromStr for MilpBackend {
    type Err = SolverError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.to_ascii_lowercase();
        match normalized.as_str() {
            "microlp" => Ok(MilpBackend::Microlp),
            #[cfg(feature = "solver-highs")]
            "highs" => Ok(MilpBackend::Highs),
            _ => Err(SolverError::UnknownSolver(format!(
                "'{}'; supported values: {}",
                normalized,
                MilpBackend::available().join(", ")
            ))),
        }
    }
}

/// Solves [`MilpModel`]s with a `good_lp` backend.
///
/// Time limits are passed to HiGHS, which stops its own search. `microlp` has
/// no limit of its own: the solve runs on a worker thread and the caller stops
/// waiting once the limit expires. That worker is detached, not interrupted,
/// and keeps its CPU until the abandoned solve finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpSolver {
    backend: MilpBackend,
}

impl GoodLpSolver {
    pub fn new(backend: MilpBackend) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> MilpBackend {
        self.backend
    }
}

impl MilpSolver for GoodLpSolver {
    fn name(&self) -> &str {
        self.backend.as_str()
    }

    fn solve(&self, model: &MilpModel, limits: &SolveLimits) -> Result<SolveOutcome, SolverError> {
        debug!(
            backend = self.backend.as_str(),
            vars = model.num_vars(),
            binaries = model.num_binaries(),
            integers = model.num_integers(),
            constraints = model.num_constraints(),
            "solving MILP"
        );
        let Some(limit) = limits.time_limit else {
            return solve_blocking(model, self.backend, None);
        };

        if self.backend.has_native_time_limit() {
            let started = Instant::now();
            let result = solve_blocking(model, self.backend, Some(limit));
            if started.elapsed() >= limit {
                warn!(limit = ?limit, "MILP solve hit its time limit");
                return Ok(SolveOutcome::TimedOut { best_bound: None });
            }
            return result;
        }

        let (tx, rx) = mpsc::channel();
        let owned = model.clone();
        let backend = self.backend;
        thread::Builder::new()
            .name("csnd-milp".into())
            .spawn(move || {
                let _ = tx.send(solve_blocking(&owned, backend, None));
            })
            .map_err(|e| SolverError::Worker(e.to_string()))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(limit = ?limit, "MILP solve hit its time limit");
                Ok(SolveOutcome::TimedOut { best_bound: None })
            }
            Err(RecvTimeoutError::Disconnected) => Err(SolverError::Worker(
                "solver thread exited without a result".into(),
            )),
        }
    }
}

#[cfg_attr(not(feature = "solver-highs"), allow(unused_variables))]
fn solve_blocking(
    model: &MilpModel,
    backend: MilpBackend,
    limit: Option<Duration>,
) -> Result<SolveOutcome, SolverError> {
    if model.num_vars() == 0 {
        return Ok(solve_empty(model));
    }
    if model
        .constraints()
        .iter()
        .any(|c| c.terms.is_empty() && !c.holds(&[], 1e-9))
    {
        return Ok(SolveOutcome::Infeasible);
    }

    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = model
        .vars()
        .iter()
        .map(|def| {
            let var = match def.kind {
                VarKind::Continuous => variable().min(def.lower).max(def.upper),
                VarKind::Binary => variable()
                    .integer()
                    .min(def.lower.max(0.0))
                    .max(def.upper.min(1.0)),
                VarKind::Integer => variable().integer().min(def.lower).max(def.upper),
            };
            vars.add(var)
        })
        .collect();

    let mut objective = Expression::from(0.0);
    for (def, &var) in model.vars().iter().zip(&handles) {
        if def.cost != 0.0 {
            objective += def.cost * var;
        }
    }
    let problem = vars.minimise(objective);

    match backend {
        MilpBackend::Microlp => solve_with(problem.using(microlp), model, &handles),
        #[cfg(feature = "solver-highs")]
        MilpBackend::Highs => {
            let mut problem = problem.using(highs);
            if let Some(limit) = limit {
                problem = problem.set_time_limit(limit.as_secs_f64());
            }
            solve_with(problem, model, &handles)
        }
    }
}

fn solve_with<M>(
    mut problem: M,
    model: &MilpModel,
    handles: &[Variable],
) -> Result<SolveOutcome, SolverError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in model.constraints().iter().filter(|c| !c.terms.is_empty()) {
        let mut lhs = Expression::from(0.0);
        for &(var, coef) in &c.terms {
            lhs += coef * handles[var.value()];
        }
        let rhs = c.rhs;
        let row = match c.sense {
            Sense::Le => constraint!(lhs <= rhs),
            Sense::Eq => constraint!(lhs == rhs),
            Sense::Ge => constraint!(lhs >= rhs),
        };
        problem.add_constraint(row);
    }

    match problem.solve() {
        Ok(solution) => {
            let values: Vec<f64> = handles.iter().map(|&v| solution.value(v)).collect();
            let objective = model.objective_value(&values);
            Ok(SolveOutcome::Optimal { values, objective })
        }
        Err(ResolutionError::Infeasible) => Ok(SolveOutcome::Infeasible),
        Err(ResolutionError::Unbounded) => Ok(SolveOutcome::Unbounded),
        Err(e) => Err(SolverError::Backend(e.to_string())),
    }
}

/// A model without variables is feasible iff every constraint holds at 0.
fn solve_empty(model: &MilpModel) -> SolveOutcome {
    if model.constraints().iter().all(|c| c.holds(&[], 1e-9)) {
        SolveOutcome::Optimal {
            values: Vec::new(),
            objective: 0.0,
        }
    } else {
        SolveOutcome::Infeasible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("MicroLP".parse::<MilpBackend>().unwrap(), MilpBackend::Microlp);
        let err = "gurobi".parse::<MilpBackend>().unwrap_err();
        assert!(err.to_string().contains("microlp"));
    }

    #[test]
    fn test_knapsack_like_model() {
        // min 3x + 10y  s.t.  x <= 4y,  x >= 2,  x in [0, 5], y binary
        let mut model = MilpModel::new();
        let x = model.continuous(0.0, 5.0, 3.0);
        let y = model.binary(10.0);
        model.add_constraint("link", vec![(x, 1.0), (y, -4.0)], Sense::Le, 0.0);
        model.add_constraint("demand", vec![(x, 1.0)], Sense::Ge, 2.0);

        let outcome = GoodLpSolver::default()
            .solve(&model, &SolveLimits::default())
            .unwrap();
        match outcome {
            SolveOutcome::Optimal { values, objective } => {
                assert!((values[0] - 2.0).abs() < 1e-6);
                assert!((values[1] - 1.0).abs() < 1e-6);
                assert!((objective - 16.0).abs() < 1e-6);
            }
            other => panic!("expected optimal, got {other:?}"),
        }
    }

    #[test]
    fn test_infeasible_model() {
        let mut model = MilpModel::new();
        let x = model.continuous(0.0, 1.0, 1.0);
        model.add_constraint("too_much", vec![(x, 1.0)], Sense::Ge, 2.0);

        let limits = SolveLimits {
            time_limit: Some(Duration::from_secs(30)),
        };
        let outcome = GoodLpSolver::default().solve(&model, &limits).unwrap();
        assert_eq!(outcome, SolveOutcome::Infeasible);
    }

    #[test]
    fn test_integer_variable_rounds_up_to_cover_demand() {
        // min n  s.t.  10n >= 24,  n integer in [0, 3]
        let mut model = MilpModel::new();
        let n = model.integer(0.0, 3.0, 1.0);
        model.add_constraint("cover", vec![(n, 10.0)], Sense::Ge, 24.0);

        match GoodLpSolver::default()
            .solve(&model, &SolveLimits::default())
            .unwrap()
        {
            SolveOutcome::Optimal { values, .. } => assert!((values[0] - 3.0).abs() < 1e-6),
            other => panic!("expected optimal, got {other:?}"),
        }
    }

    #[test]
    fn test_only_highs_enforces_its_own_time_limit() {
        assert!(!MilpBackend::Microlp.has_native_time_limit());
        #[cfg(feature = "solver-highs")]
        assert!(MilpBackend::Highs.has_native_time_limit());
    }

    #[cfg(feature = "solver-highs")]
    #[test]
    fn test_highs_solves_within_native_limit() {
        let mut model = MilpModel::new();
        let x = model.continuous(0.0, 5.0, 3.0);
        let y = model.binary(10.0);
        model.add_constraint("link", vec![(x, 1.0), (y, -4.0)], Sense::Le, 0.0);
        model.add_constraint("demand", vec![(x, 1.0)], Sense::Ge, 2.0);

        let limits = SolveLimits {
            time_limit: Some(Duration::from_secs(30)),
        };
        let outcome = GoodLpSolver::new(MilpBackend::Highs)
            .solve(&model, &limits)
            .unwrap();
        assert_eq!(outcome.status(), "optimal");
    }

    #[test]
    fn test_empty_model() {
        let model = MilpModel::new();
        let outcome = GoodLpSolver::default()
            .solve(&model, &SolveLimits::default())
            .unwrap();
        assert_eq!(outcome.status(), "optimal");
    }
}
