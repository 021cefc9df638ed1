use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use csnd_core::{expand, ArrivalRounding, Discretization, ExpandedNetwork, Instance};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::config::DddConfig;
use super::error::DddError;
use super::state::{IterationRecord, Phase, RefinementState};
use crate::consistency::check;
use crate::milp::{build_model, MilpSolver, SolveLimits, SolveOutcome};
use crate::solution::DesignSolution;

/// Shared flag that stops a running [`DddSolver`] at the next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The relaxed optimum was realizable in continuous time
    Optimal,
    /// A probed upper bound met the lower bound
    GapClosed,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::Optimal => "optimal",
            Termination::GapClosed => "gap_closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DddOutcome {
    pub solution: DesignSolution,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
    /// Discretization of the last solved relaxation
    pub discretization: Discretization,
    pub elapsed: Duration,
    pub termination: Termination,
}

impl DddOutcome {
    pub fn objective(&self) -> f64 {
        self.solution.total_cost
    }
}

/// Solves an [`Instance`] by dynamic discretization discovery.
pub struct DddSolver<'a> {
    instance: &'a Instance,
    solver: &'a dyn MilpSolver,
    config: DddConfig,
    cancel: Option<CancelFlag>,
}

impl<'a> DddSolver<'a> {
    pub fn new(instance: &'a Instance, solver: &'a dyn MilpSolver) -> Self {
        Self {
            instance,
            solver,
            config: DddConfig::default(),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: DddConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &DddConfig {
        &self.config
    }

    pub fn solve(&self) -> Result<DddOutcome, DddError> {
        self.solve_with(|_| {})
    }

    /// Run the loop, handing every finished iteration to `observer`.
    pub fn solve_with<F>(&self, mut observer: F) -> Result<DddOutcome, DddError>
    where
        F: FnMut(&IterationRecord),
    {
        self.config.validate()?;
        let started = Instant::now();
        let instance = self.instance;

        let discretization = if self.config.seed_travel_bounds {
            Discretization::seeded(instance)
        } else {
            Discretization::initial(instance)
        };
        let mut state = RefinementState::new(discretization);
        info!(
            solver = self.solver.name(),
            nodes = instance.num_nodes(),
            arcs = instance.arcs().len(),
            commodities = instance.commodities().len(),
            time_points = state.discretization.len(),
            "starting dynamic discretization discovery"
        );

        loop {
            self.check_budget(&state, started)?;
            state.iteration += 1;
            let iteration = state.iteration;

            state.advance(Phase::Expand);
            let network = expand(instance, &state.discretization, ArrivalRounding::Down);
            let timed_nodes = network.node_count();
            debug!(
                iteration,
                timed_nodes,
                timed_arcs = network.arc_count(),
                "expanded network"
            );

            state.advance(Phase::Solve);
            let model = build_model(&network, instance, self.config.model_options());
            if let Some(k) = model.unroutable().first() {
                debug!(iteration, commodity = %k, "commodity cannot reach its destination");
                state.advance(Phase::Terminated);
                return Err(DddError::Infeasible {
                    iteration,
                    timed_nodes,
                });
            }
            let (limits, budget_binds) = self.solve_limits(started);
            let outcome = self
                .solver
                .solve(model.milp(), &limits)
                .map_err(|e| DddError::Solver {
                    iteration,
                    timed_nodes,
                    message: e.to_string(),
                })?;
            let values = match outcome {
                SolveOutcome::Optimal { values, .. } => values,
                SolveOutcome::Infeasible => {
                    state.advance(Phase::Terminated);
                    return Err(DddError::Infeasible {
                        iteration,
                        timed_nodes,
                    });
                }
                SolveOutcome::Unbounded => {
                    state.advance(Phase::Terminated);
                    return Err(DddError::Solver {
                        iteration,
                        timed_nodes,
                        message: "relaxation is unbounded".into(),
                    });
                }
                SolveOutcome::TimedOut { best_bound } => {
                    if let Some(bound) = best_bound {
                        state.raise_lower_bound(bound);
                    }
                    state.advance(Phase::Terminated);
                    if budget_binds {
                        return Err(DddError::ResourceExceeded {
                            iteration,
                            reason: "time limit reached during a solve".into(),
                            bounds: state.bounds(),
                        });
                    }
                    return Err(DddError::SolverTimeout {
                        iteration,
                        timed_nodes,
                        bounds: state.bounds(),
                    });
                }
            };
            model
                .milp()
                .check_assignment(&values)
                .map_err(|e| DddError::Solver {
                    iteration,
                    timed_nodes,
                    message: e.to_string(),
                })?;
            let timed = model.interpret(instance, &values);
            let lower_bound = state.raise_lower_bound(timed.objective);

            state.advance(Phase::Check);
            let report = check(&timed, &network, instance, self.config.parallel).map_err(|e| {
                DddError::InternalInconsistency {
                    iteration,
                    detail: e.to_string(),
                }
            })?;
            let consistent = report.is_consistent();
            state.pending = report.repair_points();

            if !consistent && self.config.upper_bound_probe {
                if let Some(design) = self.probe(&state.discretization, started) {
                    if state.offer_incumbent(design) {
                        debug!(iteration, upper_bound = ?state.upper_bound, "improved upper bound");
                    }
                }
            }

            let record = IterationRecord {
                iteration,
                objective: timed.objective,
                lower_bound,
                upper_bound: if consistent {
                    Some(timed.objective)
                } else {
                    state.upper_bound
                },
                timed_nodes,
                timed_arcs: network.arc_count(),
                discretization_size: state.discretization.len(),
                repair_points: state.pending.len(),
                consistent,
            };
            info!(
                iteration,
                objective = record.objective,
                lower_bound,
                upper_bound = ?record.upper_bound,
                timed_nodes,
                repair_points = record.repair_points,
                "iteration finished"
            );
            observer(&record);
            state.history.push(record);

            if consistent {
                let solution = DesignSolution::from_report(instance, &report);
                state.advance(Phase::Terminated);
                return Ok(self.finish(state, solution, Termination::Optimal, started));
            }
            if state.gap_closed(self.config.optimality_gap) {
                if let Some(solution) = state.incumbent.take() {
                    info!(iteration, "upper bound meets lower bound");
                    state.advance(Phase::Terminated);
                    return Ok(self.finish(state, solution, Termination::GapClosed, started));
                }
            }
            if state.pending.is_empty() {
                state.advance(Phase::Terminated);
                return Err(DddError::InternalInconsistency {
                    iteration,
                    detail: "inconsistent solution without repair points".into(),
                });
            }

            state.advance(Phase::Refine);
            let added = state.refine()?;
            debug!(iteration, added, time_points = state.discretization.len(), "refined");
            if added == 0 {
                state.advance(Phase::Terminated);
                return Err(DddError::InternalInconsistency {
                    iteration,
                    detail: "repair points are already in the discretization".into(),
                });
            }
        }
    }

    fn check_budget(&self, state: &RefinementState, started: Instant) -> Result<(), DddError> {
        let iteration = state.iteration;
        if self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            warn!(iteration, "run cancelled");
            return Err(DddError::Cancelled {
                iteration,
                bounds: state.bounds(),
            });
        }
        if iteration >= self.config.max_iterations {
            warn!(iteration, bounds = %state.bounds(), "iteration limit reached");
            return Err(DddError::ResourceExceeded {
                iteration,
                reason: format!("iteration limit of {} reached", self.config.max_iterations),
                bounds: state.bounds(),
            });
        }
        if let Some(limit) = self.config.time_limit() {
            if started.elapsed() >= limit {
                warn!(iteration, bounds = %state.bounds(), "time limit reached");
                return Err(DddError::ResourceExceeded {
                    iteration,
                    reason: format!("time limit of {:.2?} reached", limit),
                    bounds: state.bounds(),
                });
            }
        }
        Ok(())
    }

    /// Per-solve limits and whether the run's remaining time is the binding one.
    fn solve_limits(&self, started: Instant) -> (SolveLimits, bool) {
        let remaining = self
            .config
            .time_limit()
            .map(|limit| limit.saturating_sub(started.elapsed()));
        match (self.config.solver_time_limit(), remaining) {
            (Some(solve), Some(rest)) if rest < solve => (
                SolveLimits {
                    time_limit: Some(rest),
                },
                true,
            ),
            (Some(solve), _) => (
                SolveLimits {
                    time_limit: Some(solve),
                },
                false,
            ),
            (None, rest) => (SolveLimits { time_limit: rest }, rest.is_some()),
        }
    }

    /// Solve the round-up network over `disc`; every solution it finds is
    /// realizable.
    fn probe(&self, disc: &Discretization, started: Instant) -> Option<DesignSolution> {
        let network: ExpandedNetwork = expand(self.instance, disc, ArrivalRounding::Up);
        let model = build_model(&network, self.instance, self.config.model_options());
        if !model.unroutable().is_empty() {
            return None;
        }
        let (limits, _) = self.solve_limits(started);
        let values = match self.solver.solve(model.milp(), &limits) {
            Ok(SolveOutcome::Optimal { values, .. }) => values,
            Ok(other) => {
                debug!(status = other.status(), "upper bound probe found no design");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "upper bound probe failed");
                return None;
            }
        };
        if let Err(e) = model.milp().check_assignment(&values) {
            warn!(error = %e, "upper bound probe got an unusable assignment");
            return None;
        }
        let timed = model.interpret(self.instance, &values);
        match check(&timed, &network, self.instance, self.config.parallel) {
            Ok(report) if report.is_consistent() => {
                Some(DesignSolution::from_report(self.instance, &report))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "upper bound probe produced an unreadable flow");
                None
            }
        }
    }

    fn finish(
        &self,
        state: RefinementState,
        solution: DesignSolution,
        termination: Termination,
        started: Instant,
    ) -> DddOutcome {
        let upper_bound = solution.total_cost;
        let lower_bound = state.lower_bound.unwrap_or(upper_bound);
        info!(
            iterations = state.iteration,
            objective = upper_bound,
            elapsed = ?started.elapsed(),
            termination = ?termination,
            "dynamic discretization discovery finished"
        );
        DddOutcome {
            solution,
            lower_bound,
            upper_bound,
            iterations: state.iteration,
            history: state.history,
            discretization: state.discretization,
            elapsed: started.elapsed(),
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use csnd_core::{Arc as ServiceArc, Commodity, NodeId};

    use crate::milp::{GoodLpSolver, MilpModel, SolverError};

    enum Script {
        Outcome(SolveOutcome),
        Fail,
    }

    /// Replays canned outcomes, one per solve.
    struct ScriptedSolver {
        script: Mutex<VecDeque<Script>>,
    }

    impl ScriptedSolver {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl MilpSolver for ScriptedSolver {
        fn name(&self) -> &str {
            "scripted"
        }

        fn solve(&self, _: &MilpModel, _: &SolveLimits) -> Result<SolveOutcome, SolverError> {
            match self.script.lock().unwrap().pop_front() {
                Some(Script::Outcome(outcome)) => Ok(outcome),
                Some(Script::Fail) => Err(SolverError::Backend("scripted failure".into())),
                None => panic!("solver called more often than scripted"),
            }
        }
    }

    fn n(v: usize) -> NodeId {
        NodeId::new(v)
    }

    fn single_arc(deadline: f64) -> Instance {
        Instance::new(
            2,
            vec![ServiceArc::new(n(1), n(2), 1.0, 10.0, 0.0, 5.0)],
            vec![Commodity::new(n(1), n(2), 1.0, 0.0, deadline)],
        )
        .unwrap()
    }

    fn slow_and_fast() -> Instance {
        Instance::new(
            2,
            vec![
                ServiceArc::new(n(1), n(2), 1.0, 10.0, 0.0, 8.0),
                ServiceArc::new(n(1), n(2), 5.0, 10.0, 0.0, 3.0),
            ],
            vec![Commodity::new(n(1), n(2), 1.0, 0.0, 5.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_solver_infeasible_ends_run() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(vec![Script::Outcome(SolveOutcome::Infeasible)]);
        let err = DddSolver::new(&instance, &solver).solve().unwrap_err();
        assert!(matches!(
            err,
            DddError::Infeasible {
                iteration: 1,
                timed_nodes: 6
            }
        ));
    }

    #[test]
    fn test_timeout_keeps_best_bound() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(vec![Script::Outcome(SolveOutcome::TimedOut {
            best_bound: Some(0.5),
        })]);
        let err = DddSolver::new(&instance, &solver).solve().unwrap_err();
        match err {
            DddError::SolverTimeout {
                iteration, bounds, ..
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(bounds.lower, Some(0.5));
                assert_eq!(bounds.upper, None);
            }
            other => panic!("expected a solver timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_failure_carries_context() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(vec![Script::Fail]);
        let err = DddSolver::new(&instance, &solver).solve().unwrap_err();
        match err {
            DddError::Solver {
                iteration,
                timed_nodes,
                message,
            } => {
                assert_eq!(iteration, 1);
                assert_eq!(timed_nodes, 6);
                assert!(message.contains("scripted failure"));
            }
            other => panic!("expected a solver error, got {other:?}"),
        }
    }

    #[test]
    fn test_short_assignment_is_a_solver_error() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(vec![Script::Outcome(SolveOutcome::Optimal {
            values: vec![1.0],
            objective: 1.0,
        })]);
        let err = DddSolver::new(&instance, &solver).solve().unwrap_err();
        match err {
            DddError::Solver {
                iteration, message, ..
            } => {
                assert_eq!(iteration, 1);
                assert!(message.contains("returned 1 values"), "{message}");
            }
            other => panic!("expected a solver error, got {other:?}"),
        }
    }

    #[test]
    fn test_cancelled_before_first_solve() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(Vec::new());
        let flag = CancelFlag::new();
        flag.cancel();
        let err = DddSolver::new(&instance, &solver)
            .with_cancel(flag)
            .solve()
            .unwrap_err();
        assert!(matches!(err, DddError::Cancelled { iteration: 0, .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let instance = single_arc(10.0);
        let solver = ScriptedSolver::new(Vec::new());
        let config = DddConfig {
            optimality_gap: -1.0,
            ..DddConfig::default()
        };
        let err = DddSolver::new(&instance, &solver)
            .with_config(config)
            .solve()
            .unwrap_err();
        assert!(matches!(err, DddError::Instance(_)));
    }

    #[test]
    fn test_unreachable_deadline_becomes_unroutable() {
        // travel time 5 against a deadline of 4: the first relaxation still
        // reaches (2, 4), the refined one cannot
        let instance = single_arc(4.0);
        let solver = GoodLpSolver::default();
        let err = DddSolver::new(&instance, &solver).solve().unwrap_err();
        assert!(matches!(err, DddError::Infeasible { iteration: 2, .. }));
    }

    #[test]
    fn test_iteration_cap_reports_lower_bound() {
        let instance = slow_and_fast();
        let solver = GoodLpSolver::default();
        let config = DddConfig {
            max_iterations: 1,
            ..DddConfig::default()
        };
        let err = DddSolver::new(&instance, &solver)
            .with_config(config)
            .solve()
            .unwrap_err();
        match err {
            DddError::ResourceExceeded {
                iteration, bounds, ..
            } => {
                assert_eq!(iteration, 1);
                assert!((bounds.lower.unwrap() - 1.0).abs() < 1e-6);
            }
            other => panic!("expected the iteration cap, got {other:?}"),
        }
    }

    #[test]
    fn test_probe_supplies_upper_bound() {
        let instance = slow_and_fast();
        let solver = GoodLpSolver::default();
        let config = DddConfig {
            upper_bound_probe: true,
            ..DddConfig::default()
        };
        let mut records = Vec::new();
        let outcome = DddSolver::new(&instance, &solver)
            .with_config(config)
            .solve_with(|r| records.push(r.clone()))
            .unwrap();

        assert!((outcome.objective() - 5.0).abs() < 1e-6);
        assert!(records.len() >= 2);
        assert!((records[0].upper_bound.unwrap() - 5.0).abs() < 1e-6);
        assert_eq!(records.len(), outcome.history.len());
    }
}
