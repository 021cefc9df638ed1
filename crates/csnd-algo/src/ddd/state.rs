use csnd_core::{CsndResult, Discretization};
use serde::Serialize;

use super::error::Bounds;
use crate::consistency::RepairPoint;
use crate::solution::DesignSolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Expand,
    Solve,
    Check,
    Refine,
    Terminated,
}

impl Phase {
    /// Whether the loop may move from `self` to `next`.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Init, Expand)
                | (Expand, Solve)
                | (Solve, Check)
                | (Check, Refine)
                | (Refine, Expand)
                | (Init | Expand | Solve | Check | Refine, Terminated)
        )
    }
}

/// Summary of one Expand-Solve-Check round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Optimum of the relaxed model
    pub objective: f64,
    pub lower_bound: f64,
    pub upper_bound: Option<f64>,
    pub timed_nodes: usize,
    pub timed_arcs: usize,
    /// Time points before refinement
    pub discretization_size: usize,
    pub repair_points: usize,
    pub consistent: bool,
}

/// Everything the refinement loop carries between iterations.
#[derive(Debug, Clone)]
pub struct RefinementState {
    pub discretization: Discretization,
    /// Number of the current (or last started) iteration, 1-based
    pub iteration: usize,
    pub phase: Phase,
    pub lower_bound: Option<f64>,
    pub upper_bound: Option<f64>,
    /// Best continuous-feasible design found so far
    pub incumbent: Option<DesignSolution>,
    /// Repair points waiting for the next refinement
    pub pending: Vec<RepairPoint>,
    pub history: Vec<IterationRecord>,
}

impl RefinementState {
    pub fn new(discretization: Discretization) -> Self {
        Self {
            discretization,
            iteration: 0,
            phase: Phase::Init,
            lower_bound: None,
            upper_bound: None,
            incumbent: None,
            pending: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            lower: self.lower_bound,
            upper: self.upper_bound,
        }
    }

    /// `lower = max(lower, value)`; returns the new lower bound.
    pub fn raise_lower_bound(&mut self, value: f64) -> f64 {
        let lower = self.lower_bound.map_or(value, |lb| lb.max(value));
        self.lower_bound = Some(lower);
        lower
    }

    /// Keep `solution` if it beats the incumbent.
    pub fn offer_incumbent(&mut self, solution: DesignSolution) -> bool {
        if self
            .upper_bound
            .is_some_and(|ub| ub <= solution.total_cost)
        {
            return false;
        }
        self.upper_bound = Some(solution.total_cost);
        self.incumbent = Some(solution);
        true
    }

    pub fn gap_closed(&self, tolerance: f64) -> bool {
        self.bounds().gap().is_some_and(|gap| gap <= tolerance)
    }

    /// Insert all pending repair points; returns how many were new.
    pub fn refine(&mut self) -> CsndResult<usize> {
        let points: Vec<_> = self.pending.iter().map(|p| (p.node, p.time)).collect();
        let added = self.discretization.apply(&points)?;
        self.pending.clear();
        Ok(added)
    }
}
