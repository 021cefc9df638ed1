//! Solver-neutral mixed-integer linear programs.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Index of a variable in a [`MilpModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(usize);

impl VarIndex {
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Continuous,
    Binary,
    /// Whole numbers within the variable's bounds
    Integer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
    /// Objective coefficient (minimized)
    pub cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sense::Le => write!(f, "<="),
            Sense::Eq => write!(f, "="),
            Sense::Ge => write!(f, ">="),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(VarIndex, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(v, c)| c * values[v.0]).sum()
    }

    /// Whether `values` satisfy the constraint within `tol`.
    pub fn holds(&self, values: &[f64], tol: f64) -> bool {
        let lhs = self.lhs(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + tol,
            Sense::Eq => (lhs - self.rhs).abs() <= tol,
            Sense::Ge => lhs >= self.rhs - tol,
        }
    }
}

/// A minimization problem over bounded continuous, binary and integer variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilpModel {
    vars: Vec<VarDef>,
    constraints: Vec<LinearConstraint>,
}

impl MilpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_var(&mut self, def: VarDef) -> VarIndex {
        self.vars.push(def);
        VarIndex(self.vars.len() - 1)
    }

    pub fn continuous(&mut self, lower: f64, upper: f64, cost: f64) -> VarIndex {
        self.add_var(VarDef {
            kind: VarKind::Continuous,
            lower,
            upper,
            cost,
        })
    }

    pub fn binary(&mut self, cost: f64) -> VarIndex {
        self.add_var(VarDef {
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
            cost,
        })
    }

    pub fn integer(&mut self, lower: f64, upper: f64, cost: f64) -> VarIndex {
        self.add_var(VarDef {
            kind: VarKind::Integer,
            lower,
            upper,
            cost,
        })
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarIndex, f64)>,
        sense: Sense,
        rhs: f64,
    ) {
        self.constraints.push(LinearConstraint {
            name: name.into(),
            terms,
            sense,
            rhs,
        });
    }

    pub fn vars(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_binaries(&self) -> usize {
        self.vars
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .count()
    }

    pub fn num_integers(&self) -> usize {
        self.vars
            .iter()
            .filter(|v| v.kind == VarKind::Integer)
            .count()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Reject an assignment that does not cover exactly this model's variables.
    pub fn check_assignment(&self, values: &[f64]) -> Result<(), SolverError> {
        if values.len() == self.vars.len() {
            Ok(())
        } else {
            Err(SolverError::Assignment {
                expected: self.vars.len(),
                found: values.len(),
            })
        }
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.vars
            .iter()
            .zip(values)
            .map(|(def, value)| def.cost * value)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveLimits {
    /// Wall-clock budget for one solve
    pub time_limit: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SolveOutcome {
    Optimal { values: Vec<f64>, objective: f64 },
    Infeasible,
    Unbounded,
    /// The limit expired first; `best_bound` is the solver's dual bound if
    /// it reported one.
    TimedOut { best_bound: Option<f64> },
}

impl SolveOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            SolveOutcome::Optimal { .. } => "optimal",
            SolveOutcome::Infeasible => "infeasible",
            SolveOutcome::Unbounded => "unbounded",
            SolveOutcome::TimedOut { .. } => "timeout",
        }
    }
}

/// Errors raised by a solver backend itself.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Unknown backend name
    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    /// Backend reported a failure other than infeasibility or unboundedness
    #[error("Solver backend failed: {0}")]
    Backend(String),

    /// Worker thread could not be started or died
    #[error("Solver worker failed: {0}")]
    Worker(String),

    /// Assignment length differs from the model's variable count
    #[error("Solver returned {found} values for {expected} variables")]
    Assignment { expected: usize, found: usize },
}

/// The boundary between model construction and the optimization engine.
///
/// Implementations must be usable from several threads; the refinement loop
/// itself only calls [`MilpSolver::solve`] sequentially.
pub trait MilpSolver: Send + Sync {
    fn name(&self) -> &str;

    fn solve(&self, model: &MilpModel, limits: &SolveLimits) -> Result<SolveOutcome, SolverError>;
}
