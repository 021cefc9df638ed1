//! # csnd-algo: Service Network Design by Dynamic Discretization Discovery
//!
//! Solves the continuous-time service network design problem: choose which
//! arcs to open and how to route every commodity so that each one leaves its
//! source no earlier than its release time, reaches its sink no later than
//! its deadline, and total flow plus fixed cost is minimal.
//!
//! ## Dynamic Discretization Discovery
//!
//! [`DddSolver`] never builds the fully time-expanded network. It starts from
//! a handful of time points per node, solves a relaxation whose arcs may
//! travel faster than physically possible, and refines only where the
//! relaxation cheated:
//!
//! ```text
//!   Init ──► Expand ──► Solve ──► Check ──► Terminated (consistent)
//!              ▲                    │
//!              └────── Refine ◄─────┘ (repair points)
//! ```
//!
//! Every relaxed optimum is a lower bound. A consistent one is realizable in
//! continuous time and therefore optimal.
//!
//! ## Full discretization
//!
//! [`solve_full_discretization`] solves a single model over a regular grid.
//! Its solutions are always realizable, but their quality depends on the
//! grid step.
//!
//! ## Example
//!
//! ```ignore
//! use csnd_algo::{DddSolver, GoodLpSolver};
//!
//! let instance = csnd_io::read_instance("instance.dow")?;
//! let solver = GoodLpSolver::default();
//! let outcome = DddSolver::new(&instance, &solver).solve()?;
//! println!("{}", outcome.solution.summary());
//! ```
//!
//! ## Modules
//!
//! - [`milp`] - Solver-neutral MILP models and the `good_lp` backend
//! - [`consistency`] - Continuous-time replay of timed solutions
//! - [`ddd`] - The refinement loop
//! - [`baseline`] - Single solve on a regular grid
//! - [`solution`] - Timed and realized solutions

pub mod baseline;
pub mod consistency;
pub mod ddd;
pub mod milp;
pub mod solution;

pub use baseline::{solve_full_discretization, BaselineOptions, BaselineOutcome};
pub use consistency::{check, CheckError, ConsistencyReport, PathReport, PathStatus, RepairPoint};
pub use ddd::{
    Bounds, CancelFlag, DddConfig, DddError, DddOutcome, DddSolver, IterationRecord, Phase,
    RefinementState, Termination,
};
pub use milp::{GoodLpSolver, MilpBackend, MilpSolver, SolveLimits, SolveOutcome, SolverError};
pub use solution::{
    CommoditySchedule, DesignSolution, Dispatch, Leg, ScheduledPath, TimedSolution,
};
