//! Service network design as a mixed-integer program.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │  ExpandedNetwork ──► build_model ──► MilpModel ──► MilpSolver        │
//! │                          │                              │            │
//! │                       SndModel ◄──── values ◄──── SolveOutcome       │
//! │                          │                                           │
//! │                          ▼                                           │
//! │                    TimedSolution                                     │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`MilpModel`] is independent of any solver library. [`MilpSolver`] is the
//! seam between model construction and optimization: the refinement loop
//! only talks to the trait, so tests can drive it with scripted solvers while
//! [`GoodLpSolver`] does the real work through `good_lp`.

mod backend;
mod builder;
mod model;

pub use backend::{GoodLpSolver, MilpBackend};
pub use builder::{build_model, ModelOptions, SndModel, FLOW_EPSILON};
pub use model::{
    LinearConstraint, MilpModel, MilpSolver, Sense, SolveLimits, SolveOutcome, SolverError,
    VarDef, VarIndex, VarKind,
};
