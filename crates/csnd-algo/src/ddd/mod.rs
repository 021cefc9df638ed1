//! Dynamic discretization discovery.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DYNAMIC DISCRETIZATION DISCOVERY                                        │
//! │  ────────────────────────────────                                        │
//! │                                                                          │
//! │  Init     {0, H} per node, releases, deadlines and travel bounds         │
//! │  Expand   timed network, arrivals rounded DOWN (a relaxation)            │
//! │  Solve    min flow + fixed cost                      ──► lower bound     │
//! │  Check    replay in continuous time                                      │
//! │             consistent   ──► optimal, stop                               │
//! │             inconsistent ──► repair points (node, real arrival)          │
//! │  Refine   insert the repair points, back to Expand                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refinement only adds points, so every relaxation is at least as tight as
//! the one before and the lower bound never decreases. A run ends with an
//! optimal design or one of the [`DddError`] variants; runs stopped by a cap
//! or a cancel still report the best bounds found.

mod config;
mod engine;
mod error;
mod state;

pub use config::DddConfig;
pub use engine::{CancelFlag, DddOutcome, DddSolver, Termination};
pub use error::{Bounds, DddError};
pub use state::{IterationRecord, Phase, RefinementState};
