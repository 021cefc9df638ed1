//! # csnd-io: Instance files
//!
//! Reads and writes the whitespace-separated instance format used by the
//! service network design benchmark sets:
//!
//! ```text
//! <title line, ignored>
//! NUM_NODES NUM_ARCS NUM_COMMODITIES
//! TAIL HEAD FLOW_COST CAPACITY FIXED_COST TRAVEL_TIME      (NUM_ARCS lines)
//! SOURCE SINK QUANTITY RELEASE_TIME DEADLINE_TIME          (NUM_COMMODITIES lines)
//! ```
//!
//! Nodes are 1-indexed. Every problem with the content is reported as
//! [`CsndError::MalformedInstance`](csnd_core::CsndError::MalformedInstance)
//! carrying the 1-based line number.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use csnd_io::read_instance;
//!
//! fn main() -> csnd_core::CsndResult<()> {
//!     let instance = read_instance("instances/c33.dow")?;
//!     println!("{} arcs, {} commodities", instance.arcs().len(), instance.commodities().len());
//!     Ok(())
//! }
//! ```

pub mod dow;

pub use dow::{format_instance, parse_instance, read_instance, write_instance, DEFAULT_TITLE};
