//! # csnd-core: Continuous-Time Service Network Design Core
//!
//! Data structures shared by every csnd crate: the immutable problem
//! [`Instance`], per-node time point sets ([`Discretization`]) and the
//! partially time-expanded network built from them ([`ExpandedNetwork`]).
//!
//! ## Design Philosophy
//!
//! The physical network is a directed multigraph:
//! - **Nodes**: terminals, identified by 1-based [`NodeId`]s
//! - **Arcs**: services with a flow cost, a capacity, a fixed cost and a
//!   travel time, identified by their position ([`ArcId`])
//! - **Commodities**: shipments with a release time and a deadline
//!   ([`CommodityId`])
//!
//! Time is continuous. A [`Discretization`] picks finitely many time points
//! per node and [`expand`] turns the instance into a petgraph `DiGraph` of
//! timed nodes, holdover arcs and movement arcs. The expansion is a pure
//! function of its inputs so it can be rebuilt after every refinement.
//!
//! ## Quick Start
//!
//! ```rust
//! use csnd_core::*;
//!
//! let instance = Instance::new(
//!     2,
//!     vec![Arc::new(NodeId::new(1), NodeId::new(2), 1.0, 10.0, 0.0, 5.0)],
//!     vec![Commodity::new(NodeId::new(1), NodeId::new(2), 1.0, 0.0, 10.0)],
//! )
//! .unwrap();
//!
//! let disc = Discretization::seeded(&instance);
//! assert_eq!(disc.points(NodeId::new(1)), &[0.0, 5.0, 10.0]);
//!
//! let network = expand(&instance, &disc, ArrivalRounding::Down);
//! assert_eq!(network.node_count(), 6);
//! ```
//!
//! ## Modules
//!
//! - [`instance`] - Validated problem data and travel-time distances
//! - [`discretization`] - Monotone per-node time point sets
//! - [`expansion`] - Partially time-expanded networks
//! - [`error`] - [`CsndError`] and [`CsndResult`]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod discretization;
pub mod error;
pub mod expansion;
pub mod instance;

pub use discretization::{time_eq, Discretization, TIME_EPSILON};
pub use error::{CsndError, CsndResult, Record};
pub use expansion::{expand, ArrivalRounding, ExpandedNetwork, TimedArc, TimedNode};
pub use instance::{Arc, Commodity, Instance};
pub use petgraph::graph::{EdgeIndex, NodeIndex};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArcId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommodityId(usize);

impl NodeId {
    /// Node ids are 1-based, as in the instance files.
    #[inline]
    pub fn new(value: usize) -> Self {
        NodeId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
    /// 0-based position, for indexing per-node tables.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 - 1
    }
    #[inline]
    pub fn from_index(index: usize) -> Self {
        NodeId(index + 1)
    }
}

impl ArcId {
    #[inline]
    pub fn new(value: usize) -> Self {
        ArcId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl CommodityId {
    #[inline]
    pub fn new(value: usize) -> Self {
        CommodityId(value)
    }
    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ArcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a{}", self.0 + 1)
    }
}

impl fmt::Display for CommodityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}", self.0 + 1)
    }
}
