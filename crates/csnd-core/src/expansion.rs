//! Partially time-expanded networks.
//!
//! Given an instance and a discretization, [`expand`] creates one timed node
//! per (node, time point), a holdover arc between consecutive points of each
//! node, and a movement copy of every arc for every departure point of its
//! tail. Where a movement lands depends on [`ArrivalRounding`]:
//!
//! ```text
//!   tail u:  ──●───────────●──────────────●──      t_u + travel_time
//!              t_u                                         │
//!   head v:  ──●──────●─────────────●──────────●──          ▼
//!                     ▲ Down: latest point <= arrival
//!                                   ▲ Up: earliest point >= arrival
//! ```
//!
//! `Down` lets a commodity arrive no later than it physically could, so every
//! continuous-time schedule maps onto the network and the optimum is a lower
//! bound. `Up` only offers dispatches that can be carried out as modeled, so
//! its solutions are feasible in continuous time.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::discretization::{Discretization, TIME_EPSILON};
use crate::instance::Instance;
use crate::{ArcId, CommodityId, NodeId};

/// How a movement arc's real arrival is mapped onto the head's time points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrivalRounding {
    /// Latest point at or before the arrival (relaxation).
    #[default]
    Down,
    /// Earliest point at or after the arrival; arcs with no such point are
    /// left out.
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedNode {
    pub node: NodeId,
    pub time: f64,
    /// Position of `time` in the node's point list.
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimedArc {
    Movement {
        arc: ArcId,
        departure: f64,
        /// Real arrival, `departure + travel_time`, before rounding.
        arrival: f64,
    },
    /// Waiting at a node. Free and uncapacitated.
    Holdover { node: NodeId },
}

impl TimedArc {
    pub fn arc(&self) -> Option<ArcId> {
        match self {
            TimedArc::Movement { arc, .. } => Some(*arc),
            TimedArc::Holdover { .. } => None,
        }
    }

    pub fn is_holdover(&self) -> bool {
        matches!(self, TimedArc::Holdover { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ExpandedNetwork {
    graph: DiGraph<TimedNode, TimedArc>,
    rounding: ArrivalRounding,
    by_node: Vec<Vec<NodeIndex>>,
    by_arc: Vec<Vec<EdgeIndex>>,
    commodity_ends: Vec<(Option<NodeIndex>, Option<NodeIndex>)>,
}

impl PartialEq for ExpandedNetwork {
    fn eq(&self, other: &Self) -> bool {
        let nodes_eq = self
            .graph
            .raw_nodes()
            .iter()
            .map(|n| &n.weight)
            .eq(other.graph.raw_nodes().iter().map(|n| &n.weight));
        let edges_eq = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| (e.source(), e.target(), &e.weight))
            .eq(other
                .graph
                .raw_edges()
                .iter()
                .map(|e| (e.source(), e.target(), &e.weight)));
        self.rounding == other.rounding && nodes_eq && edges_eq
    }
}

impl ExpandedNetwork {
    pub fn graph(&self) -> &DiGraph<TimedNode, TimedArc> {
        &self.graph
    }

    pub fn rounding(&self) -> ArrivalRounding {
        self.rounding
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn arc_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn timed_node(&self, index: NodeIndex) -> &TimedNode {
        &self.graph[index]
    }

    pub fn timed_arc(&self, index: EdgeIndex) -> &TimedArc {
        &self.graph[index]
    }

    /// Timed copies of `node`, in time order.
    pub fn timed_nodes_of(&self, node: NodeId) -> &[NodeIndex] {
        &self.by_node[node.index()]
    }

    /// Movement copies of `arc`, in departure order.
    pub fn movements_of(&self, arc: ArcId) -> &[EdgeIndex] {
        &self.by_arc[arc.value()]
    }

    pub fn movement_arcs(&self) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.by_arc.iter().flatten().copied()
    }

    /// Timed node where `commodity` enters: earliest point at or after its
    /// release at its source.
    pub fn origin(&self, commodity: CommodityId) -> Option<NodeIndex> {
        self.commodity_ends[commodity.value()].0
    }

    /// Timed node where `commodity` must leave: latest point at or before its
    /// deadline at its sink.
    pub fn destination(&self, commodity: CommodityId) -> Option<NodeIndex> {
        self.commodity_ends[commodity.value()].1
    }

    /// Difference between the real and the modeled arrival of a movement arc.
    ///
    /// Positive when the network lets the commodity arrive earlier than
    /// physically possible, negative when it has to wait. Zero for holdovers.
    pub fn arrival_gap(&self, edge: EdgeIndex) -> f64 {
        match self.graph[edge] {
            TimedArc::Movement { arrival, .. } => match self.graph.edge_endpoints(edge) {
                Some((_, head)) => arrival - self.graph[head].time,
                None => 0.0,
            },
            TimedArc::Holdover { .. } => 0.0,
        }
    }
}

struct MovementCopy {
    from_slot: usize,
    to_slot: usize,
    departure: f64,
    arrival: f64,
}

fn movement_copies(
    instance: &Instance,
    disc: &Discretization,
    rounding: ArrivalRounding,
    arc: ArcId,
) -> Vec<MovementCopy> {
    let spec = instance.arc(arc);
    let horizon = instance.horizon();
    disc.points(spec.tail)
        .iter()
        .enumerate()
        .filter(|&(_, &t)| rounding == ArrivalRounding::Up || t <= horizon + TIME_EPSILON)
        .filter_map(|(from_slot, &departure)| {
            let arrival = departure + spec.travel_time;
            let to_slot = match rounding {
                ArrivalRounding::Down => disc.latest_at_or_before(spec.head, arrival),
                ArrivalRounding::Up => disc.earliest_at_or_after(spec.head, arrival),
            }?;
            Some(MovementCopy {
                from_slot,
                to_slot,
                departure,
                arrival,
            })
        })
        .collect()
}

/// Build the timed network for `disc`.
///
/// Pure and deterministic: timed nodes are added in (node, time) order, then
/// holdovers, then movement arcs in (arc, departure) order.
pub fn expand(
    instance: &Instance,
    disc: &Discretization,
    rounding: ArrivalRounding,
) -> ExpandedNetwork {
    let mut graph = DiGraph::with_capacity(disc.len(), disc.len());
    let mut by_node = Vec::with_capacity(instance.num_nodes());

    for node in instance.nodes() {
        let indices: Vec<NodeIndex> = disc
            .points(node)
            .iter()
            .enumerate()
            .map(|(slot, &time)| graph.add_node(TimedNode { node, time, slot }))
            .collect();
        by_node.push(indices);
    }

    for node in instance.nodes() {
        for pair in by_node[node.index()].windows(2) {
            graph.add_edge(pair[0], pair[1], TimedArc::Holdover { node });
        }
    }

    #[cfg(feature = "parallel")]
    let copies: Vec<Vec<MovementCopy>> = (0..instance.arcs().len())
        .into_par_iter()
        .map(|i| movement_copies(instance, disc, rounding, ArcId::new(i)))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let copies: Vec<Vec<MovementCopy>> = instance
        .arc_ids()
        .map(|arc| movement_copies(instance, disc, rounding, arc))
        .collect();

    let mut by_arc = Vec::with_capacity(copies.len());
    for (i, arc_copies) in copies.into_iter().enumerate() {
        let arc = ArcId::new(i);
        let spec = instance.arc(arc);
        let edges = arc_copies
            .into_iter()
            .map(|c| {
                graph.add_edge(
                    by_node[spec.tail.index()][c.from_slot],
                    by_node[spec.head.index()][c.to_slot],
                    TimedArc::Movement {
                        arc,
                        departure: c.departure,
                        arrival: c.arrival,
                    },
                )
            })
            .collect();
        by_arc.push(edges);
    }

    let commodity_ends = instance
        .commodities()
        .iter()
        .map(|c| {
            let origin = disc
                .earliest_at_or_after(c.source, c.release)
                .map(|slot| by_node[c.source.index()][slot]);
            let destination = disc
                .latest_at_or_before(c.sink, c.deadline)
                .map(|slot| by_node[c.sink.index()][slot]);
            (origin, destination)
        })
        .collect();

    ExpandedNetwork {
        graph,
        rounding,
        by_node,
        by_arc,
        commodity_ends,
    }
}
