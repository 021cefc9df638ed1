//! Validated problem data.
//!
//! An [`Instance`] is built once, checked on construction and never mutated
//! afterwards. Everything downstream (discretizations, expanded networks,
//! models) borrows it.

use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, Reversed};
use serde::{Deserialize, Serialize};

use crate::error::{CsndError, CsndResult, Record};
use crate::{ArcId, CommodityId, NodeId};

/// A directed service between two terminals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub tail: NodeId,
    pub head: NodeId,
    /// Cost per unit of quantity moved along the arc
    pub flow_cost: f64,
    /// Maximum quantity moved by one dispatch
    pub capacity: f64,
    /// Paid once if the arc is used at all
    pub fixed_cost: f64,
    pub travel_time: f64,
}

impl Arc {
    pub fn new(
        tail: NodeId,
        head: NodeId,
        flow_cost: f64,
        capacity: f64,
        fixed_cost: f64,
        travel_time: f64,
    ) -> Self {
        Self {
            tail,
            head,
            flow_cost,
            capacity,
            fixed_cost,
            travel_time,
        }
    }
}

/// A shipment that becomes available at `source` at `release` and must be at
/// `sink` no later than `deadline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub source: NodeId,
    pub sink: NodeId,
    pub quantity: f64,
    pub release: f64,
    pub deadline: f64,
}

impl Commodity {
    pub fn new(source: NodeId, sink: NodeId, quantity: f64, release: f64, deadline: f64) -> Self {
        Self {
            source,
            sink,
            quantity,
            release,
            deadline,
        }
    }
}

/// A validated continuous-time service network design instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    name: String,
    num_nodes: usize,
    arcs: Vec<Arc>,
    commodities: Vec<Commodity>,
}

impl Instance {
    /// Validate and assemble an instance.
    ///
    /// Fails with [`CsndError::MalformedInstance`] naming the first record
    /// and field that break the model's rules.
    pub fn new(num_nodes: usize, arcs: Vec<Arc>, commodities: Vec<Commodity>) -> CsndResult<Self> {
        for (i, arc) in arcs.iter().enumerate() {
            validate_arc(num_nodes, i, arc)?;
        }
        for (k, commodity) in commodities.iter().enumerate() {
            validate_commodity(num_nodes, k, commodity)?;
        }
        Ok(Self {
            name: String::new(),
            num_nodes,
            arcs,
            commodities,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        (1..=self.num_nodes).map(NodeId::new)
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn arc(&self, id: ArcId) -> &Arc {
        &self.arcs[id.value()]
    }

    pub fn arc_ids(&self) -> impl Iterator<Item = ArcId> {
        (0..self.arcs.len()).map(ArcId::new)
    }

    pub fn commodities(&self) -> &[Commodity] {
        &self.commodities
    }

    pub fn commodity(&self, id: CommodityId) -> &Commodity {
        &self.commodities[id.value()]
    }

    pub fn commodity_ids(&self) -> impl Iterator<Item = CommodityId> {
        (0..self.commodities.len()).map(CommodityId::new)
    }

    /// Latest deadline over all commodities, 0 without commodities.
    pub fn horizon(&self) -> f64 {
        self.commodities
            .iter()
            .map(|c| c.deadline)
            .fold(0.0, f64::max)
    }

    /// The physical network weighted by travel time.
    ///
    /// Node `i` of the graph is `NodeId::from_index(i)`; parallel arcs are kept.
    pub fn travel_graph(&self) -> DiGraph<NodeId, f64> {
        let mut graph = DiGraph::with_capacity(self.num_nodes, self.arcs.len());
        for node in self.nodes() {
            graph.add_node(node);
        }
        for arc in &self.arcs {
            graph.add_edge(
                NodeIndex::new(arc.tail.index()),
                NodeIndex::new(arc.head.index()),
                arc.travel_time,
            );
        }
        graph
    }

    /// Shortest travel time from `origin` to every node (`None` if unreachable).
    pub fn travel_times_from(&self, origin: NodeId) -> Vec<Option<f64>> {
        let graph = self.travel_graph();
        let dist = dijkstra(&graph, NodeIndex::new(origin.index()), None, |e| {
            *e.weight()
        });
        (0..self.num_nodes)
            .map(|i| dist.get(&NodeIndex::new(i)).copied())
            .collect()
    }

    /// Shortest travel time from every node to `destination`.
    pub fn travel_times_to(&self, destination: NodeId) -> Vec<Option<f64>> {
        let graph = self.travel_graph();
        let dist = dijkstra(
            Reversed(&graph),
            NodeIndex::new(destination.index()),
            None,
            |e| *e.weight(),
        );
        (0..self.num_nodes)
            .map(|i| dist.get(&NodeIndex::new(i)).copied())
            .collect()
    }
}

fn validate_node(num_nodes: usize, record: Record, field: &'static str, node: NodeId) -> CsndResult<()> {
    if node.value() == 0 || node.value() > num_nodes {
        return Err(CsndError::malformed(
            record,
            field,
            format!("node {} outside 1..={num_nodes}", node.value()),
        ));
    }
    Ok(())
}

fn require(ok: bool, record: Record, field: &'static str, reason: &str) -> CsndResult<()> {
    if ok {
        Ok(())
    } else {
        Err(CsndError::malformed(record, field, reason))
    }
}

fn validate_arc(num_nodes: usize, i: usize, arc: &Arc) -> CsndResult<()> {
    let record = Record::Arc(i);
    validate_node(num_nodes, record, "tail", arc.tail)?;
    validate_node(num_nodes, record, "head", arc.head)?;
    require(arc.tail != arc.head, record, "head", "self-loop (tail equals head)")?;
    require(
        arc.flow_cost.is_finite() && arc.flow_cost >= 0.0,
        record,
        "flow_cost",
        "must be finite and >= 0",
    )?;
    require(
        arc.capacity.is_finite() && arc.capacity > 0.0,
        record,
        "capacity",
        "must be finite and > 0",
    )?;
    require(
        arc.fixed_cost.is_finite() && arc.fixed_cost >= 0.0,
        record,
        "fixed_cost",
        "must be finite and >= 0",
    )?;
    require(
        arc.travel_time.is_finite() && arc.travel_time > 0.0,
        record,
        "travel_time",
        "must be finite and > 0",
    )
}

fn validate_commodity(num_nodes: usize, k: usize, commodity: &Commodity) -> CsndResult<()> {
    let record = Record::Commodity(k);
    validate_node(num_nodes, record, "source", commodity.source)?;
    validate_node(num_nodes, record, "sink", commodity.sink)?;
    require(
        commodity.source != commodity.sink,
        record,
        "sink",
        "source and sink coincide",
    )?;
    require(
        commodity.quantity.is_finite() && commodity.quantity > 0.0,
        record,
        "quantity",
        "must be finite and > 0",
    )?;
    require(
        commodity.release.is_finite() && commodity.release >= 0.0,
        record,
        "release",
        "must be finite and >= 0",
    )?;
    require(
        commodity.deadline.is_finite() && commodity.deadline > commodity.release,
        record,
        "deadline",
        "must be finite and later than the release time",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: usize) -> NodeId {
        NodeId::new(v)
    }

    fn line() -> Vec<Arc> {
        vec![
            Arc::new(n(1), n(2), 1.0, 10.0, 0.0, 2.0),
            Arc::new(n(2), n(3), 1.0, 10.0, 0.0, 3.0),
            Arc::new(n(1), n(3), 4.0, 10.0, 0.0, 7.0),
        ]
    }

    #[test]
    fn test_valid_instance() {
        let inst = Instance::new(3, line(), vec![Commodity::new(n(1), n(3), 2.0, 1.0, 9.0)])
            .unwrap()
            .with_name("line");
        assert_eq!(inst.name(), "line");
        assert_eq!(inst.arcs().len(), 3);
        assert_eq!(inst.horizon(), 9.0);
        assert_eq!(inst.nodes().count(), 3);
    }

    #[test]
    fn test_rejects_release_after_deadline() {
        let err = Instance::new(3, line(), vec![Commodity::new(n(1), n(3), 1.0, 5.0, 5.0)])
            .unwrap_err();
        match err {
            CsndError::MalformedInstance { record, field, .. } => {
                assert_eq!(record, Record::Commodity(0));
                assert_eq!(field, "deadline");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_unknown_node() {
        let arcs = vec![Arc::new(n(1), n(4), 1.0, 1.0, 0.0, 1.0)];
        let err = Instance::new(3, arcs, vec![]).unwrap_err();
        assert!(matches!(
            err,
            CsndError::MalformedInstance {
                record: Record::Arc(0),
                field: "head",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_non_positive_values() {
        let zero_tt = vec![Arc::new(n(1), n(2), 1.0, 1.0, 0.0, 0.0)];
        assert!(Instance::new(2, zero_tt, vec![]).is_err());

        let zero_cap = vec![Arc::new(n(1), n(2), 1.0, 0.0, 0.0, 1.0)];
        assert!(Instance::new(2, zero_cap, vec![]).is_err());

        let loop_arc = vec![Arc::new(n(2), n(2), 1.0, 1.0, 0.0, 1.0)];
        assert!(Instance::new(2, loop_arc, vec![]).is_err());

        let zero_qty = vec![Commodity::new(n(1), n(2), 0.0, 0.0, 1.0)];
        assert!(Instance::new(2, vec![], zero_qty).is_err());
    }

    #[test]
    fn test_travel_times() {
        let inst = Instance::new(3, line(), vec![]).unwrap();
        let from = inst.travel_times_from(n(1));
        assert_eq!(from, vec![Some(0.0), Some(2.0), Some(5.0)]);

        let to = inst.travel_times_to(n(3));
        assert_eq!(to, vec![Some(5.0), Some(3.0), Some(0.0)]);

        let from_sink = inst.travel_times_from(n(3));
        assert_eq!(from_sink, vec![None, None, Some(0.0)]);
    }
}
