//! Per-node time point sets.
//!
//! A [`Discretization`] maps every node to a strictly increasing list of
//! non-negative time points. Sets only grow: refinement inserts points, it
//! never removes them. Two points closer than [`TIME_EPSILON`] are the same
//! point.

use serde::Serialize;

use crate::error::{CsndError, CsndResult};
use crate::instance::Instance;
use crate::NodeId;

/// Tolerance used for every comparison between time values.
pub const TIME_EPSILON: f64 = 1e-9;

#[inline]
pub fn time_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIME_EPSILON
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discretization {
    points: Vec<Vec<f64>>,
}

impl Discretization {
    /// An empty discretization (no points at any node).
    pub fn empty(num_nodes: usize) -> Self {
        Self {
            points: vec![Vec::new(); num_nodes],
        }
    }

    /// `{0, horizon}` at every node plus each commodity's release time at its
    /// source and deadline at its sink.
    pub fn initial(instance: &Instance) -> Self {
        let mut disc = Self::empty(instance.num_nodes());
        let horizon = instance.horizon();
        for node in instance.nodes() {
            disc.insert(node, 0.0);
            disc.insert(node, horizon);
        }
        for commodity in instance.commodities() {
            disc.insert(commodity.source, commodity.release);
            disc.insert(commodity.sink, commodity.deadline);
        }
        disc
    }

    /// [`Discretization::initial`] plus the earliest arrival and latest
    /// departure of every commodity at every node on a route that can meet
    /// its deadline.
    pub fn seeded(instance: &Instance) -> Self {
        let mut disc = Self::initial(instance);
        for commodity in instance.commodities() {
            let from_source = instance.travel_times_from(commodity.source);
            let to_sink = instance.travel_times_to(commodity.sink);
            for node in instance.nodes() {
                let (Some(out), Some(back)) = (from_source[node.index()], to_sink[node.index()])
                else {
                    continue;
                };
                let earliest = commodity.release + out;
                let latest = commodity.deadline - back;
                if earliest <= latest + TIME_EPSILON {
                    disc.insert(node, earliest);
                    disc.insert(node, latest);
                }
            }
        }
        disc
    }

    /// The grid `{0, delta, 2*delta, ..}` up to the first multiple of `delta`
    /// at or after the horizon, at every node.
    pub fn regular(instance: &Instance, delta: f64) -> CsndResult<Self> {
        if !(delta.is_finite() && delta > 0.0) {
            return Err(CsndError::Config(format!(
                "time step must be a positive number, got {delta}"
            )));
        }
        let steps = (instance.horizon() / delta - TIME_EPSILON).ceil().max(0.0) as usize;
        let grid: Vec<f64> = (0..=steps).map(|i| i as f64 * delta).collect();
        Ok(Self {
            points: vec![grid; instance.num_nodes()],
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self, node: NodeId) -> &[f64] {
        &self.points[node.index()]
    }

    /// Total number of time points over all nodes.
    pub fn len(&self) -> usize {
        self.points.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, node: NodeId, time: f64) -> bool {
        let pts = self.points(node);
        let idx = pts.partition_point(|&p| p < time - TIME_EPSILON);
        idx < pts.len() && time_eq(pts[idx], time)
    }

    /// Insert `time` at `node`; returns false when the point already exists.
    pub fn insert(&mut self, node: NodeId, time: f64) -> bool {
        let pts = &mut self.points[node.index()];
        let idx = pts.partition_point(|&p| p < time - TIME_EPSILON);
        if idx < pts.len() && time_eq(pts[idx], time) {
            return false;
        }
        pts.insert(idx, time);
        true
    }

    /// Insert a batch of points, all or nothing.
    ///
    /// Every point is validated before the first insertion; returns how many
    /// points were new.
    pub fn apply(&mut self, repairs: &[(NodeId, f64)]) -> CsndResult<usize> {
        for &(node, time) in repairs {
            if node.value() == 0 || node.index() >= self.points.len() {
                return Err(CsndError::Discretization(format!(
                    "node {node} is not part of the network"
                )));
            }
            if !(time.is_finite() && time >= 0.0) {
                return Err(CsndError::Discretization(format!(
                    "time point {time} at node {node} is not a non-negative number"
                )));
            }
        }
        Ok(repairs
            .iter()
            .filter(|&&(node, time)| self.insert(node, time))
            .count())
    }

    /// Slot of the latest point at or before `time`.
    pub fn latest_at_or_before(&self, node: NodeId, time: f64) -> Option<usize> {
        let idx = self
            .points(node)
            .partition_point(|&p| p <= time + TIME_EPSILON);
        idx.checked_sub(1)
    }

    /// Slot of the earliest point at or after `time`.
    pub fn earliest_at_or_after(&self, node: NodeId, time: f64) -> Option<usize> {
        let pts = self.points(node);
        let idx = pts.partition_point(|&p| p < time - TIME_EPSILON);
        (idx < pts.len()).then_some(idx)
    }
}
