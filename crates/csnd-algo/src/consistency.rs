//! Continuous-time feasibility of timed solutions.
//!
//! A solution of the relaxed network can move a commodity faster than
//! physically possible: a movement arc departing at `t` lands on the latest
//! head point at or before `t + travel_time`. [`check`] replays every
//! commodity in continuous time and reports where the discretization is too
//! coarse.
//!
//! 1. Each commodity's flow shares are decomposed into origin-destination
//!    paths; cycles found on the way are cancelled.
//! 2. Every movement arc whose real arrival is later than its head time point
//!    yields a [`RepairPoint`] `(head node, real arrival)`.
//! 3. Paths are realized departing as soon as the commodity is ready. Paths
//!    that arrive after the deadline are [`PathStatus::Late`]. Paths leaving
//!    on the same arc at the same instant form one dispatch, which sends as
//!    many vehicles as its load needs.
//!
//! Only gaps of inconsistent paths become repair points. An inconsistent path
//! always has a gap, so a non-empty repair set always refines the network.

use std::collections::HashMap;

use csnd_core::{
    ArrivalRounding, CommodityId, EdgeIndex, ExpandedNetwork, Instance, NodeId, NodeIndex,
    TimedArc, TIME_EPSILON,
};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::milp::FLOW_EPSILON;
use crate::solution::{Leg, TimedSolution};

/// A time point missing from a node's discretization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RepairPoint {
    pub node: NodeId,
    pub time: f64,
    /// Commodity whose path exposed the gap
    pub commodity: CommodityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Consistent,
    /// Realized arrival after the deadline
    Late,
}

#[derive(Debug, Clone)]
pub struct PathReport {
    pub commodity: CommodityId,
    /// Fraction of the commodity's quantity on this path
    pub share: f64,
    pub edges: Vec<EdgeIndex>,
    pub legs: Vec<Leg>,
    /// Realized arrival at the sink
    pub arrival: f64,
    /// Gaps in path order
    pub gaps: Vec<RepairPoint>,
    pub status: PathStatus,
}

impl PathReport {
    /// Where the path first outruns physical travel time.
    pub fn first_violation(&self) -> Option<&RepairPoint> {
        self.gaps.first()
    }

    pub fn is_consistent(&self) -> bool {
        self.status == PathStatus::Consistent
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    pub paths: Vec<PathReport>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.paths.iter().all(PathReport::is_consistent)
    }

    pub fn paths_of(&self, commodity: CommodityId) -> impl Iterator<Item = &PathReport> {
        self.paths.iter().filter(move |p| p.commodity == commodity)
    }

    pub fn inconsistent_commodities(&self) -> Vec<CommodityId> {
        let mut ids: Vec<CommodityId> = self
            .paths
            .iter()
            .filter(|p| !p.is_consistent())
            .map(|p| p.commodity)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Gaps of all inconsistent paths, sorted by (node, time) and without
    /// duplicates.
    pub fn repair_points(&self) -> Vec<RepairPoint> {
        let mut points: Vec<RepairPoint> = self
            .paths
            .iter()
            .filter(|p| !p.is_consistent())
            .flat_map(|p| p.gaps.iter().copied())
            .collect();
        points.sort_by(|a, b| {
            a.node
                .cmp(&b.node)
                .then(a.time.total_cmp(&b.time))
                .then(a.commodity.cmp(&b.commodity))
        });
        points.dedup_by(|later, first| {
            later.node == first.node && (later.time - first.time).abs() <= TIME_EPSILON
        });
        points
    }
}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("flow of commodity {commodity} cannot be decomposed: {detail}")]
    Decomposition {
        commodity: CommodityId,
        detail: String,
    },
}

/// Check `solution` of `network` for continuous-time feasibility.
pub fn check(
    solution: &TimedSolution,
    network: &ExpandedNetwork,
    instance: &Instance,
    parallel: bool,
) -> Result<ConsistencyReport, CheckError> {
    let ids: Vec<CommodityId> = instance.commodity_ids().collect();
    let per_commodity = map_commodities(&ids, parallel, |k| {
        commodity_paths(solution, network, instance, k)
    });

    let mut paths = Vec::new();
    for result in per_commodity {
        paths.extend(result?);
    }
    Ok(ConsistencyReport { paths })
}

#[cfg(feature = "parallel")]
fn map_commodities<T, F>(ids: &[CommodityId], parallel: bool, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(CommodityId) -> T + Sync + Send,
{
    if parallel {
        ids.par_iter().map(|&k| f(k)).collect()
    } else {
        ids.iter().map(|&k| f(k)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn map_commodities<T, F>(ids: &[CommodityId], _parallel: bool, f: F) -> Vec<T>
where
    F: Fn(CommodityId) -> T,
{
    ids.iter().map(|&k| f(k)).collect()
}

fn commodity_paths(
    solution: &TimedSolution,
    network: &ExpandedNetwork,
    instance: &Instance,
    commodity: CommodityId,
) -> Result<Vec<PathReport>, CheckError> {
    let fail = |detail: &str| CheckError::Decomposition {
        commodity,
        detail: detail.to_string(),
    };
    let origin = network
        .origin(commodity)
        .ok_or_else(|| fail("no origin time point"))?;
    let destination = network
        .destination(commodity)
        .ok_or_else(|| fail("no destination time point"))?;
    let flows = solution
        .flows
        .get(commodity.value())
        .ok_or_else(|| fail("missing from the solution"))?;

    let decomposed = decompose(network, flows, origin, destination)
        .map_err(|detail| CheckError::Decomposition { commodity, detail })?;
    if decomposed.is_empty() {
        return Err(fail("carries no flow"));
    }

    let release = instance.commodity(commodity).release;
    let deadline = instance.commodity(commodity).deadline;
    Ok(decomposed
        .into_iter()
        .map(|(share, edges)| {
            let gaps = gaps_along(network, instance, &edges, commodity);
            let (legs, arrival) = realize(network, instance, &edges, release);
            let status = if arrival > deadline + TIME_EPSILON {
                PathStatus::Late
            } else {
                PathStatus::Consistent
            };
            PathReport {
                commodity,
                share,
                edges,
                legs,
                arrival,
                gaps,
                status,
            }
        })
        .collect())
}

/// Split a commodity's flow into (share, path) pairs.
///
/// Walks from `origin` along arcs with residual flow, lowest edge index first.
/// Revisiting a node closes a cycle, which is cancelled by its bottleneck.
fn decompose(
    network: &ExpandedNetwork,
    flows: &[(EdgeIndex, f64)],
    origin: NodeIndex,
    destination: NodeIndex,
) -> Result<Vec<(f64, Vec<EdgeIndex>)>, String> {
    let raw = network.graph().raw_edges();
    let mut residual: HashMap<EdgeIndex, f64> = flows.iter().copied().collect();
    let mut outgoing: HashMap<NodeIndex, Vec<EdgeIndex>> = HashMap::new();
    for &(edge, _) in flows {
        outgoing.entry(raw[edge.index()].source()).or_default().push(edge);
    }
    for list in outgoing.values_mut() {
        list.sort();
    }

    let next_edge = |residual: &HashMap<EdgeIndex, f64>, node: NodeIndex| {
        outgoing.get(&node).and_then(|list| {
            list.iter()
                .copied()
                .find(|e| residual.get(e).is_some_and(|&r| r > FLOW_EPSILON))
        })
    };
    let bottleneck = |residual: &HashMap<EdgeIndex, f64>, edges: &[EdgeIndex]| {
        edges
            .iter()
            .map(|e| residual.get(e).copied().unwrap_or(0.0))
            .fold(f64::INFINITY, f64::min)
    };
    let drain = |residual: &mut HashMap<EdgeIndex, f64>, edges: &[EdgeIndex], amount: f64| {
        for e in edges {
            if let Some(r) = residual.get_mut(e) {
                *r -= amount;
            }
        }
    };

    let mut paths = Vec::new();
    'paths: while next_edge(&residual, origin).is_some() {
        let mut edges: Vec<EdgeIndex> = Vec::new();
        let mut position: HashMap<NodeIndex, usize> = HashMap::from([(origin, 0)]);
        let mut node = origin;
        while node != destination {
            let Some(edge) = next_edge(&residual, node) else {
                if edges.is_empty() {
                    // a cancelled cycle took the last flow out of the origin
                    continue 'paths;
                }
                return Err(format!("flow stops at timed node {}", node.index()));
            };
            edges.push(edge);
            node = raw[edge.index()].target();
            if let Some(&start) = position.get(&node) {
                let cycle = edges.split_off(start);
                let amount = bottleneck(&residual, &cycle);
                drain(&mut residual, &cycle, amount);
                position.retain(|_, &mut p| p <= start);
            } else {
                position.insert(node, edges.len());
            }
        }
        let amount = bottleneck(&residual, &edges);
        drain(&mut residual, &edges, amount);
        paths.push((amount, edges));
    }
    Ok(paths)
}

fn gaps_along(
    network: &ExpandedNetwork,
    instance: &Instance,
    edges: &[EdgeIndex],
    commodity: CommodityId,
) -> Vec<RepairPoint> {
    if network.rounding() != ArrivalRounding::Down {
        return Vec::new();
    }
    edges
        .iter()
        .filter_map(|&e| match *network.timed_arc(e) {
            TimedArc::Movement { arc, arrival, .. } if network.arrival_gap(e) > TIME_EPSILON => {
                Some(RepairPoint {
                    node: instance.arc(arc).head,
                    time: arrival,
                    commodity,
                })
            }
            _ => None,
        })
        .collect()
}

/// Replay a path in continuous time starting at `release`, leaving every
/// node as soon as the commodity is there.
fn realize(
    network: &ExpandedNetwork,
    instance: &Instance,
    edges: &[EdgeIndex],
    release: f64,
) -> (Vec<Leg>, f64) {
    let mut ready = release;
    let mut legs = Vec::new();
    for &e in edges {
        if let TimedArc::Movement { arc, departure, .. } = *network.timed_arc(e) {
            let spec = instance.arc(arc);
            let depart = ready;
            ready = depart + spec.travel_time;
            legs.push(Leg {
                arc,
                tail: spec.tail,
                head: spec.head,
                scheduled: departure,
                departure: depart,
                arrival: ready,
            });
        }
    }
    (legs, ready)
}
