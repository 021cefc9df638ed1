//! Translation of a timed network into a [`MilpModel`].

use std::collections::HashSet;

use csnd_core::{
    ArcId, ArrivalRounding, CommodityId, EdgeIndex, ExpandedNetwork, Instance, NodeIndex, TimedArc,
};
use petgraph::visit::{Bfs, Reversed};

use super::model::{MilpModel, Sense, VarIndex};
use crate::solution::TimedSolution;

/// Shares below this are treated as zero when reading a solution back.
pub const FLOW_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Force every commodity onto a single path (binary flow shares).
    pub unsplittable: bool,
}

/// A [`MilpModel`] together with the mapping back to timed arcs.
#[derive(Debug, Clone)]
pub struct SndModel {
    milp: MilpModel,
    /// Per commodity: (timed arc, variable) for every arc it may use.
    flows: Vec<Vec<(EdgeIndex, VarIndex)>>,
    /// Design variable per underlying arc with a fixed cost that can carry flow.
    design: Vec<Option<VarIndex>>,
    /// Vehicle count per movement copy that may need more than one dispatch.
    dispatches: Vec<Option<VarIndex>>,
    unroutable: Vec<CommodityId>,
    arc_of_edge: Vec<Option<ArcId>>,
}

impl SndModel {
    pub fn milp(&self) -> &MilpModel {
        &self.milp
    }

    /// Commodities with no path from their origin to their destination in the
    /// timed network. Any non-empty list makes the model infeasible.
    pub fn unroutable(&self) -> &[CommodityId] {
        &self.unroutable
    }

    pub fn flow_vars(&self, commodity: CommodityId) -> &[(EdgeIndex, VarIndex)] {
        &self.flows[commodity.value()]
    }

    pub fn design_var(&self, arc: ArcId) -> Option<VarIndex> {
        self.design[arc.value()]
    }

    pub fn dispatch_var(&self, edge: EdgeIndex) -> Option<VarIndex> {
        self.dispatches.get(edge.index()).copied().flatten()
    }

    /// Read an assignment of the model's variables back as flows on timed arcs.
    pub fn interpret(&self, instance: &Instance, values: &[f64]) -> TimedSolution {
        let mut flow_cost = 0.0;
        let mut used = vec![false; instance.arcs().len()];
        let flows = self
            .flows
            .iter()
            .enumerate()
            .map(|(k, vars)| {
                let commodity = &instance.commodities()[k];
                vars.iter()
                    .filter_map(|&(edge, var)| {
                        let share = values[var.value()];
                        (share > FLOW_EPSILON).then_some((edge, share))
                    })
                    .inspect(|&(edge, share)| {
                        if let Some(arc) = self.arc_of(edge) {
                            used[arc.value()] = true;
                            flow_cost += instance.arc(arc).flow_cost * commodity.quantity * share;
                        }
                    })
                    .collect()
            })
            .collect();

        let open_arcs: Vec<ArcId> = instance
            .arc_ids()
            .filter(|&arc| match self.design[arc.value()] {
                Some(var) => values[var.value()] > 0.5,
                None => false,
            })
            .collect();
        let fixed_cost = open_arcs.iter().map(|&a| instance.arc(a).fixed_cost).sum();
        let used_arcs = instance.arc_ids().filter(|a| used[a.value()]).collect();

        TimedSolution {
            objective: self.milp.objective_value(values),
            flow_cost,
            fixed_cost,
            flows,
            open_arcs,
            used_arcs,
        }
    }

    fn arc_of(&self, edge: EdgeIndex) -> Option<ArcId> {
        self.arc_of_edge.get(edge.index()).copied().flatten()
    }
}

/// Timed arcs that lie on some origin-to-destination walk.
fn useful_edges(
    network: &ExpandedNetwork,
    origin: NodeIndex,
    destination: NodeIndex,
) -> Option<Vec<EdgeIndex>> {
    let graph = network.graph();
    let mut forward = HashSet::new();
    let mut bfs = Bfs::new(graph, origin);
    while let Some(node) = bfs.next(graph) {
        forward.insert(node);
    }
    if !forward.contains(&destination) {
        return None;
    }

    let mut backward = HashSet::new();
    let reversed = Reversed(graph);
    let mut bfs = Bfs::new(reversed, destination);
    while let Some(node) = bfs.next(reversed) {
        backward.insert(node);
    }

    Some(
        graph
            .edge_indices()
            .filter(|&e| match graph.edge_endpoints(e) {
                Some((from, to)) => forward.contains(&from) && backward.contains(&to),
                None => false,
            })
            .collect(),
    )
}

/// Build the service network design model over `network`.
///
/// A movement copy of a round-down network stands for every real departure
/// between its time point and the next one, so it may need several vehicles.
/// Its capacity row counts them with an integer `n[a]`, free of charge since
/// the fixed cost is paid once per arc:
///
/// ```text
/// min  Σ_k Σ_a flow_cost(a) · q_k · x[k,a]  +  Σ_arc fixed_cost(arc) · y[arc]
/// s.t. Σ_out x[k,·] − Σ_in x[k,·] = +1 / −1 / 0   (origin / destination / other)
///      Σ_k q_k · x[k,a] ≤ capacity(a) · n[a]      (every movement copy a)
///      n[a] ≤ ⌈Σ_k q_k / capacity(a)⌉ · y[arc(a)]
///      0 ≤ x[k,a] ≤ 1,  n integer,  y binary
/// ```
///
/// A round-up network keeps one vehicle per copy, a restriction whose
/// solutions are all realizable:
///
/// ```text
///      Σ_k q_k · x[k,a] ≤ capacity(a) · y[arc(a)]
///      0 ≤ x[k,a] ≤ min(1, capacity / q_k)
/// ```
///
/// Unsplittable commodities always travel in one vehicle and skip arcs whose
/// capacity is below their quantity.
pub fn build_model(network: &ExpandedNetwork, instance: &Instance, options: ModelOptions) -> SndModel {
    let graph = network.graph();
    let relaxed = network.rounding() == ArrivalRounding::Down;
    let mut milp = MilpModel::new();
    let mut flows = Vec::with_capacity(instance.commodities().len());
    let mut unroutable = Vec::new();
    let mut loads: Vec<Vec<(VarIndex, f64)>> = vec![Vec::new(); graph.edge_count()];

    for k in instance.commodity_ids() {
        let commodity = instance.commodity(k);
        let ends = network.origin(k).zip(network.destination(k));
        let Some(((origin, destination), edges)) =
            ends.and_then(|(o, d)| useful_edges(network, o, d).map(|edges| ((o, d), edges)))
        else {
            unroutable.push(k);
            flows.push(Vec::new());
            continue;
        };

        let mut vars = Vec::with_capacity(edges.len());
        for edge in edges {
            let (upper, cost) = match graph[edge] {
                TimedArc::Movement { arc, .. } => {
                    let spec = instance.arc(arc);
                    let single = (spec.capacity / commodity.quantity).min(1.0);
                    if options.unsplittable && single < 1.0 {
                        continue;
                    }
                    (
                        if relaxed { 1.0 } else { single },
                        spec.flow_cost * commodity.quantity,
                    )
                }
                TimedArc::Holdover { .. } => (1.0, 0.0),
            };
            let var = if options.unsplittable {
                milp.binary(cost)
            } else {
                milp.continuous(0.0, upper, cost)
            };
            if graph[edge].arc().is_some() {
                loads[edge.index()].push((var, commodity.quantity));
            }
            vars.push((edge, var));
        }

        let mut balance: Vec<Vec<(VarIndex, f64)>> = vec![Vec::new(); graph.node_count()];
        for &(edge, var) in &vars {
            if let Some((from, to)) = graph.edge_endpoints(edge) {
                balance[from.index()].push((var, 1.0));
                balance[to.index()].push((var, -1.0));
            }
        }
        for node in graph.node_indices() {
            let terms = std::mem::take(&mut balance[node.index()]);
            let rhs = if node == origin {
                1.0
            } else if node == destination {
                -1.0
            } else {
                0.0
            };
            if terms.is_empty() && rhs == 0.0 {
                continue;
            }
            milp.add_constraint(format!("flow_{k}_{}", node.index()), terms, Sense::Eq, rhs);
        }
        flows.push(vars);
    }

    let mut design = vec![None; instance.arcs().len()];
    for arc in instance.arc_ids() {
        let spec = instance.arc(arc);
        let carries_flow = network
            .movements_of(arc)
            .iter()
            .any(|e| !loads[e.index()].is_empty());
        if spec.fixed_cost > 0.0 && carries_flow {
            design[arc.value()] = Some(milp.binary(spec.fixed_cost));
        }
    }

    let mut dispatches = vec![None; graph.edge_count()];
    for arc in instance.arc_ids() {
        let spec = instance.arc(arc);
        for &edge in network.movements_of(arc) {
            let mut terms = std::mem::take(&mut loads[edge.index()]);
            if terms.is_empty() {
                continue;
            }
            let total: f64 = terms.iter().map(|&(_, q)| q).sum();
            let vehicles = vehicles_for(total, spec.capacity);
            let name = format!("cap_{}", edge.index());
            match design[arc.value()] {
                Some(y) if relaxed && vehicles > 1.0 => {
                    let n = milp.integer(0.0, vehicles, 0.0);
                    terms.push((n, -spec.capacity));
                    milp.add_constraint(name, terms, Sense::Le, 0.0);
                    milp.add_constraint(
                        format!("open_{}", edge.index()),
                        vec![(n, 1.0), (y, -vehicles)],
                        Sense::Le,
                        0.0,
                    );
                    dispatches[edge.index()] = Some(n);
                }
                Some(y) => {
                    terms.push((y, -spec.capacity));
                    milp.add_constraint(name, terms, Sense::Le, 0.0);
                }
                // a free arc sends as many vehicles as its copy needs
                None if relaxed => {}
                None if total > spec.capacity => {
                    milp.add_constraint(name, terms, Sense::Le, spec.capacity);
                }
                None => {}
            }
        }
    }

    let arc_of_edge = graph.edge_weights().map(TimedArc::arc).collect();

    SndModel {
        milp,
        flows,
        design,
        dispatches,
        unroutable,
        arc_of_edge,
    }
}

/// Vehicles needed to move `load` at `capacity` each, at least one.
fn vehicles_for(load: f64, capacity: f64) -> f64 {
    (load / capacity - FLOW_EPSILON).ceil().max(1.0)
}
