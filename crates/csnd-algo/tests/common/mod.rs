//! Shared instances and a brute-force reference solver.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use csnd_algo::milp::{MilpModel, MilpSolver, SolveLimits, SolveOutcome, SolverError};
use csnd_algo::GoodLpSolver;
use csnd_core::{Arc, ArcId, Commodity, Instance, NodeId};

pub const TINY: &str = "\
tiny instance
3 3 3
1 2 1 2 1 1
2 3 1 2 1 1
1 3 2 2 2 1
1 3 1 0 3
2 3 1 1 2
1 2 1 1 2
";

pub fn n(v: usize) -> NodeId {
    NodeId::new(v)
}

pub fn tiny() -> Instance {
    csnd_io::parse_instance(TINY).unwrap()
}

/// One arc (cost 1, capacity 10, travel time 5) and one commodity released
/// at 0 with the given deadline.
pub fn single_arc(deadline: f64) -> Instance {
    Instance::new(
        2,
        vec![Arc::new(n(1), n(2), 1.0, 10.0, 0.0, 5.0)],
        vec![Commodity::new(n(1), n(2), 1.0, 0.0, deadline)],
    )
    .unwrap()
}

/// A slow cheap arc that misses the deadline and a fast expensive one.
pub fn slow_and_fast() -> Instance {
    Instance::new(
        2,
        vec![
            Arc::new(n(1), n(2), 1.0, 10.0, 0.0, 8.0),
            Arc::new(n(1), n(2), 5.0, 10.0, 0.0, 3.0),
        ],
        vec![Commodity::new(n(1), n(2), 1.0, 0.0, 5.0)],
    )
    .unwrap()
}

/// Two commodities with disjoint time windows sharing a fixed-cost arc.
pub fn shared_fixed_cost() -> Instance {
    Instance::new(
        2,
        vec![
            Arc::new(n(1), n(2), 1.0, 10.0, 10.0, 2.0),
            Arc::new(n(1), n(2), 7.0, 10.0, 0.0, 2.0),
        ],
        vec![
            Commodity::new(n(1), n(2), 1.0, 0.0, 4.0),
            Commodity::new(n(1), n(2), 1.0, 3.0, 8.0),
        ],
    )
    .unwrap()
}

/// Four loads of 6 that only the cheap arc (capacity 10, travel time 1)
/// delivers cheaply by the deadline 1.5; a parallel arc costs 100 per unit.
pub fn crowded_parallel(fixed_cost: f64) -> Instance {
    Instance::new(
        2,
        vec![
            Arc::new(n(1), n(2), 1.0, 10.0, fixed_cost, 1.0),
            Arc::new(n(1), n(2), 100.0, 10.0, 0.0, 1.0),
        ],
        (0..4)
            .map(|_| Commodity::new(n(1), n(2), 6.0, 0.0, 1.5))
            .collect(),
    )
    .unwrap()
}

/// Counts solves and delegates to the default backend.
#[derive(Default)]
pub struct CountingSolver {
    inner: GoodLpSolver,
    calls: AtomicUsize,
}

impl CountingSolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MilpSolver for CountingSolver {
    fn name(&self) -> &str {
        "counting"
    }

    fn solve(&self, model: &MilpModel, limits: &SolveLimits) -> Result<SolveOutcome, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.solve(model, limits)
    }
}

/// Simple paths (as arc lists) from `from` to `to` whose travel time fits
/// in `budget`.
fn timely_paths(instance: &Instance, from: NodeId, to: NodeId, budget: f64) -> Vec<Vec<ArcId>> {
    fn walk(
        instance: &Instance,
        at: NodeId,
        to: NodeId,
        budget: f64,
        visited: &mut Vec<NodeId>,
        path: &mut Vec<ArcId>,
        out: &mut Vec<Vec<ArcId>>,
    ) {
        if at == to {
            out.push(path.clone());
            return;
        }
        for arc in instance.arc_ids() {
            let spec = instance.arc(arc);
            if spec.tail != at || visited.contains(&spec.head) || spec.travel_time > budget + 1e-9
            {
                continue;
            }
            visited.push(spec.head);
            path.push(arc);
            walk(instance, spec.head, to, budget - spec.travel_time, visited, path, out);
            path.pop();
            visited.pop();
        }
    }

    let mut out = Vec::new();
    walk(instance, from, to, budget, &mut vec![from], &mut Vec::new(), &mut out);
    out
}

/// Optimal continuous-time cost by enumeration. Waiting is free and an arc
/// sends as many vehicles as a dispatch needs, so any timely path can be
/// taken as soon as the commodity is ready and capacity never rules one out.
/// Returns `None` if some commodity has no timely path.
pub fn brute_force_optimum(instance: &Instance) -> Option<f64> {
    let options: Vec<Vec<Vec<ArcId>>> = instance
        .commodities()
        .iter()
        .map(|c| timely_paths(instance, c.source, c.sink, c.deadline - c.release))
        .collect();
    if options.iter().any(Vec::is_empty) {
        return None;
    }

    let mut best = f64::INFINITY;
    let mut choice = vec![0usize; options.len()];
    loop {
        let mut open = vec![false; instance.arcs().len()];
        let mut cost = 0.0;
        for (k, &i) in choice.iter().enumerate() {
            let quantity = instance.commodities()[k].quantity;
            for &arc in &options[k][i] {
                open[arc.value()] = true;
                cost += instance.arc(arc).flow_cost * quantity;
            }
        }
        cost += instance
            .arc_ids()
            .filter(|a| open[a.value()])
            .map(|a| instance.arc(a).fixed_cost)
            .sum::<f64>();
        best = best.min(cost);

        // next combination
        let mut k = 0;
        loop {
            if k == choice.len() {
                return Some(best);
            }
            choice[k] += 1;
            if choice[k] < options[k].len() {
                break;
            }
            choice[k] = 0;
            k += 1;
        }
    }
}
