//! Solutions of the timed model and their continuous-time realization.

use csnd_core::{ArcId, CommodityId, EdgeIndex, Instance, NodeId, TIME_EPSILON};
use serde::Serialize;

use crate::consistency::ConsistencyReport;

/// A variable assignment of the timed model read back onto timed arcs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimedSolution {
    /// Model objective (flow plus fixed cost)
    pub objective: f64,
    pub flow_cost: f64,
    pub fixed_cost: f64,
    /// Per commodity: timed arcs with a positive share
    pub flows: Vec<Vec<(EdgeIndex, f64)>>,
    /// Arcs whose design variable is set
    pub open_arcs: Vec<ArcId>,
    /// Arcs carrying flow on any movement copy
    pub used_arcs: Vec<ArcId>,
}

/// One traversal of an arc in continuous time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Leg {
    pub arc: ArcId,
    pub tail: NodeId,
    pub head: NodeId,
    /// Departure of the timed arc in the model
    pub scheduled: f64,
    pub departure: f64,
    pub arrival: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledPath {
    /// Fraction of the commodity's quantity
    pub share: f64,
    pub legs: Vec<Leg>,
}

impl ScheduledPath {
    pub fn arrival(&self) -> Option<f64> {
        self.legs.last().map(|leg| leg.arrival)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommoditySchedule {
    pub commodity: CommodityId,
    pub paths: Vec<ScheduledPath>,
    /// Latest arrival over all paths
    pub arrival: f64,
}

/// Everything leaving on one arc at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Dispatch {
    pub arc: ArcId,
    pub departure: f64,
    pub load: f64,
    /// Vehicles of the arc's capacity needed for `load`
    pub vehicles: usize,
}

/// A continuous-time feasible network design with its dispatch schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DesignSolution {
    /// Flow plus fixed cost
    pub total_cost: f64,
    pub flow_cost: f64,
    pub fixed_cost: f64,
    /// Arcs used by some path; each pays its fixed cost once
    pub open_arcs: Vec<ArcId>,
    pub schedules: Vec<CommoditySchedule>,
    /// In (arc, departure) order
    pub dispatches: Vec<Dispatch>,
}

impl DesignSolution {
    /// Collect the realized paths of a consistent report and price them.
    pub fn from_report(instance: &Instance, report: &ConsistencyReport) -> Self {
        let mut used = vec![false; instance.arcs().len()];
        let mut flow_cost = 0.0;

        let schedules: Vec<CommoditySchedule> = instance
            .commodity_ids()
            .map(|k| {
                let quantity = instance.commodity(k).quantity;
                let paths: Vec<ScheduledPath> = report
                    .paths_of(k)
                    .map(|p| {
                        for leg in &p.legs {
                            used[leg.arc.value()] = true;
                            flow_cost += instance.arc(leg.arc).flow_cost * quantity * p.share;
                        }
                        ScheduledPath {
                            share: p.share,
                            legs: p.legs.clone(),
                        }
                    })
                    .collect();
                let arrival = report
                    .paths_of(k)
                    .map(|p| p.arrival)
                    .fold(instance.commodity(k).release, f64::max);
                CommoditySchedule {
                    commodity: k,
                    paths,
                    arrival,
                }
            })
            .collect();

        let open_arcs: Vec<ArcId> = instance.arc_ids().filter(|a| used[a.value()]).collect();
        let fixed_cost = open_arcs.iter().map(|&a| instance.arc(a).fixed_cost).sum();
        let dispatches = group_dispatches(instance, &schedules);

        Self {
            total_cost: flow_cost + fixed_cost,
            flow_cost,
            fixed_cost,
            open_arcs,
            schedules,
            dispatches,
        }
    }

    pub fn schedule(&self, commodity: CommodityId) -> Option<&CommoditySchedule> {
        self.schedules.iter().find(|s| s.commodity == commodity)
    }

    /// Number of distinct (arc, departure) dispatches.
    pub fn dispatch_count(&self) -> usize {
        let mut dispatches: Vec<(ArcId, f64)> = self
            .schedules
            .iter()
            .flat_map(|s| &s.paths)
            .flat_map(|p| &p.legs)
            .map(|leg| (leg.arc, leg.departure))
            .collect();
        dispatches.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
        dispatches.dedup_by(|later, first| {
            later.0 == first.0 && (later.1 - first.1).abs() <= TIME_EPSILON
        });
        dispatches.len()
    }

    pub fn vehicle_count(&self) -> usize {
        self.dispatches.iter().map(|d| d.vehicles).sum()
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Network Design Summary\n{}\n", "=".repeat(40)));
        s.push_str(&format!("Total Cost: {:.4}\n", self.total_cost));
        s.push_str(&format!("  Flow: {:.4}\n", self.flow_cost));
        s.push_str(&format!("  Fixed: {:.4}\n", self.fixed_cost));
        let arcs: Vec<String> = self.open_arcs.iter().map(ToString::to_string).collect();
        s.push_str(&format!(
            "Arcs Opened: {} [{}]\n",
            self.open_arcs.len(),
            arcs.join(", ")
        ));
        s.push_str(&format!(
            "Dispatches: {} ({} vehicles)\n",
            self.dispatch_count(),
            self.vehicle_count()
        ));

        if !self.schedules.is_empty() {
            s.push_str("\nSchedules:\n");
            for schedule in &self.schedules {
                s.push_str(&format!(
                    "  {} arrives {:.4}\n",
                    schedule.commodity, schedule.arrival
                ));
                for path in &schedule.paths {
                    let legs: Vec<String> = path
                        .legs
                        .iter()
                        .map(|leg| {
                            format!(
                                "{}->{} @{:.2}..{:.2}",
                                leg.tail, leg.head, leg.departure, leg.arrival
                            )
                        })
                        .collect();
                    s.push_str(&format!("    {:>5.1}%  {}\n", path.share * 100.0, legs.join(", ")));
                }
            }
        }

        s
    }
}

/// Merge legs leaving on the same arc at the same instant.
fn group_dispatches(instance: &Instance, schedules: &[CommoditySchedule]) -> Vec<Dispatch> {
    let mut legs: Vec<(ArcId, f64, f64)> = schedules
        .iter()
        .flat_map(|s| {
            let quantity = instance.commodity(s.commodity).quantity;
            s.paths.iter().flat_map(move |p| {
                p.legs
                    .iter()
                    .map(move |leg| (leg.arc, leg.departure, p.share * quantity))
            })
        })
        .collect();
    legs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut dispatches: Vec<Dispatch> = Vec::new();
    for (arc, departure, load) in legs {
        match dispatches.last_mut() {
            Some(last) if last.arc == arc && departure - last.departure <= TIME_EPSILON => {
                last.load += load;
            }
            _ => dispatches.push(Dispatch {
                arc,
                departure,
                load,
                vehicles: 0,
            }),
        }
    }
    for dispatch in &mut dispatches {
        let capacity = instance.arc(dispatch.arc).capacity;
        dispatch.vehicles = ((dispatch.load / capacity - 1e-9).ceil() as usize).max(1);
    }
    dispatches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(arc: usize, tail: usize, head: usize, departure: f64, arrival: f64) -> Leg {
        Leg {
            arc: ArcId::new(arc),
            tail: NodeId::new(tail),
            head: NodeId::new(head),
            scheduled: departure,
            departure,
            arrival,
        }
    }

    #[test]
    fn test_solution_summary() {
        let solution = DesignSolution {
            total_cost: 12.0,
            flow_cost: 2.0,
            fixed_cost: 10.0,
            open_arcs: vec![ArcId::new(0)],
            schedules: vec![
                CommoditySchedule {
                    commodity: CommodityId::new(0),
                    paths: vec![ScheduledPath {
                        share: 1.0,
                        legs: vec![leg(0, 1, 2, 0.0, 2.0)],
                    }],
                    arrival: 2.0,
                },
                CommoditySchedule {
                    commodity: CommodityId::new(1),
                    paths: vec![ScheduledPath {
                        share: 1.0,
                        legs: vec![leg(0, 1, 2, 3.0, 5.0)],
                    }],
                    arrival: 5.0,
                },
            ],
            dispatches: Vec::new(),
        };

        assert_eq!(solution.dispatch_count(), 2);
        assert_eq!(solution.schedule(CommodityId::new(1)).unwrap().arrival, 5.0);
        assert_eq!(solution.schedules[0].paths[0].arrival(), Some(2.0));

        let summary = solution.summary();
        assert!(summary.contains("Total Cost: 12.0000"));
        assert!(summary.contains("Arcs Opened: 1 [a1]"));
        assert!(summary.contains("k2 arrives 5.0000"));
        assert!(summary.contains("1->2 @3.00..5.00"));
    }

    #[test]
    fn test_shared_dispatch_counts_once() {
        let solution = DesignSolution {
            schedules: vec![
                CommoditySchedule {
                    commodity: CommodityId::new(0),
                    paths: vec![ScheduledPath {
                        share: 1.0,
                        legs: vec![leg(0, 1, 2, 0.0, 2.0)],
                    }],
                    arrival: 2.0,
                },
                CommoditySchedule {
                    commodity: CommodityId::new(1),
                    paths: vec![ScheduledPath {
                        share: 1.0,
                        legs: vec![leg(0, 1, 2, 0.0, 2.0)],
                    }],
                    arrival: 2.0,
                },
            ],
            ..DesignSolution::default()
        };
        assert_eq!(solution.dispatch_count(), 1);
    }

    #[test]
    fn test_merged_dispatch_counts_vehicles() {
        use crate::consistency::{PathReport, PathStatus};
        use csnd_core::{Arc, Commodity};

        let instance = Instance::new(
            2,
            vec![Arc::new(NodeId::new(1), NodeId::new(2), 1.0, 10.0, 4.0, 2.0)],
            vec![
                Commodity::new(NodeId::new(1), NodeId::new(2), 6.0, 0.0, 5.0),
                Commodity::new(NodeId::new(1), NodeId::new(2), 6.0, 0.0, 5.0),
            ],
        )
        .unwrap();
        let path = |k: usize| PathReport {
            commodity: CommodityId::new(k),
            share: 1.0,
            edges: Vec::new(),
            legs: vec![leg(0, 1, 2, 0.0, 2.0)],
            arrival: 2.0,
            gaps: Vec::new(),
            status: PathStatus::Consistent,
        };
        let report = ConsistencyReport {
            paths: vec![path(0), path(1)],
        };

        let solution = DesignSolution::from_report(&instance, &report);
        assert_eq!(solution.dispatches.len(), 1);
        assert_eq!(solution.dispatches[0].load, 12.0);
        assert_eq!(solution.dispatches[0].vehicles, 2);
        assert!((solution.total_cost - 16.0).abs() < 1e-9);
        assert!(solution.summary().contains("Dispatches: 1 (2 vehicles)"));
    }
}
