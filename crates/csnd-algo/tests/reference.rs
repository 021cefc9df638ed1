//! The refinement loop against exhaustive path enumeration.

mod common;

use common::{brute_force_optimum, crowded_parallel, n};
use csnd_algo::{DddError, DddSolver, GoodLpSolver};
use csnd_core::{Arc, Commodity, Instance};
use proptest::prelude::*;

/// Three nodes and integer data; capacities are often below a single load.
fn small_instance() -> impl Strategy<Value = Instance> {
    let arc = (1usize..=3, 1usize..=3, 0u32..=4, 1u32..=6, 0u32..=6, 1u32..=3)
        .prop_filter("self loop", |(tail, head, ..)| tail != head);
    let commodity = (1usize..=3, 1usize..=3, 1u32..=3, 0u32..=2, 1u32..=5)
        .prop_filter("source equals sink", |(source, sink, ..)| source != sink);

    (
        prop::collection::vec(arc, 1..=5),
        prop::collection::vec(commodity, 1..=3),
    )
        .prop_map(|(arcs, commodities)| {
            let arcs = arcs
                .into_iter()
                .map(|(tail, head, flow, capacity, fixed, tt)| {
                    Arc::new(
                        n(tail),
                        n(head),
                        flow as f64,
                        capacity as f64,
                        fixed as f64,
                        tt as f64,
                    )
                })
                .collect();
            let commodities = commodities
                .into_iter()
                .map(|(source, sink, quantity, release, window)| {
                    Commodity::new(
                        n(source),
                        n(sink),
                        quantity as f64,
                        release as f64,
                        (release + window) as f64,
                    )
                })
                .collect();
            Instance::new(3, arcs, commodities).unwrap()
        })
}

#[test]
fn test_binding_capacity_matches_enumeration() {
    for fixed_cost in [0.0, 5.0] {
        let instance = crowded_parallel(fixed_cost);
        let expected = brute_force_optimum(&instance).unwrap();
        assert!((expected - (24.0 + fixed_cost)).abs() < 1e-9);

        let outcome = DddSolver::new(&instance, &GoodLpSolver::default())
            .solve()
            .unwrap();
        assert!((outcome.objective() - expected).abs() < 1e-6);
        assert!(outcome.lower_bound <= expected + 1e-6);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_refinement_finds_enumerated_optimum(instance in small_instance()) {
        let expected = brute_force_optimum(&instance);
        let solver = GoodLpSolver::default();
        let result = DddSolver::new(&instance, &solver).solve();

        match (expected, result) {
            (Some(cost), Ok(outcome)) => {
                prop_assert!(
                    (outcome.objective() - cost).abs() < 1e-6,
                    "expected {}, got {}", cost, outcome.objective()
                );
                prop_assert!(outcome.lower_bound <= outcome.upper_bound + 1e-6);
            }
            (None, Err(DddError::Infeasible { .. })) => {}
            (expected, result) => {
                prop_assert!(
                    false,
                    "reference {:?}, refinement {:?}",
                    expected,
                    result.map(|o| o.objective())
                );
            }
        }
    }
}
