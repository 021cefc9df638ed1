//! Regular-grid solves compared with the refinement loop.

mod common;

use common::{crowded_parallel, shared_fixed_cost, tiny};
use csnd_algo::{
    solve_full_discretization, BaselineOptions, DddError, DddSolver, GoodLpSolver,
};

#[test]
fn test_unit_grid_reaches_refined_optimum() {
    let instance = tiny();
    let solver = GoodLpSolver::default();
    let options = BaselineOptions::default();

    let grid = solve_full_discretization(&instance, 1.0, &solver, &options).unwrap();
    let refined = DddSolver::new(&instance, &solver).solve().unwrap();

    assert!((grid.solution.total_cost - 6.0).abs() < 1e-6);
    assert!((grid.solution.total_cost - refined.objective()).abs() < 1e-6);
    // {0, 1, 2, 3} at each of the three nodes
    assert_eq!(grid.timed_nodes, 12);
    for schedule in &grid.solution.schedules {
        let commodity = instance.commodity(schedule.commodity);
        assert!(schedule.arrival <= commodity.deadline + 1e-9);
    }
}

#[test]
fn test_coarse_grid_is_infeasible() {
    let instance = tiny();
    let err = solve_full_discretization(
        &instance,
        2.0,
        &GoodLpSolver::default(),
        &BaselineOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DddError::Infeasible { .. }), "got {err:?}");
}

#[test]
fn test_grid_never_beats_refinement() {
    let instance = shared_fixed_cost();
    let solver = GoodLpSolver::default();
    let refined = DddSolver::new(&instance, &solver).solve().unwrap();
    for delta in [1.0, 0.5] {
        let grid =
            solve_full_discretization(&instance, delta, &solver, &BaselineOptions::default())
                .unwrap();
        assert!(grid.solution.total_cost >= refined.objective() - 1e-6);
    }
}

#[test]
fn test_grid_spreads_load_over_departures() {
    // one vehicle per grid departure: 0, 0.25 and 0.5 carry the 24 units
    let instance = crowded_parallel(0.0);
    let grid = solve_full_discretization(
        &instance,
        0.25,
        &GoodLpSolver::default(),
        &BaselineOptions::default(),
    )
    .unwrap();
    assert!((grid.solution.total_cost - 24.0).abs() < 1e-6);
    assert_eq!(grid.solution.open_arcs, vec![csnd_core::ArcId::new(0)]);
}
