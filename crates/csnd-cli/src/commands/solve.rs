//! `csnd solve`

use std::fs::File;
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use csnd_algo::{
    solve_full_discretization, BaselineOptions, DddSolver, DesignSolution, GoodLpSolver,
    IterationRecord, MilpBackend,
};
use csnd_cli::cli::SolveArgs;
use csnd_core::Instance;
use csnd_io::read_instance;
use serde::Serialize;
use tracing::info;

use crate::commands::util::{configure_threads, load_config};

/// Solution output format
#[derive(Debug, Serialize)]
struct SolveOutput {
    instance: String,
    method: &'static str,
    status: String,
    objective: f64,
    lower_bound: Option<f64>,
    upper_bound: f64,
    iterations: usize,
    solve_time_ms: u64,
    solution: DesignSolution,
    history: Vec<IterationRecord>,
}

pub fn handle(args: &SolveArgs) -> Result<()> {
    configure_threads(&args.threads);

    let instance = read_instance(&args.instance)
        .with_context(|| format!("reading instance {}", args.instance))?;
    println!(
        "Instance loaded: {} nodes, {} arcs, {} commodities",
        instance.num_nodes(),
        instance.arcs().len(),
        instance.commodities().len()
    );

    let backend: MilpBackend = args.solver.parse().context("selecting MILP backend")?;
    let solver = GoodLpSolver::new(backend);

    let start = Instant::now();
    let mut output = if args.full {
        solve_grid(&instance, args, &solver)?
    } else {
        solve_refined(&instance, args, &solver)?
    };
    let elapsed = start.elapsed();
    output.solve_time_ms = elapsed.as_millis() as u64;

    println!("\n{}", output.solution.summary());
    println!("Status: {}", output.status);
    println!("Objective: {:.4}", output.objective);
    if let Some(lower) = output.lower_bound {
        println!("Lower bound: {:.4}", lower);
    }
    println!("Iterations: {}", output.iterations);
    println!("Wall-clock time: {:.3?}", elapsed);

    if let Some(out_path) = &args.out {
        let json = serde_json::to_string_pretty(&output).context("serializing solution")?;
        let mut file =
            File::create(out_path).with_context(|| format!("creating output file {out_path}"))?;
        file.write_all(json.as_bytes()).context("writing output")?;
        println!("Results written to {}", out_path);
    }

    Ok(())
}

fn solve_refined(instance: &Instance, args: &SolveArgs, solver: &GoodLpSolver) -> Result<SolveOutput> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(max) = args.max_iterations {
        config.max_iterations = max;
    }
    if args.time_limit.is_some() {
        config.time_limit_secs = args.time_limit;
    }
    if args.solver_time_limit.is_some() {
        config.solver_time_limit_secs = args.solver_time_limit;
    }
    config.unsplittable |= args.unsplittable;
    config.upper_bound_probe |= args.probe;
    info!(?config, "dynamic discretization discovery");

    let outcome = DddSolver::new(instance, solver)
        .with_config(config)
        .solve()
        .context("solving by dynamic discretization discovery")?;

    Ok(SolveOutput {
        instance: args.instance.clone(),
        method: "ddd",
        status: outcome.termination.as_str().to_string(),
        objective: outcome.objective(),
        lower_bound: Some(outcome.lower_bound),
        upper_bound: outcome.upper_bound,
        iterations: outcome.iterations,
        solve_time_ms: 0,
        solution: outcome.solution,
        history: outcome.history,
    })
}

fn solve_grid(instance: &Instance, args: &SolveArgs, solver: &GoodLpSolver) -> Result<SolveOutput> {
    let config = load_config(args.config.as_deref())?;
    let options = BaselineOptions {
        unsplittable: config.unsplittable || args.unsplittable,
        parallel: config.parallel,
        solver_time_limit_secs: args.solver_time_limit.or(config.solver_time_limit_secs),
    };
    info!(delta = args.delta_t, ?options, "full discretization");

    let outcome = solve_full_discretization(instance, args.delta_t, solver, &options)
        .with_context(|| format!("solving on a grid of step {}", args.delta_t))?;

    Ok(SolveOutput {
        instance: args.instance.clone(),
        method: "full",
        status: "feasible".to_string(),
        objective: outcome.solution.total_cost,
        lower_bound: None,
        upper_bound: outcome.solution.total_cost,
        iterations: 1,
        solve_time_ms: 0,
        solution: outcome.solution,
        history: Vec::new(),
    })
}
