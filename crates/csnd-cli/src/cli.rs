use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "csnd",
    version,
    about = "Continuous-time service network design"
)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve an instance by dynamic discretization discovery
    Solve(SolveArgs),
    /// Parse an instance file and report what it contains
    Validate {
        /// Path to the instance file
        instance: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    /// Path to the instance file
    pub instance: String,
    /// Solve once on a regular time grid instead of refining
    #[arg(long)]
    pub full: bool,
    /// Grid step for `--full`
    #[arg(long, default_value = "1.0")]
    pub delta_t: f64,
    /// Maximum number of refinement iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,
    /// Wall-clock budget for the whole run (seconds)
    #[arg(long)]
    pub time_limit: Option<f64>,
    /// Budget for each MILP solve (seconds)
    #[arg(long)]
    pub solver_time_limit: Option<f64>,
    /// Refinement settings (TOML); flags override the file
    #[arg(long)]
    pub config: Option<String>,
    /// MILP backend (microlp, highs)
    #[arg(long, default_value = "microlp")]
    pub solver: String,
    /// Route each commodity on a single path
    #[arg(long)]
    pub unsplittable: bool,
    /// Solve the round-up network for upper bounds while refining
    #[arg(long)]
    pub probe: bool,
    /// Threading hint (`auto` or integer)
    #[arg(long, default_value = "auto")]
    pub threads: String,
    /// Write the solution as JSON
    #[arg(short, long)]
    pub out: Option<String>,
}
