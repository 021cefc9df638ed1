use std::fs;

use anyhow::{Context, Result};
use csnd_algo::DddConfig;
use rayon::ThreadPoolBuilder;

pub fn configure_threads(spec: &str) {
    let count = if spec.eq_ignore_ascii_case("auto") {
        num_cpus::get()
    } else {
        spec.parse().unwrap_or_else(|_| num_cpus::get())
    };
    let _ = ThreadPoolBuilder::new().num_threads(count).build_global();
}

/// Refinement settings from a TOML file, or the defaults.
pub fn load_config(path: Option<&str>) -> Result<DddConfig> {
    let Some(path) = path else {
        return Ok(DddConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
    toml::from_str(&text).with_context(|| format!("parsing config {path}"))
}
