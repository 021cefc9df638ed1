use std::time::Duration;

use csnd_core::{CsndError, CsndResult};
use serde::{Deserialize, Serialize};

use crate::milp::ModelOptions;

/// Refinement loop settings.
///
/// Every field has a default, so a partial TOML table is enough:
///
/// ```toml
/// max_iterations = 100
/// time_limit_secs = 60.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DddConfig {
    /// Stop with `ResourceExceeded` after this many iterations
    pub max_iterations: usize,
    /// Wall-clock budget for the whole run (seconds)
    pub time_limit_secs: Option<f64>,
    /// Budget for a single MILP solve (seconds)
    pub solver_time_limit_secs: Option<f64>,
    /// Seed earliest arrival and latest departure times at every node
    pub seed_travel_bounds: bool,
    /// Route each commodity on a single path
    pub unsplittable: bool,
    /// Check commodities on the rayon pool
    pub parallel: bool,
    /// Also solve the round-up network for an upper bound after each
    /// inconsistent iteration
    pub upper_bound_probe: bool,
    /// Relative gap at which a probed upper bound ends the run
    pub optimality_gap: f64,
}

impl Default for DddConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            time_limit_secs: None,
            solver_time_limit_secs: None,
            seed_travel_bounds: true,
            unsplittable: false,
            parallel: true,
            upper_bound_probe: false,
            optimality_gap: 1e-6,
        }
    }
}

impl DddConfig {
    pub fn validate(&self) -> CsndResult<()> {
        if self.max_iterations == 0 {
            return Err(CsndError::Config("max_iterations must be at least 1".into()));
        }
        for (name, value) in [
            ("time_limit_secs", self.time_limit_secs),
            ("solver_time_limit_secs", self.solver_time_limit_secs),
        ] {
            if let Some(secs) = value {
                if !(secs.is_finite() && secs > 0.0) {
                    return Err(CsndError::Config(format!(
                        "{name} must be a positive number of seconds, got {secs}"
                    )));
                }
            }
        }
        if !(self.optimality_gap.is_finite() && self.optimality_gap >= 0.0) {
            return Err(CsndError::Config(format!(
                "optimality_gap must be non-negative, got {}",
                self.optimality_gap
            )));
        }
        Ok(())
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_secs.map(Duration::from_secs_f64)
    }

    pub fn solver_time_limit(&self) -> Option<Duration> {
        self.solver_time_limit_secs.map(Duration::from_secs_f64)
    }

    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            unsplittable: self.unsplittable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = DddConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.seed_travel_bounds);
        assert!(!config.upper_bound_probe);
        assert_eq!(config.time_limit(), None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let config = DddConfig {
            max_iterations: 0,
            ..DddConfig::default()
        };
        assert!(matches!(config.validate(), Err(CsndError::Config(_))));

        let config = DddConfig {
            solver_time_limit_secs: Some(-1.0),
            ..DddConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("solver_time_limit_secs"));

        let config = DddConfig {
            optimality_gap: f64::NAN,
            ..DddConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_config_deserializes() {
        let config: DddConfig =
            serde_json::from_str(r#"{"max_iterations": 7, "time_limit_secs": 1.5}"#).unwrap();
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.time_limit(), Some(Duration::from_millis(1500)));
        assert!(config.parallel);

        let unknown = serde_json::from_str::<DddConfig>(r#"{"max_iters": 7}"#);
        assert!(unknown.is_err());
    }
}
