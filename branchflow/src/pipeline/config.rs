//! Pipeline configuration.

use crate::errors::BranchflowError;
use serde::{Deserialize, Serialize};

/// Configuration for a [`Pipeline`](super::Pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of runs in flight during a concurrent replay.
    pub max_concurrent_runs: usize,
    /// Log the frozen topology as JSON at debug level.
    pub log_topology_on_freeze: bool,
    /// Warn when a single run takes longer than this many milliseconds.
    pub slow_run_warn_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            log_topology_on_freeze: false,
            slow_run_warn_ms: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvalidConfig`] if the JSON is malformed or
    /// the result fails [`PipelineConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, BranchflowError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BranchflowError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the concurrent run bound.
    #[must_use]
    pub fn with_max_concurrent_runs(mut self, runs: usize) -> Self {
        self.max_concurrent_runs = runs;
        self
    }

    /// Enables topology logging on freeze.
    #[must_use]
    pub fn with_topology_logging(mut self, enabled: bool) -> Self {
        self.log_topology_on_freeze = enabled;
        self
    }

    /// Sets the slow run threshold.
    #[must_use]
    pub fn with_slow_run_warn_ms(mut self, threshold_ms: u64) -> Self {
        self.slow_run_warn_ms = Some(threshold_ms);
        self
    }

    /// Checks the config.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvalidConfig`] if `max_concurrent_runs` is 0.
    pub fn validate(&self) -> Result<(), BranchflowError> {
        if self.max_concurrent_runs == 0 {
            return Err(BranchflowError::InvalidConfig(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
