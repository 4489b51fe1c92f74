use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{bundler::Profile, error::CoreError};

/// Scheduler settings, resolved once when the [`SchedulerContext`](crate::SchedulerContext) is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Driver-wide bundler template.
    pub load_balancing: LoadBalancingConfig,
    /// Longest time an idle channel sleeps before re-checking the queue without a wake-up.
    pub idle_poll_ms: u64,
    /// Refresh period for statistics exporters.
    pub stats_poll_interval_ms: u64,
    /// Ring-buffer size of the lifecycle notification feed.
    pub event_capacity: usize,
    /// Slice deadline for jobs whose SLA has none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_dispatch_timeout_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            load_balancing: LoadBalancingConfig::default(),
            idle_poll_ms: 1000,
            stats_poll_interval_ms: 2000,
            event_capacity: 1024,
            default_dispatch_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        let cfg: SchedulerConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.idle_poll_ms == 0 {
            return Err(CoreError::Config("idlePollMs must be positive".into()));
        }
        if self.stats_poll_interval_ms == 0 {
            return Err(CoreError::Config("statsPollIntervalMs must be positive".into()));
        }
        if self.load_balancing.algorithm.trim().is_empty() {
            return Err(CoreError::Config("load-balancing algorithm is empty".into()));
        }
        Ok(())
    }

    pub fn with_load_balancing(mut self, load_balancing: LoadBalancingConfig) -> Self {
        self.load_balancing = load_balancing;
        self
    }

    #[inline]
    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    #[inline]
    pub fn stats_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stats_poll_interval_ms)
    }
}

/// Bundler algorithm name plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoadBalancingConfig {
    pub algorithm: String,
    pub profile: Profile,
}

impl Default for LoadBalancingConfig {
    fn default() -> Self {
        Self::new("proportional")
    }
}

impl LoadBalancingConfig {
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            profile: Profile::default(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.profile = self.profile.with(key, value);
        self
    }
}
