//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Knobs for one orchestrator (`[engine]` in `ztpflow.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Switches worked on at once within a stage; 0 means all of them
    pub max_concurrency: usize,
    /// Upper bound for one action attempt, in seconds; 0 disables it
    pub action_timeout_secs: u64,
    /// Stop the run after a stage ends in a fatal failure
    pub abort_on_fatal: bool,
    /// Buffer of the progress event channel
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 0,
            action_timeout_secs: 300,
            abort_on_fatal: false,
            event_channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Per-attempt timeout, if enabled
    #[must_use]
    pub fn action_timeout(&self) -> Option<Duration> {
        (self.action_timeout_secs > 0).then(|| Duration::from_secs(self.action_timeout_secs))
    }

    /// Batch size for a stage over `hosts` switches
    #[must_use]
    pub fn concurrency_for(&self, hosts: usize) -> usize {
        match self.max_concurrency {
            0 => hosts.max(1),
            n => n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.action_timeout(), Some(Duration::from_secs(300)));
        assert!(!config.abort_on_fatal);
        assert_eq!(config.concurrency_for(7), 7);
    }

    #[test]
    fn test_zero_timeout_disables_it() {
        let config = EngineConfig {
            action_timeout_secs: 0,
            max_concurrency: 2,
            ..EngineConfig::default()
        };
        assert_eq!(config.action_timeout(), None);
        assert_eq!(config.concurrency_for(7), 2);
        assert_eq!(EngineConfig::default().concurrency_for(0), 1);
    }
}
