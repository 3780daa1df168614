//! Pipeline configuration
//!
//! Plain structs with defaults. They deserialize with serde so the embedding
//! engine can load them from its own configuration source.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::expression::Collation;

/// Default number of documents between lightweight safepoint checks
pub const DEFAULT_PIPE_SAFEPOINT_INTERVAL: usize = 100;

/// Default number of sort entries kept in memory before spilling
pub const DEFAULT_SORT_MEMORY_BUDGET: usize = 10_000;

/// External sort settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortConfig {
    /// Entries buffered in memory before a container is spilled (min 1)
    pub memory_budget: usize,
    /// Directory for spilled containers; the system temp dir when unset
    pub spill_dir: Option<PathBuf>,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_SORT_MEMORY_BUDGET,
            spill_dir: None,
        }
    }
}

impl SortConfig {
    /// Config spilling into `dir` after `memory_budget` entries
    pub fn spill_to(dir: impl Into<PathBuf>, memory_budget: usize) -> Self {
        Self {
            memory_budget,
            spill_dir: Some(dir.into()),
        }
    }

    /// Effective budget, never below one entry
    pub fn budget(&self) -> usize {
        self.memory_budget.max(1)
    }
}

/// Query pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Collation used by filters and sorting. Reference lookups follow the
    /// referenced index's own collation.
    pub collation: Collation,
    /// Documents between `safepoint_for_pipes` calls; 0 disables them
    pub pipe_safepoint_interval: usize,
    /// External sort settings
    pub sort: SortConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collation: Collation::ordinal(),
            pipe_safepoint_interval: DEFAULT_PIPE_SAFEPOINT_INTERVAL,
            sort: SortConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Replaces the collation
    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    /// Replaces the sort settings
    pub fn with_sort(mut self, sort: SortConfig) -> Self {
        self.sort = sort;
        self
    }

    /// Replaces the safepoint interval
    pub fn with_pipe_safepoint_interval(mut self, interval: usize) -> Self {
        self.pipe_safepoint_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.collation, Collation::ordinal());
        assert_eq!(config.pipe_safepoint_interval, 100);
        assert_eq!(config.sort.memory_budget, 10_000);
        assert!(config.sort.spill_dir.is_none());
    }

    #[test]
    fn test_budget_floor() {
        let sort = SortConfig::spill_to("/tmp/spill", 0);
        assert_eq!(sort.budget(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"collation": {"ignore_case": true}, "sort": {"memory_budget": 8}}"#)
                .unwrap();
        assert!(config.collation.ignore_case);
        assert_eq!(config.sort.memory_budget, 8);
        assert_eq!(config.pipe_safepoint_interval, 100);
    }
}
