//! Configuration for wordshard
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, WordShardError};

/// Main configuration for an engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Pool Sizes
    // -------------------------------------------------------------------------
    /// Number of mapper workers (lines are assigned by `line_index % mapper_count`)
    pub mapper_count: usize,

    /// Number of partitioner workers competing on the shared routing queue
    pub partitioner_count: usize,

    /// Number of reducer shards (fixed for the engine's lifetime)
    pub shard_count: usize,

    // -------------------------------------------------------------------------
    // Channel Configuration
    // -------------------------------------------------------------------------
    /// Capacity of every pipeline channel.
    /// 0 means rendezvous: each send blocks until a receiver takes it.
    pub channel_capacity: usize,

    // -------------------------------------------------------------------------
    // Query Configuration
    // -------------------------------------------------------------------------
    /// Deadline applied to `flush` / `query` / `query_all`. `None` blocks until answered.
    pub query_timeout: Option<Duration>,

    /// Flush in-flight words before every query, so a query sees every line
    /// accepted before it. When off, queries race with words still in transit.
    pub read_your_writes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mapper_count: 4,
            partitioner_count: 2,
            shard_count: 8,
            channel_capacity: 0,
            query_timeout: None,
            read_your_writes: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Create a config with the three pool sizes and defaults elsewhere
    pub fn with_counts(mapper_count: usize, partitioner_count: usize, shard_count: usize) -> Self {
        Self {
            mapper_count,
            partitioner_count,
            shard_count,
            ..Self::default()
        }
    }

    /// Reject configurations that cannot start a pipeline.
    ///
    /// Every pool needs at least one worker.
    pub fn validate(&self) -> Result<()> {
        let pools = [
            ("mapper_count", self.mapper_count),
            ("partitioner_count", self.partitioner_count),
            ("shard_count", self.shard_count),
        ];

        for (name, size) in pools {
            if size == 0 {
                return Err(WordShardError::Config(format!("{} must be at least 1", name)));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of mapper workers
    pub fn mapper_count(mut self, count: usize) -> Self {
        self.config.mapper_count = count;
        self
    }

    /// Set the number of partitioner workers
    pub fn partitioner_count(mut self, count: usize) -> Self {
        self.config.partitioner_count = count;
        self
    }

    /// Set the number of reducer shards
    pub fn shard_count(mut self, count: usize) -> Self {
        self.config.shard_count = count;
        self
    }

    /// Set the channel capacity (0 = rendezvous)
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the default query deadline
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = Some(timeout);
        self
    }

    /// Enable or disable the flush before every query
    pub fn read_your_writes(mut self, enabled: bool) -> Self {
        self.config.read_your_writes = enabled;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
