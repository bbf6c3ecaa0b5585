use crate::core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the worker node registry does when two node rows share a node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNodePolicy {
    /// Keep the row read last and record a warning.
    #[default]
    LastWriteWins,
    /// Fail the registry build.
    Reject,
}

/// Names of the catalog relations the cache reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationNames {
    pub partition: String,
    pub shard: String,
    pub shard_placement: String,
    pub node: String,
    pub partition_table_index: String,
    pub shard_table_index: String,
    pub shard_id_index: String,
    pub placement_shard_index: String,
}

impl Default for RelationNames {
    fn default() -> Self {
        Self {
            partition: "pg_dist_partition".to_string(),
            shard: "pg_dist_shard".to_string(),
            shard_placement: "pg_dist_shard_placement".to_string(),
            node: "pg_dist_node".to_string(),
            partition_table_index: "pg_dist_partition_logical_relid_index".to_string(),
            shard_table_index: "pg_dist_shard_logical_relid_index".to_string(),
            shard_id_index: "pg_dist_shard_shardid_index".to_string(),
            placement_shard_index: "pg_dist_shard_placement_shardid_index".to_string(),
        }
    }
}

impl RelationNames {
    /// All names, in the order relations are created by a fresh catalog.
    pub fn all(&self) -> [&str; 8] {
        [
            self.partition.as_str(),
            self.shard.as_str(),
            self.shard_placement.as_str(),
            self.node.as_str(),
            self.partition_table_index.as_str(),
            self.shard_table_index.as_str(),
            self.shard_id_index.as_str(),
            self.placement_shard_index.as_str(),
        ]
    }
}

/// Metadata cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Initial number of table entry slots
    pub initial_table_capacity: usize,

    /// Capacity hint for the worker node map
    pub max_worker_nodes_tracked: usize,

    /// Handling of node rows that collide on node id
    pub duplicate_node_policy: DuplicateNodePolicy,

    /// Catalog relation and index names
    pub relation_names: RelationNames,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self {
            initial_table_capacity: 32,
            max_worker_nodes_tracked: 2048,
            duplicate_node_policy: DuplicateNodePolicy::LastWriteWins,
            relation_names: RelationNames::default(),
        }
    }

    /// Set the initial table slot capacity
    pub fn initial_table_capacity(mut self, capacity: usize) -> Self {
        self.initial_table_capacity = capacity;
        self
    }

    /// Set the worker node capacity hint
    pub fn max_worker_nodes_tracked(mut self, max: usize) -> Self {
        self.max_worker_nodes_tracked = max;
        self
    }

    /// Set the duplicate node policy
    pub fn duplicate_node_policy(mut self, policy: DuplicateNodePolicy) -> Self {
        self.duplicate_node_policy = policy;
        self
    }

    /// Override the catalog relation names
    pub fn relation_names(mut self, names: RelationNames) -> Self {
        self.relation_names = names;
        self
    }

    /// Read a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
