use crate::core::{NodeId, Result, ShardId, TableId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Row of the partition table: one per distributed table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRow {
    pub table_id: TableId,
    /// Raw method code; decoded by the cache so unknown codes surface there.
    pub partition_method: char,
    /// Serialized partition key expression.
    pub partition_key: String,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub is_cluster: bool,
}

/// Row of the shard table. Bounds are stored as text and typed on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRow {
    pub table_id: TableId,
    pub shard_id: ShardId,
    #[serde(default = "default_storage_type")]
    pub storage_type: char,
    #[serde(default)]
    pub min_value: Option<String>,
    #[serde(default)]
    pub max_value: Option<String>,
}

fn default_storage_type() -> char {
    't'
}

impl ShardRow {
    pub fn new(table_id: TableId, shard_id: ShardId) -> Self {
        Self {
            table_id,
            shard_id,
            storage_type: default_storage_type(),
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_bounds(mut self, min: impl Into<String>, max: impl Into<String>) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    pub fn with_storage_type(mut self, storage_type: char) -> Self {
        self.storage_type = storage_type;
        self
    }
}

/// Row of the node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRow {
    pub node_id: NodeId,
    pub name: String,
    pub port: u32,
    #[serde(default = "default_node_role")]
    pub role: char,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub group_id: u32,
}

fn default_node_role() -> char {
    'p'
}

fn default_active() -> bool {
    true
}

impl NodeRow {
    pub fn new(node_id: NodeId, name: impl Into<String>, port: u32) -> Self {
        Self {
            node_id,
            name: name.into(),
            port,
            role: default_node_role(),
            active: default_active(),
            group_id: 0,
        }
    }

    pub fn with_group(mut self, group_id: u32) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Catalog contents as stored in a JSON fixture file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFixture {
    /// Whether the distribution layer is installed in the fixture.
    pub loaded: bool,
    pub partitions: Vec<PartitionRow>,
    pub shards: Vec<ShardRow>,
    pub nodes: Vec<NodeRow>,
}

impl CatalogFixture {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}
