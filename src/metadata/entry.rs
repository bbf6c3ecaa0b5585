use super::classifier::ClassifiedShards;
use super::shard_interval::{PartitionColumn, ShardInterval};
use crate::core::{PartitionMethod, TableId};
use crate::types::{HashCapability, OrderingCapability};
use std::sync::Arc;

/// Distribution metadata of a table that has a partition record.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDistribution {
    pub partition_method: PartitionMethod,
    /// Serialized partition key expression as stored in the catalog.
    pub partition_key_expression: String,
    pub partition_column: PartitionColumn,
    pub is_owner: bool,
    pub is_cluster: bool,
    pub shards: ClassifiedShards,
    /// Present only for HASH distributed tables.
    pub hash_function: Option<HashCapability>,
}

/// Cached metadata of one table.
///
/// Non-distributed tables are cached too so repeated checks stay cheap;
/// they carry no distribution data at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DistTableCacheEntry {
    table_id: TableId,
    distribution: Option<TableDistribution>,
}

impl DistTableCacheEntry {
    pub fn not_distributed(table_id: TableId) -> Self {
        Self {
            table_id,
            distribution: None,
        }
    }

    pub fn distributed(table_id: TableId, distribution: TableDistribution) -> Self {
        Self {
            table_id,
            distribution: Some(distribution),
        }
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    pub fn is_distributed_table(&self) -> bool {
        self.distribution.is_some()
    }

    pub fn distribution(&self) -> Option<&TableDistribution> {
        self.distribution.as_ref()
    }

    pub fn is_owner(&self) -> bool {
        self.distribution.as_ref().is_some_and(|d| d.is_owner)
    }

    pub fn is_cluster(&self) -> bool {
        self.distribution.as_ref().is_some_and(|d| d.is_cluster)
    }

    pub fn partition_method(&self) -> Option<PartitionMethod> {
        self.distribution.as_ref().map(|d| d.partition_method)
    }

    pub fn partition_key_expression(&self) -> Option<&str> {
        self.distribution
            .as_ref()
            .map(|d| d.partition_key_expression.as_str())
    }

    pub fn partition_column(&self) -> Option<&PartitionColumn> {
        self.distribution.as_ref().map(|d| &d.partition_column)
    }

    /// Shards sorted by min value, unbounded shards last.
    pub fn shard_intervals(&self) -> &[ShardInterval] {
        self.distribution
            .as_ref()
            .map(|d| d.shards.sorted.as_slice())
            .unwrap_or(&[])
    }

    pub fn shard_count(&self) -> usize {
        self.shard_intervals().len()
    }

    pub fn comparison_function(&self) -> Option<&OrderingCapability> {
        self.distribution
            .as_ref()
            .and_then(|d| d.shards.comparator.as_ref())
    }

    pub fn hash_function(&self) -> Option<&HashCapability> {
        self.distribution
            .as_ref()
            .and_then(|d| d.hash_function.as_ref())
    }

    pub fn has_uninitialized_shard_interval(&self) -> bool {
        self.distribution
            .as_ref()
            .is_some_and(|d| d.shards.has_uninitialized_shard_interval)
    }

    pub fn has_uniform_hash_distribution(&self) -> bool {
        self.distribution
            .as_ref()
            .is_some_and(|d| d.shards.has_uniform_hash_distribution)
    }
}

/// Slot of the table cache.
///
/// Invalidation only retags the slot; the stale entry is dropped when the
/// next successful rebuild replaces it.
#[derive(Debug, Clone)]
pub enum CacheSlot {
    Valid(Arc<DistTableCacheEntry>),
    Invalid(Arc<DistTableCacheEntry>),
}

impl CacheSlot {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn entry(&self) -> &Arc<DistTableCacheEntry> {
        match self {
            Self::Valid(entry) | Self::Invalid(entry) => entry,
        }
    }

    pub fn valid_entry(&self) -> Option<&Arc<DistTableCacheEntry>> {
        match self {
            Self::Valid(entry) => Some(entry),
            Self::Invalid(_) => None,
        }
    }

    /// Mark the slot stale. Returns true if it was valid before.
    pub fn invalidate(&mut self) -> bool {
        match self {
            Self::Valid(entry) => {
                let stale = Arc::clone(entry);
                *self = Self::Invalid(stale);
                true
            }
            Self::Invalid(_) => false,
        }
    }
}
