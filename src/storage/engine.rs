use super::catalog::{NodeRow, PartitionRow, ShardRow};
use crate::core::{NodeId, RelationId, Result, ShardId, TableId};
use std::rc::Rc;

/// Installation state of the distribution layer in the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionState {
    Absent,
    /// Installation script is still running; catalog tables may be partial.
    Creating,
    Loaded,
}

/// Catalog reader trait - the read side of the distribution catalog.
///
/// Every scan names the relation or index it reads through, using ids
/// previously obtained from `resolve_relation`. Implementations reject ids
/// they no longer know with `MetadataError::StaleRelation`.
pub trait CatalogReader {
    /// Probe whether the distribution layer is installed
    fn extension_state(&self) -> ExtensionState;

    /// Resolve a relation or index name to its current id
    fn resolve_relation(&self, name: &str) -> Option<RelationId>;

    /// Point lookup of a partition record through the partition-by-table index
    fn lookup_partition(&self, index: RelationId, table_id: TableId) -> Result<Option<PartitionRow>>;

    /// Range scan of shard records through the shard-by-table index
    fn scan_shards(&self, index: RelationId, table_id: TableId) -> Result<Vec<ShardRow>>;

    /// Point lookup of a shard record through the shard-by-id index
    fn lookup_shard(&self, index: RelationId, shard_id: ShardId) -> Result<Option<ShardRow>>;

    /// Unfiltered scan of the node relation
    fn scan_nodes(&self, relation: RelationId) -> Result<Vec<NodeRow>>;
}

/// Write side of the node relation.
///
/// Writers only change rows; invalidating what the cache built from them is
/// up to the caller.
pub trait CatalogWriter {
    /// Append a node row
    fn insert_node_row(&self, relation: RelationId, row: NodeRow) -> Result<()>;

    /// Set the active flag of the rows keyed by `node_id`; false if there are none
    fn update_node_active(&self, relation: RelationId, node_id: NodeId, active: bool) -> Result<bool>;
}

impl<T: CatalogReader + ?Sized> CatalogReader for Rc<T> {
    fn extension_state(&self) -> ExtensionState {
        (**self).extension_state()
    }

    fn resolve_relation(&self, name: &str) -> Option<RelationId> {
        (**self).resolve_relation(name)
    }

    fn lookup_partition(&self, index: RelationId, table_id: TableId) -> Result<Option<PartitionRow>> {
        (**self).lookup_partition(index, table_id)
    }

    fn scan_shards(&self, index: RelationId, table_id: TableId) -> Result<Vec<ShardRow>> {
        (**self).scan_shards(index, table_id)
    }

    fn lookup_shard(&self, index: RelationId, shard_id: ShardId) -> Result<Option<ShardRow>> {
        (**self).lookup_shard(index, shard_id)
    }

    fn scan_nodes(&self, relation: RelationId) -> Result<Vec<NodeRow>> {
        (**self).scan_nodes(relation)
    }
}

impl<T: CatalogWriter + ?Sized> CatalogWriter for Rc<T> {
    fn insert_node_row(&self, relation: RelationId, row: NodeRow) -> Result<()> {
        (**self).insert_node_row(relation, row)
    }

    fn update_node_active(&self, relation: RelationId, node_id: NodeId, active: bool) -> Result<bool> {
        (**self).update_node_active(relation, node_id, active)
    }
}
