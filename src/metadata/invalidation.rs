// ============================================================================
// Invalidation Coordinator
// ============================================================================
//
// Notifications only flip flags in a shared inbox. They may arrive at any
// time, including from inside a catalog scan that is part of a rebuild, so
// nothing here frees or rebuilds state synchronously. The service drains the
// inbox at well-defined points and applies it to the caches.
//
// Table ids are classified when they are applied, against the relation ids
// resolved at that moment: the partition relation ends the generation and the
// node relation drops the worker node map.
//
// The activation gate and the resolved relation ids form one generation:
// a change to the partition relation itself ends the generation and both
// are re-established on the next access.
//
// ============================================================================

use super::table_cache::TableMetadataCache;
use super::worker_nodes::WorkerNodeRegistry;
use crate::config::RelationNames;
use crate::core::{MetadataError, RelationId, Result, TableId};
use crate::storage::{CatalogReader, ExtensionState};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

// ============================================================================
// Notification targets
// ============================================================================

/// Scope of a table notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationTarget {
    Table(TableId),
    /// Every cached table.
    All,
}

impl From<TableId> for InvalidationTarget {
    fn from(table_id: TableId) -> Self {
        Self::Table(table_id)
    }
}

// ============================================================================
// Inbox and handle
// ============================================================================

#[derive(Debug, Default)]
struct Inbox {
    all_tables: Cell<bool>,
    nodes: Cell<bool>,
    tables: RefCell<HashSet<TableId>>,
}

/// Everything notified since the last drain.
///
/// `reset` is only set by [`InvalidationCoordinator::apply_pending`], once
/// the table ids have been classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingInvalidations {
    pub reset: bool,
    pub all_tables: bool,
    pub nodes: bool,
    pub tables: Vec<TableId>,
}

impl PendingInvalidations {
    pub fn is_empty(&self) -> bool {
        !self.reset && !self.all_tables && !self.nodes && self.tables.is_empty()
    }
}

/// Cloneable entry point for change notifications.
///
/// Safe to call from anywhere in the session, including scan callbacks.
#[derive(Debug, Clone, Default)]
pub struct InvalidationHandle {
    inbox: Rc<Inbox>,
}

impl InvalidationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_changed(&self, target: impl Into<InvalidationTarget>) {
        match target.into() {
            InvalidationTarget::Table(table_id) => {
                self.inbox.tables.borrow_mut().insert(table_id);
            }
            InvalidationTarget::All => self.inbox.all_tables.set(true),
        }
    }

    pub fn notify_all_changed(&self) {
        self.notify_changed(InvalidationTarget::All);
    }

    pub fn notify_nodes_changed(&self) {
        self.inbox.nodes.set(true);
    }

    /// A partition row changed. Both the old and the new owning table are
    /// invalidated when they differ.
    pub fn notify_partition_row_changed(&self, old: Option<TableId>, new: Option<TableId>) {
        self.notify_row_changed(old, new);
    }

    /// A shard row changed; same rules as partition rows.
    pub fn notify_shard_row_changed(&self, old: Option<TableId>, new: Option<TableId>) {
        self.notify_row_changed(old, new);
    }

    fn notify_row_changed(&self, old: Option<TableId>, new: Option<TableId>) {
        if let Some(old) = old {
            if Some(old) != new {
                self.notify_changed(old);
            }
        }
        if let Some(new) = new {
            self.notify_changed(new);
        }
    }

    /// Notification keyed by a raw relation id.
    ///
    /// Relation ids and table ids share one id space, so this is the same
    /// as a table notification.
    pub fn notify_relation_changed(&self, relation_id: RelationId) {
        self.notify_changed(TableId(relation_id.as_raw()));
    }

    pub fn has_pending(&self) -> bool {
        self.inbox.all_tables.get()
            || self.inbox.nodes.get()
            || !self.inbox.tables.borrow().is_empty()
    }

    /// Take everything notified so far, leaving the inbox empty.
    pub fn drain(&self) -> PendingInvalidations {
        let mut tables: Vec<TableId> = self.inbox.tables.borrow_mut().drain().collect();
        tables.sort();
        PendingInvalidations {
            reset: false,
            all_tables: self.inbox.all_tables.replace(false),
            nodes: self.inbox.nodes.replace(false),
            tables,
        }
    }
}

// ============================================================================
// Resolved catalog relations
// ============================================================================

/// Catalog relations and indexes the cache reads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogRelation {
    Partition,
    Shard,
    ShardPlacement,
    Node,
    PartitionTableIndex,
    ShardTableIndex,
    ShardIdIndex,
    PlacementShardIndex,
}

impl CatalogRelation {
    const COUNT: usize = 8;

    fn slot(self) -> usize {
        self as usize
    }

    pub fn name(self, names: &RelationNames) -> &str {
        match self {
            Self::Partition => names.partition.as_str(),
            Self::Shard => names.shard.as_str(),
            Self::ShardPlacement => names.shard_placement.as_str(),
            Self::Node => names.node.as_str(),
            Self::PartitionTableIndex => names.partition_table_index.as_str(),
            Self::ShardTableIndex => names.shard_table_index.as_str(),
            Self::ShardIdIndex => names.shard_id_index.as_str(),
            Self::PlacementShardIndex => names.placement_shard_index.as_str(),
        }
    }
}

/// Lazily resolved relation ids, cached until the next reset.
#[derive(Debug, Clone)]
pub struct CatalogRelations {
    names: RelationNames,
    resolved: [Option<RelationId>; CatalogRelation::COUNT],
}

impl CatalogRelations {
    pub fn new(names: RelationNames) -> Self {
        Self {
            names,
            resolved: [None; CatalogRelation::COUNT],
        }
    }

    pub fn names(&self) -> &RelationNames {
        &self.names
    }

    pub fn resolve(
        &mut self,
        relation: CatalogRelation,
        catalog: &dyn CatalogReader,
    ) -> Result<RelationId> {
        if let Some(id) = self.resolved[relation.slot()] {
            return Ok(id);
        }

        let name = relation.name(&self.names);
        let id = catalog
            .resolve_relation(name)
            .ok_or_else(|| MetadataError::RelationLookupFailed(name.to_string()))?;
        self.resolved[relation.slot()] = Some(id);
        Ok(id)
    }

    /// The cached id, without asking the catalog.
    pub fn cached(&self, relation: CatalogRelation) -> Option<RelationId> {
        self.resolved[relation.slot()]
    }

    pub fn partition_table_index(&mut self, catalog: &dyn CatalogReader) -> Result<RelationId> {
        self.resolve(CatalogRelation::PartitionTableIndex, catalog)
    }

    pub fn shard_table_index(&mut self, catalog: &dyn CatalogReader) -> Result<RelationId> {
        self.resolve(CatalogRelation::ShardTableIndex, catalog)
    }

    pub fn shard_id_index(&mut self, catalog: &dyn CatalogReader) -> Result<RelationId> {
        self.resolve(CatalogRelation::ShardIdIndex, catalog)
    }

    pub fn node_relation(&mut self, catalog: &dyn CatalogReader) -> Result<RelationId> {
        self.resolve(CatalogRelation::Node, catalog)
    }

    pub fn reset(&mut self) {
        self.resolved = [None; CatalogRelation::COUNT];
    }
}

// ============================================================================
// Activation gate
// ============================================================================

/// Remembers a positive activation check; a negative one is re-probed.
#[derive(Debug, Default)]
pub struct ActivationGate {
    active: bool,
}

impl ActivationGate {
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Probe the catalog unless already known to be active.
    ///
    /// On becoming active the partition relation is resolved right away so
    /// a later notification about it is recognised as a reset.
    pub fn check(
        &mut self,
        catalog: &dyn CatalogReader,
        relations: &mut CatalogRelations,
    ) -> bool {
        if self.active {
            return true;
        }

        if catalog.extension_state() != ExtensionState::Loaded {
            return false;
        }

        match relations.resolve(CatalogRelation::Partition, catalog) {
            Ok(_) => {
                info!("distribution metadata became available");
                self.active = true;
                true
            }
            Err(err) => {
                warn!("extension reported loaded but {}", err);
                false
            }
        }
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Owns the generation state and applies drained notifications.
#[derive(Debug)]
pub struct InvalidationCoordinator {
    handle: InvalidationHandle,
    gate: ActivationGate,
    relations: CatalogRelations,
}

impl InvalidationCoordinator {
    pub fn new(names: RelationNames) -> Self {
        Self {
            handle: InvalidationHandle::new(),
            gate: ActivationGate::default(),
            relations: CatalogRelations::new(names),
        }
    }

    pub fn handle(&self) -> InvalidationHandle {
        self.handle.clone()
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn relations_mut(&mut self) -> &mut CatalogRelations {
        &mut self.relations
    }

    pub fn ensure_active(&mut self, catalog: &dyn CatalogReader) -> bool {
        self.gate.check(catalog, &mut self.relations)
    }

    /// Apply everything notified since the last call.
    ///
    /// A table id naming the partition relation ends the generation; one
    /// naming the node relation drops the worker node map. Ids the current
    /// generation has not resolved are plain table notifications.
    pub fn apply_pending(
        &mut self,
        tables: &mut TableMetadataCache,
        nodes: &mut WorkerNodeRegistry,
    ) -> PendingInvalidations {
        let mut pending = self.handle.drain();
        if pending.is_empty() {
            return pending;
        }

        let partition = self.relations.cached(CatalogRelation::Partition);
        let node = self.relations.cached(CatalogRelation::Node);
        for table_id in &pending.tables {
            let relation_id = Some(RelationId(table_id.as_raw()));
            if relation_id == partition {
                pending.reset = true;
            } else if relation_id == node {
                pending.nodes = true;
            }
        }

        if pending.reset {
            self.reset(tables, nodes);
            return pending;
        }

        if pending.all_tables {
            let count = tables.invalidate_all();
            debug!("invalidated all {} cached table entries", count);
        } else {
            for table_id in &pending.tables {
                if tables.invalidate(*table_id) {
                    debug!("invalidated cached entry for table {}", table_id);
                }
            }
        }

        if pending.nodes {
            nodes.invalidate();
            debug!("dropped worker node map");
        }

        pending
    }

    /// End the current generation.
    pub fn reset(&mut self, tables: &mut TableMetadataCache, nodes: &mut WorkerNodeRegistry) {
        self.gate.deactivate();
        self.relations.reset();
        let count = tables.invalidate_all();
        nodes.invalidate();
        debug!(
            "metadata generation reset: {} table entries invalidated, relation ids dropped",
            count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::entry::DistTableCacheEntry;
    use crate::storage::InMemoryCatalog;
    use std::sync::Arc;

    fn cached(ids: &[u32]) -> TableMetadataCache {
        let mut cache = TableMetadataCache::default();
        for id in ids {
            cache.store(Arc::new(DistTableCacheEntry::not_distributed(TableId(*id))));
        }
        cache
    }

    #[test]
    fn test_row_change_invalidates_old_and_new_owner() {
        let handle = InvalidationHandle::new();
        handle.notify_shard_row_changed(Some(TableId(1)), Some(TableId(2)));
        handle.notify_partition_row_changed(None, Some(TableId(3)));
        handle.notify_partition_row_changed(Some(TableId(4)), None);
        handle.notify_shard_row_changed(Some(TableId(5)), Some(TableId(5)));

        let pending = handle.drain();
        assert_eq!(
            pending.tables,
            vec![TableId(1), TableId(2), TableId(3), TableId(4), TableId(5)]
        );
        assert!(!handle.has_pending());
    }

    #[test]
    fn test_clones_share_one_inbox() {
        let handle = InvalidationHandle::new();
        let other = handle.clone();
        other.notify_nodes_changed();
        assert!(handle.has_pending());
        assert!(handle.drain().nodes);
        assert!(!other.has_pending());
    }

    #[test]
    fn test_relation_notifications_are_classified() {
        let catalog = InMemoryCatalog::loaded();
        let mut coordinator = InvalidationCoordinator::new(RelationNames::default());
        let handle = coordinator.handle();
        let mut tables = cached(&[1]);
        let mut nodes = WorkerNodeRegistry::new();

        // Nothing resolved yet: a plain table notification.
        let partition = catalog.relation_id("pg_dist_partition").unwrap();
        handle.notify_relation_changed(partition);
        let pending = coordinator.apply_pending(&mut tables, &mut nodes);
        assert!(!pending.reset);
        assert_eq!(pending.tables, vec![TableId(partition.as_raw())]);

        assert!(coordinator.ensure_active(&catalog));
        let node = catalog.relation_id("pg_dist_node").unwrap();

        // The node relation is only known once something resolved it.
        handle.notify_relation_changed(node);
        assert!(!coordinator.apply_pending(&mut tables, &mut nodes).nodes);

        coordinator.relations_mut().node_relation(&catalog).unwrap();
        handle.notify_relation_changed(node);
        let pending = coordinator.apply_pending(&mut tables, &mut nodes);
        assert!(pending.nodes);
        assert!(!pending.reset);
        assert_eq!(tables.valid_count(), 1);

        // Table-keyed notifications are classified the same way.
        handle.notify_changed(TableId(partition.as_raw()));
        assert!(coordinator.apply_pending(&mut tables, &mut nodes).reset);
        assert!(!coordinator.is_active());
    }

    #[test]
    fn test_node_relation_resolved_after_activation() {
        let catalog = InMemoryCatalog::loaded();
        let mut coordinator = InvalidationCoordinator::new(RelationNames::default());
        let handle = coordinator.handle();
        let mut tables = TableMetadataCache::default();
        let mut nodes = WorkerNodeRegistry::new();

        assert!(coordinator.ensure_active(&catalog));
        assert!(coordinator.relations_mut().cached(CatalogRelation::Node).is_none());

        let node = coordinator.relations_mut().node_relation(&catalog).unwrap();
        handle.notify_relation_changed(node);
        let pending = coordinator.apply_pending(&mut tables, &mut nodes);
        assert!(pending.nodes);
        assert!(coordinator.is_active());
    }

    #[test]
    fn test_gate_only_caches_positive_result() {
        let catalog = InMemoryCatalog::new();
        let mut relations = CatalogRelations::new(RelationNames::default());
        let mut gate = ActivationGate::default();

        assert!(!gate.check(&catalog, &mut relations));
        catalog.begin_create_extension();
        assert!(!gate.check(&catalog, &mut relations));
        catalog.finish_create_extension();
        assert!(gate.check(&catalog, &mut relations));
        assert!(relations.cached(CatalogRelation::Partition).is_some());

        // Stays active without probing again.
        catalog.drop_extension();
        assert!(gate.check(&catalog, &mut relations));
    }

    #[test]
    fn test_missing_relation_name_fails_lookup() {
        let catalog = InMemoryCatalog::loaded();
        let mut names = RelationNames::default();
        names.shard_id_index = "no_such_index".to_string();
        let mut relations = CatalogRelations::new(names);

        assert_eq!(
            relations.shard_id_index(&catalog),
            Err(MetadataError::RelationLookupFailed("no_such_index".to_string()))
        );
        assert!(relations.shard_table_index(&catalog).is_ok());
    }

    #[test]
    fn test_apply_point_and_wildcard() {
        let mut coordinator = InvalidationCoordinator::new(RelationNames::default());
        let handle = coordinator.handle();
        let mut tables = cached(&[1, 2, 3]);
        let mut nodes = WorkerNodeRegistry::new();

        handle.notify_changed(TableId(2));
        handle.notify_changed(TableId(42));
        coordinator.apply_pending(&mut tables, &mut nodes);
        assert_eq!(tables.valid_count(), 2);
        assert!(tables.valid_entry(TableId(2)).is_none());

        handle.notify_all_changed();
        coordinator.apply_pending(&mut tables, &mut nodes);
        assert_eq!(tables.valid_count(), 0);
    }

    #[test]
    fn test_reset_ends_generation() {
        let catalog = InMemoryCatalog::loaded();
        let mut coordinator = InvalidationCoordinator::new(RelationNames::default());
        let handle = coordinator.handle();
        let mut tables = cached(&[1, 2]);
        let mut nodes = WorkerNodeRegistry::new();

        assert!(coordinator.ensure_active(&catalog));
        let partition = catalog.relation_id("pg_dist_partition").unwrap();
        handle.notify_relation_changed(partition);

        let pending = coordinator.apply_pending(&mut tables, &mut nodes);
        assert!(pending.reset);
        assert!(!coordinator.is_active());
        assert_eq!(tables.valid_count(), 0);
        assert!(coordinator.relations_mut().cached(CatalogRelation::Partition).is_none());

        // Ids from the ended generation no longer trigger a reset.
        handle.notify_relation_changed(partition);
        assert!(!coordinator.apply_pending(&mut tables, &mut nodes).reset);
    }
}
