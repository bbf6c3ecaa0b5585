use crate::config::CacheConfig;
use crate::core::{MetadataError, NodeId, RelationId, Result, ShardId, TableId};
use crate::metadata::{
    DistTableCacheEntry, IntervalType, InvalidationCoordinator, InvalidationHandle,
    InvalidationTarget, RegistryWarning, ShardInterval, TableMetadataCache, WorkerNodeMap,
    WorkerNodeRegistry, build_shard_interval, build_table_entry,
};
use crate::storage::{CatalogReader, CatalogWriter, NodeRow};
use crate::types::{BuiltinTypes, TypeGateway};
use log::{debug, info};
use std::sync::Arc;

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub active: bool,
    pub cached_tables: usize,
    pub valid_tables: usize,
    pub worker_nodes_built: bool,
}

/// Distribution metadata cache of one session.
///
/// Owns the table entries, the worker node map and the activation state.
/// Every operation first applies notifications received since the previous
/// one, so notifications delivered through an [`InvalidationHandle`] while
/// the service was busy take effect before anything is served.
///
/// # Examples
///
/// ```
/// use shardmeta::{InMemoryCatalog, MetadataCacheService, CacheConfig, TableId};
///
/// let catalog = InMemoryCatalog::loaded();
/// let mut cache = MetadataCacheService::new(catalog, CacheConfig::default());
///
/// assert!(!cache.is_distributed(TableId(42)).unwrap());
/// assert!(cache.get_metadata(TableId(42)).unwrap_err().is_not_distributed());
/// ```
pub struct MetadataCacheService<C: CatalogReader, G: TypeGateway = BuiltinTypes> {
    catalog: C,
    gateway: G,
    config: CacheConfig,
    coordinator: InvalidationCoordinator,
    tables: TableMetadataCache,
    nodes: WorkerNodeRegistry,
}

impl<C: CatalogReader> MetadataCacheService<C> {
    /// Create a cache over `catalog` using the built-in types.
    pub fn new(catalog: C, config: CacheConfig) -> Self {
        Self::with_gateway(catalog, BuiltinTypes, config)
    }
}

impl<C: CatalogReader, G: TypeGateway> MetadataCacheService<C, G> {
    pub fn with_gateway(catalog: C, gateway: G, config: CacheConfig) -> Self {
        Self {
            tables: TableMetadataCache::with_capacity(config.initial_table_capacity),
            coordinator: InvalidationCoordinator::new(config.relation_names.clone()),
            nodes: WorkerNodeRegistry::new(),
            catalog,
            gateway,
            config,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Handle for delivering notifications from outside the service,
    /// including from inside catalog scans.
    pub fn invalidation_handle(&self) -> InvalidationHandle {
        self.coordinator.handle()
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Whether the distribution layer is usable right now.
    pub fn is_active(&mut self) -> bool {
        self.apply_pending();
        self.coordinator.ensure_active(&self.catalog)
    }

    /// Cached entry for `table_id`, rebuilt from the catalog if needed.
    ///
    /// A table without a partition record yields a not-distributed entry.
    /// While the distribution layer is inactive the catalog is not read and
    /// nothing is cached.
    pub fn lookup(&mut self, table_id: TableId) -> Result<Arc<DistTableCacheEntry>> {
        if !self.is_active() {
            return Ok(Arc::new(DistTableCacheEntry::not_distributed(table_id)));
        }

        if let Some(entry) = self.tables.valid_entry(table_id) {
            return Ok(entry);
        }

        let entry = Arc::new(build_table_entry(
            table_id,
            &self.catalog,
            self.coordinator.relations_mut(),
            &self.gateway,
        )?);
        self.tables.store(Arc::clone(&entry));

        // Notifications that arrived during the rebuild apply to the entry
        // just stored.
        self.apply_pending();
        Ok(entry)
    }

    pub fn is_distributed(&mut self, table_id: TableId) -> Result<bool> {
        Ok(self.lookup(table_id)?.is_distributed_table())
    }

    /// Entry of a distributed table; `NotDistributed` otherwise.
    pub fn get_metadata(&mut self, table_id: TableId) -> Result<Arc<DistTableCacheEntry>> {
        let entry = self.lookup(table_id)?;
        if !entry.is_distributed_table() {
            return Err(MetadataError::NotDistributed(table_id));
        }
        Ok(entry)
    }

    /// Owner flag of the table's partition record; false if not distributed.
    pub fn is_table_owner(&mut self, table_id: TableId) -> Result<bool> {
        Ok(self.lookup(table_id)?.is_owner())
    }

    /// Read one shard by id, independent of its table.
    ///
    /// The owning table's entry supplies the type the bounds are read with,
    /// so that entry is loaded (and cached) as a side effect.
    pub fn load_shard_interval(&mut self, shard_id: ShardId) -> Result<ShardInterval> {
        if !self.is_active() {
            return Err(MetadataError::ExtensionNotLoaded);
        }

        let index = self.coordinator.relations_mut().shard_id_index(&self.catalog)?;
        let row = self
            .catalog
            .lookup_shard(index, shard_id)?
            .ok_or(MetadataError::ShardNotFound(shard_id))?;

        let entry = self.get_metadata(row.table_id)?;
        let (Some(method), Some(column)) = (entry.partition_method(), entry.partition_column())
        else {
            return Err(MetadataError::NotDistributed(row.table_id));
        };

        build_shard_interval(&row, IntervalType::for_method(method, column), &self.gateway)
    }

    /// Worker nodes by node id, built from the catalog on first access after
    /// an invalidation.
    pub fn get_worker_nodes(&mut self) -> Result<Arc<WorkerNodeMap>> {
        if !self.is_active() {
            return Err(MetadataError::ExtensionNotLoaded);
        }

        let relation = self.coordinator.relations_mut().node_relation(&self.catalog)?;
        let catalog = &self.catalog;
        let nodes = self.nodes.get_or_build(
            self.config.duplicate_node_policy,
            self.config.max_worker_nodes_tracked,
            || catalog.scan_nodes(relation),
        )?;

        self.apply_pending();
        Ok(nodes)
    }

    /// Warnings of the most recent node map build.
    pub fn worker_node_warnings(&self) -> &[RegistryWarning] {
        self.nodes.warnings()
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub fn notify_changed(&mut self, target: impl Into<InvalidationTarget>) {
        self.coordinator.handle().notify_changed(target);
        self.apply_pending();
    }

    pub fn notify_nodes_changed(&mut self) {
        self.coordinator.handle().notify_nodes_changed();
        self.apply_pending();
    }

    pub fn notify_partition_row_changed(&mut self, old: Option<TableId>, new: Option<TableId>) {
        self.coordinator
            .handle()
            .notify_partition_row_changed(old, new);
        self.apply_pending();
    }

    pub fn notify_shard_row_changed(&mut self, old: Option<TableId>, new: Option<TableId>) {
        self.coordinator.handle().notify_shard_row_changed(old, new);
        self.apply_pending();
    }

    pub fn notify_relation_changed(&mut self, relation_id: RelationId) {
        self.coordinator.handle().notify_relation_changed(relation_id);
        self.apply_pending();
    }

    /// End the current generation: deactivate, forget relation ids and
    /// invalidate every cached entry and the node map.
    pub fn reset(&mut self) {
        self.coordinator.reset(&mut self.tables, &mut self.nodes);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            active: self.coordinator.is_active(),
            cached_tables: self.tables.len(),
            valid_tables: self.tables.valid_count(),
            worker_nodes_built: self.nodes.is_built(),
        }
    }

    fn apply_pending(&mut self) {
        let pending = self
            .coordinator
            .apply_pending(&mut self.tables, &mut self.nodes);
        if pending.reset {
            debug!("partition relation changed, metadata cache reset");
        }
    }
}

impl<C: CatalogReader + CatalogWriter, G: TypeGateway> MetadataCacheService<C, G> {
    /// Add a worker node row, then drop the node map built from the old rows.
    pub fn insert_worker_node(&mut self, row: NodeRow) -> Result<()> {
        let relation = self.writable_node_relation()?;
        let node_id = row.node_id;
        self.catalog.insert_node_row(relation, row)?;
        info!("added worker node {}", node_id);
        self.notify_relation_changed(relation);
        Ok(())
    }

    /// Flip the active flag of an existing worker node.
    pub fn set_worker_node_active(&mut self, node_id: NodeId, active: bool) -> Result<()> {
        let relation = self.writable_node_relation()?;
        if !self.catalog.update_node_active(relation, node_id, active)? {
            return Err(MetadataError::NodeNotFound(node_id));
        }
        info!("worker node {} marked {}", node_id, if active { "active" } else { "inactive" });
        self.notify_relation_changed(relation);
        Ok(())
    }

    fn writable_node_relation(&mut self) -> Result<RelationId> {
        if !self.is_active() {
            return Err(MetadataError::ExtensionNotLoaded);
        }
        self.coordinator.relations_mut().node_relation(&self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryCatalog, PartitionRow, ShardRow};
    use crate::metadata::PartitionColumn;
    use crate::types::builtin::INT8_TYPE;
    use std::rc::Rc;

    fn range_table(catalog: &InMemoryCatalog, table_id: TableId) {
        catalog.upsert_partition(PartitionRow {
            table_id,
            partition_method: 'r',
            partition_key: PartitionColumn::new("id", 1, INT8_TYPE).encode(),
            is_owner: true,
            is_cluster: false,
        });
    }

    #[test]
    fn test_inactive_service_reads_nothing() {
        let catalog = Rc::new(InMemoryCatalog::new());
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        assert!(!cache.is_distributed(TableId(1)).unwrap());
        assert_eq!(
            cache.load_shard_interval(ShardId(1)),
            Err(MetadataError::ExtensionNotLoaded)
        );
        assert_eq!(catalog.scan_counts().total(), 0);
        assert_eq!(cache.stats().cached_tables, 0);
    }

    #[test]
    fn test_owner_flag() {
        let catalog = Rc::new(InMemoryCatalog::loaded());
        range_table(&catalog, TableId(1));
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        assert!(cache.is_table_owner(TableId(1)).unwrap());
        assert!(!cache.is_table_owner(TableId(2)).unwrap());
    }

    #[test]
    fn test_shard_interval_uses_table_type() {
        let catalog = Rc::new(InMemoryCatalog::loaded());
        range_table(&catalog, TableId(1));
        catalog.insert_shard(ShardRow::new(TableId(1), ShardId(10)).with_bounds("5", "9"));
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        let shard = cache.load_shard_interval(ShardId(10)).unwrap();
        assert_eq!(shard.value_type_id, INT8_TYPE);
        assert_eq!(shard.hash_token_range(), None);
        assert_eq!(
            cache.load_shard_interval(ShardId(11)),
            Err(MetadataError::ShardNotFound(ShardId(11)))
        );
    }

    #[test]
    fn test_stats_follow_notifications() {
        let catalog = Rc::new(InMemoryCatalog::loaded());
        range_table(&catalog, TableId(1));
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        cache.lookup(TableId(1)).unwrap();
        cache.lookup(TableId(2)).unwrap();
        assert_eq!(
            cache.stats(),
            CacheStats {
                active: true,
                cached_tables: 2,
                valid_tables: 2,
                worker_nodes_built: false,
            }
        );

        cache.notify_changed(TableId(2));
        assert_eq!(cache.stats().valid_tables, 1);

        cache.reset();
        let stats = cache.stats();
        assert!(!stats.active);
        assert_eq!(stats.valid_tables, 0);
        assert_eq!(stats.cached_tables, 2);
    }

    #[test]
    fn test_node_writes_drop_node_map() {
        let catalog = Rc::new(InMemoryCatalog::loaded());
        catalog.insert_node(NodeRow::new(NodeId(1), "worker-1", 5432));
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        assert_eq!(cache.get_worker_nodes().unwrap().len(), 1);

        cache
            .insert_worker_node(NodeRow::new(NodeId(2), "worker-2", 5432))
            .unwrap();
        assert!(!cache.stats().worker_nodes_built);
        assert_eq!(cache.get_worker_nodes().unwrap().len(), 2);

        cache.set_worker_node_active(NodeId(2), false).unwrap();
        let nodes = cache.get_worker_nodes().unwrap();
        assert!(!nodes[&NodeId(2)].active);
        assert_eq!(catalog.scan_counts().node_scans, 3);

        assert_eq!(
            cache.set_worker_node_active(NodeId(7), true),
            Err(MetadataError::NodeNotFound(NodeId(7)))
        );
        assert!(cache.stats().active);
    }

    #[test]
    fn test_node_writes_need_active_layer() {
        let catalog = Rc::new(InMemoryCatalog::new());
        let mut cache = MetadataCacheService::new(Rc::clone(&catalog), CacheConfig::default());

        assert_eq!(
            cache.insert_worker_node(NodeRow::new(NodeId(1), "worker-1", 5432)),
            Err(MetadataError::ExtensionNotLoaded)
        );
    }
}
