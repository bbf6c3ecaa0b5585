use super::catalog::{CatalogFixture, NodeRow, PartitionRow, ShardRow};
use super::engine::{CatalogReader, CatalogWriter, ExtensionState};
use crate::config::RelationNames;
use crate::core::{MetadataError, NodeId, RelationId, Result, ShardId, TableId};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

/// Relation ids handed out by a fresh catalog start here.
const FIRST_RELATION_ID: u32 = 16384;

/// Which kind of catalog access a scan hook observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Partition,
    Shards,
    ShardPoint,
    Nodes,
}

/// Number of catalog accesses served so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCounts {
    pub partition_lookups: usize,
    pub shard_scans: usize,
    pub shard_lookups: usize,
    pub node_scans: usize,
}

impl ScanCounts {
    pub fn total(&self) -> usize {
        self.partition_lookups + self.shard_scans + self.shard_lookups + self.node_scans
    }
}

type ScanHook = Box<dyn Fn(ScanKind)>;

struct CatalogState {
    extension: ExtensionState,
    relations: HashMap<String, RelationId>,
    next_relation_id: u32,
    partitions: BTreeMap<TableId, PartitionRow>,
    /// Insertion order is the scan order.
    shards: Vec<ShardRow>,
    nodes: Vec<NodeRow>,
}

/// Single-session in-memory catalog.
///
/// Mutations take `&self` so a test can keep one handle for editing rows
/// while the cache holds another for reading. Dropping and recreating the
/// extension hands out new relation ids, which makes stale ids observable.
pub struct InMemoryCatalog {
    names: RelationNames,
    state: RefCell<CatalogState>,
    counts: Cell<ScanCounts>,
    scan_hook: RefCell<Option<ScanHook>>,
}

impl InMemoryCatalog {
    /// Catalog without the distribution layer installed
    pub fn new() -> Self {
        Self::with_relation_names(RelationNames::default())
    }

    pub fn with_relation_names(names: RelationNames) -> Self {
        Self {
            names,
            state: RefCell::new(CatalogState {
                extension: ExtensionState::Absent,
                relations: HashMap::new(),
                next_relation_id: FIRST_RELATION_ID,
                partitions: BTreeMap::new(),
                shards: Vec::new(),
                nodes: Vec::new(),
            }),
            counts: Cell::new(ScanCounts::default()),
            scan_hook: RefCell::new(None),
        }
    }

    /// Catalog with the distribution layer installed and no rows
    pub fn loaded() -> Self {
        let catalog = Self::new();
        catalog.create_extension();
        catalog
    }

    pub fn from_fixture(fixture: CatalogFixture, names: RelationNames) -> Self {
        let catalog = Self::with_relation_names(names);
        if fixture.loaded {
            catalog.create_extension();
        }
        {
            let mut state = catalog.state.borrow_mut();
            for row in fixture.partitions {
                state.partitions.insert(row.table_id, row);
            }
            state.shards = fixture.shards;
            state.nodes = fixture.nodes;
        }
        catalog
    }

    // ========================================================================
    // Extension lifecycle
    // ========================================================================

    /// Create the catalog relations and mark the extension as loaded
    pub fn create_extension(&self) {
        self.begin_create_extension();
        self.finish_create_extension();
    }

    /// Create the catalog relations; the extension stays in `Creating`
    pub fn begin_create_extension(&self) {
        let mut state = self.state.borrow_mut();
        state.relations.clear();
        for name in self.names.all() {
            let id = RelationId(state.next_relation_id);
            state.next_relation_id += 1;
            state.relations.insert(name.to_string(), id);
        }
        state.extension = ExtensionState::Creating;
    }

    pub fn finish_create_extension(&self) {
        self.state.borrow_mut().extension = ExtensionState::Loaded;
    }

    /// Drop the extension together with every catalog row
    pub fn drop_extension(&self) {
        let mut state = self.state.borrow_mut();
        state.extension = ExtensionState::Absent;
        state.relations.clear();
        state.partitions.clear();
        state.shards.clear();
        state.nodes.clear();
    }

    /// Current id of a relation, without counting as a catalog access
    pub fn relation_id(&self, name: &str) -> Option<RelationId> {
        self.state.borrow().relations.get(name).copied()
    }

    pub fn relation_names(&self) -> &RelationNames {
        &self.names
    }

    // ========================================================================
    // Row mutations
    // ========================================================================

    /// Insert or replace the partition record of a table
    pub fn upsert_partition(&self, row: PartitionRow) {
        self.state.borrow_mut().partitions.insert(row.table_id, row);
    }

    pub fn remove_partition(&self, table_id: TableId) -> Option<PartitionRow> {
        self.state.borrow_mut().partitions.remove(&table_id)
    }

    pub fn insert_shard(&self, row: ShardRow) {
        self.state.borrow_mut().shards.push(row);
    }

    /// Replace the bounds of a shard. Returns false if the shard is unknown.
    pub fn update_shard_bounds(
        &self,
        shard_id: ShardId,
        min_value: Option<String>,
        max_value: Option<String>,
    ) -> bool {
        let mut state = self.state.borrow_mut();
        match state.shards.iter_mut().find(|row| row.shard_id == shard_id) {
            Some(row) => {
                row.min_value = min_value;
                row.max_value = max_value;
                true
            }
            None => false,
        }
    }

    pub fn remove_shard(&self, shard_id: ShardId) -> Option<ShardRow> {
        let mut state = self.state.borrow_mut();
        let position = state.shards.iter().position(|row| row.shard_id == shard_id)?;
        Some(state.shards.remove(position))
    }

    pub fn insert_node(&self, row: NodeRow) {
        self.state.borrow_mut().nodes.push(row);
    }

    /// Flip the active flag of every row with `node_id`
    pub fn set_node_active(&self, node_id: NodeId, active: bool) -> bool {
        let mut state = self.state.borrow_mut();
        let mut found = false;
        for row in state.nodes.iter_mut().filter(|row| row.node_id == node_id) {
            row.active = active;
            found = true;
        }
        found
    }

    pub fn remove_node(&self, node_id: NodeId) -> usize {
        let mut state = self.state.borrow_mut();
        let before = state.nodes.len();
        state.nodes.retain(|row| row.node_id != node_id);
        before - state.nodes.len()
    }

    // ========================================================================
    // Instrumentation
    // ========================================================================

    pub fn scan_counts(&self) -> ScanCounts {
        self.counts.get()
    }

    pub fn reset_scan_counts(&self) {
        self.counts.set(ScanCounts::default());
    }

    /// Run `hook` at the start of every catalog scan, before rows are read.
    pub fn set_scan_hook(&self, hook: impl Fn(ScanKind) + 'static) {
        *self.scan_hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn clear_scan_hook(&self) {
        self.scan_hook.borrow_mut().take();
    }

    fn begin_scan(&self, kind: ScanKind) {
        let mut counts = self.counts.get();
        match kind {
            ScanKind::Partition => counts.partition_lookups += 1,
            ScanKind::Shards => counts.shard_scans += 1,
            ScanKind::ShardPoint => counts.shard_lookups += 1,
            ScanKind::Nodes => counts.node_scans += 1,
        }
        self.counts.set(counts);

        if let Some(hook) = self.scan_hook.borrow().as_ref() {
            hook(kind);
        }
    }

    fn check_relation(&self, state: &CatalogState, id: RelationId, name: &str) -> Result<()> {
        match state.relations.get(name) {
            Some(current) if *current == id => Ok(()),
            _ => Err(MetadataError::StaleRelation(id)),
        }
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogReader for InMemoryCatalog {
    fn extension_state(&self) -> ExtensionState {
        self.state.borrow().extension
    }

    fn resolve_relation(&self, name: &str) -> Option<RelationId> {
        self.relation_id(name)
    }

    fn lookup_partition(&self, index: RelationId, table_id: TableId) -> Result<Option<PartitionRow>> {
        self.begin_scan(ScanKind::Partition);
        let state = self.state.borrow();
        self.check_relation(&state, index, &self.names.partition_table_index)?;
        Ok(state.partitions.get(&table_id).cloned())
    }

    fn scan_shards(&self, index: RelationId, table_id: TableId) -> Result<Vec<ShardRow>> {
        self.begin_scan(ScanKind::Shards);
        let state = self.state.borrow();
        self.check_relation(&state, index, &self.names.shard_table_index)?;
        Ok(state
            .shards
            .iter()
            .filter(|row| row.table_id == table_id)
            .cloned()
            .collect())
    }

    fn lookup_shard(&self, index: RelationId, shard_id: ShardId) -> Result<Option<ShardRow>> {
        self.begin_scan(ScanKind::ShardPoint);
        let state = self.state.borrow();
        self.check_relation(&state, index, &self.names.shard_id_index)?;
        Ok(state
            .shards
            .iter()
            .find(|row| row.shard_id == shard_id)
            .cloned())
    }

    fn scan_nodes(&self, relation: RelationId) -> Result<Vec<NodeRow>> {
        self.begin_scan(ScanKind::Nodes);
        let state = self.state.borrow();
        self.check_relation(&state, relation, &self.names.node)?;
        Ok(state.nodes.clone())
    }
}

impl CatalogWriter for InMemoryCatalog {
    fn insert_node_row(&self, relation: RelationId, row: NodeRow) -> Result<()> {
        {
            let state = self.state.borrow();
            self.check_relation(&state, relation, &self.names.node)?;
        }
        self.insert_node(row);
        Ok(())
    }

    fn update_node_active(&self, relation: RelationId, node_id: NodeId, active: bool) -> Result<bool> {
        {
            let state = self.state.borrow();
            self.check_relation(&state, relation, &self.names.node)?;
        }
        Ok(self.set_node_active(node_id, active))
    }
}
