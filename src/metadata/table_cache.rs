use super::classifier::{ClassifiedShards, classify};
use super::entry::{CacheSlot, DistTableCacheEntry, TableDistribution};
use super::invalidation::CatalogRelations;
use super::shard_interval::{IntervalType, PartitionColumn, build_shard_interval};
use crate::core::{PartitionMethod, Result, TableId};
use crate::storage::CatalogReader;
use crate::types::TypeGateway;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Level, event, info_span};

/// Table id -> cache slot map. Owns every cached entry.
#[derive(Debug, Default)]
pub struct TableMetadataCache {
    slots: HashMap<TableId, CacheSlot>,
}

impl TableMetadataCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(capacity),
        }
    }

    /// Fast path: the entry for `table_id` if it is cached and valid.
    pub fn valid_entry(&self, table_id: TableId) -> Option<Arc<DistTableCacheEntry>> {
        self.slots
            .get(&table_id)
            .and_then(|slot| slot.valid_entry())
            .cloned()
    }

    pub fn slot(&self, table_id: TableId) -> Option<&CacheSlot> {
        self.slots.get(&table_id)
    }

    /// Store a freshly built entry as valid, replacing whatever was cached.
    pub fn store(&mut self, entry: Arc<DistTableCacheEntry>) {
        self.slots.insert(entry.table_id(), CacheSlot::Valid(entry));
    }

    /// Mark one entry stale. Unknown tables are ignored.
    pub fn invalidate(&mut self, table_id: TableId) -> bool {
        self.slots
            .get_mut(&table_id)
            .is_some_and(|slot| slot.invalidate())
    }

    /// Mark every entry stale. Returns how many were valid.
    pub fn invalidate_all(&mut self) -> usize {
        self.slots
            .values_mut()
            .map(|slot| slot.invalidate())
            .filter(|was_valid| *was_valid)
            .count()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn valid_count(&self) -> usize {
        self.slots.values().filter(|slot| slot.is_valid()).count()
    }
}

/// Read a table's partition and shard records and build a complete entry.
///
/// Nothing is written to the cache here; a failure leaves the caller's
/// cache untouched.
pub fn build_table_entry(
    table_id: TableId,
    catalog: &dyn CatalogReader,
    relations: &mut CatalogRelations,
    gateway: &dyn TypeGateway,
) -> Result<DistTableCacheEntry> {
    let span = info_span!("metadata.table.rebuild", table_id = %table_id);
    let _enter = span.enter();

    let partition_index = relations.partition_table_index(catalog)?;
    let Some(partition) = catalog.lookup_partition(partition_index, table_id)? else {
        event!(Level::DEBUG, "no partition record, caching as not distributed");
        return Ok(DistTableCacheEntry::not_distributed(table_id));
    };

    let partition_method = PartitionMethod::from_code(partition.partition_method)?;
    let partition_column = PartitionColumn::decode(&partition.partition_key)?;
    let interval = IntervalType::for_method(partition_method, &partition_column);

    let shard_index = relations.shard_table_index(catalog)?;
    let shard_rows = catalog.scan_shards(shard_index, table_id)?;

    let shards = if shard_rows.is_empty() {
        ClassifiedShards::empty()
    } else {
        let intervals = shard_rows
            .iter()
            .map(|row| build_shard_interval(row, interval, gateway))
            .collect::<Result<Vec<_>>>()?;
        classify(intervals, partition_method, gateway)?
    };

    let hash_function = match partition_method {
        PartitionMethod::Hash => Some(gateway.resolve_hash(partition_column.type_id)?),
        PartitionMethod::Append | PartitionMethod::Range => None,
    };

    event!(
        Level::DEBUG,
        method = %partition_method,
        shard_count = shards.sorted.len(),
        uninitialized = shards.has_uninitialized_shard_interval,
        uniform_hash = shards.has_uniform_hash_distribution,
        "table entry rebuilt"
    );

    Ok(DistTableCacheEntry::distributed(
        table_id,
        TableDistribution {
            partition_method,
            partition_key_expression: partition.partition_key,
            partition_column,
            is_owner: partition.is_owner,
            is_cluster: partition.is_cluster,
            shards,
            hash_function,
        },
    ))
}
