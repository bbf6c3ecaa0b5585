pub mod classifier;
pub mod entry;
pub mod invalidation;
pub mod shard_interval;
pub mod table_cache;
pub mod worker_nodes;

pub use classifier::{ClassifiedShards, HASH_TOKEN_COUNT, classify, uniform_hash_ranges};
pub use entry::{CacheSlot, DistTableCacheEntry, TableDistribution};
pub use invalidation::{
    ActivationGate, CatalogRelation, CatalogRelations, InvalidationCoordinator, InvalidationHandle,
    InvalidationTarget, PendingInvalidations,
};
pub use shard_interval::{IntervalType, PartitionColumn, ShardBounds, ShardInterval, build_shard_interval};
pub use table_cache::{TableMetadataCache, build_table_entry};
pub use worker_nodes::{RegistryWarning, WorkerNode, WorkerNodeMap, WorkerNodeRegistry, build_worker_node_map};
