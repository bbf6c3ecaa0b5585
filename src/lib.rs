// ============================================================================
// shardmeta Library
// ============================================================================
//
// Session-local cache of distribution metadata: which tables are
// distributed, how their shards are laid out, and which worker nodes exist.
// Entries are built lazily from the catalog and invalidated by change
// notifications.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod metadata;
pub mod storage;
pub mod types;

// Re-export main types for convenience
pub use config::{CacheConfig, DuplicateNodePolicy, RelationNames};
pub use core::{
    Datum, MetadataError, NodeId, NodeRole, PartitionMethod, RelationId, Result, ShardId,
    ShardStorageType, TableId, TypeId,
};
pub use facade::{CacheStats, MetadataCacheService};
pub use metadata::{
    DistTableCacheEntry, InvalidationHandle, InvalidationTarget, PartitionColumn,
    RegistryWarning, ShardInterval, WorkerNode, WorkerNodeMap,
};
pub use storage::{CatalogFixture, CatalogReader, CatalogWriter, ExtensionState, InMemoryCatalog};
pub use types::{BuiltinTypes, TypeGateway};
