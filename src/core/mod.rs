pub mod error;
pub mod types;
pub mod value;

pub use error::{MetadataError, Result};
pub use types::{NodeId, NodeRole, PartitionMethod, RelationId, ShardId, ShardStorageType, TableId, TypeId};
pub use value::Datum;
