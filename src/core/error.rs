use super::types::{NodeId, RelationId, ShardId, TableId, TypeId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("relation {0} is not distributed")]
    NotDistributed(TableId),

    #[error("could not find valid entry for shard {0}")]
    ShardNotFound(ShardId),

    #[error("unsupported table partition type: {0}")]
    UnsupportedPartitionMethod(char),

    #[error("cache lookup failed for type {0}")]
    UnknownType(TypeId),

    #[error("invalid input syntax for type {type_name}: \"{input}\" ({reason})")]
    InvalidTypedValue {
        type_name: &'static str,
        input: String,
        reason: String,
    },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid partition key expression: {0}")]
    InvalidPartitionKey(String),

    #[error("cache lookup failed for {0}, called too early?")]
    RelationLookupFailed(String),

    #[error("relation {0} no longer exists in the catalog")]
    StaleRelation(RelationId),

    #[error("corrupt catalog row: {0}")]
    CorruptCatalogRow(String),

    #[error("could not find valid entry for node {0}")]
    NodeNotFound(NodeId),

    #[error("multiple rows for worker node {0}")]
    DuplicateWorkerNode(NodeId),

    #[error("distribution metadata is not available: extension not loaded")]
    ExtensionNotLoaded,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;

impl MetadataError {
    /// Errors that callers are expected to branch on rather than propagate.
    pub fn is_not_distributed(&self) -> bool {
        matches!(self, Self::NotDistributed(_))
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
