use super::{MetadataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! catalog_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            pub fn as_raw(&self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }
    };
}

catalog_id!(
    /// Identifier of a (possibly distributed) table; the cache key.
    TableId(u32)
);
catalog_id!(
    /// Globally unique shard identifier.
    ShardId(u64)
);
catalog_id!(
    /// Unique key of a worker node row.
    NodeId(u32)
);
catalog_id!(
    /// Identifier of a value type known to the type gateway.
    TypeId(u32)
);
catalog_id!(
    /// Identifier of a catalog relation or index.
    RelationId(u32)
);

/// Strategy used to assign rows to shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionMethod {
    Append,
    Range,
    Hash,
}

impl PartitionMethod {
    pub const APPEND_CODE: char = 'a';
    pub const RANGE_CODE: char = 'r';
    pub const HASH_CODE: char = 'h';

    /// Decode the single-character method stored in partition records.
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            Self::APPEND_CODE => Ok(Self::Append),
            Self::RANGE_CODE => Ok(Self::Range),
            Self::HASH_CODE => Ok(Self::Hash),
            other => Err(MetadataError::UnsupportedPartitionMethod(other)),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Append => Self::APPEND_CODE,
            Self::Range => Self::RANGE_CODE,
            Self::Hash => Self::HASH_CODE,
        }
    }
}

impl fmt::Display for PartitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "APPEND"),
            Self::Range => write!(f, "RANGE"),
            Self::Hash => write!(f, "HASH"),
        }
    }
}

/// How a shard's data is stored on its placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardStorageType {
    Table,
    Foreign,
    Columnar,
}

impl ShardStorageType {
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            't' => Ok(Self::Table),
            'f' => Ok(Self::Foreign),
            'c' => Ok(Self::Columnar),
            other => Err(MetadataError::CorruptCatalogRow(format!(
                "unknown shard storage type '{}'",
                other
            ))),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Table => 't',
            Self::Foreign => 'f',
            Self::Columnar => 'c',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    Primary,
    Secondary,
}

impl NodeRole {
    pub fn from_code(code: char) -> Result<Self> {
        match code {
            'p' => Ok(Self::Primary),
            's' => Ok(Self::Secondary),
            other => Err(MetadataError::CorruptCatalogRow(format!(
                "unknown node role '{}'",
                other
            ))),
        }
    }

    pub fn code(&self) -> char {
        match self {
            Self::Primary => 'p',
            Self::Secondary => 's',
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_method_codes() {
        assert_eq!(PartitionMethod::from_code('a').unwrap(), PartitionMethod::Append);
        assert_eq!(PartitionMethod::from_code('r').unwrap(), PartitionMethod::Range);
        assert_eq!(PartitionMethod::from_code('h').unwrap(), PartitionMethod::Hash);
        assert_eq!(PartitionMethod::Hash.code(), 'h');
    }

    #[test]
    fn test_unknown_partition_method() {
        assert_eq!(
            PartitionMethod::from_code('x'),
            Err(MetadataError::UnsupportedPartitionMethod('x'))
        );
    }

    #[test]
    fn test_storage_type_and_role_codes() {
        assert_eq!(ShardStorageType::from_code('f').unwrap(), ShardStorageType::Foreign);
        assert!(ShardStorageType::from_code('z').is_err());
        assert_eq!(NodeRole::from_code('s').unwrap(), NodeRole::Secondary);
        assert!(matches!(
            NodeRole::from_code('?'),
            Err(MetadataError::CorruptCatalogRow(_))
        ));
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&ShardId(102008)).unwrap();
        assert_eq!(json, "102008");
        let table: TableId = serde_json::from_str("42").unwrap();
        assert_eq!(table, TableId(42));
    }
}
