use crate::core::{Datum, MetadataError, PartitionMethod, Result, ShardId, ShardStorageType, TableId, TypeId};
use crate::storage::ShardRow;
use crate::types::TypeGateway;
use crate::types::builtin::INT4_TYPE;
use serde::{Deserialize, Serialize};

/// Decoded partition key expression: the distribution column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionColumn {
    pub column: String,
    pub attnum: i16,
    pub type_id: TypeId,
    #[serde(default = "no_type_mod")]
    pub type_mod: i32,
}

fn no_type_mod() -> i32 {
    -1
}

impl PartitionColumn {
    pub fn new(column: impl Into<String>, attnum: i16, type_id: TypeId) -> Self {
        Self {
            column: column.into(),
            attnum,
            type_id,
            type_mod: no_type_mod(),
        }
    }

    pub fn with_type_mod(mut self, type_mod: i32) -> Self {
        self.type_mod = type_mod;
        self
    }

    /// Decode a serialized partition key expression.
    pub fn decode(expression: &str) -> Result<Self> {
        serde_json::from_str(expression)
            .map_err(|e| MetadataError::InvalidPartitionKey(format!("{}: {}", expression, e)))
    }

    pub fn encode(&self) -> String {
        // Serializing a plain struct of strings and integers cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Type and modifier used to read a table's shard bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalType {
    pub type_id: TypeId,
    pub type_mod: i32,
}

impl IntervalType {
    /// HASH bounds are always hash tokens; APPEND and RANGE bounds use the
    /// distribution column's declared type.
    pub fn for_method(method: PartitionMethod, column: &PartitionColumn) -> Self {
        match method {
            PartitionMethod::Hash => Self {
                type_id: INT4_TYPE,
                type_mod: -1,
            },
            PartitionMethod::Append | PartitionMethod::Range => Self {
                type_id: column.type_id,
                type_mod: column.type_mod,
            },
        }
    }

    /// Resolve from the raw method code stored in a partition record.
    pub fn resolve(method_code: char, column: &PartitionColumn) -> Result<Self> {
        let method = PartitionMethod::from_code(method_code)?;
        Ok(Self::for_method(method, column))
    }
}

/// Typed bounds of a shard. Both ends are present or the shard is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardBounds {
    pub min: Datum,
    pub max: Datum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInterval {
    pub table_id: TableId,
    pub shard_id: ShardId,
    pub storage_type: ShardStorageType,
    pub value_type_id: TypeId,
    pub value_type_len: i16,
    pub value_is_fixed_size: bool,
    pub bounds: Option<ShardBounds>,
}

impl ShardInterval {
    pub fn min_value(&self) -> Option<&Datum> {
        self.bounds.as_ref().map(|b| &b.min)
    }

    pub fn max_value(&self) -> Option<&Datum> {
        self.bounds.as_ref().map(|b| &b.max)
    }

    pub fn min_value_exists(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn max_value_exists(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn is_bounded(&self) -> bool {
        self.bounds.is_some()
    }

    /// Bounds as hash tokens, if this is a bounded HASH shard.
    pub fn hash_token_range(&self) -> Option<(i32, i32)> {
        let bounds = self.bounds.as_ref()?;
        Some((bounds.min.as_i32()?, bounds.max.as_i32()?))
    }
}

/// Build a `ShardInterval` from a raw shard row.
///
/// Bounds are parsed only when both textual bounds are present; a row with
/// one missing bound is treated as unbounded.
pub fn build_shard_interval(
    row: &ShardRow,
    interval: IntervalType,
    gateway: &dyn TypeGateway,
) -> Result<ShardInterval> {
    let storage_type = ShardStorageType::from_code(row.storage_type)?;
    let info = gateway.type_info(interval.type_id)?;

    let bounds = match (&row.min_value, &row.max_value) {
        (Some(min_text), Some(max_text)) => Some(ShardBounds {
            min: gateway.parse_value(interval.type_id, interval.type_mod, min_text)?,
            max: gateway.parse_value(interval.type_id, interval.type_mod, max_text)?,
        }),
        _ => None,
    };

    Ok(ShardInterval {
        table_id: row.table_id,
        shard_id: row.shard_id,
        storage_type,
        value_type_id: interval.type_id,
        value_type_len: info.len,
        value_is_fixed_size: info.by_value,
        bounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BuiltinTypes;
    use crate::types::builtin::{TEXT_TYPE, VARCHAR_TYPE};

    fn int_column() -> PartitionColumn {
        PartitionColumn::new("id", 1, TypeId(20))
    }

    #[test]
    fn test_interval_type_per_method() {
        let column = PartitionColumn::new("name", 2, VARCHAR_TYPE).with_type_mod(8);

        let hash = IntervalType::resolve('h', &column).unwrap();
        assert_eq!(hash, IntervalType { type_id: INT4_TYPE, type_mod: -1 });

        let range = IntervalType::resolve('r', &column).unwrap();
        assert_eq!(range, IntervalType { type_id: VARCHAR_TYPE, type_mod: 8 });

        let append = IntervalType::resolve('a', &column).unwrap();
        assert_eq!(append.type_id, VARCHAR_TYPE);

        assert_eq!(
            IntervalType::resolve('x', &column),
            Err(MetadataError::UnsupportedPartitionMethod('x'))
        );
    }

    #[test]
    fn test_partition_column_roundtrip_and_defaults() {
        let column = PartitionColumn::decode(r#"{"column":"id","attnum":1,"type_id":23}"#).unwrap();
        assert_eq!(column.type_mod, -1);
        assert_eq!(PartitionColumn::decode(&column.encode()).unwrap(), column);
        assert!(matches!(
            PartitionColumn::decode("{VAR :varno 1}"),
            Err(MetadataError::InvalidPartitionKey(_))
        ));
    }

    #[test]
    fn test_build_bounded_interval() {
        let row = ShardRow::new(TableId(5), ShardId(500)).with_bounds("10", "20");
        let interval = IntervalType::for_method(PartitionMethod::Range, &int_column());
        let shard = build_shard_interval(&row, interval, &BuiltinTypes).unwrap();

        assert_eq!(shard.min_value(), Some(&Datum::Int8(10)));
        assert_eq!(shard.max_value(), Some(&Datum::Int8(20)));
        assert_eq!(shard.value_type_len, 8);
        assert!(shard.value_is_fixed_size);
        assert_eq!(shard.storage_type, ShardStorageType::Table);
    }

    #[test]
    fn test_single_missing_bound_leaves_shard_unbounded() {
        let mut row = ShardRow::new(TableId(5), ShardId(501));
        row.min_value = Some("not even a number".to_string());

        let interval = IntervalType::for_method(PartitionMethod::Append, &int_column());
        let shard = build_shard_interval(&row, interval, &BuiltinTypes).unwrap();

        assert!(!shard.min_value_exists());
        assert!(!shard.max_value_exists());
        assert!(shard.min_value().is_none());
    }

    #[test]
    fn test_text_bounds_are_variable_length() {
        let row = ShardRow::new(TableId(5), ShardId(502)).with_bounds("apple", "melon");
        let column = PartitionColumn::new("name", 2, TEXT_TYPE);
        let interval = IntervalType::for_method(PartitionMethod::Range, &column);
        let shard = build_shard_interval(&row, interval, &BuiltinTypes).unwrap();

        assert_eq!(shard.value_type_len, -1);
        assert!(!shard.value_is_fixed_size);
    }

    #[test]
    fn test_build_errors_propagate() {
        let interval = IntervalType { type_id: TypeId(4242), type_mod: -1 };
        let row = ShardRow::new(TableId(5), ShardId(503));
        assert_eq!(
            build_shard_interval(&row, interval, &BuiltinTypes),
            Err(MetadataError::UnknownType(TypeId(4242)))
        );

        let bad_storage = ShardRow::new(TableId(5), ShardId(504)).with_storage_type('q');
        let interval = IntervalType::for_method(PartitionMethod::Hash, &int_column());
        assert!(matches!(
            build_shard_interval(&bad_storage, interval, &BuiltinTypes),
            Err(MetadataError::CorruptCatalogRow(_))
        ));

        let bad_value = ShardRow::new(TableId(5), ShardId(505)).with_bounds("1", "two");
        assert!(matches!(
            build_shard_interval(&bad_value, interval, &BuiltinTypes),
            Err(MetadataError::InvalidTypedValue { .. })
        ));
    }
}
