use super::shard_interval::ShardInterval;
use crate::core::{MetadataError, PartitionMethod, Result};
use crate::types::builtin::INT4_TYPE;
use crate::types::{OrderingCapability, TypeGateway};
use std::cmp::Ordering;
use std::mem::discriminant;

/// Number of distinct 32-bit hash tokens.
pub const HASH_TOKEN_COUNT: u64 = 1 << 32;

/// Sorted shards of one table plus the facts derived from the sort.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedShards {
    pub sorted: Vec<ShardInterval>,
    /// Absent when there are no shards.
    pub comparator: Option<OrderingCapability>,
    pub has_uninitialized_shard_interval: bool,
    pub has_uniform_hash_distribution: bool,
}

impl ClassifiedShards {
    pub fn empty() -> Self {
        Self {
            sorted: Vec::new(),
            comparator: None,
            has_uninitialized_shard_interval: false,
            has_uniform_hash_distribution: false,
        }
    }
}

/// Sort a table's shards and derive the uninitialized/uniform flags.
pub fn classify(
    shards: Vec<ShardInterval>,
    method: PartitionMethod,
    gateway: &dyn TypeGateway,
) -> Result<ClassifiedShards> {
    if shards.is_empty() {
        return Ok(ClassifiedShards::empty());
    }

    let comparator = shard_comparator(&shards, method, gateway)?;
    let sorted = sort_shard_intervals(shards, &comparator)?;
    let has_uninitialized_shard_interval = has_uninitialized_shard_interval(&sorted);
    let has_uniform_hash_distribution =
        method == PartitionMethod::Hash && has_uniform_hash_distribution(&sorted);

    Ok(ClassifiedShards {
        sorted,
        comparator: Some(comparator),
        has_uninitialized_shard_interval,
        has_uniform_hash_distribution,
    })
}

/// HASH shards always order as 32-bit integers; other methods use the
/// ordering of the shards' value type. Callers pass at least one shard.
fn shard_comparator(
    shards: &[ShardInterval],
    method: PartitionMethod,
    gateway: &dyn TypeGateway,
) -> Result<OrderingCapability> {
    let type_id = match method {
        PartitionMethod::Hash => INT4_TYPE,
        PartitionMethod::Append | PartitionMethod::Range => shards[0].value_type_id,
    };
    gateway.resolve_ordering(type_id)
}

/// Bounded shards first, ascending by min value; unbounded shards last.
///
/// All bounds must hold the same kind of value. The sort is stable and a
/// comparator error ends it with that error.
pub fn sort_shard_intervals(
    shards: Vec<ShardInterval>,
    comparator: &OrderingCapability,
) -> Result<Vec<ShardInterval>> {
    check_bound_types(&shards)?;

    merge_sort_by(shards, &mut |left: &ShardInterval, right: &ShardInterval| {
        match (left.min_value(), right.min_value()) {
            (Some(l), Some(r)) => comparator.compare(l, r),
            (Some(_), None) => Ok(Ordering::Less),
            (None, Some(_)) => Ok(Ordering::Greater),
            (None, None) => Ok(Ordering::Equal),
        }
    })
}

fn check_bound_types(shards: &[ShardInterval]) -> Result<()> {
    let mut bounds = shards
        .iter()
        .filter_map(|shard| Some([shard.min_value()?, shard.max_value()?]))
        .flatten();

    let Some(first) = bounds.next() else {
        return Ok(());
    };
    match bounds.find(|value| discriminant(*value) != discriminant(first)) {
        Some(other) => Err(MetadataError::TypeMismatch(format!(
            "shard bounds mix {} and {}",
            first.type_name(),
            other.type_name()
        ))),
        None => Ok(()),
    }
}

fn merge_sort_by<T>(
    mut items: Vec<T>,
    compare: &mut impl FnMut(&T, &T) -> Result<Ordering>,
) -> Result<Vec<T>> {
    if items.len() <= 1 {
        return Ok(items);
    }

    let right = items.split_off(items.len() / 2);
    let left = merge_sort_by(items, compare)?;
    let right = merge_sort_by(right, compare)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare(l, r)? != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_left { left.next() } else { right.next() });
    }
    Ok(merged)
}

/// Unbounded shards sort last, so looking at the final one is enough.
pub fn has_uninitialized_shard_interval(sorted: &[ShardInterval]) -> bool {
    sorted.last().is_some_and(|shard| !shard.is_bounded())
}

/// Canonical `(min, max)` token ranges for `shard_count` HASH shards.
///
/// The token space is cut into equal ranges of `2^32 / shard_count` tokens;
/// the last range ends at `i32::MAX` to absorb the remainder.
pub fn uniform_hash_ranges(shard_count: usize) -> Vec<(i32, i32)> {
    if shard_count == 0 {
        return Vec::new();
    }

    let increment = (HASH_TOKEN_COUNT / shard_count as u64) as i64;
    (0..shard_count)
        .map(|index| {
            let min = i64::from(i32::MIN) + index as i64 * increment;
            let max = if index == shard_count - 1 {
                i64::from(i32::MAX)
            } else {
                min + increment - 1
            };
            (min as i32, max as i32)
        })
        .collect()
}

/// Whether sorted HASH shards match the canonical layout exactly.
pub fn has_uniform_hash_distribution(sorted: &[ShardInterval]) -> bool {
    if sorted.is_empty() {
        return false;
    }

    sorted
        .iter()
        .zip(uniform_hash_ranges(sorted.len()))
        .all(|(shard, expected)| shard.hash_token_range() == Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Datum, ShardId, ShardStorageType, TableId, TypeId};
    use crate::metadata::shard_interval::ShardBounds;
    use crate::types::BuiltinTypes;

    fn shard(id: u64, bounds: Option<(Datum, Datum)>, type_id: TypeId) -> ShardInterval {
        ShardInterval {
            table_id: TableId(1),
            shard_id: ShardId(id),
            storage_type: ShardStorageType::Table,
            value_type_id: type_id,
            value_type_len: 4,
            value_is_fixed_size: true,
            bounds: bounds.map(|(min, max)| ShardBounds { min, max }),
        }
    }

    fn hash_shard(id: u64, min: i32, max: i32) -> ShardInterval {
        shard(id, Some((Datum::Int4(min), Datum::Int4(max))), INT4_TYPE)
    }

    fn canonical_hash_shards(count: usize) -> Vec<ShardInterval> {
        uniform_hash_ranges(count)
            .into_iter()
            .enumerate()
            .map(|(i, (min, max))| hash_shard(100 + i as u64, min, max))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let classified = classify(Vec::new(), PartitionMethod::Hash, &BuiltinTypes).unwrap();
        assert!(classified.sorted.is_empty());
        assert!(classified.comparator.is_none());
        assert!(!classified.has_uninitialized_shard_interval);
        assert!(!classified.has_uniform_hash_distribution);
    }

    #[test]
    fn test_range_shards_sort_with_unbounded_last() {
        let shards = vec![
            shard(3, None, INT4_TYPE),
            shard(2, Some((Datum::Int4(100), Datum::Int4(199))), INT4_TYPE),
            shard(1, Some((Datum::Int4(0), Datum::Int4(99))), INT4_TYPE),
        ];

        let classified = classify(shards, PartitionMethod::Range, &BuiltinTypes).unwrap();
        let order: Vec<u64> = classified.sorted.iter().map(|s| s.shard_id.0).collect();

        assert_eq!(order, vec![1, 2, 3]);
        assert!(classified.has_uninitialized_shard_interval);
        assert!(!classified.has_uniform_hash_distribution);
        assert_eq!(classified.comparator.unwrap().type_id(), INT4_TYPE);
    }

    #[test]
    fn test_four_canonical_hash_shards_are_uniform() {
        let quarter = 1i64 << 30;
        let min = i64::from(i32::MIN);
        let shards = vec![
            hash_shard(4, (min + 3 * quarter) as i32, i32::MAX),
            hash_shard(2, (min + quarter) as i32, (min + 2 * quarter - 1) as i32),
            hash_shard(1, i32::MIN, (min + quarter - 1) as i32),
            hash_shard(3, (min + 2 * quarter) as i32, (min + 3 * quarter - 1) as i32),
        ];

        let classified = classify(shards, PartitionMethod::Hash, &BuiltinTypes).unwrap();
        let order: Vec<u64> = classified.sorted.iter().map(|s| s.shard_id.0).collect();

        assert_eq!(order, vec![1, 2, 3, 4]);
        assert!(classified.has_uniform_hash_distribution);
        assert!(!classified.has_uninitialized_shard_interval);
    }

    #[test]
    fn test_uniform_ranges_absorb_rounding() {
        let ranges = uniform_hash_ranges(3);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].0, i32::MIN);
        assert_eq!(ranges[1].0 as i64, ranges[0].1 as i64 + 1);
        assert_eq!(ranges[2].1, i32::MAX);
        assert_eq!(uniform_hash_ranges(1), vec![(i32::MIN, i32::MAX)]);
        assert!(uniform_hash_ranges(0).is_empty());
    }

    #[test]
    fn test_single_bound_change_breaks_uniformity() {
        for count in [1usize, 2, 3, 4, 7, 32] {
            assert!(has_uniform_hash_distribution(&canonical_hash_shards(count)));

            for victim in 0..count {
                // overlap with the next range, or a gap before the end
                for delta in [1i32, -1] {
                    let mut shards = canonical_hash_shards(count);
                    let (min, max) = shards[victim].hash_token_range().unwrap();
                    let Some(new_max) = max.checked_add(delta) else {
                        continue;
                    };
                    shards[victim] = hash_shard(shards[victim].shard_id.0, min, new_max);
                    assert!(
                        !has_uniform_hash_distribution(&shards),
                        "count={} victim={} delta={}",
                        count,
                        victim,
                        delta
                    );
                }
            }
        }
    }

    #[test]
    fn test_uniformity_only_for_hash_method() {
        let classified =
            classify(canonical_hash_shards(4), PartitionMethod::Range, &BuiltinTypes).unwrap();
        assert!(!classified.has_uniform_hash_distribution);
    }

    #[test]
    fn test_unbounded_hash_shard_breaks_uniformity() {
        let mut shards = canonical_hash_shards(2);
        shards.push(shard(9, None, INT4_TYPE));

        let classified = classify(shards, PartitionMethod::Hash, &BuiltinTypes).unwrap();
        assert!(classified.has_uninitialized_shard_interval);
        assert!(!classified.has_uniform_hash_distribution);
        assert_eq!(classified.sorted.last().unwrap().shard_id, ShardId(9));
    }

    #[test]
    fn test_incomparable_bounds_fail_the_sort() {
        let shards = vec![
            shard(1, Some((Datum::Int4(1), Datum::Int4(2))), INT4_TYPE),
            shard(2, Some((Datum::Text("a".into()), Datum::Text("b".into()))), INT4_TYPE),
        ];
        assert!(matches!(
            classify(shards, PartitionMethod::Range, &BuiltinTypes),
            Err(MetadataError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_mixed_bound_types_are_rejected_before_sorting() {
        // Min and max of one shard disagree; the mins alone would compare.
        let shards = vec![
            shard(1, Some((Datum::Int4(5), Datum::Int8(9))), INT4_TYPE),
            shard(2, Some((Datum::Int4(1), Datum::Int4(2))), INT4_TYPE),
        ];
        let comparator = BuiltinTypes.resolve_ordering(INT4_TYPE).unwrap();
        assert!(matches!(
            sort_shard_intervals(shards, &comparator),
            Err(MetadataError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_comparator_error_ends_sort() {
        fn only_small(left: &Datum, right: &Datum) -> Result<Ordering> {
            match (left.as_i32(), right.as_i32()) {
                (Some(l), Some(r)) if l < 1000 && r < 1000 => Ok(l.cmp(&r)),
                _ => Err(MetadataError::TypeMismatch("value too large".into())),
            }
        }

        let comparator = OrderingCapability::new(INT4_TYPE, only_small);
        let shards: Vec<ShardInterval> = (0..64)
            .map(|i| hash_shard(i, (i as i32 * 37) % 1100, 2000))
            .collect();
        assert!(matches!(
            sort_shard_intervals(shards, &comparator),
            Err(MetadataError::TypeMismatch(_))
        ));

        let shards: Vec<ShardInterval> = (0..64)
            .map(|i| hash_shard(i, (i as i32 * 37) % 997, 2000))
            .collect();
        let sorted = sort_shard_intervals(shards, &comparator).unwrap();
        let mins: Vec<i32> = sorted.iter().filter_map(|s| s.min_value()?.as_i32()).collect();
        assert!(mins.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_equal_minimums_keep_input_order() {
        let shards = vec![hash_shard(7, 0, 10), hash_shard(3, 0, 20), hash_shard(5, -5, 0)];
        let comparator = BuiltinTypes.resolve_ordering(INT4_TYPE).unwrap();
        let order: Vec<u64> = sort_shard_intervals(shards, &comparator)
            .unwrap()
            .iter()
            .map(|s| s.shard_id.0)
            .collect();
        assert_eq!(order, vec![5, 7, 3]);
    }
}
