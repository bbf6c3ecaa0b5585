// ============================================================================
// Type Gateway
// ============================================================================
//
// Turns textual shard bounds into typed datums and resolves per-type
// ordering and hashing. The cache treats these as opaque capabilities: an
// entry stores whichever capability it was built with and never asks the
// gateway again until it is rebuilt.
//
// ============================================================================

pub mod builtin;

pub use builtin::BuiltinTypes;

use crate::core::{Datum, Result, TypeId};
use std::cmp::Ordering;
use std::fmt;

pub type CompareFn = fn(&Datum, &Datum) -> Result<Ordering>;
pub type HashFn = fn(&Datum) -> Result<i32>;

/// Storage characteristics of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub name: &'static str,
    /// Fixed length in bytes, or -1 for variable length values.
    pub len: i16,
    pub by_value: bool,
}

/// Ordering procedure resolved for a type.
#[derive(Clone, Copy)]
pub struct OrderingCapability {
    type_id: TypeId,
    compare: CompareFn,
}

impl OrderingCapability {
    pub fn new(type_id: TypeId, compare: CompareFn) -> Self {
        Self { type_id, compare }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn compare(&self, left: &Datum, right: &Datum) -> Result<Ordering> {
        (self.compare)(left, right)
    }
}

impl fmt::Debug for OrderingCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderingCapability")
            .field("type_id", &self.type_id)
            .finish()
    }
}

impl PartialEq for OrderingCapability {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Hash procedure mapping a value of one type to a 32-bit hash token.
#[derive(Clone, Copy)]
pub struct HashCapability {
    type_id: TypeId,
    hash: HashFn,
}

impl HashCapability {
    pub fn new(type_id: TypeId, hash: HashFn) -> Self {
        Self { type_id, hash }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn hash_token(&self, value: &Datum) -> Result<i32> {
        (self.hash)(value)
    }
}

impl fmt::Debug for HashCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashCapability")
            .field("type_id", &self.type_id)
            .finish()
    }
}

impl PartialEq for HashCapability {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

/// Type services consumed by the metadata cache.
///
/// Every method fails with `MetadataError::UnknownType` when the type
/// cannot be resolved.
pub trait TypeGateway {
    fn type_info(&self, type_id: TypeId) -> Result<TypeInfo>;

    /// Parse `text` as a value of `type_id`, honouring the type modifier
    /// (`-1` means none).
    fn parse_value(&self, type_id: TypeId, type_mod: i32, text: &str) -> Result<Datum>;

    fn resolve_ordering(&self, type_id: TypeId) -> Result<OrderingCapability>;

    fn resolve_hash(&self, type_id: TypeId) -> Result<HashCapability>;
}
