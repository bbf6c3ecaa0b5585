use super::{CompareFn, HashCapability, HashFn, OrderingCapability, TypeGateway, TypeInfo};
use crate::core::value::float_bits;
use crate::core::{Datum, MetadataError, Result, TypeId};
use lazy_static::lazy_static;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const BOOL_TYPE: TypeId = TypeId(16);
pub const INT8_TYPE: TypeId = TypeId(20);
pub const INT2_TYPE: TypeId = TypeId(21);
pub const INT4_TYPE: TypeId = TypeId(23);
pub const TEXT_TYPE: TypeId = TypeId(25);
pub const FLOAT8_TYPE: TypeId = TypeId(701);
pub const VARCHAR_TYPE: TypeId = TypeId(1043);

type ParseFn = fn(&str, i32) -> Result<Datum>;

struct BuiltinType {
    info: TypeInfo,
    parse: ParseFn,
    compare: CompareFn,
    hash: HashFn,
}

lazy_static! {
    static ref BUILTIN_TYPES: HashMap<TypeId, BuiltinType> = {
        let mut types = HashMap::new();
        register(&mut types, BOOL_TYPE, "boolean", 1, true, parse_bool);
        register(&mut types, INT2_TYPE, "smallint", 2, true, parse_int2);
        register(&mut types, INT4_TYPE, "integer", 4, true, parse_int4);
        register(&mut types, INT8_TYPE, "bigint", 8, true, parse_int8);
        register(&mut types, FLOAT8_TYPE, "double precision", 8, true, parse_float8);
        register(&mut types, TEXT_TYPE, "text", -1, false, parse_text);
        register(&mut types, VARCHAR_TYPE, "character varying", -1, false, parse_varchar);
        types
    };
}

fn register(
    types: &mut HashMap<TypeId, BuiltinType>,
    type_id: TypeId,
    name: &'static str,
    len: i16,
    by_value: bool,
    parse: ParseFn,
) {
    types.insert(
        type_id,
        BuiltinType {
            info: TypeInfo {
                type_id,
                name,
                len,
                by_value,
            },
            parse,
            compare: compare_datums,
            hash: hash_datum,
        },
    );
}

/// Gateway over the built-in scalar types.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTypes;

impl BuiltinTypes {
    pub fn new() -> Self {
        Self
    }

    fn lookup(&self, type_id: TypeId) -> Result<&'static BuiltinType> {
        BUILTIN_TYPES
            .get(&type_id)
            .ok_or(MetadataError::UnknownType(type_id))
    }
}

impl TypeGateway for BuiltinTypes {
    fn type_info(&self, type_id: TypeId) -> Result<TypeInfo> {
        Ok(self.lookup(type_id)?.info)
    }

    fn parse_value(&self, type_id: TypeId, type_mod: i32, text: &str) -> Result<Datum> {
        (self.lookup(type_id)?.parse)(text, type_mod)
    }

    fn resolve_ordering(&self, type_id: TypeId) -> Result<OrderingCapability> {
        Ok(OrderingCapability::new(type_id, self.lookup(type_id)?.compare))
    }

    fn resolve_hash(&self, type_id: TypeId) -> Result<HashCapability> {
        Ok(HashCapability::new(type_id, self.lookup(type_id)?.hash))
    }
}

fn invalid(type_name: &'static str, input: &str, reason: impl Into<String>) -> MetadataError {
    MetadataError::InvalidTypedValue {
        type_name,
        input: input.to_string(),
        reason: reason.into(),
    }
}

fn parse_bool(text: &str, _type_mod: i32) -> Result<Datum> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Datum::Bool(true)),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(Datum::Bool(false)),
        _ => Err(invalid("boolean", text, "expected a boolean literal")),
    }
}

fn parse_int2(text: &str, _type_mod: i32) -> Result<Datum> {
    text.trim()
        .parse::<i16>()
        .map(Datum::Int2)
        .map_err(|e| invalid("smallint", text, e.to_string()))
}

fn parse_int4(text: &str, _type_mod: i32) -> Result<Datum> {
    text.trim()
        .parse::<i32>()
        .map(Datum::Int4)
        .map_err(|e| invalid("integer", text, e.to_string()))
}

fn parse_int8(text: &str, _type_mod: i32) -> Result<Datum> {
    text.trim()
        .parse::<i64>()
        .map(Datum::Int8)
        .map_err(|e| invalid("bigint", text, e.to_string()))
}

fn parse_float8(text: &str, _type_mod: i32) -> Result<Datum> {
    text.trim()
        .parse::<f64>()
        .map(Datum::Float8)
        .map_err(|e| invalid("double precision", text, e.to_string()))
}

fn parse_text(text: &str, _type_mod: i32) -> Result<Datum> {
    Ok(Datum::Text(text.to_string()))
}

/// `type_mod` is the maximum length in characters. Excess trailing spaces
/// are truncated, anything else over the limit is rejected.
fn parse_varchar(text: &str, type_mod: i32) -> Result<Datum> {
    let Ok(max_len) = usize::try_from(type_mod) else {
        return Ok(Datum::Text(text.to_string()));
    };

    if text.chars().count() <= max_len {
        return Ok(Datum::Text(text.to_string()));
    }

    let kept: String = text.chars().take(max_len).collect();
    let rest: String = text.chars().skip(max_len).collect();
    if rest.chars().all(|c| c == ' ') {
        Ok(Datum::Text(kept))
    } else {
        Err(invalid(
            "character varying",
            text,
            format!("value too long for type character varying({})", max_len),
        ))
    }
}

fn compare_datums(left: &Datum, right: &Datum) -> Result<Ordering> {
    left.compare(right)
}

const FNV_OFFSET: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Integers of every width hash through their 64-bit value so equal values
/// produce equal tokens regardless of declared width.
fn hash_datum(value: &Datum) -> Result<i32> {
    let hash = match value {
        Datum::Bool(b) => fnv1a(&[*b as u8]),
        Datum::Int2(_) | Datum::Int4(_) | Datum::Int8(_) => {
            let wide = value.as_i64().unwrap_or_default();
            fnv1a(&wide.to_le_bytes())
        }
        Datum::Float8(f) => fnv1a(&float_bits(*f).to_le_bytes()),
        Datum::Text(s) => fnv1a(s.as_bytes()),
    };
    Ok(((hash >> 32) ^ hash) as u32 as i32)
}
