use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use crate::core::{MetadataError, Result};

/// A typed value produced by the type gateway from a textual shard bound.
#[derive(Debug, Clone)]
pub enum Datum {
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float8(f64),
    Text(String),
}

impl Datum {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int2(_) => "smallint",
            Self::Int4(_) => "integer",
            Self::Int8(_) => "bigint",
            Self::Float8(_) => "double precision",
            Self::Text(_) => "text",
        }
    }

    /// Hash tokens and HASH shard bounds are 32-bit integers.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int4(v) => Some(*v),
            Self::Int2(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int2(v) => Some(i64::from(*v)),
            Self::Int4(v) => Some(i64::from(*v)),
            Self::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is stored inline rather than behind a pointer.
    pub fn is_by_value(&self) -> bool {
        !matches!(self, Self::Text(_))
    }

    /// Same-type comparison. Values of different types never compare.
    pub fn compare(&self, other: &Datum) -> Result<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Ok(a.cmp(b)),
            (Self::Int2(a), Self::Int2(b)) => Ok(a.cmp(b)),
            (Self::Int4(a), Self::Int4(b)) => Ok(a.cmp(b)),
            (Self::Int8(a), Self::Int8(b)) => Ok(a.cmp(b)),
            (Self::Float8(a), Self::Float8(b)) => {
                // NaN sorts above every other value and equal to itself
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ok(Ordering::Equal),
                    (true, false) => Ok(Ordering::Greater),
                    (false, true) => Ok(Ordering::Less),
                    (false, false) => Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
                }
            }
            (Self::Text(a), Self::Text(b)) => Ok(a.cmp(b)),
            _ => Err(MetadataError::TypeMismatch(format!(
                "Cannot compare incompatible types: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float8(a), Self::Float8(b)) => {
                (a.is_nan() && b.is_nan()) || a == b
            }
            _ => matches!(self.compare(other), Ok(Ordering::Equal)),
        }
    }
}

impl Eq for Datum {}

impl Hash for Datum {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Bool(b) => {
                0u8.hash(state);
                b.hash(state);
            }
            Self::Int2(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Self::Int4(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Self::Int8(i) => {
                3u8.hash(state);
                i.hash(state);
            }
            Self::Float8(f) => {
                4u8.hash(state);
                float_bits(*f).hash(state);
            }
            Self::Text(s) => {
                5u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// Bit pattern shared by every float that compares equal: signed zeros map
/// to `0.0` and every NaN payload to the canonical NaN.
pub(crate) fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", if *b { "t" } else { "f" }),
            Self::Int2(i) => write!(f, "{}", i),
            Self::Int4(i) => write!(f, "{}", i),
            Self::Int8(i) => write!(f, "{}", i),
            Self::Float8(fl) => {
                if fl.is_nan() {
                    write!(f, "NaN")
                } else if fl.is_infinite() {
                    if *fl > 0.0 {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else {
                    write!(f, "{}", fl)
                }
            }
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Self {
        Self::Int4(i)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Self::Int8(i)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}
