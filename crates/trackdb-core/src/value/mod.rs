mod compare;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use ulid::Ulid;

///
/// Value
///
/// Boxed scalar value for one property slot.
///
/// Null → the slot holds no value (i.e., SQL NULL).
/// Every other variant carries exactly one scalar; collections and
/// navigations are not values, they live on the instance graph.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Value {
    Blob(Vec<u8>),
    Bool(bool),
    Float64(f64),
    Int(i64),
    Null,
    Text(String),
    Timestamp(DateTime<Utc>),
    Uint(u64),
    Ulid(Ulid),
}

impl Value {
    /// Returns the kind tag for a non-null value, `None` for `Null`.
    #[must_use]
    pub const fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Blob(_) => Some(ValueKind::Blob),
            Self::Bool(_) => Some(ValueKind::Bool),
            Self::Float64(_) => Some(ValueKind::Float64),
            Self::Int(_) => Some(ValueKind::Int),
            Self::Null => None,
            Self::Text(_) => Some(ValueKind::Text),
            Self::Timestamp(_) => Some(ValueKind::Timestamp),
            Self::Uint(_) => Some(ValueKind::Uint),
            Self::Ulid(_) => Some(ValueKind::Ulid),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_text(&self) -> Option<&str> {
        if let Self::Text(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        if let Self::Int(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_uint(&self) -> Option<u64> {
        if let Self::Uint(u) = self {
            Some(*u)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn as_ulid(&self) -> Option<Ulid> {
        if let Self::Ulid(u) = self {
            Some(*u)
        } else {
            None
        }
    }

    /// Total canonical comparator used by the identity map and key tuples.
    #[must_use]
    pub fn canonical_cmp(left: &Self, right: &Self) -> Ordering {
        compare::canonical_cmp(left, right)
    }

    /// Stable canonical rank used for cross-variant ordering.
    #[must_use]
    pub(crate) const fn canonical_rank(&self) -> u8 {
        compare::canonical_rank(self)
    }
}

// Float slots compare bitwise so that stores and snapshots can be `Eq`;
// canonical_cmp is the ordering authority, not IEEE comparison.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a.to_bits() == b.to_bits(),
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Ulid(a), Self::Ulid(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

#[macro_export]
macro_rules! impl_value_from_for {
    ( $( $type:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$type> for Value {
                fn from(v: $type) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from_for! {
    bool              => Bool,
    f32               => Float64,
    f64               => Float64,
    i8                => Int,
    i16               => Int,
    i32               => Int,
    i64               => Int,
    &str              => Text,
    String            => Text,
    u8                => Uint,
    u16               => Uint,
    u32               => Uint,
    u64               => Uint,
    Ulid              => Ulid,
    Vec<u8>           => Blob,
    DateTime<Utc>     => Timestamp,
}

impl<T> From<Option<T>> for Value
where
    T: Into<Self>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

///
/// ValueKind
///
/// Runtime type tag for one property slot. Slot writes are checked against
/// the declared kind; `Null` has no kind and is governed by nullability.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ValueKind {
    Blob,
    Bool,
    Float64,
    Int,
    Text,
    Timestamp,
    Uint,
    Ulid,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Blob => "blob",
            Self::Bool => "bool",
            Self::Float64 => "float64",
            Self::Int => "int",
            Self::Text => "text",
            Self::Timestamp => "timestamp",
            Self::Uint => "uint",
            Self::Ulid => "ulid",
        };
        write!(f, "{label}")
    }
}
