//! Canonical total ordering across `Value` variants.
//!
//! Null sorts before everything, then variants by stable rank, then within
//! one variant by the natural per-type ordering. Floats use IEEE total
//! ordering so the comparator stays total.

use crate::value::Value;
use std::cmp::Ordering;

pub(crate) const fn canonical_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Uint(_) => 3,
        Value::Float64(_) => 4,
        Value::Text(_) => 5,
        Value::Blob(_) => 6,
        Value::Timestamp(_) => 7,
        Value::Ulid(_) => 8,
    }
}

pub(crate) fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::Ulid(a), Value::Ulid(b)) => a.cmp(b),

        // Cross-variant: rank decides.
        _ => left.canonical_rank().cmp(&right.canonical_rank()),
    }
}
