use crate::value::{Value, ValueKind};
use std::cmp::Ordering;
use ulid::Ulid;

#[test]
fn kind_is_none_for_null_only() {
    assert_eq!(Value::Null.kind(), None);
    assert_eq!(Value::Bool(true).kind(), Some(ValueKind::Bool));
    assert_eq!(Value::Text("x".to_string()).kind(), Some(ValueKind::Text));
    assert_eq!(Value::Ulid(Ulid::from(9)).kind(), Some(ValueKind::Ulid));
}

#[test]
fn float_equality_is_bitwise() {
    assert_eq!(Value::Float64(1.5), Value::Float64(1.5));
    assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
    assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
}

#[test]
fn canonical_cmp_is_total_within_variant() {
    assert_eq!(
        Value::canonical_cmp(&Value::Int(-1), &Value::Int(4)),
        Ordering::Less
    );
    assert_eq!(
        Value::canonical_cmp(
            &Value::Text("a".to_string()),
            &Value::Text("a".to_string())
        ),
        Ordering::Equal
    );
    assert_eq!(
        Value::canonical_cmp(&Value::Float64(f64::NAN), &Value::Float64(1.0)),
        Ordering::Greater
    );
}

#[test]
fn canonical_cmp_orders_null_first_and_by_rank_across_variants() {
    assert_eq!(
        Value::canonical_cmp(&Value::Null, &Value::Bool(false)),
        Ordering::Less
    );
    assert_eq!(
        Value::canonical_cmp(&Value::Int(100), &Value::Uint(1)),
        Ordering::Less
    );
    assert_eq!(
        Value::canonical_cmp(&Value::Ulid(Ulid::from(1)), &Value::Uint(u64::MAX)),
        Ordering::Greater
    );
}

#[test]
fn from_impls_produce_expected_variants() {
    assert_eq!(Value::from(3u32), Value::Uint(3));
    assert_eq!(Value::from(-3i32), Value::Int(-3));
    assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
    assert_eq!(Value::from(None::<i64>), Value::Null);
    assert_eq!(Value::from(Some(7i64)), Value::Int(7));
}

#[test]
fn value_serde_round_trip() {
    let value = Value::Text("Building One".to_string());
    let json = serde_json::to_string(&value).unwrap();
    let back: Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back, value);
}
