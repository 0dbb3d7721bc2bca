use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

///
/// KeyTuple
///
/// Canonical primary-key (or principal-key) tuple for one instance, in the
/// declared key-property order. Ordering uses the canonical value
/// comparator so tuples can index the identity map.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyTuple(Vec<Value>);

impl KeyTuple {
    #[must_use]
    pub const fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// True when every component carries a value. A tuple with any null
    /// component does not identify a persisted row.
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|v| !v.is_null())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Ord for KeyTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut order = self.0.len().cmp(&other.0.len());
        for (left, right) in self.0.iter().zip(other.0.iter()) {
            match Value::canonical_cmp(left, right) {
                Ordering::Equal => {}
                non_eq => {
                    order = non_eq;
                    break;
                }
            }
        }
        order
    }
}

impl PartialOrd for KeyTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value:?}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<Value>> for KeyTuple {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::KeyTuple;
    use crate::value::Value;

    #[test]
    fn tuple_with_null_component_is_not_set() {
        assert!(!KeyTuple::new(vec![Value::Null]).is_set());
        assert!(!KeyTuple::new(vec![Value::Int(1), Value::Null]).is_set());
        assert!(KeyTuple::new(vec![Value::Int(1), Value::Int(2)]).is_set());
    }

    #[test]
    fn empty_tuple_is_not_set() {
        assert!(!KeyTuple::new(Vec::new()).is_set());
    }

    #[test]
    fn ordering_is_componentwise() {
        let a = KeyTuple::new(vec![Value::Int(1), Value::Int(2)]);
        let b = KeyTuple::new(vec![Value::Int(1), Value::Int(3)]);
        assert!(a < b);

        let shorter = KeyTuple::new(vec![Value::Int(1)]);
        assert!(shorter < a);
    }
}
