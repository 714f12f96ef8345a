//! Index keys with scan-bound sentinels.
//!
//! A key is a row's projection onto a sort spec, with each part carrying its
//! direction so keys order correctly inside a `BTreeMap`. Parts can also be
//! the `Min`/`Max` sentinels, which lets a constraint scan start at the first
//! row of a constraint group even when a later sort part is descending: the
//! sentinel that sorts first under the part's direction is used for every
//! column the constraint does not pin.

use crate::sort::{Direction, SortSpec};
use alloc::vec::Vec;
use core::cmp::Ordering;
use rill_core::{Row, Value};

/// A key component: a concrete value or a scan-bound sentinel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoundValue {
    /// Sorts below every value.
    Min,
    /// A concrete value.
    Val(Value),
    /// Sorts above every value.
    Max,
}

impl BoundValue {
    /// The sentinel that sorts first under the given direction.
    pub fn lowest(direction: Direction) -> Self {
        match direction {
            Direction::Asc => BoundValue::Min,
            Direction::Desc => BoundValue::Max,
        }
    }

    fn compare(&self, other: &BoundValue) -> Ordering {
        match (self, other) {
            (BoundValue::Min, BoundValue::Min) => Ordering::Equal,
            (BoundValue::Max, BoundValue::Max) => Ordering::Equal,
            (BoundValue::Min, _) => Ordering::Less,
            (_, BoundValue::Min) => Ordering::Greater,
            (BoundValue::Max, _) => Ordering::Greater,
            (_, BoundValue::Max) => Ordering::Less,
            (BoundValue::Val(a), BoundValue::Val(b)) => a.cmp(b),
        }
    }
}

/// One directed component of an index key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPart {
    pub value: BoundValue,
    pub direction: Direction,
}

/// A complete index key: one directed part per sort spec column.
///
/// Keys are only ever compared against keys built for the same spec, so the
/// per-part directions always agree between the two sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexKey {
    parts: Vec<KeyPart>,
}

impl IndexKey {
    /// Creates a key from its parts.
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Projects a row onto a sort spec.
    pub fn for_row(row: &Row, spec: &SortSpec) -> Self {
        Self::new(
            spec.parts()
                .iter()
                .map(|part| KeyPart {
                    value: BoundValue::Val(
                        row.get(part.column).cloned().unwrap_or(Value::Null),
                    ),
                    direction: part.direction,
                })
                .collect(),
        )
    }

    /// Returns the parts of this key.
    #[inline]
    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            let cmp = a.direction.apply(a.value.compare(&b.value));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        self.parts.len().cmp(&other.parts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::OrderPart;
    use alloc::vec;

    fn key(spec: &SortSpec, values: Vec<Value>) -> IndexKey {
        IndexKey::for_row(&Row::new(values), spec)
    }

    #[test]
    fn test_key_order_asc() {
        let spec = SortSpec::ascending(&[0]);
        assert!(key(&spec, vec![Value::Int(1)]) < key(&spec, vec![Value::Int(2)]));
    }

    #[test]
    fn test_key_order_desc() {
        let spec = SortSpec::new(vec![OrderPart::desc(0)]);
        assert!(key(&spec, vec![Value::Int(2)]) < key(&spec, vec![Value::Int(1)]));
    }

    #[test]
    fn test_sentinels_bracket_values() {
        let min = IndexKey::new(vec![KeyPart {
            value: BoundValue::Min,
            direction: Direction::Asc,
        }]);
        let max = IndexKey::new(vec![KeyPart {
            value: BoundValue::Max,
            direction: Direction::Asc,
        }]);
        let spec = SortSpec::ascending(&[0]);
        let v = key(&spec, vec![Value::Int(0)]);
        assert!(min < v);
        assert!(v < max);
    }

    #[test]
    fn test_lowest_sentinel_respects_direction() {
        // Under a descending part, Max sorts first.
        let first = IndexKey::new(vec![KeyPart {
            value: BoundValue::lowest(Direction::Desc),
            direction: Direction::Desc,
        }]);
        let spec = SortSpec::new(vec![OrderPart::desc(0)]);
        let v = key(&spec, vec![Value::Int(100)]);
        assert!(first < v);
    }

    #[test]
    fn test_mixed_direction_key() {
        let spec = SortSpec::new(vec![OrderPart::asc(0), OrderPart::desc(1)]);
        let a = key(&spec, vec![Value::Int(1), Value::Int(9)]);
        let b = key(&spec, vec![Value::Int(1), Value::Int(3)]);
        // Same first column, second is descending: 9 before 3.
        assert!(a < b);
    }
}
