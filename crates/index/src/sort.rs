//! Sort order declarations.

use alloc::vec::Vec;
use core::cmp::Ordering;

/// Position of a column in a table schema.
pub type ColumnId = usize;

/// Sort direction for one ordering part.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ascending order (smallest first)
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Direction {
    /// Applies this direction to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// One `(column, direction)` pair of an ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderPart {
    pub column: ColumnId,
    pub direction: Direction,
}

impl OrderPart {
    /// Creates an ascending part.
    pub fn asc(column: ColumnId) -> Self {
        Self {
            column,
            direction: Direction::Asc,
        }
    }

    /// Creates a descending part.
    pub fn desc(column: ColumnId) -> Self {
        Self {
            column,
            direction: Direction::Desc,
        }
    }
}

/// An ordered list of `(column, direction)` pairs defining a total order
/// over rows once it includes the primary key.
///
/// `SortSpec` is plain data with structural equality and hashing, so it
/// doubles as the key of a source's index arena: one index per distinct
/// spec actually in use.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct SortSpec {
    parts: Vec<OrderPart>,
}

impl SortSpec {
    /// Creates a spec from its parts.
    pub fn new(parts: Vec<OrderPart>) -> Self {
        Self { parts }
    }

    /// A spec sorting the given columns ascending, in order.
    pub fn ascending(columns: &[ColumnId]) -> Self {
        Self::new(columns.iter().map(|&c| OrderPart::asc(c)).collect())
    }

    /// Returns the ordering parts.
    #[inline]
    pub fn parts(&self) -> &[OrderPart] {
        &self.parts
    }

    /// Returns the number of parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the spec has no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Returns true if the spec orders by the given column anywhere.
    pub fn contains_column(&self, column: ColumnId) -> bool {
        self.parts.iter().any(|p| p.column == column)
    }

    /// Returns a spec extended with any of the given key columns it does not
    /// already order by, appended ascending. This turns a requested ordering
    /// into a strict total order over rows of the table.
    pub fn with_key(&self, key_columns: &[ColumnId]) -> SortSpec {
        let mut parts = self.parts.clone();
        for &column in key_columns {
            if !parts.iter().any(|p| p.column == column) {
                parts.push(OrderPart::asc(column));
            }
        }
        SortSpec::new(parts)
    }

    /// Returns a spec with `part` prepended.
    pub fn prefixed_with(&self, part: OrderPart) -> SortSpec {
        let mut parts = Vec::with_capacity(self.parts.len() + 1);
        parts.push(part);
        parts.extend(self.parts.iter().copied());
        SortSpec::new(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_direction_apply() {
        assert_eq!(Direction::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Direction::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Direction::Desc.apply(Ordering::Equal), Ordering::Equal);
    }

    #[test]
    fn test_with_key_appends_missing() {
        let spec = SortSpec::new(vec![OrderPart::desc(2)]);
        let extended = spec.with_key(&[0, 2]);
        assert_eq!(
            extended.parts(),
            &[OrderPart::desc(2), OrderPart::asc(0)]
        );
    }

    #[test]
    fn test_with_key_noop_when_present() {
        let spec = SortSpec::new(vec![OrderPart::asc(0)]);
        assert_eq!(spec.with_key(&[0]), spec);
    }

    #[test]
    fn test_prefixed_with() {
        let spec = SortSpec::ascending(&[0]);
        let prefixed = spec.prefixed_with(OrderPart::asc(3));
        assert_eq!(
            prefixed.parts(),
            &[OrderPart::asc(3), OrderPart::asc(0)]
        );
    }

    #[test]
    fn test_spec_as_map_key() {
        use hashbrown::HashMap;
        let mut map: HashMap<SortSpec, u32> = HashMap::new();
        map.insert(SortSpec::ascending(&[0]), 1);
        map.insert(SortSpec::ascending(&[0, 1]), 2);
        assert_eq!(map.get(&SortSpec::ascending(&[0])), Some(&1));
        assert_eq!(map.len(), 2);
    }
}
