//! Row comparison according to a sort spec.

use crate::sort::SortSpec;
use core::cmp::Ordering;
use rill_core::{Row, Value};

/// Compares rows by the columns and directions of a `SortSpec`.
///
/// Missing columns compare as `Null`, which keeps comparison total even for
/// rows narrower than the spec expects; validated pipelines never hit that
/// path.
#[derive(Clone, Debug)]
pub struct RowComparator {
    spec: SortSpec,
}

impl RowComparator {
    /// Creates a comparator for the given spec.
    pub fn new(spec: SortSpec) -> Self {
        Self { spec }
    }

    /// Returns the spec this comparator orders by.
    #[inline]
    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    /// Compares two rows.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for part in self.spec.parts() {
            let av = a.get(part.column).unwrap_or(&Value::Null);
            let bv = b.get(part.column).unwrap_or(&Value::Null);
            let cmp = part.direction.apply(av.cmp(bv));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }

    /// Returns true if a sorts strictly before b.
    #[inline]
    pub fn is_less(&self, a: &Row, b: &Row) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a and b occupy the same sort position.
    #[inline]
    pub fn is_equal(&self, a: &Row, b: &Row) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}
