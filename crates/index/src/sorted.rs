//! Ordered row container backing source indexes.

use crate::key::IndexKey;
use crate::sort::SortSpec;
use alloc::collections::BTreeMap;
use core::ops::Bound;
use rill_core::Row;

/// A set of rows kept sorted by a `SortSpec`.
///
/// The spec is expected to include the table's primary key, making keys
/// unique. Readers use cursor-style probes (`first_at_or_after`,
/// `first_after`, `next_lower`) and re-probe per step instead of holding an
/// iterator, so a suspended scan never pins the container while a consumer
/// callback runs (see the overlay protocol in the IVM layer).
#[derive(Debug)]
pub struct SortedRowIndex {
    spec: SortSpec,
    rows: BTreeMap<IndexKey, Row>,
}

impl SortedRowIndex {
    /// Creates an empty index ordered by the given spec.
    pub fn new(spec: SortSpec) -> Self {
        Self {
            spec,
            rows: BTreeMap::new(),
        }
    }

    /// Returns the spec this index orders by.
    #[inline]
    pub fn spec(&self) -> &SortSpec {
        &self.spec
    }

    /// Returns the number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the index holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Projects a row onto this index's key space.
    pub fn key_of(&self, row: &Row) -> IndexKey {
        IndexKey::for_row(row, &self.spec)
    }

    /// Returns true if a row with this row's key is present.
    pub fn contains(&self, row: &Row) -> bool {
        self.rows.contains_key(&self.key_of(row))
    }

    /// Inserts a row. Returns false if a row with the same key was already
    /// present (the index is left unchanged).
    pub fn insert(&mut self, row: Row) -> bool {
        let key = self.key_of(&row);
        if self.rows.contains_key(&key) {
            return false;
        }
        self.rows.insert(key, row);
        true
    }

    /// Removes the row with this row's key. Returns false if absent.
    pub fn remove(&mut self, row: &Row) -> bool {
        self.rows.remove(&self.key_of(row)).is_some()
    }

    /// Returns the first row in sort order.
    pub fn first(&self) -> Option<(IndexKey, Row)> {
        self.rows
            .iter()
            .next()
            .map(|(k, r)| (k.clone(), r.clone()))
    }

    /// Returns the first row whose key is >= `key`.
    pub fn first_at_or_after(&self, key: &IndexKey) -> Option<(IndexKey, Row)> {
        self.rows
            .range((Bound::Included(key.clone()), Bound::Unbounded))
            .next()
            .map(|(k, r)| (k.clone(), r.clone()))
    }

    /// Returns the first row whose key is > `key`.
    pub fn first_after(&self, key: &IndexKey) -> Option<(IndexKey, Row)> {
        self.rows
            .range((Bound::Excluded(key.clone()), Bound::Unbounded))
            .next()
            .map(|(k, r)| (k.clone(), r.clone()))
    }

    /// Returns the last row whose key is < `key`.
    pub fn next_lower(&self, key: &IndexKey) -> Option<(IndexKey, Row)> {
        self.rows
            .range((Bound::Unbounded, Bound::Excluded(key.clone())))
            .next_back()
            .map(|(k, r)| (k.clone(), r.clone()))
    }

    /// Iterates all rows in sort order. Used to replay the primary index
    /// into a newly built secondary index.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }
}
