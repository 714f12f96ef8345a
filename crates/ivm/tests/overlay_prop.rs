//! Property-based tests for the overlay splice using proptest.
//!
//! For any sorted row sequence and any overlay position (before-all,
//! at-first, mid, replacing-existing, at-last, after-all), splicing must
//! produce exactly the sequence obtained by applying the change to the set
//! and re-sorting.

use proptest::prelude::*;
use rill_core::{Row, Value};
use rill_ivm::{generate_with_overlay, Overlay, SourceChange};
use rill_index::{RowComparator, SortSpec};

fn row(id: i64, rank: i64) -> Row {
    Row::new(vec![Value::Int(id), Value::Int(rank)])
}

fn splice(rows: &[i64], overlay: Option<Overlay>) -> Vec<i64> {
    let cmp = RowComparator::new(SortSpec::ascending(&[0]));
    generate_with_overlay(None, rows.iter().map(|&id| row(id, 0)), None, overlay, cmp)
        .map(|r| r.get(0).unwrap().as_int().unwrap())
        .collect()
}

proptest! {
    /// Splicing an add overlay anywhere into a sorted sequence equals
    /// inserting the row and re-sorting.
    #[test]
    fn overlay_add_matches_sorted_insert(
        mut ids in prop::collection::btree_set(0i64..100, 0..20),
        added in 0i64..100,
    ) {
        prop_assume!(!ids.contains(&added));
        let sorted: Vec<i64> = ids.iter().copied().collect();
        let spliced = splice(&sorted, Some(Overlay {
            output_index: 0,
            change: SourceChange::add(row(added, 0)),
        }));
        ids.insert(added);
        let expected: Vec<i64> = ids.iter().copied().collect();
        prop_assert_eq!(spliced, expected);
    }

    /// Splicing a remove overlay equals deleting the row.
    #[test]
    fn overlay_remove_matches_sorted_delete(
        ids in prop::collection::btree_set(0i64..100, 1..20),
        pick in 0usize..20,
    ) {
        let sorted: Vec<i64> = ids.iter().copied().collect();
        let removed = sorted[pick % sorted.len()];
        let spliced = splice(&sorted, Some(Overlay {
            output_index: 0,
            change: SourceChange::remove(row(removed, 0)),
        }));
        let expected: Vec<i64> =
            sorted.iter().copied().filter(|&id| id != removed).collect();
        prop_assert_eq!(spliced, expected);
    }

    /// An edit overlay that keeps the key replaces the row's payload without
    /// disturbing its neighbors.
    #[test]
    fn overlay_edit_in_place(
        ids in prop::collection::btree_set(0i64..100, 1..20),
        pick in 0usize..20,
        new_rank in 1i64..50,
    ) {
        let sorted: Vec<i64> = ids.iter().copied().collect();
        let edited = sorted[pick % sorted.len()];
        let cmp = RowComparator::new(SortSpec::ascending(&[0]));
        let result: Vec<Row> = generate_with_overlay(
            None,
            sorted.iter().map(|&id| row(id, 0)),
            None,
            Some(Overlay {
                output_index: 0,
                change: SourceChange::edit(row(edited, 0), row(edited, new_rank)),
            }),
            cmp,
        )
        .collect();
        prop_assert_eq!(result.len(), sorted.len());
        for (r, &id) in result.iter().zip(&sorted) {
            prop_assert_eq!(r.get(0).unwrap().as_int().unwrap(), id);
            let rank = r.get(1).unwrap().as_int().unwrap();
            prop_assert_eq!(rank, if id == edited { new_rank } else { 0 });
        }
    }
}
