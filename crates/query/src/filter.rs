//! Condition compilation and filter pushdown.

use crate::ast::Condition;
use alloc::rc::Rc;
use alloc::vec::Vec;
use rill_core::schema::Table;
use rill_core::{Error, Result, Row, Value};
use rill_ivm::RowPredicate;

/// Compiles a condition tree (without `Exists` nodes; the builder lifts
/// those into semi-joins first) into a row predicate.
pub fn compile_predicate(table: &Table, condition: &Condition) -> Result<RowPredicate> {
    Ok(match condition {
        Condition::Simple { field, op, value } => {
            let column = table.require_column(field)?;
            let op = *op;
            let value = value.clone();
            Rc::new(move |row: &Row| {
                op.eval(row.get(column).unwrap_or(&Value::Null), &value)
            })
        }
        Condition::And(branches) => {
            let compiled = compile_all(table, branches)?;
            Rc::new(move |row: &Row| compiled.iter().all(|p| p(row)))
        }
        Condition::Or(branches) => {
            let compiled = compile_all(table, branches)?;
            Rc::new(move |row: &Row| compiled.iter().any(|p| p(row)))
        }
        Condition::Exists(_) => {
            return Err(Error::invalid_operation(
                "exists conditions compile to joins, not predicates",
            ))
        }
    })
}

fn compile_all(table: &Table, branches: &[Condition]) -> Result<Vec<RowPredicate>> {
    branches
        .iter()
        .map(|branch| compile_predicate(table, branch))
        .collect()
}

/// Decides which conjuncts of a condition ride on the source connection as
/// fetch-side filters. Only shapes whose pushdown is exact qualify:
///
/// 1. a lone simple condition,
/// 2. an `and` whose branches are all simple,
/// 3. an `or` of exactly one condition (a no-op wrapper).
///
/// Pushdown narrows fetches at the index; pushes are never filtered by the
/// source, so the pipeline's Filter operator remains authoritative either
/// way. Returns the pushable conjuncts and whether they cover the whole
/// condition.
pub fn pushdown_split<'a>(condition: &'a Condition) -> (Vec<&'a Condition>, bool) {
    let mut condition = condition;
    if let Condition::Or(branches) = condition {
        if branches.len() == 1 {
            condition = &branches[0];
        }
    }

    match condition {
        Condition::Simple { .. } => (alloc::vec![condition], true),
        Condition::And(branches) => {
            let simple: Vec<&Condition> = branches
                .iter()
                .filter(|b| matches!(b, Condition::Simple { .. }))
                .collect();
            let all = simple.len() == branches.len();
            (simple, all)
        }
        _ => (Vec::new(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompareOp;
    use alloc::vec;
    use rill_core::schema::TableBuilder;
    use rill_core::DataType;

    fn table() -> Table {
        TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::Int)
            .unwrap()
            .add_column("age", DataType::Int)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap()
    }

    fn user(id: i64, age: i64) -> Row {
        Row::new(vec![Value::Int(id), Value::Int(age)])
    }

    #[test]
    fn test_simple_predicate() {
        let p = compile_predicate(
            &table(),
            &Condition::simple("age", CompareOp::Ge, 18i64),
        )
        .unwrap();
        assert!(p(&user(1, 20)));
        assert!(!p(&user(1, 10)));
    }

    #[test]
    fn test_and_or_predicates() {
        let cond = Condition::Or(vec![
            Condition::simple("age", CompareOp::Lt, 13i64),
            Condition::And(vec![
                Condition::simple("age", CompareOp::Ge, 65i64),
                Condition::simple("id", CompareOp::Ne, 0i64),
            ]),
        ]);
        let p = compile_predicate(&table(), &cond).unwrap();
        assert!(p(&user(1, 10)));
        assert!(p(&user(1, 70)));
        assert!(!p(&user(0, 70)));
        assert!(!p(&user(1, 30)));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let result = compile_predicate(
            &table(),
            &Condition::simple("missing", CompareOp::Eq, 1i64),
        );
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })));
    }

    #[test]
    fn test_pushdown_split_shapes() {
        let simple = Condition::simple("age", CompareOp::Ge, 18i64);
        let (push, all) = pushdown_split(&simple);
        assert_eq!(push.len(), 1);
        assert!(all);

        let and_of_simple = Condition::And(vec![
            Condition::simple("age", CompareOp::Ge, 18i64),
            Condition::simple("id", CompareOp::Ne, 0i64),
        ]);
        let (push, all) = pushdown_split(&and_of_simple);
        assert_eq!(push.len(), 2);
        assert!(all);

        // A one-armed or unwraps.
        let unary_or = Condition::Or(vec![simple.clone()]);
        let (push, all) = pushdown_split(&unary_or);
        assert_eq!(push.len(), 1);
        assert!(all);

        // A real disjunction stays on the Filter operator.
        let or = Condition::Or(vec![
            Condition::simple("age", CompareOp::Lt, 13i64),
            Condition::simple("age", CompareOp::Ge, 65i64),
        ]);
        let (push, all) = pushdown_split(&or);
        assert!(push.is_empty());
        assert!(!all);

        // An and with a nested or pushes the simple half only.
        let mixed = Condition::And(vec![simple, or]);
        let (push, all) = pushdown_split(&mixed);
        assert_eq!(push.len(), 1);
        assert!(!all);
    }
}
