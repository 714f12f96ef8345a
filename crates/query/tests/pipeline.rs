//! End-to-end pipeline tests: AST in, live materialized results out.

use rill_core::schema::TableBuilder;
use rill_core::{DataType, Row, Value};
use rill_index::Direction;
use rill_ivm::{ArrayView, MemorySource, SourceChange};
use rill_query::{build, CompareOp, Condition, Correlation, Query, Related, SourceSet};

fn registry() -> SourceSet {
    let mut set = SourceSet::new();
    set.add(MemorySource::new(
        TableBuilder::new("issue")
            .unwrap()
            .add_column("id", DataType::Int)
            .unwrap()
            .add_column("title", DataType::Text)
            .unwrap()
            .add_column("open", DataType::Bool)
            .unwrap()
            .add_column("priority", DataType::Int)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    ));
    set.add(MemorySource::new(
        TableBuilder::new("comment")
            .unwrap()
            .add_column("id", DataType::Int)
            .unwrap()
            .add_column("issue_id", DataType::Int)
            .unwrap()
            .add_column("body", DataType::Text)
            .unwrap()
            .primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap(),
    ));
    set
}

fn issue(id: i64, title: &str, open: bool, priority: i64) -> Row {
    Row::new(vec![
        Value::Int(id),
        Value::Text(title.into()),
        Value::Bool(open),
        Value::Int(priority),
    ])
}

fn comment(id: i64, issue_id: i64, body: &str) -> Row {
    Row::new(vec![
        Value::Int(id),
        Value::Int(issue_id),
        Value::Text(body.into()),
    ])
}

fn ids(view: &ArrayView) -> Vec<i64> {
    view.rows()
        .iter()
        .map(|n| n.row.get(0).unwrap().as_int().unwrap())
        .collect()
}

#[test]
fn open_issues_with_comments_stay_live() {
    let set = registry();
    // Open issues by descending priority, with their comments.
    let query = Query {
        where_clause: Some(Condition::simple("open", CompareOp::Eq, true)),
        order_by: vec![("priority".into(), Direction::Desc)],
        related: vec![Related {
            correlation: Correlation {
                parent_field: "id".into(),
                child_field: "issue_id".into(),
            },
            hidden: false,
            subquery: Box::new(Query::table("comment")),
        }],
        ..Query::table("issue")
    };
    let view = ArrayView::new(build(&query, &set).unwrap());
    view.hydrate().unwrap();

    let issues = set.get("issue").unwrap();
    let comments = set.get("comment").unwrap();

    issues
        .push(SourceChange::add(issue(1, "crash", true, 5)))
        .unwrap();
    issues
        .push(SourceChange::add(issue(2, "typo", false, 1)))
        .unwrap();
    issues
        .push(SourceChange::add(issue(3, "slow", true, 3)))
        .unwrap();
    assert_eq!(ids(&view), vec![1, 3]);

    // Comments land under their issue.
    comments
        .push(SourceChange::add(comment(10, 1, "me too")))
        .unwrap();
    let rows = view.rows();
    let crash = rows
        .iter()
        .find(|n| n.row.get(0) == Some(&Value::Int(1)))
        .unwrap();
    let related = crash.relationship("comment").unwrap();
    assert_eq!(related.nodes.len(), 1);

    // Closing an issue retracts it, along with its join results.
    issues
        .push(SourceChange::edit(
            issue(1, "crash", true, 5),
            issue(1, "crash", false, 5),
        ))
        .unwrap();
    assert_eq!(ids(&view), vec![3]);

    // Reopening brings it back, comments intact.
    issues
        .push(SourceChange::edit(
            issue(1, "crash", false, 5),
            issue(1, "crash", true, 5),
        ))
        .unwrap();
    let rows = view.rows();
    assert_eq!(ids(&view), vec![1, 3]);
    let crash = rows
        .iter()
        .find(|n| n.row.get(0) == Some(&Value::Int(1)))
        .unwrap();
    assert_eq!(crash.relationship("comment").unwrap().nodes.len(), 1);
}

#[test]
fn limited_window_tracks_membership() {
    let set = registry();
    let query = Query {
        order_by: vec![("priority".into(), Direction::Desc)],
        limit: Some(2),
        ..Query::table("issue")
    };
    let issues = set.get("issue").unwrap();
    for (id, priority) in [(1, 10), (2, 30), (3, 20)] {
        issues
            .push(SourceChange::add(issue(id, "t", true, priority)))
            .unwrap();
    }
    let view = ArrayView::new(build(&query, &set).unwrap());
    view.hydrate().unwrap();
    assert_eq!(ids(&view), vec![2, 3]);

    // A higher-priority arrival evicts the window's last row.
    issues
        .push(SourceChange::add(issue(4, "t", true, 40)))
        .unwrap();
    assert_eq!(ids(&view), vec![4, 2]);

    // Removing a window row pulls the next candidate back in.
    issues
        .push(SourceChange::remove(issue(4, "t", true, 40)))
        .unwrap();
    assert_eq!(ids(&view), vec![2, 3]);
}
