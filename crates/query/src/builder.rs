//! Compiles a query AST into a live pipeline.
//!
//! The pipeline shape is fixed: source connection → `Filter` → existence
//! semi-joins → `Skip` → `Take` → related left joins. Existence conditions
//! narrow the parent set before pagination so they never consume limit
//! slots; related subqueries hydrate after pagination so the limit windows
//! parent rows, not join results.
//!
//! Simple conjuncts of the where tree additionally ride on the source
//! connection as fetch-side filters; the source never filters pushes, so
//! the `Filter` operator always stays in the pipeline to judge them.

use crate::ast::{Condition, Query, Related};
use crate::filter::{compile_predicate, pushdown_split};
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;
use rill_core::schema::Table;
use rill_core::{Error, Result};
use rill_index::{OrderPart, SortSpec};
use rill_ivm::{
    Basis, CorrelationPath, Filter, Input, Join, JoinArgs, JoinKind, MemorySource, RowPredicate,
    Skip, SkipBound, Take,
};

/// Resolves table names to sources. The storage layer behind this trait
/// owns schema validity and type translation.
pub trait SourceProvider {
    fn source(&self, table: &str) -> Option<&MemorySource>;
}

/// A plain in-memory source registry.
#[derive(Default)]
pub struct SourceSet {
    sources: HashMap<String, MemorySource>,
}

impl SourceSet {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under its table name.
    pub fn add(&mut self, source: MemorySource) {
        self.sources
            .insert(source.table().name().to_string(), source);
    }

    /// Looks a source up by table name.
    pub fn get(&self, table: &str) -> Option<&MemorySource> {
        self.sources.get(table)
    }
}

impl SourceProvider for SourceSet {
    fn source(&self, table: &str) -> Option<&MemorySource> {
        self.get(table)
    }
}

/// Compiles `query` into a pipeline and returns its root, ready for a view
/// to attach to and hydrate.
pub fn build(query: &Query, provider: &dyn SourceProvider) -> Result<Rc<dyn Input>> {
    let source = provider
        .source(&query.table)
        .ok_or_else(|| Error::table_not_found(&query.table))?;
    let table = source.table().clone();

    let sort = resolve_sort(&table, &query.order_by)?;
    let (residual, exists) = split_exists(query.where_clause.as_ref())?;

    let (pushed, _exact) = match &residual {
        Some(condition) => pushdown_split(condition),
        None => (Vec::new(), true),
    };
    let connection_filters: Vec<RowPredicate> = pushed
        .iter()
        .map(|condition| compile_predicate(&table, condition))
        .collect::<Result<_>>()?;

    let mut root: Rc<dyn Input> = source.connect(sort, connection_filters);

    if let Some(condition) = &residual {
        root = Filter::new(root, compile_predicate(&table, condition)?);
    }

    for related in &exists {
        root = apply_exists(root, &table, related, provider)?;
    }

    if let Some(start) = &query.start {
        table.validate_row(&start.row)?;
        let exclusive = match start.basis {
            Basis::At => false,
            Basis::After => true,
            Basis::Before => {
                return Err(Error::invalid_operation(
                    "a query start cannot use the before basis",
                ))
            }
        };
        root = Skip::new(
            root,
            SkipBound {
                row: start.row.clone(),
                exclusive,
            },
        );
    }

    if let Some(limit) = query.limit {
        root = Take::new(root, limit);
    }

    for related in &query.related {
        root = apply_related(root, &table, None, related, provider)?;
    }

    Ok(root)
}

fn resolve_sort(table: &Table, order_by: &[(String, rill_index::Direction)]) -> Result<SortSpec> {
    let parts = order_by
        .iter()
        .map(|(name, direction)| {
            Ok(OrderPart {
                column: table.require_column(name)?,
                direction: *direction,
            })
        })
        .collect::<Result<Vec<OrderPart>>>()?;
    Ok(SortSpec::new(parts))
}

/// Lifts existence checks out of the where tree. They are only supported as
/// top-level conjuncts, where semi-join placement is exact.
fn split_exists(
    condition: Option<&Condition>,
) -> Result<(Option<Condition>, Vec<Related>)> {
    let Some(condition) = condition else {
        return Ok((None, Vec::new()));
    };
    match condition {
        Condition::Exists(related) => Ok((None, alloc::vec![related.clone()])),
        Condition::And(branches) => {
            let mut exists = Vec::new();
            let mut rest = Vec::new();
            for branch in branches {
                match branch {
                    Condition::Exists(related) => exists.push(related.clone()),
                    other => {
                        ensure_no_exists(other)?;
                        rest.push(other.clone());
                    }
                }
            }
            let residual = match rest.len() {
                0 => None,
                1 => rest.pop(),
                _ => Some(Condition::And(rest)),
            };
            Ok((residual, exists))
        }
        other => {
            ensure_no_exists(other)?;
            Ok((Some(other.clone()), Vec::new()))
        }
    }
}

fn ensure_no_exists(condition: &Condition) -> Result<()> {
    match condition {
        Condition::Simple { .. } => Ok(()),
        Condition::And(branches) | Condition::Or(branches) => {
            branches.iter().try_for_each(ensure_no_exists)
        }
        Condition::Exists(_) => Err(Error::invalid_operation(
            "exists conditions must be top-level conjuncts of the where clause",
        )),
    }
}

/// Connects a subquery's child source, with its own filters and order.
fn connect_child(
    related: &Related,
    provider: &dyn SourceProvider,
) -> Result<(Rc<dyn Input>, Rc<Table>)> {
    let sub = &related.subquery;
    if sub.limit.is_some() || sub.start.is_some() {
        return Err(Error::invalid_operation(
            "limit and start are not supported inside related subqueries",
        ));
    }
    let child_source = provider
        .source(&sub.table)
        .ok_or_else(|| Error::table_not_found(&sub.table))?;
    let child_table = child_source.table().clone();
    let child_sort = resolve_sort(&child_table, &sub.order_by)?;

    let (residual, exists) = split_exists(sub.where_clause.as_ref())?;
    if !exists.is_empty() {
        return Err(Error::invalid_operation(
            "exists conditions are not supported inside related subqueries",
        ));
    }
    let (pushed, _exact) = match &residual {
        Some(condition) => pushdown_split(condition),
        None => (Vec::new(), true),
    };
    let filters: Vec<RowPredicate> = pushed
        .iter()
        .map(|condition| compile_predicate(&child_table, condition))
        .collect::<Result<_>>()?;

    let mut child: Rc<dyn Input> = child_source.connect(child_sort, filters);
    if let Some(condition) = &residual {
        child = Filter::new(child, compile_predicate(&child_table, condition)?);
    }
    Ok((child, child_table))
}

/// Wires one related subquery as a left join, then recurses into its own
/// related entries: each nested hop joins against the chain built so far,
/// correlating through the relationship it hangs off.
fn apply_related(
    parent: Rc<dyn Input>,
    parent_table: &Rc<Table>,
    via: Option<&str>,
    related: &Related,
    provider: &dyn SourceProvider,
) -> Result<Rc<dyn Input>> {
    let parent_column = parent_table.require_column(&related.correlation.parent_field)?;
    let (child, child_table) = connect_child(related, provider)?;
    let child_column = child_table.require_column(&related.correlation.child_field)?;
    let relationship = related.subquery.relationship_name().to_string();

    let parent_key = match via {
        None => CorrelationPath::root(parent_column),
        Some(rel) => CorrelationPath::through(rel, parent_column),
    };
    let mut root: Rc<dyn Input> = Join::new(JoinArgs {
        parent,
        child,
        kind: JoinKind::Left,
        parent_key,
        child_column,
        relationship: relationship.clone(),
        hidden: related.hidden,
    });

    for nested in &related.subquery.related {
        root = apply_related(root, &child_table, Some(&relationship), nested, provider)?;
    }
    Ok(root)
}

/// Wires an existence check as a semi-join on the parent's root columns.
fn apply_exists(
    parent: Rc<dyn Input>,
    parent_table: &Rc<Table>,
    related: &Related,
    provider: &dyn SourceProvider,
) -> Result<Rc<dyn Input>> {
    if !related.subquery.related.is_empty() {
        return Err(Error::invalid_operation(
            "related subqueries are not supported inside exists conditions",
        ));
    }
    let parent_column = parent_table.require_column(&related.correlation.parent_field)?;
    let (child, child_table) = connect_child(related, provider)?;
    let child_column = child_table.require_column(&related.correlation.child_field)?;

    Ok(Join::new(JoinArgs {
        parent,
        child,
        kind: JoinKind::Semi,
        parent_key: CorrelationPath::root(parent_column),
        child_column,
        relationship: related.subquery.relationship_name().to_string(),
        hidden: true,
    }))
}
