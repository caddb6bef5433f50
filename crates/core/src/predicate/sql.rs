//! SQL rendering of predicate trees using SeaQuery.
//!
//! Generates PostgreSQL for SQL-backed resources:
//! - Relationship existence checks as `EXISTS (SELECT 1 ...)` subqueries
//! - Array membership as `value = ANY(column)`
//! - Sorts on related fields through LEFT JOINs
//! - Offset and keyset pagination

use std::collections::BTreeMap;

use sea_query::{
    Alias, Asterisk, Cond, Expr, ExprTrait, Func, JoinType, NullOrdering, Order,
    PostgresQueryBuilder, Query, SelectStatement, SimpleExpr,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{CompareOp, Predicate, TextMatch};
use crate::pagination::PageRequest;
use crate::schema::FieldPath;
use crate::sort::{NullsOrder, SortSpec};
use crate::translate::TranslatedQuery;

/// How a relationship maps onto a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipJoin {
    /// Related table.
    pub table: String,
    /// Column on the base table.
    pub local_field: String,
    /// Column on the related table.
    pub foreign_field: String,
}

impl RelationshipJoin {
    pub fn new(
        table: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
        }
    }
}

/// Renders translated queries against one base table.
#[derive(Debug, Clone)]
pub struct SqlRenderer {
    base_table: String,
    relationships: BTreeMap<String, RelationshipJoin>,
    /// Column holding keyset cursor values.
    cursor_column: String,
}

impl SqlRenderer {
    pub fn new(base_table: impl Into<String>) -> Self {
        Self {
            base_table: base_table.into(),
            relationships: BTreeMap::new(),
            cursor_column: "id".to_string(),
        }
    }

    pub fn with_relationship(mut self, name: impl Into<String>, join: RelationshipJoin) -> Self {
        self.relationships.insert(name.into(), join);
        self
    }

    pub fn with_relationships(mut self, joins: BTreeMap<String, RelationshipJoin>) -> Self {
        self.relationships.extend(joins);
        self
    }

    pub fn with_cursor_column(mut self, column: impl Into<String>) -> Self {
        self.cursor_column = column.into();
        self
    }

    /// Condition for `predicate` with field references resolved against
    /// `table`.
    pub fn condition(&self, predicate: &Predicate, table: &str) -> SimpleExpr {
        match predicate {
            Predicate::All(parts) => parts
                .iter()
                .fold(Cond::all(), |cond, p| cond.add(self.condition(p, table)))
                .into(),
            Predicate::Any(parts) => parts
                .iter()
                .fold(Cond::any(), |cond, p| cond.add(self.condition(p, table)))
                .into(),
            Predicate::Compare { field, op, value } => {
                let col = column(table, field);
                let value = sql_value(value);
                match op {
                    CompareOp::Eq => col.eq(value),
                    CompareOp::Gt => col.gt(value),
                    CompareOp::Gte => col.gte(value),
                    CompareOp::Lt => col.lt(value),
                    CompareOp::Lte => col.lte(value),
                }
            }
            Predicate::Text {
                field,
                mode,
                value,
                case_sensitive,
            } => {
                let (col, value) = if *case_sensitive {
                    (column(table, field), value.clone())
                } else {
                    (
                        SimpleExpr::from(Func::lower(column(table, field))),
                        value.to_lowercase(),
                    )
                };
                let escaped = escape_like_wildcards(&value);
                match mode {
                    TextMatch::Contains => col.like(format!("%{escaped}%")),
                    TextMatch::StartsWith => col.like(format!("{escaped}%")),
                    TextMatch::EndsWith => col.like(format!("%{escaped}")),
                    TextMatch::Equals => col.eq(value),
                }
            }
            Predicate::HasElement { field, value } => {
                Expr::cust_with_exprs("$1 = ANY($2)", [sql_value(value), column(table, field)])
            }
            Predicate::Exists {
                relationship,
                predicate,
            } => self.exists(table, relationship, predicate),
        }
    }

    fn exists(&self, table: &str, relationship: &str, predicate: &Predicate) -> SimpleExpr {
        let Some(join) = self.relationships.get(relationship) else {
            tracing::error!(
                relationship,
                "relationship has no join mapping; restricting results"
            );
            // Restrict rather than widen the result set.
            return Expr::cust("FALSE");
        };

        let subquery = Query::select()
            .expr(Expr::val(1))
            .from_as(Alias::new(&join.table), Alias::new(relationship))
            .and_where(
                Expr::col((Alias::new(relationship), Alias::new(&join.foreign_field)))
                    .equals((Alias::new(table), Alias::new(&join.local_field))),
            )
            .and_where(self.condition(predicate, relationship))
            .to_owned();
        Expr::exists(subquery)
    }

    /// SELECT for one page of results.
    ///
    /// Keyset pages fetch one extra row so the caller can tell whether more
    /// records exist; `before` pages come back in reverse order.
    pub fn select(&self, query: &TranslatedQuery) -> SelectStatement {
        let base = self.base_table.as_str();
        let mut select = Query::select();
        select
            .column((Alias::new(base), Asterisk))
            .from(Alias::new(base));

        if let Some(predicate) = &query.predicate {
            select.and_where(self.condition(predicate, base));
        }

        self.add_sorts(&mut select, &query.sort);

        match &query.page {
            PageRequest::Offset { .. } => {
                select.limit(u64::from(query.page.limit()));
                select.offset(query.page.offset());
            }
            PageRequest::Keyset {
                after,
                before,
                limit,
            } => {
                let cursor = Expr::col((Alias::new(base), Alias::new(&self.cursor_column)));
                let order = match (after, before) {
                    (Some(after), _) => {
                        select.and_where(cursor.gt(after.as_str()));
                        Order::Asc
                    }
                    (None, Some(before)) => {
                        select.and_where(cursor.lt(before.as_str()));
                        Order::Desc
                    }
                    (None, None) => Order::Asc,
                };
                select.order_by((Alias::new(base), Alias::new(&self.cursor_column)), order);
                select.limit(u64::from(*limit) + 1);
            }
        }

        select
    }

    /// COUNT(*) of all matching records.
    pub fn count(&self, query: &TranslatedQuery) -> SelectStatement {
        let base = self.base_table.as_str();
        let mut select = Query::select();
        select.expr(Expr::col(Asterisk).count()).from(Alias::new(base));
        if let Some(predicate) = &query.predicate {
            select.and_where(self.condition(predicate, base));
        }
        select
    }

    /// Add ORDER BY clauses, joining related tables for related sort fields.
    fn add_sorts(&self, select: &mut SelectStatement, sort: &SortSpec) {
        let mut joined: Vec<&str> = Vec::new();

        for entry in sort.entries() {
            let path = FieldPath::parse(&entry.field).unwrap_or_else(|| FieldPath::scalar(&entry.field));
            let table = match path.relationship.as_deref() {
                None => self.base_table.as_str(),
                Some(relationship) => {
                    let Some((name, join)) = self.relationships.get_key_value(relationship) else {
                        tracing::warn!(field = %entry.field, "no join mapping for sort field, skipping");
                        continue;
                    };
                    if !joined.contains(&name.as_str()) {
                        select.join_as(
                            JoinType::LeftJoin,
                            Alias::new(&join.table),
                            Alias::new(name),
                            Expr::col((Alias::new(&self.base_table), Alias::new(&join.local_field)))
                                .equals((Alias::new(name), Alias::new(&join.foreign_field))),
                        );
                        joined.push(name);
                    }
                    name.as_str()
                }
            };

            let col = (Alias::new(table), Alias::new(&path.field));
            let order = if entry.direction.is_descending() {
                Order::Desc
            } else {
                Order::Asc
            };
            match entry.direction.nulls() {
                Some(NullsOrder::First) => {
                    select.order_by_with_nulls(col, order, NullOrdering::First);
                }
                Some(NullsOrder::Last) => {
                    select.order_by_with_nulls(col, order, NullOrdering::Last);
                }
                None => {
                    select.order_by(col, order);
                }
            }
        }
    }

    pub fn select_sql(&self, query: &TranslatedQuery) -> String {
        self.select(query).to_string(PostgresQueryBuilder)
    }

    pub fn count_sql(&self, query: &TranslatedQuery) -> String {
        self.count(query).to_string(PostgresQueryBuilder)
    }
}

fn column(table: &str, field: &str) -> SimpleExpr {
    Expr::col((Alias::new(table), Alias::new(field))).into()
}

fn sql_value(value: &Value) -> SimpleExpr {
    match value {
        Value::Bool(b) => Expr::val(*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Expr::val(i).into(),
            None => Expr::val(n.as_f64().unwrap_or_default()).into(),
        },
        Value::String(s) => Expr::val(s.as_str()).into(),
        Value::Null => Expr::val(Option::<String>::None).into(),
        other => Expr::val(other.to_string()).into(),
    }
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
