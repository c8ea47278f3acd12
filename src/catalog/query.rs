//! # Catalog Query
//!
//! A query against one catalog entity type, built up by filters and sent to
//! the client in one search call.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::Value;
use tracing::info;

use crate::common::{GatewayError, GatewayResult};
use crate::filters::{Condition, FilterTarget, Operator, SortKey, WhereFilter, WhereTree};

/// Aggregate applied to the selected rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count,
    Distinct,
    CountDistinct,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Count => "COUNT",
            Aggregate::Distinct => "DISTINCT",
            Aggregate::CountDistinct => "COUNT:DISTINCT",
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self, Aggregate::Count | Aggregate::CountDistinct)
    }
}

/// Query over one catalog entity type
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    entity: String,
    conditions: BTreeMap<String, Vec<Condition>>,
    nested: Vec<WhereTree>,
    aggregate: Option<Aggregate>,
    attributes: Vec<String>,
    order: Vec<SortKey>,
    limit: Option<(u64, u64)>,
    includes: BTreeSet<String>,
    include_all_direct: bool,
    max_entities: Option<u64>,
}

impl CatalogQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        let entity = entity.into();
        info!(entity = %entity, "Creating catalog query");
        Self {
            entity,
            conditions: BTreeMap::new(),
            nested: Vec::new(),
            aggregate: None,
            attributes: Vec::new(),
            order: Vec::new(),
            limit: None,
            includes: BTreeSet::new(),
            include_all_direct: false,
            max_entities: None,
        }
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Include every direct relation of the returned entities
    pub fn with_all_direct_includes(mut self) -> Self {
        self.include_all_direct = true;
        self
    }

    /// Bound used for the window when a skip arrives without a limit
    pub fn with_max_entities(mut self, max_entities: Option<u64>) -> Self {
        self.max_entities = max_entities;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn conditions(&self) -> &BTreeMap<String, Vec<Condition>> {
        &self.conditions
    }

    pub fn nested_conditions(&self) -> &[WhereTree] {
        &self.nested
    }

    pub fn aggregate(&self) -> Option<Aggregate> {
        self.aggregate
    }

    /// Attributes selected by a `DISTINCT` aggregate
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn order(&self) -> &[SortKey] {
        &self.order
    }

    /// `(skip, count)` window
    pub fn limit(&self) -> Option<(u64, u64)> {
        self.limit
    }

    pub fn includes(&self) -> &BTreeSet<String> {
        &self.includes
    }

    pub fn includes_all_direct(&self) -> bool {
        self.include_all_direct
    }

    /// Render as JPQL, for logging
    pub fn to_jpql(&self) -> String {
        let mut jpql = String::from("SELECT ");
        let selected = if self.attributes.is_empty() {
            "o".to_string()
        } else {
            self.attributes
                .iter()
                .map(|a| format!("o.{}", a))
                .collect::<Vec<_>>()
                .join(", ")
        };
        jpql.push_str(&match self.aggregate {
            None => selected,
            Some(Aggregate::Distinct) => format!("DISTINCT {}", selected),
            Some(Aggregate::Count) => format!("COUNT({})", selected),
            Some(Aggregate::CountDistinct) => format!("COUNT(DISTINCT {})", selected),
        });
        jpql.push_str(&format!(" FROM {} o", self.entity));

        let mut clauses: Vec<String> = self
            .conditions
            .iter()
            .flat_map(|(field, conditions)| {
                conditions
                    .iter()
                    .map(move |c| render_condition(field, c.operator, &c.value))
            })
            .collect();
        clauses.extend(self.nested.iter().map(render_tree));
        if !clauses.is_empty() {
            jpql.push_str(" WHERE ");
            jpql.push_str(&clauses.join(" AND "));
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|k| format!("o.{} {}", k.field, if k.ascending { "ASC" } else { "DESC" }))
                .collect();
            jpql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }
        if let Some((skip, count)) = self.limit {
            jpql.push_str(&format!(" LIMIT {}, {}", skip, count));
        }
        if self.include_all_direct {
            jpql.push_str(" INCLUDE 1");
        } else if !self.includes.is_empty() {
            let paths: Vec<String> = self.includes.iter().map(|p| format!("o.{}", p)).collect();
            jpql.push_str(&format!(" INCLUDE {}", paths.join(", ")));
        }
        jpql
    }
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_jpql())
    }
}

/// Wrap the operand of the `like` family in wildcards
pub fn like_operand(operator: Operator, value: &Value) -> Value {
    match (operator, value) {
        (Operator::Like | Operator::ILike | Operator::NLike | Operator::NILike, Value::String(s)) => {
            Value::String(format!("%{}%", s))
        }
        _ => value.clone(),
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(items) => format!(
            "({})",
            items.iter().map(render_literal).collect::<Vec<_>>().join(", ")
        ),
        other => other.to_string(),
    }
}

fn render_condition(field: &str, operator: Operator, value: &Value) -> String {
    let lhs = format!("o.{}", field);
    match operator {
        Operator::Eq => format!("{} = {}", lhs, render_literal(value)),
        Operator::Ne => format!("{} != {}", lhs, render_literal(value)),
        Operator::Like => format!("{} like {}", lhs, render_literal(value)),
        Operator::NLike => format!("{} not like {}", lhs, render_literal(value)),
        Operator::ILike => format!("UPPER({}) like UPPER({})", lhs, render_literal(value)),
        Operator::NILike => format!("UPPER({}) not like UPPER({})", lhs, render_literal(value)),
        Operator::Lt => format!("{} < {}", lhs, render_literal(value)),
        Operator::Lte => format!("{} <= {}", lhs, render_literal(value)),
        Operator::Gt => format!("{} > {}", lhs, render_literal(value)),
        Operator::Gte => format!("{} >= {}", lhs, render_literal(value)),
        Operator::In => format!("{} in {}", lhs, render_literal(value)),
        Operator::Between => match value.as_array().map(Vec::as_slice) {
            Some([low, high]) => format!(
                "{} between {} and {}",
                lhs,
                render_literal(low),
                render_literal(high)
            ),
            _ => format!("{} between {}", lhs, render_literal(value)),
        },
    }
}

fn render_tree(tree: &WhereTree) -> String {
    match tree {
        WhereTree::Leaf(filter) => render_condition(&filter.field, filter.operator, &filter.value),
        WhereTree::And(children) => format!(
            "({})",
            children.iter().map(render_tree).collect::<Vec<_>>().join(" AND ")
        ),
        WhereTree::Or(children) => format!(
            "({})",
            children.iter().map(render_tree).collect::<Vec<_>>().join(" OR ")
        ),
    }
}

fn wrap_tree_operands(tree: &WhereTree) -> WhereTree {
    match tree {
        WhereTree::Leaf(filter) => WhereTree::Leaf(WhereFilter {
            value: like_operand(filter.operator, &filter.value),
            ..filter.clone()
        }),
        WhereTree::And(children) => WhereTree::And(children.iter().map(wrap_tree_operands).collect()),
        WhereTree::Or(children) => WhereTree::Or(children.iter().map(wrap_tree_operands).collect()),
    }
}

impl FilterTarget for CatalogQuery {
    fn add_condition(&mut self, filter: &WhereFilter) -> GatewayResult<()> {
        self.conditions
            .entry(filter.field.clone())
            .or_default()
            .push(Condition {
                operator: filter.operator,
                value: like_operand(filter.operator, &filter.value),
            });
        Ok(())
    }

    fn add_nested_condition(&mut self, tree: &WhereTree) -> GatewayResult<()> {
        self.nested.push(wrap_tree_operands(tree));
        Ok(())
    }

    fn set_order(&mut self, keys: &[SortKey]) -> GatewayResult<()> {
        self.order = keys.to_vec();
        Ok(())
    }

    fn add_includes(&mut self, paths: &[String]) -> GatewayResult<()> {
        self.includes.extend(paths.iter().cloned());
        Ok(())
    }

    fn set_window(&mut self, skip: u64, limit: Option<u64>) -> GatewayResult<()> {
        let count = match (limit, self.max_entities) {
            (Some(count), _) => count,
            (None, Some(max_entities)) => max_entities,
            (None, None) => {
                return Err(GatewayError::bad_request(
                    "Bad request made, a skip filter can only be used together with a limit filter",
                ))
            }
        };
        self.limit = Some((skip, count));
        Ok(())
    }

    fn set_distinct(&mut self, fields: &[String]) -> GatewayResult<()> {
        self.aggregate = Some(match self.aggregate {
            Some(aggregate) if aggregate.is_count() => Aggregate::CountDistinct,
            _ => Aggregate::Distinct,
        });
        self.attributes = fields.to_vec();
        Ok(())
    }
}
