//! # Filter Model
//!
//! Typed filter intents. Every constructor validates its arguments eagerly,
//! so a filter that exists is well-formed; errors that depend on the live
//! schema surface later, when the filter is applied or the query executed.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::common::{GatewayError, GatewayResult};

/// Where-filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Like,
    ILike,
    NLike,
    NILike,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Between,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Like => "like",
            Operator::ILike => "ilike",
            Operator::NLike => "nlike",
            Operator::NILike => "nilike",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::Between => "between",
        }
    }
}

impl FromStr for Operator {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "eq" => Operator::Eq,
            "ne" | "neq" => Operator::Ne,
            "like" => Operator::Like,
            "ilike" => Operator::ILike,
            "nlike" => Operator::NLike,
            "nilike" => Operator::NILike,
            "lt" => Operator::Lt,
            "lte" => Operator::Lte,
            "gt" => Operator::Gt,
            "gte" => Operator::Gte,
            "in" => Operator::In,
            "between" => Operator::Between,
            _ => {
                return Err(GatewayError::validation(format!(
                    "Bad operation given to where filter: {}",
                    s
                )))
            }
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One condition on a field
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub operator: Operator,
    pub value: Value,
}

/// `Where(field, operator, value)`
#[derive(Debug, Clone, PartialEq)]
pub struct WhereFilter {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl WhereFilter {
    pub fn new(field: impl Into<String>, operator: &str, value: Value) -> GatewayResult<Self> {
        Self::with_operator(field, operator.parse()?, value)
    }

    pub fn with_operator(
        field: impl Into<String>,
        operator: Operator,
        value: Value,
    ) -> GatewayResult<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(GatewayError::validation("Where filter field cannot be empty"));
        }

        match operator {
            Operator::In if !value.is_array() => {
                return Err(GatewayError::validation(format!(
                    "Where filter 'in' on {} requires a list of values",
                    field
                )));
            }
            Operator::Between if value.as_array().map(Vec::len) != Some(2) => {
                return Err(GatewayError::validation(format!(
                    "Where filter 'between' on {} requires a list of two values",
                    field
                )));
            }
            _ => {}
        }

        Ok(Self {
            field,
            operator,
            value,
        })
    }

    pub fn condition(&self) -> Condition {
        Condition {
            operator: self.operator,
            value: self.value.clone(),
        }
    }
}

/// Boolean combination of where filters
#[derive(Debug, Clone, PartialEq)]
pub enum WhereTree {
    Leaf(WhereFilter),
    And(Vec<WhereTree>),
    Or(Vec<WhereTree>),
}

impl WhereTree {
    /// All leaf filters, left to right
    pub fn leaves(&self) -> Vec<&WhereFilter> {
        match self {
            WhereTree::Leaf(filter) => vec![filter],
            WhereTree::And(children) | WhereTree::Or(children) => {
                children.iter().flat_map(WhereTree::leaves).collect()
            }
        }
    }

    /// Rewrite every leaf's field name
    pub fn map_fields<F>(&self, f: &F) -> GatewayResult<WhereTree>
    where
        F: Fn(&str) -> GatewayResult<String>,
    {
        Ok(match self {
            WhereTree::Leaf(filter) => WhereTree::Leaf(WhereFilter {
                field: f(&filter.field)?,
                ..filter.clone()
            }),
            WhereTree::And(children) => WhereTree::And(
                children
                    .iter()
                    .map(|c| c.map_fields(f))
                    .collect::<GatewayResult<_>>()?,
            ),
            WhereTree::Or(children) => WhereTree::Or(
                children
                    .iter()
                    .map(|c| c.map_fields(f))
                    .collect::<GatewayResult<_>>()?,
            ),
        })
    }
}

/// Sort key pushed onto a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub ascending: bool,
}

/// `Order(field, direction)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFilter {
    pub field: String,
    pub ascending: bool,
}

impl OrderFilter {
    pub fn new(field: impl Into<String>, direction: &str) -> GatewayResult<Self> {
        let ascending = match direction.to_lowercase().as_str() {
            "asc" => true,
            "desc" => false,
            _ => {
                return Err(GatewayError::validation(format!(
                    "Bad order direction given: {}",
                    direction
                )))
            }
        };

        Ok(Self {
            field: field.into(),
            ascending,
        })
    }

    /// Parse the request form `"field direction"`
    pub fn parse(value: &str) -> GatewayResult<Self> {
        let parts: Vec<&str> = value.split_whitespace().collect();
        match parts.as_slice() {
            [field, direction] => Self::new(*field, direction),
            _ => Err(GatewayError::validation(format!(
                "Bad order filter given, expected 'field direction': {}",
                value
            ))),
        }
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            field: self.field.clone(),
            ascending: self.ascending,
        }
    }
}

fn non_negative(kind: &str, value: i64) -> GatewayResult<u64> {
    u64::try_from(value)
        .map_err(|_| GatewayError::validation(format!("{} value must be 0 or greater", kind)))
}

/// `Limit(n)`; carries the skip value once a skip filter is merged into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitFilter {
    pub limit_value: u64,
    pub skip_value: Option<u64>,
}

impl LimitFilter {
    pub fn new(limit_value: i64) -> GatewayResult<Self> {
        Ok(Self {
            limit_value: non_negative("Limit", limit_value)?,
            skip_value: None,
        })
    }
}

/// `Skip(n)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipFilter {
    pub skip_value: u64,
}

impl SkipFilter {
    pub fn new(skip_value: i64) -> GatewayResult<Self> {
        Ok(Self {
            skip_value: non_negative("Skip", skip_value)?,
        })
    }
}

/// `Include(relation-path-set)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeFilter {
    /// Dot-separated relation chains
    pub included_filters: Vec<String>,
}

impl IncludeFilter {
    pub fn new(paths: Vec<String>) -> GatewayResult<Self> {
        if paths.iter().any(|p| p.split('.').any(str::is_empty)) {
            return Err(GatewayError::validation(format!(
                "Bad include relations provided: {:?}",
                paths
            )));
        }
        Ok(Self {
            included_filters: paths,
        })
    }

    /// Build from the request forms: a string, a list, or a mapping of
    /// relation to nested includes, arbitrarily nested
    pub fn from_json(value: &Value) -> GatewayResult<Self> {
        let mut paths = Vec::new();
        collect_include_paths("", value, &mut paths)?;
        Self::new(paths)
    }
}

fn collect_include_paths(prefix: &str, value: &Value, out: &mut Vec<String>) -> GatewayResult<()> {
    let join = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", prefix, name)
        }
    };

    match value {
        Value::String(name) => out.push(join(name)),
        Value::Array(items) => {
            for item in items {
                collect_include_paths(prefix, item, out)?;
            }
        }
        Value::Object(map) => {
            for (name, nested) in map {
                let path = join(name);
                let before = out.len();
                collect_include_paths(&path, nested, out)?;
                if out.len() == before {
                    out.push(path);
                }
            }
        }
        Value::Null if !prefix.is_empty() => {}
        other => {
            return Err(GatewayError::validation(format!(
                "Bad include relations provided: {}",
                other
            )))
        }
    }
    Ok(())
}

/// `Distinct(field-set)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctFieldFilter {
    pub fields: Vec<String>,
}

impl DistinctFieldFilter {
    pub fn new(fields: Vec<String>) -> GatewayResult<Self> {
        if fields.is_empty() || fields.iter().any(String::is_empty) {
            return Err(GatewayError::validation(
                "Distinct filter requires at least one field name",
            ));
        }
        Ok(Self { fields })
    }
}

/// Kinds of filter, in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FilterKind {
    Where = 0,
    Order = 1,
    Include = 2,
    Pagination = 3,
    Distinct = 4,
}

/// A filter from a request
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    Where(WhereFilter),
    NestedWhere(WhereTree),
    Order(OrderFilter),
    Limit(LimitFilter),
    Skip(SkipFilter),
    Include(IncludeFilter),
    Distinct(DistinctFieldFilter),
}

impl QueryFilter {
    pub fn kind(&self) -> FilterKind {
        match self {
            QueryFilter::Where(_) | QueryFilter::NestedWhere(_) => FilterKind::Where,
            QueryFilter::Order(_) => FilterKind::Order,
            QueryFilter::Include(_) => FilterKind::Include,
            QueryFilter::Limit(_) | QueryFilter::Skip(_) => FilterKind::Pagination,
            QueryFilter::Distinct(_) => FilterKind::Distinct,
        }
    }

    /// Convenience constructor for the common where form
    pub fn where_(field: &str, operator: &str, value: Value) -> GatewayResult<Self> {
        Ok(QueryFilter::Where(WhereFilter::new(field, operator, value)?))
    }

    pub fn order(field: &str, direction: &str) -> GatewayResult<Self> {
        Ok(QueryFilter::Order(OrderFilter::new(field, direction)?))
    }

    pub fn limit(value: i64) -> GatewayResult<Self> {
        Ok(QueryFilter::Limit(LimitFilter::new(value)?))
    }

    pub fn skip(value: i64) -> GatewayResult<Self> {
        Ok(QueryFilter::Skip(SkipFilter::new(value)?))
    }

    pub fn include(paths: &[&str]) -> GatewayResult<Self> {
        Ok(QueryFilter::Include(IncludeFilter::new(
            paths.iter().map(|p| p.to_string()).collect(),
        )?))
    }

    pub fn distinct(fields: &[&str]) -> GatewayResult<Self> {
        Ok(QueryFilter::Distinct(DistinctFieldFilter::new(
            fields.iter().map(|f| f.to_string()).collect(),
        )?))
    }
}
