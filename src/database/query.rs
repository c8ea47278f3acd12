//! # Row Query
//!
//! A query over one table of the relational mirror. Fields are addressed
//! the way rows name them: attribute names, `<relation>ID` foreign keys and
//! upper-cased relation names (`INVESTIGATION.title`).

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::common::{GatewayError, GatewayResult};
use crate::entity::{EntitySchema, Schema};
use crate::filters::{FilterTarget, Operator, SortKey, WhereFilter};

use super::row::{find_foreign_key, find_relation, table_name};
use super::store::entity_for_table;

/// Deepest `relation.relation.field` a filter may address
pub const MAX_FIELD_DEPTH: usize = 3;

/// A field translated onto the entity schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// Name as given in the request
    pub column: String,
    /// Dotted path over schema attribute and relation names
    pub path: String,
}

/// One where condition
#[derive(Debug, Clone, PartialEq)]
pub struct RowCondition {
    pub field: FieldPath,
    pub operator: Operator,
    pub value: Value,
}

/// Query over one table
#[derive(Debug, Clone)]
pub struct RowQuery {
    schema: Schema,
    entity: Arc<EntitySchema>,
    table: String,
    conditions: Vec<RowCondition>,
    order: Vec<(FieldPath, bool)>,
    offset: u64,
    limit: Option<u64>,
    includes: Option<Vec<String>>,
    distinct: Vec<FieldPath>,
    count: bool,
}

impl RowQuery {
    pub fn new(schema: &Schema, table: &str) -> GatewayResult<Self> {
        let entity = entity_for_table(schema, table)
            .cloned()
            .ok_or_else(|| {
                GatewayError::bad_request(format!("Bad request made, unknown table {}", table))
            })?;

        debug!(table, "Creating row query");
        Ok(Self {
            schema: schema.clone(),
            table: table_name(&entity.name),
            entity,
            conditions: Vec::new(),
            order: Vec::new(),
            offset: 0,
            limit: None,
            includes: None,
            distinct: Vec::new(),
            count: false,
        })
    }

    /// Count matching rows instead of returning them
    pub fn counting(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn entity(&self) -> &Arc<EntitySchema> {
        &self.entity
    }

    pub fn conditions(&self) -> &[RowCondition] {
        &self.conditions
    }

    pub fn order(&self) -> &[(FieldPath, bool)] {
        &self.order
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Include paths in row naming, if an include filter was applied
    pub fn includes(&self) -> Option<&[String]> {
        self.includes.as_deref()
    }

    pub fn distinct(&self) -> &[FieldPath] {
        &self.distinct
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    /// Translate a row field name onto the schema
    pub fn resolve_field(&self, field: &str) -> GatewayResult<FieldPath> {
        let segments: Vec<&str> = field.split('.').collect();
        if segments.len() > MAX_FIELD_DEPTH {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, maximum related depth exceeded. {}'s depth > {}",
                field, MAX_FIELD_DEPTH
            )));
        }

        let unknown = |table: &str, name: &str| {
            GatewayError::bad_request(format!(
                "Bad request made, unknown attribute {} on table {}",
                name, table
            ))
        };

        let mut entity = Arc::clone(&self.entity);
        let mut path = Vec::with_capacity(segments.len());
        let (last, relations) = segments
            .split_last()
            .ok_or_else(|| unknown(&self.table, field))?;

        for name in relations {
            let relation = find_relation(&entity, name)
                .ok_or_else(|| unknown(&table_name(&entity.name), name))?;
            path.push(relation.name.clone());
            let target = self
                .schema
                .entity(&relation.target)
                .cloned()
                .ok_or_else(|| unknown(&table_name(&entity.name), name))?;
            entity = target;
        }

        if entity.attribute_kind(last).is_some() {
            path.push(last.to_string());
        } else if let Some(relation) = find_foreign_key(&entity, last) {
            path.push(relation.name.clone());
            path.push("id".to_string());
        } else {
            return Err(unknown(&table_name(&entity.name), last));
        }

        Ok(FieldPath {
            column: field.to_string(),
            path: path.join("."),
        })
    }

    /// Translate a row include path onto schema relation names
    pub fn resolve_include(&self, include: &str) -> GatewayResult<String> {
        let mut entity = Arc::clone(&self.entity);
        let mut path = Vec::new();
        for name in include.split('.') {
            let relation = find_relation(&entity, name).ok_or_else(|| {
                GatewayError::bad_request(format!(
                    "Bad request made, {} is not a relation of {}",
                    name,
                    table_name(&entity.name)
                ))
            })?;
            path.push(relation.name.clone());
            entity = self.schema.entity(&relation.target).cloned().ok_or_else(|| {
                GatewayError::bad_request(format!("Bad request made, unknown table {}", relation.target))
            })?;
        }
        Ok(path.join("."))
    }

    /// Render as parametrised SQL, for logging
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let column = |field: &FieldPath| {
            let parts: Vec<String> = field.column.split('.').map(str::to_uppercase).collect();
            if parts.len() == 1 {
                format!("{}.{}", self.table, parts[0])
            } else {
                parts.join(".")
            }
        };

        let selected = if self.count {
            format!("count({}.ID)", self.table)
        } else if self.distinct.is_empty() {
            format!("{}.*", self.table)
        } else {
            format!(
                "DISTINCT {}",
                self.distinct.iter().map(column).collect::<Vec<_>>().join(", ")
            )
        };
        let mut sql = format!("SELECT {} FROM {}", selected, self.table);

        let mut clauses = Vec::new();
        for condition in &self.conditions {
            let lhs = column(&condition.field);
            let clause = match condition.operator {
                Operator::Eq => format!("{} = ?", lhs),
                Operator::Ne => format!("{} != ?", lhs),
                Operator::Like => format!("{} LIKE ?", lhs),
                Operator::NLike => format!("{} NOT LIKE ?", lhs),
                Operator::ILike => format!("lower({}) LIKE lower(?)", lhs),
                Operator::NILike => format!("lower({}) NOT LIKE lower(?)", lhs),
                Operator::Lt => format!("{} < ?", lhs),
                Operator::Lte => format!("{} <= ?", lhs),
                Operator::Gt => format!("{} > ?", lhs),
                Operator::Gte => format!("{} >= ?", lhs),
                Operator::In => format!("{} IN (?)", lhs),
                Operator::Between => format!("{} BETWEEN ? AND ?", lhs),
            };
            match (condition.operator, &condition.value) {
                (Operator::Between, Value::Array(bounds)) => params.extend(bounds.iter().cloned()),
                (_, value) => params.push(value.clone()),
            }
            clauses.push(clause);
        }
        if !clauses.is_empty() {
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|(field, ascending)| {
                    format!("{} {}", column(field), if *ascending { "ASC" } else { "DESC" })
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::from(limit));
        }
        if self.offset > 0 {
            sql.push_str(" OFFSET ?");
            params.push(Value::from(self.offset));
        }
        (sql, params)
    }
}

impl fmt::Display for RowQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.to_sql();
        write!(f, "{} {:?}", sql, params)
    }
}

impl FilterTarget for RowQuery {
    fn add_condition(&mut self, filter: &WhereFilter) -> GatewayResult<()> {
        let field = self.resolve_field(&filter.field)?;
        let value = match (filter.operator, &filter.value) {
            (Operator::Like | Operator::ILike | Operator::NLike | Operator::NILike, Value::String(s)) => {
                Value::String(format!("%{}%", s))
            }
            (_, value) => value.clone(),
        };
        self.conditions.push(RowCondition {
            field,
            operator: filter.operator,
            value,
        });
        Ok(())
    }

    fn set_order(&mut self, keys: &[SortKey]) -> GatewayResult<()> {
        self.order = keys
            .iter()
            .map(|key| Ok((self.resolve_field(&key.field)?, key.ascending)))
            .collect::<GatewayResult<_>>()?;
        Ok(())
    }

    fn add_includes(&mut self, paths: &[String]) -> GatewayResult<()> {
        if self.includes.is_some() {
            return Err(GatewayError::bad_request(
                "Bad request made, cannot process multiple include filters in one request",
            ));
        }
        for path in paths {
            self.resolve_include(path)?;
        }
        self.includes = Some(paths.to_vec());
        Ok(())
    }

    fn set_window(&mut self, skip: u64, limit: Option<u64>) -> GatewayResult<()> {
        self.offset = skip;
        if limit.is_some() {
            self.limit = limit;
        }
        Ok(())
    }

    fn set_distinct(&mut self, fields: &[String]) -> GatewayResult<()> {
        self.distinct = fields
            .iter()
            .map(|field| self.resolve_field(field))
            .collect::<GatewayResult<_>>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterOrderHandler, QueryFilter, WhereTree};
    use serde_json::json;

    fn query() -> RowQuery {
        RowQuery::new(&Schema::icat(), "DATASET").unwrap()
    }

    #[test]
    fn test_field_depth_limit() {
        let q = query();
        assert_eq!(q.resolve_field("name").unwrap().path, "name");
        assert_eq!(
            q.resolve_field("INVESTIGATION.FACILITY.name").unwrap().path,
            "investigation.facility.name"
        );
        assert_eq!(q.resolve_field("investigationID").unwrap().path, "investigation.id");
        assert!(matches!(
            q.resolve_field("INVESTIGATION.FACILITY.INSTRUMENT.name"),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(q.resolve_field("colour").is_err());
    }

    #[test]
    fn test_second_include_rejected() {
        let mut q = query();
        let mut handler = FilterOrderHandler::new();
        let result = handler.manage_filters(
            vec![
                QueryFilter::include(&["INVESTIGATION"]).unwrap(),
                QueryFilter::include(&["DATAFILE"]).unwrap(),
            ],
            &mut q,
        );
        assert!(matches!(result, Err(GatewayError::BadRequest(msg)) if msg.contains("multiple include filters")));
    }

    #[test]
    fn test_nested_where_rejected() {
        let mut q = query();
        assert!(matches!(
            q.add_nested_condition(&WhereTree::And(vec![])),
            Err(GatewayError::BadRequest(_))
        ));
    }

    #[test]
    fn test_sql_rendering() {
        let mut q = query();
        let mut handler = FilterOrderHandler::new();
        handler
            .manage_filters(
                vec![
                    QueryFilter::where_("name", "like", json!("set")).unwrap(),
                    QueryFilter::order("id", "desc").unwrap(),
                    QueryFilter::limit(10).unwrap(),
                    QueryFilter::skip(20).unwrap(),
                ],
                &mut q,
            )
            .unwrap();

        let (sql, params) = q.to_sql();
        assert_eq!(
            sql,
            "SELECT DATASET.* FROM DATASET WHERE DATASET.NAME LIKE ? \
             ORDER BY DATASET.ID DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(params, vec![json!("%set%"), json!(10), json!(20)]);
    }
}
