//! # Search API Filters
//!
//! PaNOSC requests carry one `filter` object (`{"where": .., "include":
//! [{"relation": "files"}], "limit": .., "skip": .., "order": ..}`) or, on
//! count endpoints, a bare `where` object. Field and relation names are
//! translated to catalog paths here, so the compiled filters run unchanged
//! against the catalog query.

use serde_json::{Map, Value};
use tracing::debug;

use crate::common::{GatewayError, GatewayResult};
use crate::filters::parser::parse_filter;
use crate::filters::{IncludeFilter, OrderFilter, QueryFilter, WhereFilter};

use super::mappings::Mappings;

/// Filters of one search request, with the PaNOSC relations to render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub filters: Vec<QueryFilter>,
    /// Dotted PaNOSC relation paths requested by `include`
    pub relations: Vec<String>,
}

/// Parse a `filter` object for `entity`
pub fn parse_search_filter(mappings: &Mappings, entity: &str, value: &Value) -> GatewayResult<SearchFilters> {
    let object = match value {
        Value::Null => return Ok(SearchFilters::default()),
        Value::Object(object) => object,
        other => {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, the search filter must be an object, got {}",
                other
            )))
        }
    };

    let mut result = SearchFilters::default();
    for (name, value) in object {
        match name.as_str() {
            "where" => result.filters.extend(parse_search_where(mappings, entity, value)?),
            "include" => parse_includes(mappings, entity, "", value, &mut result)?,
            "limit" | "skip" => result.filters.extend(parse_filter(name, value)?),
            "order" => {
                for filter in parse_filter("order", value)? {
                    if let QueryFilter::Order(order) = filter {
                        let field = mappings.icat_path(entity, &order.field)?;
                        let direction = if order.ascending { "asc" } else { "desc" };
                        result.filters.push(QueryFilter::Order(OrderFilter::new(field, direction)?));
                    }
                }
            }
            other => {
                return Err(GatewayError::bad_request(format!(
                    "Bad request made, unknown search filter {}",
                    other
                )))
            }
        }
    }
    debug!(entity, filters = ?result.filters, "Parsed search filter");
    Ok(result)
}

/// Parse a where object for `entity`, translating its fields
pub fn parse_search_where(mappings: &Mappings, entity: &str, value: &Value) -> GatewayResult<Vec<QueryFilter>> {
    prefixed_where(mappings, entity, "", value)
}

fn prefixed_where(mappings: &Mappings, entity: &str, prefix: &str, value: &Value) -> GatewayResult<Vec<QueryFilter>> {
    let translate = |field: &str| mappings.icat_path(entity, &join(prefix, field));
    parse_filter("where", value)?
        .into_iter()
        .map(|filter| match filter {
            QueryFilter::Where(filter) => Ok(QueryFilter::Where(WhereFilter {
                field: translate(&filter.field)?,
                ..filter
            })),
            QueryFilter::NestedWhere(tree) => Ok(QueryFilter::NestedWhere(tree.map_fields(&translate)?)),
            other => Ok(other),
        })
        .collect()
}

fn parse_includes(
    mappings: &Mappings,
    entity: &str,
    prefix: &str,
    value: &Value,
    result: &mut SearchFilters,
) -> GatewayResult<()> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        single @ Value::Object(_) => std::slice::from_ref(single),
        other => {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, include must be a list of relation objects, got {}",
                other
            )))
        }
    };

    for item in items {
        let object: &Map<String, Value> = item.as_object().ok_or_else(|| {
            GatewayError::bad_request(format!("Bad request made, bad include given: {}", item))
        })?;
        let relation = object.get("relation").and_then(Value::as_str).ok_or_else(|| {
            GatewayError::bad_request("Bad request made, each include must name a relation")
        })?;
        let path = join(prefix, relation);
        let (icat_path, _) = mappings.icat_relation_path(entity, &path)?;
        result
            .filters
            .push(QueryFilter::Include(IncludeFilter::new(vec![icat_path])?));
        result.relations.push(path.clone());

        if let Some(scope) = object.get("scope").and_then(Value::as_object) {
            for (name, value) in scope {
                match name.as_str() {
                    "where" => result.filters.extend(prefixed_where(mappings, entity, &path, value)?),
                    "include" => parse_includes(mappings, entity, &path, value, result)?,
                    other => {
                        return Err(GatewayError::bad_request(format!(
                            "Bad request made, {} is not supported in an include scope",
                            other
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}
