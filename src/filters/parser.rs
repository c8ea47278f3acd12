//! # Filter Parser
//!
//! Turns untyped request input into typed filters. Two shapes are accepted:
//! a list of single-key JSON objects (`[{"where": ...}, {"limit": 10}]`) and
//! query-string pairs whose values are JSON text (`where={"id":{"eq":1}}`).

use serde_json::{Map, Value};
use tracing::debug;

use crate::common::{GatewayError, GatewayResult};

use super::ast::{
    DistinctFieldFilter, IncludeFilter, LimitFilter, OrderFilter, QueryFilter, SkipFilter,
    WhereFilter, WhereTree,
};

/// Filter names recognised in requests
pub const FILTER_NAMES: [&str; 6] = ["where", "order", "limit", "skip", "include", "distinct"];

/// Parse a JSON list of filter objects
pub fn parse_filter_list(filters: &Value) -> GatewayResult<Vec<QueryFilter>> {
    let items = match filters {
        Value::Array(items) => items.as_slice(),
        Value::Null => return Ok(Vec::new()),
        single @ Value::Object(_) => std::slice::from_ref(single),
        other => {
            return Err(GatewayError::bad_request(format!(
                "Filters must be given as a list of objects, got {}",
                other
            )))
        }
    };

    let mut result = Vec::new();
    for item in items {
        let object = item.as_object().ok_or_else(|| {
            GatewayError::bad_request(format!("Bad filter given: {}", item))
        })?;
        for (name, value) in object {
            result.extend(parse_filter(name, value)?);
        }
    }
    Ok(result)
}

/// Parse query-string pairs; keys may repeat
pub fn parse_query_params(pairs: &[(String, String)]) -> GatewayResult<Vec<QueryFilter>> {
    let mut result = Vec::new();
    for (key, raw) in pairs {
        if !FILTER_NAMES.contains(&key.as_str()) {
            debug!(param = %key, "Ignoring unrecognised query parameter");
            continue;
        }
        // bare words such as `order=name asc` are taken as strings
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        result.extend(parse_filter(key, &value)?);
    }
    Ok(result)
}

/// Parse one named filter
pub fn parse_filter(name: &str, value: &Value) -> GatewayResult<Vec<QueryFilter>> {
    match name {
        "where" => parse_where(value),
        "order" => parse_order(value),
        "limit" => Ok(vec![QueryFilter::Limit(LimitFilter::new(parse_integer(
            "limit", value,
        )?)?)]),
        "skip" => Ok(vec![QueryFilter::Skip(SkipFilter::new(parse_integer(
            "skip", value,
        )?)?)]),
        "include" => Ok(vec![QueryFilter::Include(IncludeFilter::from_json(value)?)]),
        "distinct" => Ok(vec![QueryFilter::Distinct(DistinctFieldFilter::new(
            parse_string_list("distinct", value)?,
        )?)]),
        other => Err(GatewayError::bad_request(format!(
            "Unknown filter given: {}",
            other
        ))),
    }
}

fn parse_integer(name: &str, value: &Value) -> GatewayResult<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| GatewayError::validation(format!("{} value must be an integer: {}", name, value)))
}

fn parse_string_list(name: &str, value: &Value) -> GatewayResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    GatewayError::bad_request(format!("Bad {} filter value: {}", name, item))
                })
            })
            .collect(),
        other => Err(GatewayError::bad_request(format!(
            "Bad {} filter value: {}",
            name, other
        ))),
    }
}

fn parse_order(value: &Value) -> GatewayResult<Vec<QueryFilter>> {
    parse_string_list("order", value)?
        .iter()
        .map(|clause| OrderFilter::parse(clause).map(QueryFilter::Order))
        .collect()
}

/// Parse a where object
///
/// A flat object yields one filter per field/operator pair. An object using
/// `and`/`or` anywhere becomes a single nested filter.
pub fn parse_where(value: &Value) -> GatewayResult<Vec<QueryFilter>> {
    let object = where_object(value)?;

    if object.keys().any(|k| is_boolean_key(k)) {
        return Ok(vec![QueryFilter::NestedWhere(parse_where_tree(value)?)]);
    }

    let mut result = Vec::new();
    for (field, condition) in object {
        for filter in parse_field_conditions(field, condition)? {
            result.push(QueryFilter::Where(filter));
        }
    }
    Ok(result)
}

fn is_boolean_key(key: &str) -> bool {
    matches!(key.to_lowercase().as_str(), "and" | "or")
}

fn where_object(value: &Value) -> GatewayResult<&Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        GatewayError::bad_request(format!("Where filter must be an object: {}", value))
    })
}

fn parse_where_tree(value: &Value) -> GatewayResult<WhereTree> {
    let object = where_object(value)?;
    let mut children = Vec::new();

    for (key, nested) in object {
        if is_boolean_key(key) {
            let items = nested.as_array().ok_or_else(|| {
                GatewayError::bad_request(format!("'{}' in where filter must be a list", key))
            })?;
            let branch = items
                .iter()
                .map(parse_where_tree)
                .collect::<GatewayResult<Vec<_>>>()?;
            if key.eq_ignore_ascii_case("and") {
                children.push(WhereTree::And(branch));
            } else {
                children.push(WhereTree::Or(branch));
            }
        } else {
            for filter in parse_field_conditions(key, nested)? {
                children.push(WhereTree::Leaf(filter));
            }
        }
    }

    if children.len() == 1 {
        Ok(children.remove(0))
    } else {
        Ok(WhereTree::And(children))
    }
}

fn parse_field_conditions(field: &str, condition: &Value) -> GatewayResult<Vec<WhereFilter>> {
    match condition {
        Value::Object(ops) => ops
            .iter()
            .map(|(op, operand)| WhereFilter::new(field, op, operand.clone()))
            .collect(),
        // `{"name": "x"}` is shorthand for equality
        scalar => Ok(vec![WhereFilter::new(field, "eq", scalar.clone())?]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ast::Operator;
    use serde_json::json;

    #[test]
    fn test_parse_filter_list() {
        let filters = parse_filter_list(&json!([
            {"where": {"name": {"like": "dataset"}, "id": {"gt": 2, "lt": 9}}},
            {"order": ["name asc", "id desc"]},
            {"limit": 5},
            {"skip": 1},
            {"include": {"investigation": "facility"}},
            {"distinct": "name"}
        ]))
        .unwrap();

        let wheres = filters
            .iter()
            .filter(|f| matches!(f, QueryFilter::Where(_)))
            .count();
        assert_eq!(wheres, 3);
        assert_eq!(filters.len(), 9);
        assert!(filters.contains(&QueryFilter::distinct(&["name"]).unwrap()));
        assert!(filters.contains(&QueryFilter::include(&["investigation.facility"]).unwrap()));
    }

    #[test]
    fn test_unknown_filter_rejected() {
        assert!(matches!(
            parse_filter_list(&json!([{"group": "name"}])),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(parse_filter_list(&json!("limit")).is_err());
    }

    #[test]
    fn test_negative_limit_is_validation_error() {
        assert!(matches!(
            parse_filter("limit", &json!(-4)),
            Err(GatewayError::Validation(_))
        ));
        assert!(matches!(
            parse_filter("skip", &json!("ten")),
            Err(GatewayError::Validation(_))
        ));
    }

    #[test]
    fn test_query_params() {
        let pairs = vec![
            ("where".to_string(), r#"{"id":{"eq":3}}"#.to_string()),
            ("order".to_string(), r#""name desc""#.to_string()),
            ("order".to_string(), "id asc".to_string()),
            ("limit".to_string(), "10".to_string()),
            ("_".to_string(), "123".to_string()),
        ];
        let filters = parse_query_params(&pairs).unwrap();
        assert_eq!(filters.len(), 4);
        assert_eq!(filters[1], QueryFilter::order("name", "desc").unwrap());
        assert_eq!(filters[2], QueryFilter::order("id", "asc").unwrap());
    }

    #[test]
    fn test_nested_where() {
        let filters = parse_where(&json!({
            "or": [{"name": {"eq": "a"}}, {"name": "b"}],
            "id": {"gt": 1}
        }))
        .unwrap();
        assert_eq!(filters.len(), 1);

        let QueryFilter::NestedWhere(tree) = &filters[0] else {
            panic!("expected nested filter");
        };
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[1].operator, Operator::Eq);
        assert!(matches!(tree, WhereTree::And(children) if matches!(children[1], WhereTree::Or(_))));
    }
}
