//! Runs a compiled catalog query and shapes its result.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::common::{GatewayError, GatewayResult};
use crate::entity::{to_record, AttrValue, Entity};

use super::client::{CatalogClient, SearchResult};
use super::entity::CatalogEntity;
use super::query::CatalogQuery;

/// Result of one query execution
#[derive(Debug, Clone)]
pub enum QueryOutput {
    /// Entities as returned by the client
    Entities(Vec<CatalogEntity>),
    /// JSON-ready records
    Records(Vec<Value>),
}

impl QueryOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            QueryOutput::Entities(entities) => entities.is_empty(),
            QueryOutput::Records(records) => records.is_empty(),
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            QueryOutput::Records(records) => records,
            QueryOutput::Entities(entities) => entities
                .iter()
                .map(|e| Value::Object(to_record(e, &[] as &[&str])))
                .collect(),
        }
    }

    pub fn into_entities(self) -> Vec<CatalogEntity> {
        match self {
            QueryOutput::Entities(entities) => entities,
            QueryOutput::Records(_) => Vec::new(),
        }
    }
}

/// Execute `query` once
///
/// In JSON mode entities are serialized with the query's includes, the
/// attribute tuples of a `DISTINCT` query become nested records keyed by
/// the distinct fields, and a count is returned as the single record.
pub fn execute(
    client: &dyn CatalogClient,
    query: &CatalogQuery,
    json_mode: bool,
) -> GatewayResult<QueryOutput> {
    debug!(query = %query, "Executing catalog query");
    let results = client.search(query).map_err(GatewayError::from)?;

    if !json_mode {
        info!("Query results will be returned as catalog entities");
        return Ok(QueryOutput::Entities(
            results
                .into_iter()
                .filter_map(|r| match r {
                    SearchResult::Entity(entity) => Some(entity),
                    _ => None,
                })
                .collect(),
        ));
    }

    info!("Query results will be returned in a JSON format");
    let includes: Vec<String> = query.includes().iter().cloned().collect();
    let records = results
        .into_iter()
        .map(|result| match result {
            SearchResult::Entity(entity) => {
                let record = if query.includes_all_direct() {
                    to_record(&entity, &entity.relation_attributes())
                } else {
                    to_record(&entity, &includes)
                };
                Value::Object(record)
            }
            SearchResult::Tuple(values) => {
                Value::Object(map_distinct_attributes(query.attributes(), &values))
            }
            SearchResult::Count(count) => Value::from(count),
        })
        .collect();
    Ok(QueryOutput::Records(records))
}

/// Map distinct attribute names onto their values, nesting dotted names
pub fn map_distinct_attributes(attributes: &[String], values: &[AttrValue]) -> Map<String, Value> {
    let mut record = Map::new();
    for (name, value) in attributes.iter().zip(values) {
        insert_nested(&mut record, name, value.to_json());
    }
    record
}

fn insert_nested(record: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            record.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = record
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(nested) = slot {
                insert_nested(nested, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distinct_attributes_nest() {
        let record = map_distinct_attributes(
            &[
                "name".to_string(),
                "investigation.title".to_string(),
                "investigation.facility.name".to_string(),
            ],
            &[
                AttrValue::Str("ds".into()),
                AttrValue::Str("inv".into()),
                AttrValue::Str("ISIS".into()),
            ],
        );
        assert_eq!(
            Value::Object(record),
            json!({
                "name": "ds",
                "investigation": {"title": "inv", "facility": {"name": "ISIS"}}
            })
        );
    }
}
