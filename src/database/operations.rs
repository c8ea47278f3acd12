//! # Row Operations
//!
//! Record-level operations over a [`RowStore`]. Session checks are applied
//! by the caller.

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::catalog::map_distinct_attributes;
use crate::catalog::operations::body_items;
use crate::common::{GatewayError, GatewayResult};
use crate::entity::to_record;
use crate::filters::{FilterOrderHandler, Operator, QueryFilter, WhereFilter};

use super::query::RowQuery;
use super::store::{RowOutput, RowStore};

fn compile(store: &dyn RowStore, table: &str, filters: Vec<QueryFilter>, count: bool) -> GatewayResult<RowQuery> {
    let mut query = RowQuery::new(&store.schema()?, table)?;
    if count {
        query = query.counting();
    }
    let mut handler = FilterOrderHandler::new();
    handler.manage_filters(filters, &mut query)?;
    Ok(query)
}

fn records(query: &RowQuery, output: RowOutput) -> Vec<Value> {
    match output {
        RowOutput::Rows(rows) => {
            let includes = query.includes().unwrap_or_default();
            rows.iter()
                .map(|row| Value::Object(to_record(row, includes)))
                .collect()
        }
        RowOutput::Values(tuples) => {
            let columns: Vec<String> = query.distinct().iter().map(|f| f.column.clone()).collect();
            tuples
                .iter()
                .map(|values| Value::Object(map_distinct_attributes(&columns, values)))
                .collect()
        }
        RowOutput::Count(count) => vec![json!(count)],
    }
}

/// Rows matching the given filters
pub fn get_rows_by_filter(store: &dyn RowStore, table: &str, filters: Vec<QueryFilter>) -> GatewayResult<Vec<Value>> {
    let query = compile(store, table, filters, false)?;
    let output = store.select(&query)?;
    let results = records(&query, output);
    if results.is_empty() {
        return Err(GatewayError::missing_record("No results found"));
    }
    Ok(results)
}

/// One row by id
pub fn get_row_by_id(store: &dyn RowStore, table: &str, id: i64) -> GatewayResult<Value> {
    let filter = QueryFilter::Where(WhereFilter::with_operator("id", Operator::Eq, json!(id))?);
    get_rows_by_filter(store, table, vec![filter])
        .map_err(|err| match err {
            GatewayError::MissingRecord(_) => GatewayError::missing_record("No result found"),
            other => other,
        })?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing_record("No result found"))
}

/// First row matching the given filters
pub fn get_first_filtered_row(store: &dyn RowStore, table: &str, filters: Vec<QueryFilter>) -> GatewayResult<Value> {
    let mut filters: Vec<QueryFilter> = filters
        .into_iter()
        .filter(|f| !matches!(f, QueryFilter::Limit(_)))
        .collect();
    filters.push(QueryFilter::limit(1)?);

    get_rows_by_filter(store, table, filters)?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing_record("No results found"))
}

/// Number of rows matching the given filters
pub fn get_filtered_row_count(store: &dyn RowStore, table: &str, filters: Vec<QueryFilter>) -> GatewayResult<Value> {
    let query = compile(store, table, filters, true)?;
    let output = store.select(&query)?;
    Ok(records(&query, output).into_iter().next().unwrap_or(json!(0)))
}

/// Insert one row or a list of rows
pub fn create_rows_from_json(store: &dyn RowStore, table: &str, data: &Value, actor: &str) -> GatewayResult<Vec<Value>> {
    let mut created = Vec::new();
    for columns in body_items(data)? {
        let id = store.insert(table, columns, actor)?;
        info!(table, id, "Created row");
        created.push(get_row_by_id(store, table, id)?);
    }
    Ok(created)
}

/// Update one row and return its stored state
pub fn update_row_from_id(
    store: &dyn RowStore,
    table: &str,
    id: i64,
    patch: &Value,
    actor: &str,
) -> GatewayResult<Value> {
    let columns = patch.as_object().ok_or_else(|| {
        GatewayError::bad_request("Bad request made, the request body must be an object")
    })?;
    get_row_by_id(store, table, id)?;
    store.update(table, id, columns, actor)?;
    get_row_by_id(store, table, id)
}

/// Apply a list of patches, each naming its row by `id`
pub fn patch_entities(store: &dyn RowStore, table: &str, data: &Value, actor: &str) -> GatewayResult<Vec<Value>> {
    let mut updated = Vec::new();
    for fields in body_items(data)? {
        let id = fields.get("id").and_then(Value::as_i64).ok_or_else(|| {
            GatewayError::bad_request("Bad request made, each update must contain an 'id'")
        })?;
        let patch: Map<String, Value> = fields
            .iter()
            .filter(|(name, _)| name.as_str() != "id")
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        debug!(table, id, "Patching row");
        updated.push(update_row_from_id(store, table, id, &Value::Object(patch), actor)?);
    }
    Ok(updated)
}

pub fn delete_row_by_id(store: &dyn RowStore, table: &str, id: i64) -> GatewayResult<()> {
    get_row_by_id(store, table, id)?;
    store.delete(table, id)?;
    info!(table, id, "Deleted row");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::str_to_datetime;
    use crate::database::MemoryRowStore;
    use crate::entity::Schema;
    use crate::memory::{load_fixture, MemoryStore};

    fn row_store() -> MemoryRowStore {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({
                "Investigation": [{"id": 1, "title": "Inv", "name": "INV-1"}],
                "Dataset": [
                    {"id": 2, "name": "dataset 2", "investigation": 1},
                    {"id": 3, "name": "dataset 3", "investigation": 1}
                ]
            }),
        )
        .unwrap();
        MemoryRowStore::new(store)
    }

    #[test]
    fn test_rows_serialize_with_foreign_keys() {
        let store = row_store();
        let rows = get_rows_by_filter(
            &store,
            "DATASET",
            vec![QueryFilter::include(&["INVESTIGATION"]).unwrap()],
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["investigationID"], json!(1));
        assert_eq!(rows[0]["INVESTIGATION"]["title"], json!("Inv"));
    }

    #[test]
    fn test_missing_row() {
        let store = row_store();
        assert!(matches!(
            get_row_by_id(&store, "DATASET", 42),
            Err(GatewayError::MissingRecord(msg)) if msg == "No result found"
        ));
        assert!(matches!(
            get_rows_by_filter(
                &store,
                "DATASET",
                vec![QueryFilter::where_("name", "eq", json!("nope")).unwrap()]
            ),
            Err(GatewayError::MissingRecord(_))
        ));
    }

    #[test]
    fn test_count_and_first() {
        let store = row_store();
        assert_eq!(get_filtered_row_count(&store, "DATASET", vec![]).unwrap(), json!(2));

        let first = get_first_filtered_row(
            &store,
            "DATASET",
            vec![QueryFilter::order("id", "desc").unwrap()],
        )
        .unwrap();
        assert_eq!(first["id"], json!(3));
    }

    #[test]
    fn test_create_update_delete() {
        let store = row_store();
        let created = create_rows_from_json(
            &store,
            "DATASET",
            &json!([{"name": "new", "investigationID": 1, "startDate": "2020-01-01 10:00:00"}]),
            "db/user",
        )
        .unwrap();
        let id = created[0]["id"].as_i64().unwrap();
        assert_eq!(created[0]["createId"], json!("db/user"));
        assert_eq!(created[0]["startDate"], json!("2020-01-01 10:00:00"));

        let updated = update_row_from_id(&store, "DATASET", id, &json!({"name": "renamed"}), "db/user").unwrap();
        assert_eq!(updated["name"], json!("renamed"));

        let patched = patch_entities(&store, "DATASET", &json!([{"id": id, "description": "d"}]), "db/user").unwrap();
        assert_eq!(patched[0]["description"], json!("d"));
        assert!(str_to_datetime(patched[0]["modTime"].as_str().unwrap()).is_ok());

        delete_row_by_id(&store, "DATASET", id).unwrap();
        assert!(get_row_by_id(&store, "DATASET", id).is_err());
    }
}
