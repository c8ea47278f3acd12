//! # Row Store
//!
//! The relational mirror's storage capability, and an in-memory
//! realization of it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use tracing::debug;

use crate::common::{GatewayError, GatewayResult};
use crate::entity::{AttrValue, EntitySchema, Schema};
use crate::memory::{IncludeTree, MemoryStore, Predicate, Selection, StoreError, StoredRecord};

use super::query::RowQuery;
use super::row::{find_foreign_key, find_relation, table_name, Row};

/// Result of running a [`RowQuery`]
#[derive(Debug, Clone)]
pub enum RowOutput {
    Rows(Vec<Row>),
    /// Distinct column tuples, in the order of the query's distinct fields
    Values(Vec<Vec<AttrValue>>),
    Count(u64),
}

/// Storage behind the relational backend
pub trait RowStore: Send + Sync {
    fn schema(&self) -> GatewayResult<Schema>;

    /// Run a query once
    fn select(&self, query: &RowQuery) -> GatewayResult<RowOutput>;

    /// Insert a row from column values, returning its id
    fn insert(&self, table: &str, columns: &Map<String, Value>, actor: &str) -> GatewayResult<i64>;

    fn update(&self, table: &str, id: i64, columns: &Map<String, Value>, actor: &str) -> GatewayResult<()>;

    fn delete(&self, table: &str, id: i64) -> GatewayResult<()>;
}

/// Find the entity stored in `table`
pub fn entity_for_table<'a>(schema: &'a Schema, table: &str) -> Option<&'a Arc<EntitySchema>> {
    schema
        .names()
        .into_iter()
        .find(|name| table_name(name) == table)
        .and_then(|name| schema.entity(&name))
}

fn store_error(err: StoreError) -> GatewayError {
    match err {
        StoreError::NotFound { .. } => GatewayError::missing_record(err.to_string()),
        StoreError::Constraint(_) => GatewayError::bad_request(err.to_string()),
        err if err.is_invalid_request() => GatewayError::bad_request(err.to_string()),
        err => GatewayError::backend(err.to_string()),
    }
}

/// Translate row columns into a stored record
fn record_from_columns(
    entity: &EntitySchema,
    columns: &Map<String, Value>,
    allow_id: bool,
) -> GatewayResult<StoredRecord> {
    let mut record = StoredRecord::default();
    for (column, raw) in columns {
        if let Some(relation) = find_foreign_key(entity, column) {
            match raw {
                Value::Null => debug!(column = %column, "Ignoring null foreign key"),
                other => {
                    let target = other.as_i64().ok_or_else(|| {
                        GatewayError::bad_request(format!(
                            "Bad request made, {} must be the id of a {} row",
                            column,
                            table_name(&relation.target)
                        ))
                    })?;
                    record.links.insert(relation.name.clone(), target);
                }
            }
            continue;
        }

        let immutable = find_relation(entity, column).is_some()
            || (entity.is_meta_attribute(column) && !(allow_id && column == "id"));
        if immutable {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, cannot modify column '{}' of {}",
                column,
                table_name(&entity.name)
            )));
        }
        let kind = entity.attribute_kind(column).ok_or_else(|| {
            GatewayError::bad_request(format!(
                "Bad request made, unknown column '{}' on {}",
                column,
                table_name(&entity.name)
            ))
        })?;
        record
            .attrs
            .insert(column.clone(), AttrValue::from_json(raw, kind)?);
    }
    Ok(record)
}

/// Relational mirror held in memory
#[derive(Debug)]
pub struct MemoryRowStore {
    store: RwLock<MemoryStore>,
}

impl MemoryRowStore {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store: RwLock::new(store),
        }
    }

    fn read(&self) -> GatewayResult<RwLockReadGuard<'_, MemoryStore>> {
        self.store
            .read()
            .map_err(|_| GatewayError::backend("row store lock poisoned"))
    }

    fn write(&self) -> GatewayResult<RwLockWriteGuard<'_, MemoryStore>> {
        self.store
            .write()
            .map_err(|_| GatewayError::backend("row store lock poisoned"))
    }
}

fn distinct_tuples(store: &MemoryStore, query: &RowQuery, ids: &[i64]) -> GatewayResult<Vec<Vec<AttrValue>>> {
    let entity = &query.entity().name;
    let mut seen: Vec<Vec<AttrValue>> = Vec::new();
    for id in ids {
        let tuple = query
            .distinct()
            .iter()
            .map(|field| {
                Ok(store
                    .values_at(entity, *id, &field.path)
                    .map_err(store_error)?
                    .into_iter()
                    .next()
                    .unwrap_or(AttrValue::Null))
            })
            .collect::<GatewayResult<Vec<_>>>()?;
        if !seen.contains(&tuple) {
            seen.push(tuple);
        }
    }
    Ok(seen)
}

impl RowStore for MemoryRowStore {
    fn schema(&self) -> GatewayResult<Schema> {
        Ok(self.read()?.schema().clone())
    }

    fn select(&self, query: &RowQuery) -> GatewayResult<RowOutput> {
        let store = self.read()?;
        let entity = query.entity().name.clone();
        debug!(sql = %query, "Executing row query");

        let mut selection = Selection::new(entity.as_str());
        if !query.conditions().is_empty() {
            selection.filter = Some(Predicate::All(
                query
                    .conditions()
                    .iter()
                    .map(|c| Predicate::Compare {
                        path: c.field.path.clone(),
                        operator: c.operator,
                        value: c.value.clone(),
                    })
                    .collect(),
            ));
        }
        selection.order = query
            .order()
            .iter()
            .map(|(field, ascending)| (field.path.clone(), *ascending))
            .collect();

        let windowed = query.distinct().is_empty() && !query.is_count();
        if windowed {
            selection.skip = query.offset();
            selection.limit = query.limit();
        }
        let ids = store.select(&selection).map_err(store_error)?;

        if query.is_count() {
            let count = if query.distinct().is_empty() {
                ids.len()
            } else {
                distinct_tuples(&store, query, &ids)?.len()
            };
            return Ok(RowOutput::Count(count as u64));
        }

        if !query.distinct().is_empty() {
            let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
            let tuples = distinct_tuples(&store, query, &ids)?.into_iter().skip(skip);
            return Ok(RowOutput::Values(match query.limit() {
                Some(limit) => tuples.take(usize::try_from(limit).unwrap_or(usize::MAX)).collect(),
                None => tuples.collect(),
            }));
        }

        let paths = query
            .includes()
            .unwrap_or_default()
            .iter()
            .map(|path| query.resolve_include(path))
            .collect::<GatewayResult<Vec<_>>>()?;
        let includes = IncludeTree::from_paths(&paths);

        ids.into_iter()
            .map(|id| {
                store
                    .materialize(&entity, id, &includes)
                    .map(Row::from)
                    .map_err(store_error)
            })
            .collect::<GatewayResult<Vec<_>>>()
            .map(RowOutput::Rows)
    }

    fn insert(&self, table: &str, columns: &Map<String, Value>, actor: &str) -> GatewayResult<i64> {
        let mut store = self.write()?;
        let entity = entity_for_table(store.schema(), table)
            .cloned()
            .ok_or_else(|| GatewayError::bad_request(format!("Bad request made, unknown table {}", table)))?;
        let record = record_from_columns(&entity, columns, true)?;
        store.insert(&entity.name, record, actor).map_err(store_error)
    }

    fn update(&self, table: &str, id: i64, columns: &Map<String, Value>, actor: &str) -> GatewayResult<()> {
        let mut store = self.write()?;
        let entity = entity_for_table(store.schema(), table)
            .cloned()
            .ok_or_else(|| GatewayError::bad_request(format!("Bad request made, unknown table {}", table)))?;
        let record = record_from_columns(&entity, columns, false)?;
        store.update(&entity.name, id, record, actor).map_err(store_error)
    }

    fn delete(&self, table: &str, id: i64) -> GatewayResult<()> {
        let mut store = self.write()?;
        let entity = entity_for_table(store.schema(), table)
            .cloned()
            .ok_or_else(|| GatewayError::bad_request(format!("Bad request made, unknown table {}", table)))?;
        store.delete(&entity.name, id).map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FilterOrderHandler, QueryFilter};
    use crate::memory::load_fixture;
    use serde_json::json;

    fn row_store() -> MemoryRowStore {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({
                "Investigation": [{"id": 1, "title": "Inv"}],
                "Dataset": [
                    {"id": 2, "name": "b", "investigation": 1},
                    {"id": 3, "name": "a", "investigation": 1},
                    {"id": 4, "name": "a"}
                ]
            }),
        )
        .unwrap();
        MemoryRowStore::new(store)
    }

    fn compile(store: &MemoryRowStore, filters: Vec<QueryFilter>) -> RowQuery {
        let mut query = RowQuery::new(&store.schema().unwrap(), "DATASET").unwrap();
        FilterOrderHandler::new().manage_filters(filters, &mut query).unwrap();
        query
    }

    #[test]
    fn test_select_rows_with_include() {
        let store = row_store();
        let query = compile(
            &store,
            vec![
                QueryFilter::where_("investigationID", "eq", json!(1)).unwrap(),
                QueryFilter::order("name", "asc").unwrap(),
                QueryFilter::include(&["INVESTIGATION"]).unwrap(),
            ],
        );
        match store.select(&query).unwrap() {
            RowOutput::Rows(rows) => {
                let ids: Vec<_> = rows.iter().map(|r| r.id()).collect();
                assert_eq!(ids, vec![Some(3), Some(2)]);
            }
            other => panic!("unexpected output {:?}", other),
        }
    }

    #[test]
    fn test_distinct_and_count() {
        let store = row_store();
        let query = compile(&store, vec![QueryFilter::distinct(&["name"]).unwrap()]);
        match store.select(&query).unwrap() {
            RowOutput::Values(values) => assert_eq!(values.len(), 2),
            other => panic!("unexpected output {:?}", other),
        }

        let counting = RowQuery::new(&store.schema().unwrap(), "DATASET")
            .unwrap()
            .counting();
        assert!(matches!(store.select(&counting).unwrap(), RowOutput::Count(3)));
    }

    #[test]
    fn test_insert_rejects_unknown_and_meta_columns() {
        let store = row_store();
        let created = store
            .insert("DATASET", json!({"name": "c", "investigationID": 1}).as_object().unwrap(), "db")
            .unwrap();
        assert!(created > 4);

        assert!(matches!(
            store.insert("DATASET", json!({"colour": "red"}).as_object().unwrap(), "db"),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(matches!(
            store.update("DATASET", 2, json!({"createId": "me"}).as_object().unwrap(), "db"),
            Err(GatewayError::BadRequest(_))
        ));
        assert!(matches!(store.delete("DATASET", 99), Err(GatewayError::MissingRecord(_))));
    }
}
