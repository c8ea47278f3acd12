//! Loading store contents from JSON.
//!
//! A fixture maps entity names to lists of records. Scalar attributes use
//! their JSON form (dates in the canonical format) and to-one relations are
//! given as the id of the target record:
//!
//! ```json
//! {"Facility": [{"id": 1, "name": "ISIS"}],
//!  "Investigation": [{"id": 2, "title": "Neutrons", "facility": 1}]}
//! ```

use std::path::Path;

use serde_json::Value;
use tracing::info;

use crate::entity::AttrValue;

use super::errors::{StoreError, StoreResult};
use super::store::{MemoryStore, StoredRecord};

const FIXTURE_ACTOR: &str = "fixture";

/// Load a fixture document; returns the number of records inserted
///
/// Records are inserted first and linked afterwards, so the entity lists may
/// appear in any order.
pub fn load_fixture(store: &mut MemoryStore, fixture: &Value) -> StoreResult<usize> {
    let entities = fixture
        .as_object()
        .ok_or_else(|| StoreError::InvalidValue("fixture must be an object".to_string()))?;

    let mut pending_links = Vec::new();
    let mut inserted = 0;

    for (entity, records) in entities {
        let schema = store.entity_schema(entity)?.clone();
        let records = records.as_array().ok_or_else(|| {
            StoreError::InvalidValue(format!("fixture entry for {} must be a list", entity))
        })?;

        for raw in records {
            let fields = raw.as_object().ok_or_else(|| {
                StoreError::InvalidValue(format!("{} fixture records must be objects", entity))
            })?;

            let mut record = StoredRecord::default();
            let mut links = Vec::new();
            for (name, value) in fields {
                if let Some(kind) = schema.attribute_kind(name) {
                    let parsed = AttrValue::from_json(value, kind)
                        .map_err(|e| StoreError::InvalidValue(e.to_string()))?;
                    record.attrs.insert(name.clone(), parsed);
                } else if schema.one_relation(name).is_some() {
                    let target = value.as_i64().ok_or_else(|| {
                        StoreError::InvalidValue(format!(
                            "{}.{} must be given as a record id",
                            entity, name
                        ))
                    })?;
                    links.push((name.clone(), target));
                } else {
                    return Err(StoreError::unknown_field(entity, name));
                }
            }

            let id = store.insert(entity, record, FIXTURE_ACTOR)?;
            pending_links.extend(links.into_iter().map(|(rel, target)| (entity.clone(), id, rel, target)));
            inserted += 1;
        }
    }

    for (entity, id, relation, target) in pending_links {
        store.link(&entity, id, &relation, target)?;
    }

    info!(records = inserted, "Loaded fixture");
    Ok(inserted)
}

/// Load a fixture file
pub fn load_fixture_file(store: &mut MemoryStore, path: &Path) -> StoreResult<usize> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StoreError::InvalidValue(format!("cannot read fixture {}: {}", path.display(), e))
    })?;
    let fixture: Value = serde_json::from_str(&content).map_err(|e| {
        StoreError::InvalidValue(format!("cannot parse fixture {}: {}", path.display(), e))
    })?;
    load_fixture(store, &fixture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Schema;
    use serde_json::json;

    #[test]
    fn test_links_resolved_regardless_of_order() {
        let mut store = MemoryStore::new(Schema::icat());
        let count = load_fixture(
            &mut store,
            &json!({
                "Dataset": [{"id": 10, "name": "ds", "investigation": 5}],
                "Investigation": [{"id": 5, "title": "inv", "startDate": "2020-01-01 10:00:00"}]
            }),
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.get("Dataset", 10).unwrap().links["investigation"], 5);
        assert!(store.get("Investigation", 5).unwrap().attrs["startDate"].is_date());
    }

    #[test]
    fn test_bad_fixture_values() {
        let mut store = MemoryStore::new(Schema::icat());
        assert!(load_fixture(&mut store, &json!({"Dataset": [{"name": 4}]})).is_err());
        assert!(load_fixture(&mut store, &json!({"Dataset": [{"colour": "red"}]})).is_err());
        assert!(load_fixture(&mut store, &json!({"Widget": []})).is_err());
    }
}
