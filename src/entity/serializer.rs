//! Recursive entity serialization.
//!
//! Include paths are split on dots and flattened into one list of relation
//! names. Each level consumes the relation names it expands, so recursion
//! terminates once the list no longer names a relation of the current entity.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use super::{Entity, Related};

/// Split dotted include paths and flatten them, in sorted path order
pub fn flatten_includes<S: AsRef<str>>(includes: &[S]) -> Vec<String> {
    let mut paths: Vec<&str> = includes.iter().map(|p| p.as_ref()).collect();
    paths.sort_unstable();
    paths
        .into_iter()
        .flat_map(|path| path.split('.'))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Convert an entity and its included relations into a JSON-ready map
pub fn to_record<S: AsRef<str>>(entity: &dyn Entity, includes: &[S]) -> Map<String, Value> {
    entity_to_map(entity, &flatten_includes(includes))
}

fn entity_to_map(entity: &dyn Entity, includes: &[String]) -> Map<String, Value> {
    let mut record = Map::new();

    let included_relations: BTreeSet<&str> = entity
        .relation_attributes()
        .into_iter()
        .filter(|rel| includes.iter().any(|inc| inc == rel))
        .collect();

    let mut keys: BTreeSet<&str> = entity.instance_attributes().into_iter().collect();
    keys.extend(entity.meta_attributes());
    keys.extend(included_relations.iter().copied());

    for key in keys {
        if included_relations.contains(key) {
            let mut remaining = includes.to_vec();
            match remaining.iter().position(|inc| inc == key) {
                Some(index) => {
                    remaining.remove(index);
                }
                None => warn!(
                    key,
                    "Key couldn't be found to remove from include list, this could cause an \
                     issue further on in the request"
                ),
            }

            match entity.get_related(key) {
                Related::One(target) => {
                    record.insert(key.to_string(), Value::Object(entity_to_map(target, &remaining)));
                }
                Related::Many(targets) => {
                    let items = targets
                        .into_iter()
                        .map(|target| Value::Object(entity_to_map(target, &remaining)))
                        .collect();
                    record.insert(key.to_string(), Value::Array(items));
                }
                Related::Absent => {}
            }
        } else {
            let value = entity.get(key).map_or(Value::Null, |v| v.to_json());
            record.insert(key.to_string(), value);
        }
    }

    record
}
