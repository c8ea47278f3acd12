//! Conversion of catalog entities into PaNOSC records.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::common::GatewayResult;
use crate::entity::{AttrValue, Entity, Related};

use super::mappings::{FieldSource, Mappings};

/// Entities reached by following `path`, and whether a to-many hop was taken
fn follow<'a>(entity: &'a dyn Entity, path: &[&str]) -> (Vec<&'a dyn Entity>, bool) {
    let mut current = vec![entity];
    let mut many = false;
    for name in path {
        let mut next = Vec::new();
        for item in current {
            match item.get_related(name) {
                Related::One(target) => next.push(target),
                Related::Many(targets) => {
                    many = true;
                    next.extend(targets);
                }
                Related::Absent => {}
            }
        }
        current = next;
    }
    (current, many)
}

fn field_values<'a>(entity: &'a dyn Entity, path: &str) -> (Vec<&'a AttrValue>, bool) {
    let segments: Vec<&str> = path.split('.').collect();
    match segments.split_last() {
        Some((attr, relations)) => {
            let (holders, many) = follow(entity, relations);
            (holders.iter().filter_map(|h| h.get(attr)).collect(), many)
        }
        None => (Vec::new(), false),
    }
}

fn is_released(value: Option<&AttrValue>) -> bool {
    match value {
        Some(AttrValue::Date(date)) => *date <= Utc::now().fixed_offset(),
        _ => false,
    }
}

/// Render `entity` as the PaNOSC entity `panosc_name`
///
/// `relations` are the dotted PaNOSC relation paths to embed.
pub fn to_panosc<S: AsRef<str>>(
    mappings: &Mappings,
    panosc_name: &str,
    entity: &dyn Entity,
    relations: &[S],
) -> GatewayResult<Value> {
    let panosc = mappings.entity(panosc_name)?;
    let mut record = Map::new();

    for field in &panosc.fields {
        let (values, many) = field_values(entity, field.source.path());
        let value = match field.source {
            FieldSource::ReleasedBy(_) => Value::Bool(is_released(values.first().copied())),
            FieldSource::Path(_) if many => Value::Array(values.iter().map(|v| v.to_json()).collect()),
            FieldSource::Path(_) => values.first().map_or(Value::Null, |v| v.to_json()),
        };
        record.insert(field.name.to_string(), value);
    }

    for relation in &panosc.relations {
        let nested: Vec<&str> = relations
            .iter()
            .map(AsRef::as_ref)
            .filter_map(|path| match path.split_once('.') {
                Some((head, rest)) if head == relation.name => Some(rest),
                _ => None,
            })
            .collect();
        let requested = nested.len()
            + relations.iter().filter(|p| p.as_ref() == relation.name).count();
        if requested == 0 {
            continue;
        }

        let icat_path: Vec<&str> = relation.icat_path.split('.').collect();
        let (targets, _) = follow(entity, &icat_path);
        let rendered = targets
            .into_iter()
            .map(|target| to_panosc(mappings, relation.target, target, &nested))
            .collect::<GatewayResult<Vec<_>>>()?;

        let value = if relation.many {
            Value::Array(rendered)
        } else {
            rendered.into_iter().next().unwrap_or(Value::Null)
        };
        record.insert(relation.name.to_string(), value);
    }

    Ok(Value::Object(record))
}
