//! # Catalog Operations
//!
//! Record-level operations over a catalog client. These do not check the
//! session themselves; callers wrap them in [`requires_session`].
//!
//! [`requires_session`]: super::guard::requires_session

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::common::{GatewayError, GatewayResult};
use crate::entity::AttrValue;
use crate::filters::{FilterOrderHandler, Operator, QueryFilter, WhereFilter};

use super::client::CatalogClient;
use super::entity::CatalogEntity;
use super::executor::execute;
use super::query::{Aggregate, CatalogQuery};
use super::resolver::resolve_entity_name;

fn resolve(client: &dyn CatalogClient, table_name: &str) -> GatewayResult<String> {
    let names = client.entity_names()?;
    resolve_entity_name(&names, table_name)
}

fn id_query(entity: &str, id: i64) -> GatewayResult<CatalogQuery> {
    let mut query = CatalogQuery::new(entity).with_all_direct_includes();
    let mut handler = FilterOrderHandler::new();
    handler.manage_filters(
        vec![QueryFilter::Where(WhereFilter::with_operator(
            "id",
            Operator::Eq,
            json!(id),
        )?)],
        &mut query,
    )?;
    Ok(query)
}

/// Fetch one entity by id, with its direct relations
pub fn get_raw_entity_by_id(
    client: &dyn CatalogClient,
    table_name: &str,
    id: i64,
) -> GatewayResult<CatalogEntity> {
    let entity = resolve(client, table_name)?;
    execute(client, &id_query(&entity, id)?, false)?
        .into_entities()
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing_record("No result found"))
}

/// Fetch one record by id, with its direct relations
pub fn get_entity_by_id(client: &dyn CatalogClient, table_name: &str, id: i64) -> GatewayResult<Value> {
    let entity = resolve(client, table_name)?;
    execute(client, &id_query(&entity, id)?, true)?
        .into_records()
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing_record("No result found"))
}

/// Apply a patch to a record and return the stored result
pub fn update_entity_by_id(
    client: &dyn CatalogClient,
    table_name: &str,
    id: i64,
    patch: &Value,
) -> GatewayResult<Value> {
    let mut entity = get_raw_entity_by_id(client, table_name, id)?;
    let fields = patch.as_object().ok_or_else(|| {
        GatewayError::bad_request("Bad request made, the request body must be an object")
    })?;
    apply_patch(&mut entity, fields)?;
    client.update(&entity)?;

    // re-fetch so the caller sees what was stored
    get_entity_by_id(client, table_name, id)
}

fn apply_patch(entity: &mut CatalogEntity, fields: &Map<String, Value>) -> GatewayResult<()> {
    let schema = entity.schema().clone();
    for (name, raw) in fields {
        if schema.is_relation(name) || schema.is_meta_attribute(name) {
            return Err(GatewayError::bad_request(format!(
                "Bad request made, cannot modify attribute '{}' within the {} entity",
                name, schema.name
            )));
        }
        let kind = schema.attribute_kind(name).ok_or_else(|| {
            GatewayError::bad_request(format!(
                "Bad request made, cannot find attribute '{}' within the {} entity",
                name, schema.name
            ))
        })?;
        entity.set_attribute(name, AttrValue::from_json(raw, kind)?)?;
    }
    Ok(())
}

/// Delete a record by id
pub fn delete_entity_by_id(client: &dyn CatalogClient, table_name: &str, id: i64) -> GatewayResult<()> {
    let entity = get_raw_entity_by_id(client, table_name, id)?;
    client.delete(&entity)?;
    Ok(())
}

fn filtered_query(
    client: &dyn CatalogClient,
    table_name: &str,
    aggregate: Option<Aggregate>,
    filters: Vec<QueryFilter>,
) -> GatewayResult<CatalogQuery> {
    let entity = resolve(client, table_name)?;
    let mut query = CatalogQuery::new(entity).with_max_entities(client.max_entities());
    if let Some(aggregate) = aggregate {
        query = query.with_aggregate(aggregate);
    }

    let mut handler = FilterOrderHandler::new();
    handler.manage_filters(filters, &mut query)?;
    Ok(query)
}

/// Records matching the given filters
pub fn get_entity_with_filters(
    client: &dyn CatalogClient,
    table_name: &str,
    filters: Vec<QueryFilter>,
) -> GatewayResult<Vec<Value>> {
    let query = filtered_query(client, table_name, None, filters)?;
    let records = execute(client, &query, true)?.into_records();
    if records.is_empty() {
        return Err(GatewayError::missing_record("No results found"));
    }
    Ok(records)
}

/// First record matching the given filters
pub fn get_first_with_filters(
    client: &dyn CatalogClient,
    table_name: &str,
    filters: Vec<QueryFilter>,
) -> GatewayResult<Value> {
    let mut filters: Vec<QueryFilter> = filters
        .into_iter()
        .filter(|f| !matches!(f, QueryFilter::Limit(_)))
        .collect();
    filters.push(QueryFilter::limit(1)?);

    get_entity_with_filters(client, table_name, filters)?
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::missing_record("No results found"))
}

/// Number of records matching the given filters
pub fn get_count_with_filters(
    client: &dyn CatalogClient,
    table_name: &str,
    filters: Vec<QueryFilter>,
) -> GatewayResult<Value> {
    let query = filtered_query(client, table_name, Some(Aggregate::Count), filters)?;
    let output = execute(client, &query, true)?;
    Ok(output.into_records().into_iter().next().unwrap_or(json!(0)))
}

fn build_entity(client: &dyn CatalogClient, entity_name: &str, fields: &Map<String, Value>) -> GatewayResult<CatalogEntity> {
    let mut entity = client.new_entity(entity_name)?;
    let schema = entity.schema().clone();

    for (name, raw) in fields {
        if let Some(relation) = schema.one_relation(name) {
            let target_id = raw.as_i64().ok_or_else(|| {
                GatewayError::bad_request(format!(
                    "Bad request made, relation '{}' must be given as the id of a {}",
                    name, relation.target
                ))
            })?;
            let target = get_raw_entity_by_id(client, &relation.target, target_id)?;
            entity.set_related(name, target)?;
        } else if name == "id" {
            debug!("Ignoring id given for a new entity");
        } else {
            let kind = schema.attribute_kind(name).ok_or_else(|| {
                GatewayError::bad_request(format!(
                    "Bad request made, cannot find attribute '{}' within the {} entity",
                    name, schema.name
                ))
            })?;
            entity.set_attribute(name, AttrValue::from_json(raw, kind)?)?;
        }
    }
    Ok(entity)
}

/// Create one record or a list of records
pub fn create_entities(client: &dyn CatalogClient, table_name: &str, data: &Value) -> GatewayResult<Vec<Value>> {
    let entity_name = resolve(client, table_name)?;
    let items = body_items(data)?;

    let mut created = Vec::with_capacity(items.len());
    for fields in items {
        let entity = build_entity(client, &entity_name, fields)?;
        let id = client.create(&entity)?;
        info!(entity = %entity_name, id, "Created entity");
        created.push(get_entity_by_id(client, &entity_name, id)?);
    }
    Ok(created)
}

/// Apply a list of patches, each naming the record by `id`
pub fn update_entities(client: &dyn CatalogClient, table_name: &str, data: &Value) -> GatewayResult<Vec<Value>> {
    let items = body_items(data)?;

    let mut updated = Vec::with_capacity(items.len());
    for fields in items {
        let id = fields.get("id").and_then(Value::as_i64).ok_or_else(|| {
            GatewayError::bad_request("Bad request made, each update must contain an 'id'")
        })?;
        let mut patch = fields.clone();
        patch.remove("id");
        updated.push(update_entity_by_id(client, table_name, id, &Value::Object(patch))?);
    }
    Ok(updated)
}

pub(crate) fn body_items(data: &Value) -> GatewayResult<Vec<&Map<String, Value>>> {
    let items: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        single @ Value::Object(_) => vec![single],
        _ => {
            return Err(GatewayError::bad_request(
                "Bad request made, the request body must be an object or a list of objects",
            ))
        }
    };
    items
        .into_iter()
        .map(|item| {
            item.as_object().ok_or_else(|| {
                GatewayError::bad_request("Bad request made, each entry must be an object")
            })
        })
        .collect()
}

/// Session id, expiry time and user of the client's session
pub fn get_session_details(client: &dyn CatalogClient) -> GatewayResult<Value> {
    let minutes = client.remaining_minutes()?;
    let expiry = Utc::now() + Duration::seconds((minutes * 60.0) as i64);
    Ok(json!({
        "ID": client.session_id(),
        "EXPIREDATETIME": expiry.format("%Y-%m-%d %H:%M:%S").to_string(),
        "USERNAME": client.username()?,
    }))
}

pub fn refresh_session(client: &dyn CatalogClient) -> GatewayResult<()> {
    client.refresh()?;
    Ok(())
}

pub fn logout(client: &dyn CatalogClient) -> GatewayResult<()> {
    client.logout()?;
    Ok(())
}
