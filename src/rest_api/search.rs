//! Axum handlers for the PaNOSC search API.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::catalog::resolve_endpoint_name;
use crate::common::{GatewayError, GatewayResult};
use crate::search_api::SearchApi;

use super::parser::json_param;

pub type SearchState = Arc<SearchApi>;

type QueryPairs = Query<Vec<(String, String)>>;

fn entity_name(api: &SearchApi, endpoint: &str) -> GatewayResult<String> {
    resolve_endpoint_name(&api.mappings().names(), endpoint)
}

fn dataset_endpoint(api: &SearchApi, endpoint: &str) -> GatewayResult<()> {
    match entity_name(api, endpoint)?.as_str() {
        "Dataset" => Ok(()),
        other => Err(GatewayError::bad_request(format!(
            "Bad request made, files are only listed for datasets, not {}",
            other
        ))),
    }
}

pub async fn search(
    State(api): State<SearchState>,
    Path(endpoint): Path<String>,
    Query(pairs): QueryPairs,
) -> GatewayResult<Json<Vec<Value>>> {
    let entity = entity_name(&api, &endpoint)?;
    Ok(Json(api.get_search(&entity, &json_param(&pairs, "filter")?)?))
}

pub async fn count(
    State(api): State<SearchState>,
    Path(endpoint): Path<String>,
    Query(pairs): QueryPairs,
) -> GatewayResult<Json<Value>> {
    let entity = entity_name(&api, &endpoint)?;
    Ok(Json(api.get_count(&entity, &json_param(&pairs, "where")?)?))
}

pub async fn with_pid(
    State(api): State<SearchState>,
    Path((endpoint, pid)): Path<(String, String)>,
    Query(pairs): QueryPairs,
) -> GatewayResult<Json<Value>> {
    let entity = entity_name(&api, &endpoint)?;
    Ok(Json(api.get_with_pid(&entity, &pid, &json_param(&pairs, "filter")?)?))
}

pub async fn files(
    State(api): State<SearchState>,
    Path((endpoint, pid)): Path<(String, String)>,
    Query(pairs): QueryPairs,
) -> GatewayResult<Json<Vec<Value>>> {
    dataset_endpoint(&api, &endpoint)?;
    Ok(Json(api.get_files(&pid, &json_param(&pairs, "filter")?)?))
}

pub async fn files_count(
    State(api): State<SearchState>,
    Path((endpoint, pid)): Path<(String, String)>,
    Query(pairs): QueryPairs,
) -> GatewayResult<Json<Value>> {
    dataset_endpoint(&api, &endpoint)?;
    Ok(Json(api.get_files_count(&pid, &json_param(&pairs, "where")?)?))
}
