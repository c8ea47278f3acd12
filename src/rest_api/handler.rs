//! # Entity and Session Handlers
//!
//! Axum handlers for the generic entity endpoints and `/sessions`. Each one
//! reads the session id and filters from the request and hands them to the
//! configured backend.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::backend::{Backend, LoginRequest};
use crate::common::{GatewayError, GatewayResult};

use super::parser::{query_filters, record_id, session_id};

/// Shared backend handle
pub type BackendState = Arc<dyn Backend>;

type QueryPairs = Query<Vec<(String, String)>>;

pub async fn ping(State(backend): State<BackendState>) -> GatewayResult<Json<String>> {
    Ok(Json(backend.ping()?))
}

pub async fn login(
    State(backend): State<BackendState>,
    Json(body): Json<Value>,
) -> GatewayResult<(StatusCode, Json<Value>)> {
    let request: LoginRequest = serde_json::from_value(body).map_err(|err| {
        GatewayError::bad_request(format!("Bad request made, invalid login body: {}", err))
    })?;
    let session_id = backend.login(&request)?;
    info!(mechanism = %request.mechanism, "Session created");
    Ok((StatusCode::CREATED, Json(json!({ "sessionID": session_id }))))
}

pub async fn session_details(
    State(backend): State<BackendState>,
    headers: HeaderMap,
) -> GatewayResult<Json<Value>> {
    Ok(Json(backend.get_session_details(&session_id(&headers)?)?))
}

pub async fn refresh(State(backend): State<BackendState>, headers: HeaderMap) -> GatewayResult<Json<String>> {
    Ok(Json(backend.refresh(&session_id(&headers)?)?))
}

pub async fn logout(State(backend): State<BackendState>, headers: HeaderMap) -> GatewayResult<StatusCode> {
    backend.logout(&session_id(&headers)?)?;
    Ok(StatusCode::OK)
}

pub async fn list(
    State(backend): State<BackendState>,
    Path(entity): Path<String>,
    Query(pairs): QueryPairs,
    headers: HeaderMap,
) -> GatewayResult<Json<Vec<Value>>> {
    let session = session_id(&headers)?;
    Ok(Json(backend.get_with_filters(&session, &entity, query_filters(&pairs)?)?))
}

pub async fn create(
    State(backend): State<BackendState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> GatewayResult<Json<Vec<Value>>> {
    Ok(Json(backend.create(&session_id(&headers)?, &entity, &body)?))
}

pub async fn update(
    State(backend): State<BackendState>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> GatewayResult<Json<Vec<Value>>> {
    Ok(Json(backend.update(&session_id(&headers)?, &entity, &body)?))
}

pub async fn find_one(
    State(backend): State<BackendState>,
    Path(entity): Path<String>,
    Query(pairs): QueryPairs,
    headers: HeaderMap,
) -> GatewayResult<Json<Value>> {
    let session = session_id(&headers)?;
    Ok(Json(backend.get_one_with_filters(&session, &entity, query_filters(&pairs)?)?))
}

pub async fn count(
    State(backend): State<BackendState>,
    Path(entity): Path<String>,
    Query(pairs): QueryPairs,
    headers: HeaderMap,
) -> GatewayResult<Json<Value>> {
    let session = session_id(&headers)?;
    Ok(Json(backend.count_with_filters(&session, &entity, query_filters(&pairs)?)?))
}

pub async fn get_by_id(
    State(backend): State<BackendState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> GatewayResult<Json<Value>> {
    Ok(Json(backend.get_with_id(&session_id(&headers)?, &entity, record_id(&id)?)?))
}

pub async fn update_by_id(
    State(backend): State<BackendState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> GatewayResult<Json<Value>> {
    Ok(Json(backend.update_with_id(&session_id(&headers)?, &entity, record_id(&id)?, &body)?))
}

pub async fn delete_by_id(
    State(backend): State<BackendState>,
    Path((entity, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> GatewayResult<StatusCode> {
    backend.delete_with_id(&session_id(&headers)?, &entity, record_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}
