//! # Request Parser
//!
//! Pulls the session id, filters and record ids out of HTTP requests.

use axum::http::HeaderMap;
use serde_json::Value;

use crate::common::{GatewayError, GatewayResult};
use crate::filters::{parse_query_params, QueryFilter};

/// Session id from `Authorization: Bearer <id>`
pub fn session_id(headers: &HeaderMap) -> GatewayResult<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(GatewayError::forbidden)
}

/// Filters carried by the query string
pub fn query_filters(pairs: &[(String, String)]) -> GatewayResult<Vec<QueryFilter>> {
    parse_query_params(pairs)
}

/// Record id from a path segment
pub fn record_id(raw: &str) -> GatewayResult<i64> {
    raw.parse().map_err(|_| {
        GatewayError::bad_request(format!("Bad request made, {} is not a valid id", raw))
    })
}

/// JSON value of the query parameter `name`, or null when absent
pub fn json_param(pairs: &[(String, String)], name: &str) -> GatewayResult<Value> {
    match pairs.iter().rev().find(|(key, _)| key == name) {
        Some((_, raw)) => serde_json::from_str(raw).map_err(|err| {
            GatewayError::bad_request(format!("Bad request made, {} is not valid JSON: {}", name, err))
        }),
        None => Ok(Value::Null),
    }
}
