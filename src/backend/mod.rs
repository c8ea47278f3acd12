//! # Backends
//!
//! The data operations served over HTTP, implemented once for the catalog
//! and once for the relational mirror. Every operation except `ping` and
//! `login` is bound to a session id and checks it first.

mod catalog;
mod database;

use serde::Deserialize;
use serde_json::Value;

use crate::catalog::Credentials;
use crate::common::GatewayResult;
use crate::filters::QueryFilter;

pub use catalog::CatalogBackend;
pub use database::DatabaseBackend;

/// Body of a successful ping
pub const PING_OK_RESPONSE: &str = "DataGateway API OK";

/// Authentication mechanism used when a login names none
pub const DEFAULT_MECHANISM: &str = "simple";

/// Body of `POST /sessions`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    #[serde(default = "default_mechanism")]
    pub mechanism: String,
    #[serde(flatten)]
    pub credentials: Credentials,
}

fn default_mechanism() -> String {
    DEFAULT_MECHANISM.to_string()
}

impl LoginRequest {
    pub fn new(mechanism: &str, username: &str, password: &str) -> Self {
        Self {
            mechanism: mechanism.to_string(),
            credentials: Credentials::new(username, password),
        }
    }
}

/// Data operations shared by both backends
///
/// `entity_type` is the endpoint name (`datasets`, `Dataset`, ...); each
/// backend resolves it against its own entity names.
pub trait Backend: Send + Sync {
    fn ping(&self) -> GatewayResult<String>;

    /// Start a session, returning its id
    fn login(&self, request: &LoginRequest) -> GatewayResult<String>;

    fn get_session_details(&self, session_id: &str) -> GatewayResult<Value>;

    /// Extend a session, returning its id
    fn refresh(&self, session_id: &str) -> GatewayResult<String>;

    fn logout(&self, session_id: &str) -> GatewayResult<()>;

    fn get_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Vec<Value>>;

    fn create(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>>;

    fn update(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>>;

    fn get_one_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value>;

    fn count_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value>;

    fn get_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<Value>;

    fn delete_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<()>;

    fn update_with_id(&self, session_id: &str, entity_type: &str, id: i64, data: &Value) -> GatewayResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_request_defaults_mechanism() {
        let request: LoginRequest =
            serde_json::from_value(json!({"username": "root", "password": "pw"})).unwrap();
        assert_eq!(request, LoginRequest::new("simple", "root", "pw"));

        let anon: LoginRequest = serde_json::from_value(json!({"mechanism": "anon"})).unwrap();
        assert_eq!(anon.mechanism, "anon");
        assert!(anon.credentials.username.is_empty());
    }
}
