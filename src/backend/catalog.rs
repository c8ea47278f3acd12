//! Backend over a catalog client factory.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::catalog::operations::{
    create_entities, delete_entity_by_id, get_count_with_filters, get_entity_by_id,
    get_entity_with_filters, get_first_with_filters, get_session_details, logout, refresh_session,
    update_entities, update_entity_by_id,
};
use crate::catalog::{requires_session, resolve_endpoint_name, CatalogClient, ClientFactory};
use crate::common::{GatewayError, GatewayResult};
use crate::filters::QueryFilter;

use super::{Backend, LoginRequest, PING_OK_RESPONSE};

/// Backend talking to the catalog
pub struct CatalogBackend {
    factory: Arc<dyn ClientFactory>,
}

impl CatalogBackend {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self { factory }
    }

    /// Run `op` with a client for `session_id`, behind the session guard
    fn with_client<T, F>(&self, session_id: &str, op: F) -> GatewayResult<T>
    where
        F: FnOnce(&dyn CatalogClient) -> GatewayResult<T>,
    {
        let client = self.factory.connect(session_id);
        let client = client.as_ref();
        requires_session(client, || op(client))
    }

    fn entity_name(client: &dyn CatalogClient, entity_type: &str) -> GatewayResult<String> {
        resolve_endpoint_name(&client.entity_names()?, entity_type)
    }
}

impl Backend for CatalogBackend {
    fn ping(&self) -> GatewayResult<String> {
        info!("Pinging catalog backend");
        Ok(PING_OK_RESPONSE.to_string())
    }

    fn login(&self, request: &LoginRequest) -> GatewayResult<String> {
        let client = self
            .factory
            .login(&request.mechanism, &request.credentials)
            .map_err(|err| GatewayError::Authentication(err.to_string()))?;
        Ok(client.session_id().to_string())
    }

    fn get_session_details(&self, session_id: &str) -> GatewayResult<Value> {
        self.with_client(session_id, get_session_details)
    }

    fn refresh(&self, session_id: &str) -> GatewayResult<String> {
        self.with_client(session_id, |client| {
            refresh_session(client)?;
            Ok(client.session_id().to_string())
        })
    }

    fn logout(&self, session_id: &str) -> GatewayResult<()> {
        self.with_client(session_id, logout)
    }

    fn get_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Vec<Value>> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            get_entity_with_filters(client, &entity, filters)
        })
    }

    fn create(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            create_entities(client, &entity, data)
        })
    }

    fn update(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            update_entities(client, &entity, data)
        })
    }

    fn get_one_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            get_first_with_filters(client, &entity, filters)
        })
    }

    fn count_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            get_count_with_filters(client, &entity, filters)
        })
    }

    fn get_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<Value> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            get_entity_by_id(client, &entity, id)
        })
    }

    fn delete_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<()> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            delete_entity_by_id(client, &entity, id)
        })
    }

    fn update_with_id(&self, session_id: &str, entity_type: &str, id: i64, data: &Value) -> GatewayResult<Value> {
        self.with_client(session_id, |client| {
            let entity = Self::entity_name(client, entity_type)?;
            update_entity_by_id(client, &entity, id, data)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::entity::Schema;
    use crate::memory::{load_fixture, MemoryStore};
    use serde_json::json;

    fn backend() -> CatalogBackend {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({"Dataset": [{"id": 1, "name": "first"}, {"id": 2, "name": "second"}]}),
        )
        .unwrap();
        let catalog = Arc::new(MemoryCatalog::new(store).with_user("simple", "root", "pw"));
        CatalogBackend::new(Arc::new(catalog))
    }

    #[test]
    fn test_login_and_read() {
        let backend = backend();
        let session = backend.login(&LoginRequest::new("simple", "root", "pw")).unwrap();

        let records = backend.get_with_filters(&session, "datasets", vec![]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(backend.count_with_filters(&session, "datasets", vec![]).unwrap(), json!(2));

        let details = backend.get_session_details(&session).unwrap();
        assert_eq!(details["USERNAME"], json!("simple/root"));
    }

    #[test]
    fn test_bad_login_and_unknown_session() {
        let backend = backend();
        assert!(matches!(
            backend.login(&LoginRequest::new("simple", "root", "wrong")),
            Err(GatewayError::Authentication(_))
        ));
        assert_eq!(
            backend.get_with_filters("not-a-session", "datasets", vec![]),
            Err(GatewayError::forbidden())
        );
    }

    #[test]
    fn test_logout_ends_session() {
        let backend = backend();
        let session = backend.login(&LoginRequest::new("simple", "root", "pw")).unwrap();
        backend.logout(&session).unwrap();
        assert_eq!(backend.get_with_id(&session, "datasets", 1), Err(GatewayError::forbidden()));
    }
}
