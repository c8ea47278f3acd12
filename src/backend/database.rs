//! Backend over the relational mirror.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::catalog::resolve_endpoint_name;
use crate::common::{GatewayError, GatewayResult, ACCEPTED_DATE_FORMAT};
use crate::database::operations::{
    create_rows_from_json, delete_row_by_id, get_filtered_row_count, get_first_filtered_row,
    get_row_by_id, get_rows_by_filter, patch_entities, update_row_from_id,
};
use crate::database::{requires_valid_session, table_name, RowStore, SessionManager, SessionRepository};
use crate::filters::QueryFilter;

use super::{Backend, LoginRequest, PING_OK_RESPONSE};

/// Backend reading and writing the relational mirror
pub struct DatabaseBackend<R: SessionRepository> {
    store: Arc<dyn RowStore>,
    sessions: SessionManager<R>,
}

impl<R: SessionRepository> DatabaseBackend<R> {
    pub fn new(store: Arc<dyn RowStore>, sessions: SessionManager<R>) -> Self {
        Self { store, sessions }
    }

    fn table(&self, entity_type: &str) -> GatewayResult<String> {
        let names = self.store.schema()?.names();
        Ok(table_name(&resolve_endpoint_name(&names, entity_type)?))
    }
}

impl<R: SessionRepository> Backend for DatabaseBackend<R> {
    fn ping(&self) -> GatewayResult<String> {
        info!("Pinging relational mirror to ensure API is alive and well");
        let tables: Vec<String> = self.store.schema()?.names().iter().map(|n| table_name(n)).collect();
        debug!(?tables, "Tables on ping");
        Ok(PING_OK_RESPONSE.to_string())
    }

    fn login(&self, request: &LoginRequest) -> GatewayResult<String> {
        let session = self
            .sessions
            .login(&request.credentials.username, &request.credentials.password)
            .map_err(|_| GatewayError::Authentication("Username and password are incorrect".to_string()))?;
        info!(mechanism = %request.mechanism, username = %session.username, "Database login");
        Ok(session.id.to_string())
    }

    fn get_session_details(&self, session_id: &str) -> GatewayResult<Value> {
        requires_valid_session(&self.sessions, session_id, |session| {
            Ok(json!({
                "ID": session.id.to_string(),
                "EXPIREDATETIME": session.expires_at.format(ACCEPTED_DATE_FORMAT).to_string(),
                "USERNAME": session.username,
            }))
        })
    }

    fn refresh(&self, session_id: &str) -> GatewayResult<String> {
        let session = self.sessions.refresh(session_id)?;
        Ok(session.id.to_string())
    }

    fn logout(&self, session_id: &str) -> GatewayResult<()> {
        self.sessions.logout(session_id)?;
        Ok(())
    }

    fn get_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Vec<Value>> {
        requires_valid_session(&self.sessions, session_id, |_| {
            get_rows_by_filter(self.store.as_ref(), &self.table(entity_type)?, filters)
        })
    }

    fn create(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>> {
        requires_valid_session(&self.sessions, session_id, |session| {
            create_rows_from_json(self.store.as_ref(), &self.table(entity_type)?, data, &session.username)
        })
    }

    fn update(&self, session_id: &str, entity_type: &str, data: &Value) -> GatewayResult<Vec<Value>> {
        requires_valid_session(&self.sessions, session_id, |session| {
            patch_entities(self.store.as_ref(), &self.table(entity_type)?, data, &session.username)
        })
    }

    fn get_one_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value> {
        requires_valid_session(&self.sessions, session_id, |_| {
            get_first_filtered_row(self.store.as_ref(), &self.table(entity_type)?, filters)
        })
    }

    fn count_with_filters(
        &self,
        session_id: &str,
        entity_type: &str,
        filters: Vec<QueryFilter>,
    ) -> GatewayResult<Value> {
        requires_valid_session(&self.sessions, session_id, |_| {
            get_filtered_row_count(self.store.as_ref(), &self.table(entity_type)?, filters)
        })
    }

    fn get_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<Value> {
        requires_valid_session(&self.sessions, session_id, |_| {
            get_row_by_id(self.store.as_ref(), &self.table(entity_type)?, id)
        })
    }

    fn delete_with_id(&self, session_id: &str, entity_type: &str, id: i64) -> GatewayResult<()> {
        requires_valid_session(&self.sessions, session_id, |_| {
            delete_row_by_id(self.store.as_ref(), &self.table(entity_type)?, id)
        })
    }

    fn update_with_id(&self, session_id: &str, entity_type: &str, id: i64, data: &Value) -> GatewayResult<Value> {
        requires_valid_session(&self.sessions, session_id, |session| {
            update_row_from_id(self.store.as_ref(), &self.table(entity_type)?, id, data, &session.username)
        })
    }
}
