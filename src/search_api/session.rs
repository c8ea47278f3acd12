//! The process-shared anonymous catalog client used by the search API.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::catalog::{CatalogClient, ClientFactory, Credentials};
use crate::common::{GatewayError, GatewayResult};

/// Hands out clients bound to one anonymous session, logging in again when
/// that session is missing or has expired
pub struct SearchClientManager {
    factory: Arc<dyn ClientFactory>,
    mechanism: String,
    session: RwLock<Option<String>>,
}

impl SearchClientManager {
    pub fn new(factory: Arc<dyn ClientFactory>, mechanism: impl Into<String>) -> Self {
        Self {
            factory,
            mechanism: mechanism.into(),
            session: RwLock::new(None),
        }
    }

    /// Current anonymous session id, if one has been created
    pub fn session_id(&self) -> Option<String> {
        self.session.read().ok().and_then(|s| s.clone())
    }

    /// A client whose session is valid
    pub fn client(&self) -> GatewayResult<Box<dyn CatalogClient>> {
        if let Some(session_id) = self.session_id() {
            let client = self.factory.connect(&session_id);
            match client.remaining_minutes() {
                Ok(minutes) if minutes > 0.0 => return Ok(client),
                _ => debug!(session_id = %session_id, "Search API session expired"),
            }
        }
        self.login()
    }

    fn login(&self) -> GatewayResult<Box<dyn CatalogClient>> {
        let client = self
            .factory
            .login(&self.mechanism, &Credentials::default())
            .map_err(|err| GatewayError::Authentication(err.to_string()))?;
        info!(mechanism = %self.mechanism, "Search API logged in anonymously");

        let mut session = self
            .session
            .write()
            .map_err(|_| GatewayError::backend("search API session lock poisoned"))?;
        *session = Some(client.session_id().to_string());
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::entity::Schema;
    use crate::memory::MemoryStore;

    fn catalog(minutes: i64) -> Arc<MemoryCatalog> {
        Arc::new(
            MemoryCatalog::new(MemoryStore::new(Schema::icat()))
                .with_user("anon", "", "")
                .with_session_minutes(minutes),
        )
    }

    #[test]
    fn test_session_is_reused() {
        let manager = SearchClientManager::new(Arc::new(catalog(60)), "anon");
        assert!(manager.session_id().is_none());

        let first = manager.client().unwrap().session_id().to_string();
        let second = manager.client().unwrap().session_id().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_session_logs_in_again() {
        let catalog = catalog(-1);
        let manager = SearchClientManager::new(Arc::new(Arc::clone(&catalog)), "anon");
        let first = manager.client().unwrap().session_id().to_string();
        let second = manager.client().unwrap().session_id().to_string();
        assert_ne!(first, second);

        // the replaced session is gone from the catalog
        assert!(catalog.connect(&first).remaining_minutes().is_err());
    }

    #[test]
    fn test_rejected_login() {
        let manager = SearchClientManager::new(Arc::new(catalog(60)), "ldap");
        assert!(matches!(manager.client(), Err(GatewayError::Authentication(_))));
    }
}
