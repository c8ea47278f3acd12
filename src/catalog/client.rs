//! The session-bound catalog client capability.

use std::sync::Arc;

use serde::Deserialize;

use crate::entity::{AttrValue, EntitySchema};

use super::entity::CatalogEntity;
use super::errors::ClientResult;
use super::query::CatalogQuery;

/// One row of a catalog search result
#[derive(Debug, Clone)]
pub enum SearchResult {
    Entity(CatalogEntity),
    /// Attribute values of a `DISTINCT` query, in attribute order
    Tuple(Vec<AttrValue>),
    Count(u64),
}

/// Login credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// A client bound to one catalog session
pub trait CatalogClient: Send + Sync {
    fn session_id(&self) -> &str;

    /// Minutes left on the session; negative once expired
    fn remaining_minutes(&self) -> ClientResult<f64>;

    fn username(&self) -> ClientResult<String>;

    /// Canonically-cased names of every entity type
    fn entity_names(&self) -> ClientResult<Vec<String>>;

    fn entity_schema(&self, entity: &str) -> ClientResult<Arc<EntitySchema>>;

    fn search(&self, query: &CatalogQuery) -> ClientResult<Vec<SearchResult>>;

    /// Persist a new entity, returning its id
    fn create(&self, entity: &CatalogEntity) -> ClientResult<i64>;

    fn update(&self, entity: &CatalogEntity) -> ClientResult<()>;

    fn delete(&self, entity: &CatalogEntity) -> ClientResult<()>;

    /// Blank entity of the given type, not yet persisted
    fn new_entity(&self, entity: &str) -> ClientResult<CatalogEntity>;

    fn refresh(&self) -> ClientResult<()>;

    fn logout(&self) -> ClientResult<()>;

    /// Upper bound on rows returned by one search, if the catalog has one
    fn max_entities(&self) -> Option<u64>;
}

/// Produces catalog clients
pub trait ClientFactory: Send + Sync {
    /// Start a new session
    fn login(&self, mechanism: &str, credentials: &Credentials) -> ClientResult<Box<dyn CatalogClient>>;

    /// Bind a client to an existing session id; validity is checked on use
    fn connect(&self, session_id: &str) -> Box<dyn CatalogClient>;
}
