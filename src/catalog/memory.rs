//! # In-Memory Catalog
//!
//! A catalog server held in process memory, with session handling and a
//! small user table. `MemoryCatalog` hands out `MemoryCatalogClient`s bound
//! to one session each.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{AttrValue, EntitySchema};
use crate::filters::WhereTree;
use crate::memory::{IncludeTree, MemoryStore, Predicate, Selection, StoreError, StoredRecord};

use super::client::{CatalogClient, ClientFactory, Credentials, SearchResult};
use super::entity::CatalogEntity;
use super::errors::{ClientError, ClientResult};
use super::query::{Aggregate, CatalogQuery};

/// Default session lifetime in minutes
pub const DEFAULT_SESSION_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
struct CatalogSession {
    username: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
struct CatalogState {
    store: MemoryStore,
    sessions: HashMap<String, CatalogSession>,
    /// (mechanism, username) -> password
    users: HashMap<(String, String), String>,
}

impl CatalogState {
    /// Drop sessions past their expiry, returning how many went
    fn prune_expired(&mut self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.expires_at > now);
        before - self.sessions.len()
    }
}

/// An in-memory catalog server
#[derive(Debug)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    session_minutes: i64,
    max_entities: Option<u64>,
}

impl MemoryCatalog {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            state: RwLock::new(CatalogState {
                store,
                sessions: HashMap::new(),
                users: HashMap::new(),
            }),
            session_minutes: DEFAULT_SESSION_MINUTES,
            max_entities: None,
        }
    }

    /// Register a user for `mechanism`
    pub fn with_user(self, mechanism: &str, username: &str, password: &str) -> Self {
        if let Ok(mut state) = self.state.write() {
            state
                .users
                .insert((mechanism.to_string(), username.to_string()), password.to_string());
        }
        self
    }

    pub fn with_session_minutes(mut self, minutes: i64) -> Self {
        self.session_minutes = minutes;
        self
    }

    pub fn with_max_entities(mut self, max_entities: Option<u64>) -> Self {
        self.max_entities = max_entities;
        self
    }

    fn read(&self) -> ClientResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|_| ClientError::Internal("catalog state lock poisoned".to_string()))
    }

    fn write(&self) -> ClientResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|_| ClientError::Internal("catalog state lock poisoned".to_string()))
    }

    fn session(state: &CatalogState, session_id: &str) -> ClientResult<CatalogSession> {
        state
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ClientError::Session(format!("Unable to find session id {}", session_id)))
    }

    fn live_session(state: &CatalogState, session_id: &str) -> ClientResult<CatalogSession> {
        let session = Self::session(state, session_id)?;
        if session.expires_at <= Utc::now() {
            return Err(ClientError::Session(format!("Session id {} has expired", session_id)));
        }
        Ok(session)
    }

    fn client(self: &Arc<Self>, session_id: String) -> MemoryCatalogClient {
        MemoryCatalogClient {
            catalog: Arc::clone(self),
            session_id,
        }
    }
}

fn store_error(err: StoreError) -> ClientError {
    match err {
        StoreError::NotFound { .. } => ClientError::NoSuchObject(err.to_string()),
        err if err.is_invalid_request() => ClientError::Validation(err.to_string()),
        err => ClientError::Internal(err.to_string()),
    }
}

impl ClientFactory for Arc<MemoryCatalog> {
    fn login(&self, mechanism: &str, credentials: &Credentials) -> ClientResult<Box<dyn CatalogClient>> {
        let mut state = self.write()?;
        let known = state
            .users
            .get(&(mechanism.to_string(), credentials.username.clone()));
        if known != Some(&credentials.password) {
            return Err(ClientError::Authentication(format!(
                "Login failed for {} using {}",
                credentials.username, mechanism
            )));
        }

        let pruned = state.prune_expired();
        if pruned > 0 {
            debug!(pruned, "Removed expired catalog sessions");
        }

        let session_id = Uuid::new_v4().to_string();
        state.sessions.insert(
            session_id.clone(),
            CatalogSession {
                username: format!("{}/{}", mechanism, credentials.username),
                expires_at: Utc::now() + Duration::minutes(self.session_minutes),
            },
        );
        info!(mechanism, username = %credentials.username, "Catalog login");
        Ok(Box::new(self.client(session_id)))
    }

    fn connect(&self, session_id: &str) -> Box<dyn CatalogClient> {
        Box::new(self.client(session_id.to_string()))
    }
}

/// Client bound to one session of a [`MemoryCatalog`]
#[derive(Debug, Clone)]
pub struct MemoryCatalogClient {
    catalog: Arc<MemoryCatalog>,
    session_id: String,
}

impl MemoryCatalogClient {
    fn to_record(entity: &CatalogEntity) -> StoredRecord {
        StoredRecord {
            attrs: entity
                .attributes()
                .iter()
                .filter(|(name, value)| name.as_str() != "id" && !value.is_null())
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            links: entity
                .one_relations()
                .iter()
                .filter_map(|(name, target)| target.id().map(|id| (name.clone(), id)))
                .collect(),
        }
    }

    fn entity_id(entity: &CatalogEntity) -> ClientResult<i64> {
        entity.id().ok_or_else(|| {
            ClientError::Validation(format!("{} entity has no id", entity.schema().name))
        })
    }
}

fn tree_predicate(tree: &WhereTree) -> Predicate {
    match tree {
        WhereTree::Leaf(filter) => Predicate::Compare {
            path: filter.field.clone(),
            operator: filter.operator,
            value: filter.value.clone(),
        },
        WhereTree::And(children) => Predicate::All(children.iter().map(tree_predicate).collect()),
        WhereTree::Or(children) => Predicate::Any(children.iter().map(tree_predicate).collect()),
    }
}

fn query_predicate(query: &CatalogQuery) -> Option<Predicate> {
    let mut parts: Vec<Predicate> = query
        .conditions()
        .iter()
        .flat_map(|(field, conditions)| {
            conditions.iter().map(move |c| Predicate::Compare {
                path: field.clone(),
                operator: c.operator,
                value: c.value.clone(),
            })
        })
        .collect();
    parts.extend(query.nested_conditions().iter().map(tree_predicate));

    if parts.is_empty() {
        None
    } else {
        Some(Predicate::All(parts))
    }
}

fn window<T>(items: Vec<T>, limit: Option<(u64, u64)>) -> Vec<T> {
    match limit {
        Some((skip, count)) => items
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(usize::try_from(count).unwrap_or(usize::MAX))
            .collect(),
        None => items,
    }
}

fn distinct_tuples(store: &MemoryStore, query: &CatalogQuery, ids: &[i64]) -> ClientResult<Vec<Vec<AttrValue>>> {
    let mut seen: Vec<Vec<AttrValue>> = Vec::new();
    for id in ids {
        let mut tuple = Vec::with_capacity(query.attributes().len());
        for attribute in query.attributes() {
            let value = store
                .values_at(query.entity(), *id, attribute)
                .map_err(store_error)?
                .into_iter()
                .next()
                .unwrap_or(AttrValue::Null);
            tuple.push(value);
        }
        if !seen.contains(&tuple) {
            seen.push(tuple);
        }
    }
    Ok(seen)
}

impl CatalogClient for MemoryCatalogClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn remaining_minutes(&self) -> ClientResult<f64> {
        let state = self.catalog.read()?;
        let session = MemoryCatalog::session(&state, &self.session_id)?;
        let remaining = session.expires_at - Utc::now();
        Ok(remaining.num_seconds() as f64 / 60.0)
    }

    fn username(&self) -> ClientResult<String> {
        let state = self.catalog.read()?;
        Ok(MemoryCatalog::live_session(&state, &self.session_id)?.username)
    }

    fn entity_names(&self) -> ClientResult<Vec<String>> {
        let state = self.catalog.read()?;
        Ok(state.store.schema().names())
    }

    fn entity_schema(&self, entity: &str) -> ClientResult<Arc<EntitySchema>> {
        let state = self.catalog.read()?;
        state
            .store
            .entity_schema(entity)
            .cloned()
            .map_err(store_error)
    }

    fn search(&self, query: &CatalogQuery) -> ClientResult<Vec<SearchResult>> {
        let state = self.catalog.read()?;
        MemoryCatalog::live_session(&state, &self.session_id)?;
        let store = &state.store;
        debug!(query = %query, "Catalog search");

        let mut selection = Selection::new(query.entity());
        selection.filter = query_predicate(query);
        selection.order = query
            .order()
            .iter()
            .map(|key| (key.field.clone(), key.ascending))
            .collect();
        if query.aggregate().is_none() {
            if let Some((skip, count)) = query.limit() {
                selection.skip = skip;
                selection.limit = Some(count);
            }
        }
        let ids = store.select(&selection).map_err(store_error)?;

        match query.aggregate() {
            None => {
                let schema = store.entity_schema(query.entity()).map_err(store_error)?;
                let includes = if query.includes_all_direct() {
                    IncludeTree::all_direct(schema)
                } else {
                    for path in query.includes() {
                        store
                            .check_relation_path(query.entity(), path)
                            .map_err(store_error)?;
                    }
                    IncludeTree::from_paths(&query.includes().iter().collect::<Vec<_>>())
                };
                ids.iter()
                    .map(|id| {
                        store
                            .materialize(query.entity(), *id, &includes)
                            .map(|graph| SearchResult::Entity(CatalogEntity::from(graph)))
                            .map_err(store_error)
                    })
                    .collect()
            }
            Some(Aggregate::Count) => Ok(vec![SearchResult::Count(ids.len() as u64)]),
            Some(Aggregate::Distinct) => {
                let tuples = distinct_tuples(store, query, &ids)?;
                Ok(window(tuples, query.limit())
                    .into_iter()
                    .map(SearchResult::Tuple)
                    .collect())
            }
            Some(Aggregate::CountDistinct) => {
                let tuples = distinct_tuples(store, query, &ids)?;
                Ok(vec![SearchResult::Count(tuples.len() as u64)])
            }
        }
    }

    fn create(&self, entity: &CatalogEntity) -> ClientResult<i64> {
        let mut state = self.catalog.write()?;
        let session = MemoryCatalog::live_session(&state, &self.session_id)?;
        state
            .store
            .insert(&entity.schema().name, Self::to_record(entity), &session.username)
            .map_err(store_error)
    }

    fn update(&self, entity: &CatalogEntity) -> ClientResult<()> {
        let id = Self::entity_id(entity)?;
        let mut state = self.catalog.write()?;
        let session = MemoryCatalog::live_session(&state, &self.session_id)?;
        let mut record = Self::to_record(entity);
        // bookkeeping attributes are maintained by the store
        record.attrs.retain(|name, _| !entity.schema().is_meta_attribute(name));
        state
            .store
            .update(&entity.schema().name, id, record, &session.username)
            .map_err(store_error)
    }

    fn delete(&self, entity: &CatalogEntity) -> ClientResult<()> {
        let id = Self::entity_id(entity)?;
        let mut state = self.catalog.write()?;
        MemoryCatalog::live_session(&state, &self.session_id)?;
        state
            .store
            .delete(&entity.schema().name, id)
            .map_err(store_error)
    }

    fn new_entity(&self, entity: &str) -> ClientResult<CatalogEntity> {
        Ok(CatalogEntity::new(self.entity_schema(entity)?))
    }

    fn refresh(&self) -> ClientResult<()> {
        let mut state = self.catalog.write()?;
        MemoryCatalog::live_session(&state, &self.session_id)?;
        let expires_at = Utc::now() + Duration::minutes(self.catalog.session_minutes);
        if let Some(session) = state.sessions.get_mut(&self.session_id) {
            session.expires_at = expires_at;
        }
        Ok(())
    }

    fn logout(&self) -> ClientResult<()> {
        let mut state = self.catalog.write()?;
        state
            .sessions
            .remove(&self.session_id)
            .map(|_| ())
            .ok_or_else(|| ClientError::Session(format!("Unable to find session id {}", self.session_id)))
    }

    fn max_entities(&self) -> Option<u64> {
        self.catalog.max_entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Schema;
    use crate::filters::{FilterOrderHandler, FilterTarget, QueryFilter, WhereFilter};
    use crate::memory::load_fixture;
    use serde_json::json;

    fn catalog() -> Arc<MemoryCatalog> {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({
                "Investigation": [{"id": 1, "title": "Inv"}],
                "Dataset": [
                    {"id": 2, "name": "b", "investigation": 1},
                    {"id": 3, "name": "a", "investigation": 1},
                    {"id": 4, "name": "a"}
                ]
            }),
        )
        .unwrap();
        Arc::new(MemoryCatalog::new(store).with_user("simple", "root", "pw"))
    }

    #[test]
    fn test_login_and_session() {
        let catalog = catalog();
        assert!(matches!(
            catalog.login("simple", &Credentials::new("root", "wrong")),
            Err(ClientError::Authentication(_))
        ));

        let client = catalog.login("simple", &Credentials::new("root", "pw")).unwrap();
        assert!(client.remaining_minutes().unwrap() > 100.0);
        assert_eq!(client.username().unwrap(), "simple/root");

        client.logout().unwrap();
        assert!(client.remaining_minutes().unwrap_err().is_session_error());
        assert!(catalog.connect("nope").search(&CatalogQuery::new("Dataset")).is_err());
    }

    #[test]
    fn test_expired_session_reports_negative_minutes() {
        let catalog = Arc::new(
            MemoryCatalog::new(MemoryStore::new(Schema::icat()))
                .with_user("simple", "root", "pw")
                .with_session_minutes(-5),
        );
        let client = catalog.login("simple", &Credentials::new("root", "pw")).unwrap();
        assert!(client.remaining_minutes().unwrap() < 0.0);
        assert!(client.search(&CatalogQuery::new("Dataset")).is_err());
    }

    #[test]
    fn test_login_prunes_expired_sessions() {
        let catalog = Arc::new(
            MemoryCatalog::new(MemoryStore::new(Schema::icat()))
                .with_user("simple", "root", "pw")
                .with_session_minutes(-5),
        );
        let expired = catalog.login("simple", &Credentials::new("root", "pw")).unwrap();
        assert!(expired.remaining_minutes().unwrap() < 0.0);

        catalog.login("simple", &Credentials::new("root", "pw")).unwrap();
        assert!(expired.remaining_minutes().unwrap_err().is_session_error());
        assert_eq!(catalog.read().unwrap().sessions.len(), 1);
    }

    #[test]
    fn test_search_distinct_and_count() {
        let catalog = catalog();
        let client = catalog.login("simple", &Credentials::new("root", "pw")).unwrap();

        let mut query = CatalogQuery::new("Dataset");
        query.set_distinct(&["name".to_string()]).unwrap();
        let results = client.search(&query).unwrap();
        assert_eq!(results.len(), 2);

        let mut count = CatalogQuery::new("Dataset").with_aggregate(Aggregate::Count);
        let mut handler = FilterOrderHandler::new();
        handler
            .manage_filters(vec![QueryFilter::where_("name", "eq", json!("a")).unwrap()], &mut count)
            .unwrap();
        let results = client.search(&count).unwrap();
        assert!(matches!(results.as_slice(), [SearchResult::Count(2)]));
    }

    #[test]
    fn test_search_unknown_field_is_validation_error() {
        let catalog = catalog();
        let client = catalog.login("simple", &Credentials::new("root", "pw")).unwrap();
        let mut query = CatalogQuery::new("Dataset");
        query
            .add_condition(&WhereFilter::new("colour", "eq", json!("red")).unwrap())
            .unwrap();
        assert!(matches!(client.search(&query), Err(ClientError::Validation(_))));

        let mut query = CatalogQuery::new("Dataset");
        query.add_includes(&["widgets".to_string()]).unwrap();
        assert!(matches!(client.search(&query), Err(ClientError::Validation(_))));
    }
}
