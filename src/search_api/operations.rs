//! # Search API Operations
//!
//! Each operation compiles its PaNOSC filters onto one catalog query, runs
//! it with the shared anonymous client and converts the entities found.

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::catalog::{execute, Aggregate, CatalogQuery};
use crate::common::{GatewayError, GatewayResult};
use crate::filters::{FilterOrderHandler, FilterTarget, QueryFilter};

use super::filters::{parse_search_filter, parse_search_where};
use super::mappings::Mappings;
use super::models::to_panosc;
use super::session::SearchClientManager;

/// Skip-only window bound used when none is configured
pub const DEFAULT_MAX_ENTITIES: u64 = 100;

/// The PaNOSC search API over the catalog
pub struct SearchApi {
    mappings: Mappings,
    clients: SearchClientManager,
    max_entities: u64,
}

impl SearchApi {
    pub fn new(mappings: Mappings, clients: SearchClientManager, max_entities: u64) -> Self {
        Self {
            mappings,
            clients,
            max_entities,
        }
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// Catalog relations needed to render `entity` with `relations` embedded
    fn includes(&self, entity: &str, relations: &[String]) -> GatewayResult<Vec<String>> {
        let mut includes = self.mappings.entity(entity)?.field_relations();
        for relation in relations {
            let segments: Vec<&str> = relation.split('.').collect();
            for depth in 1..=segments.len() {
                let (icat_path, target) = self
                    .mappings
                    .icat_relation_path(entity, &segments[..depth].join("."))?;
                includes.extend(
                    self.mappings
                        .entity(target)?
                        .field_relations()
                        .into_iter()
                        .map(|r| format!("{}.{}", icat_path, r)),
                );
                includes.push(icat_path);
            }
        }
        includes.sort();
        includes.dedup();
        Ok(includes)
    }

    fn search(&self, entity: &str, filters: Vec<QueryFilter>, relations: &[String]) -> GatewayResult<Vec<Value>> {
        let panosc = self.mappings.entity(entity)?;
        let client = self.clients.client()?;

        let mut query = CatalogQuery::new(panosc.icat_entity).with_max_entities(Some(self.max_entities));
        FilterOrderHandler::new().manage_filters(filters, &mut query)?;
        query.add_includes(&self.includes(entity, relations)?)?;

        let entities = execute(client.as_ref(), &query, false)?.into_entities();
        info!(entity, results = entities.len(), "Search API query complete");
        entities
            .iter()
            .map(|e| to_panosc(&self.mappings, entity, e, relations))
            .collect()
    }

    fn count(&self, entity: &str, filters: Vec<QueryFilter>) -> GatewayResult<Value> {
        let panosc = self.mappings.entity(entity)?;
        let client = self.clients.client()?;

        let mut query = CatalogQuery::new(panosc.icat_entity).with_aggregate(Aggregate::Count);
        FilterOrderHandler::new().manage_filters(filters, &mut query)?;
        let count = execute(client.as_ref(), &query, true)?
            .into_records()
            .into_iter()
            .next()
            .unwrap_or(json!(0));
        debug!(entity, %count, "Search API count");
        Ok(json!({ "count": count }))
    }

    fn pid_filter(&self, entity: &str, pid: &str) -> GatewayResult<QueryFilter> {
        QueryFilter::where_(&self.mappings.icat_path(entity, "pid")?, "eq", json!(pid))
    }

    /// Records of `entity` matching `filter`
    pub fn get_search(&self, entity: &str, filter: &Value) -> GatewayResult<Vec<Value>> {
        let parsed = parse_search_filter(&self.mappings, entity, filter)?;
        self.search(entity, parsed.filters, &parsed.relations)
    }

    /// The record of `entity` with the given pid
    pub fn get_with_pid(&self, entity: &str, pid: &str, filter: &Value) -> GatewayResult<Value> {
        let mut parsed = parse_search_filter(&self.mappings, entity, filter)?;
        parsed.filters.push(self.pid_filter(entity, pid)?);
        self.search(entity, parsed.filters, &parsed.relations)?
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::missing_record("No result found"))
    }

    /// `{"count": n}` for records of `entity` matching `where_`
    pub fn get_count(&self, entity: &str, where_: &Value) -> GatewayResult<Value> {
        let filters = match where_ {
            Value::Null => Vec::new(),
            value => parse_search_where(&self.mappings, entity, value)?,
        };
        self.count(entity, filters)
    }

    /// Files of the dataset with the given pid
    pub fn get_files(&self, pid: &str, filter: &Value) -> GatewayResult<Vec<Value>> {
        let mut parsed = parse_search_filter(&self.mappings, "File", filter)?;
        parsed.filters.push(self.dataset_filter(pid)?);
        self.search("File", parsed.filters, &parsed.relations)
    }

    /// `{"count": n}` for files of the dataset with the given pid
    pub fn get_files_count(&self, pid: &str, where_: &Value) -> GatewayResult<Value> {
        let mut filters = match where_ {
            Value::Null => Vec::new(),
            value => parse_search_where(&self.mappings, "File", value)?,
        };
        filters.push(self.dataset_filter(pid)?);
        self.count("File", filters)
    }

    fn dataset_filter(&self, pid: &str) -> GatewayResult<QueryFilter> {
        QueryFilter::where_(&self.mappings.icat_path("File", "dataset.pid")?, "eq", json!(pid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::entity::Schema;
    use crate::memory::{load_fixture, MemoryStore};
    use std::sync::Arc;

    fn api() -> SearchApi {
        let mut store = MemoryStore::new(Schema::icat());
        load_fixture(
            &mut store,
            &json!({
                "Investigation": [{"id": 1, "title": "Beam", "doi": "10.1/inv"}],
                "Dataset": [
                    {"id": 2, "name": "ds", "doi": "10.1/ds", "investigation": 1},
                    {"id": 3, "name": "other", "doi": "10.1/other", "investigation": 1}
                ],
                "Datafile": [
                    {"id": 4, "name": "f1", "location": "/a/f1", "fileSize": 10, "dataset": 2},
                    {"id": 5, "name": "f2", "location": "/a/f2", "fileSize": 90, "dataset": 2}
                ]
            }),
        )
        .unwrap();
        let catalog = Arc::new(MemoryCatalog::new(store).with_user("anon", "", ""));
        SearchApi::new(
            Mappings::icat(),
            SearchClientManager::new(Arc::new(catalog), "anon"),
            DEFAULT_MAX_ENTITIES,
        )
    }

    #[test]
    fn test_includes_cover_field_relations() {
        let api = api();
        assert_eq!(
            api.includes("Dataset", &["documents".to_string()]).unwrap(),
            vec![
                "investigation".to_string(),
                "investigation.keywords".to_string(),
                "investigation.type".to_string(),
            ]
        );
    }

    #[test]
    fn test_search_and_pid() {
        let api = api();
        let datasets = api
            .get_search("Dataset", &json!({"where": {"title": "ds"}, "include": [{"relation": "files"}]}))
            .unwrap();
        assert_eq!(datasets.len(), 1);
        assert_eq!(datasets[0]["files"].as_array().unwrap().len(), 2);
        assert_eq!(datasets[0]["isPublic"], json!(false));

        let dataset = api.get_with_pid("Dataset", "10.1/other", &Value::Null).unwrap();
        assert_eq!(dataset["title"], json!("other"));
        assert_eq!(
            api.get_with_pid("Dataset", "missing", &Value::Null),
            Err(GatewayError::missing_record("No result found"))
        );
    }

    #[test]
    fn test_skip_without_limit_uses_max_entities() {
        let api = api();
        let datasets = api.get_search("Dataset", &json!({"skip": 1})).unwrap();
        assert_eq!(datasets.len(), 1);
    }

    #[test]
    fn test_counts_and_files() {
        let api = api();
        assert_eq!(api.get_count("Dataset", &Value::Null).unwrap(), json!({"count": 2}));
        assert_eq!(
            api.get_count("Document", &json!({"title": "Beam"})).unwrap(),
            json!({"count": 1})
        );

        let files = api.get_files("10.1/ds", &json!({"where": {"size": {"gt": 50}}})).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["name"], json!("f2"));
        assert_eq!(api.get_files_count("10.1/ds", &Value::Null).unwrap(), json!({"count": 2}));
        assert_eq!(api.get_files_count("10.1/other", &Value::Null).unwrap(), json!({"count": 0}));
    }
}
