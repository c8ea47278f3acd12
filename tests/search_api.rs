//! Search API Tests
//!
//! PaNOSC queries against the demo catalog through the shared anonymous
//! session: field translation, includes, computed fields and counts.

use std::path::Path;
use std::sync::Arc;

use datagateway::catalog::MemoryCatalog;
use datagateway::common::GatewayError;
use datagateway::entity::Schema;
use datagateway::memory::{load_fixture_file, MemoryStore};
use datagateway::search_api::{Mappings, SearchApi, SearchClientManager};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fixture.json");

fn api() -> SearchApi {
    let mut store = MemoryStore::new(Schema::icat());
    load_fixture_file(&mut store, Path::new(FIXTURE)).unwrap();
    let catalog = Arc::new(MemoryCatalog::new(store).with_user("anon", "", ""));
    SearchApi::new(
        Mappings::icat(),
        SearchClientManager::new(Arc::new(catalog), "anon"),
        100,
    )
}

fn titles(records: &[Value]) -> Vec<&str> {
    records.iter().filter_map(|r| r["title"].as_str()).collect()
}

// =============================================================================
// Search Tests
// =============================================================================

/// PaNOSC field names are translated in where and order.
#[test]
fn test_where_and_order_translated() {
    let api = api();
    let datasets = api
        .get_search(
            "Dataset",
            &json!({"where": {"title": {"like": "LAYERED"}}, "order": "title desc"}),
        )
        .unwrap();
    assert_eq!(titles(&datasets), vec!["LAYERED-002", "LAYERED-001"]);
    assert_eq!(datasets[0]["pid"], json!("10.5286/ISIS.D.1002"));
}

/// `isPublic` follows the investigation's release date.
#[test]
fn test_is_public_computed() {
    let api = api();
    let released = api.get_with_pid("Dataset", "10.5286/ISIS.D.1001", &Value::Null).unwrap();
    assert_eq!(released["isPublic"], json!(true));

    let embargoed = api.get_with_pid("Dataset", "10.5286/ISIS.D.2001", &Value::Null).unwrap();
    assert_eq!(embargoed["isPublic"], json!(false));

    assert!(matches!(
        api.get_search("Dataset", &json!({"where": {"isPublic": true}})),
        Err(GatewayError::BadRequest(_))
    ));
}

/// Nested and/or conditions combine translated fields.
#[test]
fn test_nested_or() {
    let api = api();
    let documents = api
        .get_search(
            "Document",
            &json!({"where": {"or": [
                {"title": {"like": "Polymer"}},
                {"summary": {"like": "cobaltates"}}
            ]}}),
        )
        .unwrap();
    assert_eq!(documents.len(), 2);
}

/// Fields read through relations: keyword lists and facility names.
#[test]
fn test_related_fields() {
    let api = api();
    let document = api
        .get_with_pid("Document", "10.5286/ISIS.E.2490002", &Value::Null)
        .unwrap();
    assert_eq!(document["keywords"], json!(["polymers", "SANS"]));
    assert_eq!(document["type"], json!("experiment"));

    let instrument = api
        .get_with_pid("Instrument", "pid:instrument:wish", &Value::Null)
        .unwrap();
    assert_eq!(instrument["facility"], json!("ISIS"));
}

/// Relations are embedded on request, including nested ones.
#[test]
fn test_nested_include() {
    let api = api();
    let document = api
        .get_with_pid(
            "Document",
            "10.5286/ISIS.E.1810001",
            &json!({"include": [{"relation": "datasets", "scope": {"include": [{"relation": "files"}]}}]}),
        )
        .unwrap();

    let datasets = document["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 2);
    let files: usize = datasets
        .iter()
        .map(|d| d["files"].as_array().unwrap().len())
        .sum();
    assert_eq!(files, 3);
    assert_eq!(datasets[0]["isPublic"], json!(true));
}

/// A pid with no record is a missing record.
#[test]
fn test_unknown_pid() {
    let api = api();
    assert_eq!(
        api.get_with_pid("Document", "10.0/none", &Value::Null),
        Err(GatewayError::missing_record("No result found"))
    );
}

// =============================================================================
// Count and File Tests
// =============================================================================

#[test]
fn test_counts() {
    let api = api();
    assert_eq!(api.get_count("Dataset", &Value::Null).unwrap(), json!({"count": 3}));
    assert_eq!(
        api.get_count("Document", &json!({"title": {"like": "oxides"}})).unwrap(),
        json!({"count": 1})
    );
}

#[test]
fn test_dataset_files() {
    let api = api();
    let files = api.get_files("10.5286/ISIS.D.1001", &Value::Null).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["path"].as_str().unwrap().starts_with("/archive/1810001/001/")));

    assert_eq!(
        api.get_files_count("10.5286/ISIS.D.1001", &json!({"size": {"gt": 100000000}}))
            .unwrap(),
        json!({"count": 1})
    );
}
