//! Relational Backend Tests
//!
//! The backend over the relational mirror, seeded from the demo fixture and
//! driven through endpoint names the way HTTP handlers call it.

use std::path::Path;
use std::sync::Arc;

use datagateway::backend::{Backend, DatabaseBackend, LoginRequest};
use datagateway::common::GatewayError;
use datagateway::database::{InMemorySessionRepository, MemoryRowStore, SessionConfig, SessionManager};
use datagateway::entity::Schema;
use datagateway::filters::QueryFilter;
use datagateway::memory::{load_fixture_file, MemoryStore};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fixture.json");

fn backend() -> DatabaseBackend<InMemorySessionRepository> {
    let mut store = MemoryStore::new(Schema::icat());
    load_fixture_file(&mut store, Path::new(FIXTURE)).unwrap();
    DatabaseBackend::new(
        Arc::new(MemoryRowStore::new(store)),
        SessionManager::new(
            SessionConfig::default(),
            InMemorySessionRepository::new(),
            "user",
            "password",
        ),
    )
}

fn session(backend: &DatabaseBackend<InMemorySessionRepository>) -> String {
    backend
        .login(&LoginRequest::new("simple", "user", "password"))
        .unwrap()
}

// =============================================================================
// Session Tests
// =============================================================================

/// Every data operation needs a live session.
#[test]
fn test_operations_require_session() {
    let backend = backend();
    assert_eq!(
        backend.get_with_filters("00000000-0000-0000-0000-000000000000", "datasets", vec![]),
        Err(GatewayError::forbidden())
    );
    assert_eq!(
        backend.get_with_id("not-a-uuid", "datasets", 1),
        Err(GatewayError::forbidden())
    );
}

/// Session details carry the user and an expiry in the canonical format.
#[test]
fn test_session_details() {
    let backend = backend();
    let id = session(&backend);
    let details = backend.get_session_details(&id).unwrap();
    assert_eq!(details["USERNAME"], json!("user"));
    assert_eq!(details["EXPIREDATETIME"].as_str().unwrap().len(), 19);
}

// =============================================================================
// Read Tests
// =============================================================================

/// Rows by id carry their foreign keys.
#[test]
fn test_get_row_by_id() {
    let backend = backend();
    let id = session(&backend);

    let row = backend.get_with_id(&id, "datasets", 3).unwrap();
    assert_eq!(row["name"], json!("BLEND-001"));
    assert_eq!(row["investigationID"], json!(2));

    assert!(matches!(
        backend.get_with_id(&id, "datasets", 99),
        Err(GatewayError::MissingRecord(_))
    ));
}

/// Conditions through an upper-case relation name, with one include.
#[test]
fn test_filter_through_relation() {
    let backend = backend();
    let id = session(&backend);

    let rows = backend
        .get_with_filters(
            &id,
            "datafiles",
            vec![
                QueryFilter::where_("DATASET.name", "eq", json!("LAYERED-001")).unwrap(),
                QueryFilter::include(&["DATASET"]).unwrap(),
                QueryFilter::order("fileSize", "asc").unwrap(),
            ],
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], json!("WISH00041002.nxs"));
    assert_eq!(rows[0]["DATASET"]["name"], json!("LAYERED-001"));
}

/// Two include filters in one request are refused.
#[test]
fn test_second_include_rejected() {
    let backend = backend();
    let id = session(&backend);
    let result = backend.get_with_filters(
        &id,
        "datasets",
        vec![
            QueryFilter::include(&["INVESTIGATION"]).unwrap(),
            QueryFilter::include(&["DATAFILE"]).unwrap(),
        ],
    );
    assert!(matches!(result, Err(GatewayError::BadRequest(msg)) if msg.contains("multiple include filters")));
}

/// A distinct filter on `name` echoes back only `name`.
#[test]
fn test_distinct_names() {
    let backend = backend();
    let id = session(&backend);
    let rows = backend
        .get_with_filters(&id, "datasets", vec![QueryFilter::distinct(&["name"]).unwrap()])
        .unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows
        .iter()
        .all(|r| r.as_object().unwrap().keys().map(String::as_str).eq(["name"])));
}

/// Counts and first-row reads honour their filters.
#[test]
fn test_count_and_find_one() {
    let backend = backend();
    let id = session(&backend);

    assert_eq!(
        backend
            .count_with_filters(
                &id,
                "datafiles",
                vec![QueryFilter::where_("fileSize", "gt", json!(50000000)).unwrap()],
            )
            .unwrap(),
        json!(3)
    );

    let first = backend
        .get_one_with_filters(&id, "investigations", vec![QueryFilter::order("id", "desc").unwrap()])
        .unwrap();
    assert_eq!(first["name"], json!("RB2490002"));
}

// =============================================================================
// Write Tests
// =============================================================================

/// A date written through an update reads back unchanged.
#[test]
fn test_date_round_trip() {
    let backend = backend();
    let id = session(&backend);

    let updated = backend
        .update_with_id(&id, "datasets", 1, &json!({"endDate": "2018-03-05 12:00:00"}))
        .unwrap();
    assert_eq!(updated["endDate"], json!("2018-03-05 12:00:00"));
    assert_eq!(updated["modId"], json!("user"));

    let row = backend.get_with_id(&id, "datasets", 1).unwrap();
    assert_eq!(row["endDate"], json!("2018-03-05 12:00:00"));
}

/// Created rows can be patched and deleted.
#[test]
fn test_create_patch_delete() {
    let backend = backend();
    let id = session(&backend);

    let created = backend
        .create(&id, "keywords", &json!({"name": "shear", "investigationID": 2}))
        .unwrap();
    let keyword = created[0]["id"].as_i64().unwrap();

    let patched = backend
        .update(&id, "keywords", &json!([{"id": keyword, "name": "rheology"}]))
        .unwrap();
    assert_eq!(patched[0]["name"], json!("rheology"));

    backend.delete_with_id(&id, "keywords", keyword).unwrap();
    assert!(matches!(
        backend.get_with_id(&id, "keywords", keyword),
        Err(GatewayError::MissingRecord(_))
    ));
}
