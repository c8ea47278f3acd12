//! Filter Compilation Tests
//!
//! Request filters compiled onto catalog and relational queries:
//! - skip and limit collapse into one window
//! - negative windows are rejected when the filter is built
//! - sort keys never leak from one request into the next
//! - filters from a query string compile like filters from a JSON body

use datagateway::catalog::CatalogQuery;
use datagateway::common::GatewayError;
use datagateway::database::RowQuery;
use datagateway::entity::Schema;
use datagateway::filters::{
    parse_filter_list, parse_query_params, FilterOrderHandler, QueryFilter, SortKey,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn compile(filters: Vec<QueryFilter>) -> CatalogQuery {
    let mut query = CatalogQuery::new("Dataset");
    FilterOrderHandler::new()
        .manage_filters(filters, &mut query)
        .unwrap();
    query
}

fn key(field: &str, ascending: bool) -> SortKey {
    SortKey {
        field: field.to_string(),
        ascending,
    }
}

// =============================================================================
// Window Tests
// =============================================================================

/// A skip and a limit in the same request become a single window.
#[test]
fn test_skip_and_limit_merge() {
    let mut handler = FilterOrderHandler::new();
    let mut query = CatalogQuery::new("Dataset");
    handler
        .manage_filters(
            vec![QueryFilter::skip(5).unwrap(), QueryFilter::limit(10).unwrap()],
            &mut query,
        )
        .unwrap();

    assert_eq!(query.limit(), Some((5, 10)));
    assert_eq!(handler.filters().len(), 1);
    assert!(query.to_jpql().ends_with("LIMIT 5, 10"));
}

/// A repeated skip in the query string does not undo the merged window.
#[test]
fn test_repeated_skip_in_query_string() {
    let filters = parse_query_params(&[
        ("skip".to_string(), "2".to_string()),
        ("limit".to_string(), "10".to_string()),
        ("skip".to_string(), "6".to_string()),
    ])
    .unwrap();
    let query = compile(filters);
    assert_eq!(query.limit(), Some((6, 10)));
    assert!(query.to_jpql().ends_with("LIMIT 6, 10"));
}

/// Negative limit and skip values never produce a filter.
#[test]
fn test_negative_window_rejected() {
    assert!(matches!(QueryFilter::limit(-1), Err(GatewayError::Validation(_))));
    assert!(matches!(QueryFilter::skip(-4), Err(GatewayError::Validation(_))));
    assert!(parse_filter_list(&json!([{"limit": -2}])).is_err());
}

/// A lone skip needs a bound from somewhere.
#[test]
fn test_lone_skip_needs_bound() {
    let mut query = CatalogQuery::new("Dataset");
    let result = FilterOrderHandler::new().manage_filters(vec![QueryFilter::skip(2).unwrap()], &mut query);
    assert!(matches!(result, Err(GatewayError::BadRequest(_))));

    let mut bounded = CatalogQuery::new("Dataset").with_max_entities(Some(50));
    FilterOrderHandler::new()
        .manage_filters(vec![QueryFilter::skip(2).unwrap()], &mut bounded)
        .unwrap();
    assert_eq!(bounded.limit(), Some((2, 50)));
}

// =============================================================================
// Order Tests
// =============================================================================

/// Two order filters in one request sort by both keys, in order.
#[test]
fn test_order_keys_accumulate_within_request() {
    let query = compile(vec![
        QueryFilter::order("name", "asc").unwrap(),
        QueryFilter::order("id", "desc").unwrap(),
    ]);
    assert_eq!(query.order(), &[key("name", true), key("id", false)]);
}

/// A handler reused for a second request does not carry the first
/// request's sort keys.
#[test]
fn test_order_state_independent_across_requests() {
    let mut handler = FilterOrderHandler::new();

    let first_filter = QueryFilter::order("name", "desc").unwrap();
    let mut first = CatalogQuery::new("Dataset");
    handler
        .manage_filters(vec![first_filter.clone()], &mut first)
        .unwrap();
    assert_eq!(first.order(), &[key("name", false)]);

    assert!(handler.remove_filter(&first_filter));
    let mut second = CatalogQuery::new("Dataset");
    handler
        .manage_filters(vec![QueryFilter::order("id", "asc").unwrap()], &mut second)
        .unwrap();
    assert_eq!(second.order(), &[key("id", true)]);
}

// =============================================================================
// Input Shape Tests
// =============================================================================

/// The JSON body and query-string forms compile to the same query.
#[test]
fn test_query_string_matches_json_body() {
    let from_body = parse_filter_list(&json!([
        {"where": {"name": {"like": "LAYERED"}}},
        {"order": "name desc"},
        {"limit": 3}
    ]))
    .unwrap();
    let from_query = parse_query_params(&[
        ("where".to_string(), r#"{"name": {"like": "LAYERED"}}"#.to_string()),
        ("order".to_string(), r#""name desc""#.to_string()),
        ("limit".to_string(), "3".to_string()),
    ])
    .unwrap();

    assert_eq!(compile(from_body), compile(from_query));
}

/// Like operands are wrapped in wildcards in the rendered query.
#[test]
fn test_rendered_catalog_query() {
    let query = compile(vec![
        QueryFilter::where_("name", "like", json!("LAYERED")).unwrap(),
        QueryFilter::include(&["investigation"]).unwrap(),
    ]);
    assert!(query.to_jpql().contains("o.name like '%LAYERED%'"));
    assert!(query.includes().contains("investigation"));
}

// =============================================================================
// Relational Query Tests
// =============================================================================

/// The same filters compile onto a relational query.
#[test]
fn test_relational_compilation() {
    let schema = Schema::icat();
    let mut query = RowQuery::new(&schema, "DATASET").unwrap();
    FilterOrderHandler::new()
        .manage_filters(
            vec![
                QueryFilter::where_("investigation.title", "eq", json!("x")).unwrap(),
                QueryFilter::limit(1).unwrap(),
            ],
            &mut query,
        )
        .unwrap();

    let (sql, params) = query.to_sql();
    assert!(sql.contains("LIMIT ?"));
    assert_eq!(params, vec![json!("x"), json!(1)]);
}

/// Fields deeper than three levels are refused.
#[test]
fn test_relational_depth_limit() {
    let schema = Schema::icat();
    let mut query = RowQuery::new(&schema, "DATAFILE").unwrap();
    let result = FilterOrderHandler::new().manage_filters(
        vec![QueryFilter::where_("dataset.investigation.facility.name", "eq", json!("ISIS")).unwrap()],
        &mut query,
    );
    assert!(matches!(result, Err(GatewayError::BadRequest(_))));
}
