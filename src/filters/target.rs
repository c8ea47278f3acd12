//! The query-builder capability filters are applied onto.

use crate::common::{GatewayError, GatewayResult};

use super::ast::{SortKey, WhereFilter, WhereTree};

/// A backend query that accepts compiled filters
///
/// Implemented by the catalog query and the relational row query.
pub trait FilterTarget {
    /// Add a single condition on a (possibly dotted) field
    fn add_condition(&mut self, filter: &WhereFilter) -> GatewayResult<()>;

    /// Add a boolean combination of conditions
    fn add_nested_condition(&mut self, _tree: &WhereTree) -> GatewayResult<()> {
        Err(GatewayError::bad_request(
            "Nested where filters are not supported by this backend",
        ))
    }

    /// Replace the whole order list
    fn set_order(&mut self, keys: &[SortKey]) -> GatewayResult<()>;

    /// Add dotted include paths
    fn add_includes(&mut self, paths: &[String]) -> GatewayResult<()>;

    /// Set the pagination window; `limit` is `None` for a lone skip
    fn set_window(&mut self, skip: u64, limit: Option<u64>) -> GatewayResult<()>;

    /// Restrict the query to distinct values of the given fields
    fn set_distinct(&mut self, fields: &[String]) -> GatewayResult<()>;
}
