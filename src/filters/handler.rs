//! # Filter Order Handler
//!
//! Holds the filters of one request and applies them onto a query in
//! precedence order. Two filter interactions are handled here: a skip is
//! merged into a limit when both are present, and sort keys accumulated by
//! earlier requests are dropped before new order filters are applied.

use tracing::{debug, info};

use crate::common::GatewayResult;

use super::ast::{QueryFilter, SortKey};
use super::target::FilterTarget;

/// Sort keys accumulated by order filters
///
/// Each applied order filter pushes its key and then the full list is
/// pushed onto the query, replacing whatever order it held.
#[derive(Debug, Default, Clone)]
pub struct OrderState {
    keys: Vec<SortKey>,
}

impl OrderState {
    pub fn push(&mut self, key: SortKey) {
        self.keys.push(key);
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Compiles a set of filters onto a query
#[derive(Debug, Default)]
pub struct FilterOrderHandler {
    filters: Vec<QueryFilter>,
    order_state: OrderState,
}

impl FilterOrderHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filters(&self) -> &[QueryFilter] {
        &self.filters
    }

    pub fn order_state(&self) -> &OrderState {
        &self.order_state
    }

    pub fn add_filter(&mut self, filter: QueryFilter) {
        self.filters.push(filter);
    }

    pub fn add_filters(&mut self, filters: impl IntoIterator<Item = QueryFilter>) {
        self.filters.extend(filters);
    }

    /// Remove the first filter equal to `filter`
    pub fn remove_filter(&mut self, filter: &QueryFilter) -> bool {
        match self.filters.iter().position(|f| f == filter) {
            Some(index) => {
                self.filters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Fold a skip filter into the limit filter when both are present
    ///
    /// Repeated skip or limit filters collapse to the last of each. A lone
    /// skip is left alone; the query decides whether it can honour it.
    pub fn merge_skip_into_limit(&mut self) {
        let last_limit = self
            .filters
            .iter()
            .rposition(|f| matches!(f, QueryFilter::Limit(_)));
        let last_skip = self
            .filters
            .iter()
            .rposition(|f| matches!(f, QueryFilter::Skip(_)));
        let skip_value = last_skip.and_then(|index| match &self.filters[index] {
            QueryFilter::Skip(skip) => Some(skip.skip_value),
            _ => None,
        });

        self.filters = std::mem::take(&mut self.filters)
            .into_iter()
            .enumerate()
            .filter_map(|(index, filter)| match filter {
                QueryFilter::Limit(mut limit) if Some(index) == last_limit => {
                    if let Some(skip) = skip_value {
                        debug!(skip, "Merging skip filter with limit filter");
                        limit.skip_value = Some(skip);
                    }
                    Some(QueryFilter::Limit(limit))
                }
                skip @ QueryFilter::Skip(_) if last_limit.is_none() && Some(index) == last_skip => {
                    Some(skip)
                }
                QueryFilter::Limit(_) | QueryFilter::Skip(_) => None,
                other => Some(other),
            })
            .collect();
    }

    /// Drop sort keys left over from a previous request
    pub fn clear_stale_order_state(&mut self) {
        if self
            .filters
            .iter()
            .any(|f| matches!(f, QueryFilter::Order(_)))
        {
            debug!("Clearing previous order state");
            self.order_state.clear();
        }
    }

    /// Apply every filter onto `query` in precedence order
    pub fn apply<Q: FilterTarget + ?Sized>(&mut self, query: &mut Q) -> GatewayResult<()> {
        self.filters.sort_by_key(QueryFilter::kind);

        for filter in &self.filters {
            match filter {
                QueryFilter::Where(where_filter) => query.add_condition(where_filter)?,
                QueryFilter::NestedWhere(tree) => query.add_nested_condition(tree)?,
                QueryFilter::Order(order) => {
                    info!(field = %order.field, ascending = order.ascending, "Adding order filter");
                    self.order_state.push(order.sort_key());
                    query.set_order(self.order_state.keys())?;
                }
                QueryFilter::Include(include) => query.add_includes(&include.included_filters)?,
                QueryFilter::Limit(limit) => {
                    query.set_window(limit.skip_value.unwrap_or(0), Some(limit.limit_value))?
                }
                QueryFilter::Skip(skip) => query.set_window(skip.skip_value, None)?,
                QueryFilter::Distinct(distinct) => query.set_distinct(&distinct.fields)?,
            }
        }
        Ok(())
    }

    /// Add, merge, clear and apply in one step
    pub fn manage_filters<Q: FilterTarget + ?Sized>(
        &mut self,
        filters: impl IntoIterator<Item = QueryFilter>,
        query: &mut Q,
    ) -> GatewayResult<()> {
        self.add_filters(filters);
        self.merge_skip_into_limit();
        self.clear_stale_order_state();
        self.apply(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GatewayError;
    use crate::filters::ast::{WhereFilter, WhereTree};
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<String>,
        order: Vec<SortKey>,
        window: Option<(u64, Option<u64>)>,
    }

    impl FilterTarget for Recorder {
        fn add_condition(&mut self, filter: &WhereFilter) -> GatewayResult<()> {
            self.calls.push(format!("where {}", filter.field));
            Ok(())
        }

        fn add_nested_condition(&mut self, _tree: &WhereTree) -> GatewayResult<()> {
            self.calls.push("nested".to_string());
            Ok(())
        }

        fn set_order(&mut self, keys: &[SortKey]) -> GatewayResult<()> {
            self.calls.push("order".to_string());
            self.order = keys.to_vec();
            Ok(())
        }

        fn add_includes(&mut self, _paths: &[String]) -> GatewayResult<()> {
            self.calls.push("include".to_string());
            Ok(())
        }

        fn set_window(&mut self, skip: u64, limit: Option<u64>) -> GatewayResult<()> {
            self.calls.push("window".to_string());
            self.window = Some((skip, limit));
            Ok(())
        }

        fn set_distinct(&mut self, _fields: &[String]) -> GatewayResult<()> {
            self.calls.push("distinct".to_string());
            Ok(())
        }
    }

    #[test]
    fn test_skip_merged_into_limit() {
        let mut handler = FilterOrderHandler::new();
        handler.add_filters(vec![
            QueryFilter::skip(10).unwrap(),
            QueryFilter::limit(5).unwrap(),
        ]);
        handler.merge_skip_into_limit();

        assert_eq!(handler.filters().len(), 1);
        let mut query = Recorder::default();
        handler.apply(&mut query).unwrap();
        assert_eq!(query.window, Some((10, Some(5))));
    }

    #[test]
    fn test_lone_skip_is_kept() {
        let mut handler = FilterOrderHandler::new();
        handler.add_filter(QueryFilter::skip(3).unwrap());
        handler.merge_skip_into_limit();

        let mut query = Recorder::default();
        handler.apply(&mut query).unwrap();
        assert_eq!(query.window, Some((3, None)));
    }

    #[test]
    fn test_repeated_window_filters_keep_last() {
        let mut handler = FilterOrderHandler::new();
        let mut query = Recorder::default();
        handler
            .manage_filters(
                vec![
                    QueryFilter::skip(3).unwrap(),
                    QueryFilter::limit(10).unwrap(),
                    QueryFilter::skip(7).unwrap(),
                    QueryFilter::limit(5).unwrap(),
                ],
                &mut query,
            )
            .unwrap();

        assert_eq!(handler.filters().len(), 1);
        assert_eq!(query.calls, vec!["window"]);
        assert_eq!(query.window, Some((7, Some(5))));
    }

    #[test]
    fn test_repeated_lone_skip_keeps_last() {
        let mut handler = FilterOrderHandler::new();
        handler.add_filters(vec![QueryFilter::skip(2).unwrap(), QueryFilter::skip(4).unwrap()]);
        handler.merge_skip_into_limit();

        assert_eq!(handler.filters().len(), 1);
        let mut query = Recorder::default();
        handler.apply(&mut query).unwrap();
        assert_eq!(query.window, Some((4, None)));
    }

    #[test]
    fn test_apply_follows_precedence() {
        let mut handler = FilterOrderHandler::new();
        let mut query = Recorder::default();
        handler
            .manage_filters(
                vec![
                    QueryFilter::distinct(&["name"]).unwrap(),
                    QueryFilter::limit(2).unwrap(),
                    QueryFilter::include(&["investigation"]).unwrap(),
                    QueryFilter::order("id", "asc").unwrap(),
                    QueryFilter::where_("name", "eq", json!("a")).unwrap(),
                ],
                &mut query,
            )
            .unwrap();

        assert_eq!(
            query.calls,
            vec!["where name", "order", "include", "window", "distinct"]
        );
    }

    #[test]
    fn test_order_keys_replace_not_append() {
        let mut handler = FilterOrderHandler::new();
        let mut query = Recorder::default();
        handler
            .manage_filters(
                vec![
                    QueryFilter::order("name", "asc").unwrap(),
                    QueryFilter::order("id", "desc").unwrap(),
                ],
                &mut query,
            )
            .unwrap();

        assert_eq!(
            query.order,
            vec![
                SortKey { field: "name".into(), ascending: true },
                SortKey { field: "id".into(), ascending: false },
            ]
        );
    }

    #[test]
    fn test_stale_order_state_cleared_between_requests() {
        let mut handler = FilterOrderHandler::new();

        let mut first = Recorder::default();
        handler
            .manage_filters(vec![QueryFilter::order("name", "desc").unwrap()], &mut first)
            .unwrap();

        handler.filters.clear();
        let mut second = Recorder::default();
        handler
            .manage_filters(vec![QueryFilter::order("id", "asc").unwrap()], &mut second)
            .unwrap();

        assert_eq!(
            second.order,
            vec![SortKey { field: "id".into(), ascending: true }]
        );
    }

    #[test]
    fn test_remove_filter() {
        let mut handler = FilterOrderHandler::new();
        let limit = QueryFilter::limit(4).unwrap();
        handler.add_filter(limit.clone());
        assert!(handler.remove_filter(&limit));
        assert!(!handler.remove_filter(&limit));
        assert!(handler.filters().is_empty());
    }

    #[test]
    fn test_target_errors_propagate() {
        struct Rejecting;
        impl FilterTarget for Rejecting {
            fn add_condition(&mut self, _f: &WhereFilter) -> GatewayResult<()> {
                Err(GatewayError::bad_request("no"))
            }
            fn set_order(&mut self, _k: &[SortKey]) -> GatewayResult<()> {
                Ok(())
            }
            fn add_includes(&mut self, _p: &[String]) -> GatewayResult<()> {
                Ok(())
            }
            fn set_window(&mut self, _s: u64, _l: Option<u64>) -> GatewayResult<()> {
                Ok(())
            }
            fn set_distinct(&mut self, _f: &[String]) -> GatewayResult<()> {
                Ok(())
            }
        }

        let mut handler = FilterOrderHandler::new();
        handler.add_filter(QueryFilter::where_("id", "eq", json!(1)).unwrap());
        assert!(matches!(
            handler.apply(&mut Rejecting),
            Err(GatewayError::BadRequest(_))
        ));
        let mut handler = FilterOrderHandler::new();
        handler.add_filter(QueryFilter::NestedWhere(WhereTree::And(vec![])));
        assert!(handler.apply(&mut Rejecting).is_err());
    }
}
