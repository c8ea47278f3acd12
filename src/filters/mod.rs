//! # Filters
//!
//! The generic REST filter language and its compilation onto backend
//! queries.

pub mod ast;
pub mod handler;
pub mod parser;
pub mod target;

pub use ast::{
    Condition, DistinctFieldFilter, FilterKind, IncludeFilter, LimitFilter, Operator,
    OrderFilter, QueryFilter, SkipFilter, SortKey, WhereFilter, WhereTree,
};
pub use handler::{FilterOrderHandler, OrderState};
pub use parser::{parse_filter, parse_filter_list, parse_query_params, parse_where};
pub use target::FilterTarget;
