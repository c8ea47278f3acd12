//! # Search API
//!
//! The PaNOSC search API: a read-only view of the catalog under the PaNOSC
//! data model, served through one shared anonymous session.

pub mod filters;
pub mod mappings;
pub mod models;
pub mod operations;
pub mod session;

pub use filters::{parse_search_filter, parse_search_where, SearchFilters};
pub use mappings::{FieldMapping, FieldSource, Mappings, PanoscEntity, RelationMapping};
pub use models::to_panosc;
pub use operations::{SearchApi, DEFAULT_MAX_ENTITIES};
pub use session::SearchClientManager;
