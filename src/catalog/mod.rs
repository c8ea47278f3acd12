//! # Catalog
//!
//! The entity-graph backend: a session-bound client capability, the query
//! it executes, and the record operations built on both.

pub mod client;
pub mod entity;
pub mod errors;
pub mod executor;
pub mod guard;
pub mod memory;
pub mod operations;
pub mod query;
pub mod resolver;

pub use client::{CatalogClient, ClientFactory, Credentials, SearchResult};
pub use entity::CatalogEntity;
pub use errors::{ClientError, ClientResult};
pub use executor::{execute, map_distinct_attributes, QueryOutput};
pub use guard::requires_session;
pub use memory::{MemoryCatalog, MemoryCatalogClient};
pub use query::{Aggregate, CatalogQuery};
pub use resolver::{resolve_endpoint_name, resolve_entity_name};
