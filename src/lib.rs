//! datagateway - REST gateway over a scientific metadata catalog
//!
//! Requests carry a small filter language (where, order, limit, skip,
//! include, distinct) that is compiled onto catalog queries, or onto
//! queries against a relational mirror of the catalog. A PaNOSC search API
//! is served from the same catalog.

pub mod backend;
pub mod catalog;
pub mod cli;
pub mod common;
pub mod database;
pub mod entity;
pub mod filters;
pub mod memory;
pub mod rest_api;
pub mod search_api;
