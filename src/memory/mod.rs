//! # Memory
//!
//! Volatile entity storage backing the in-memory catalog and the in-memory
//! relational mirror.

pub mod errors;
pub mod fixture;
pub mod pattern;
pub mod store;

pub use errors::{StoreError, StoreResult};
pub use fixture::{load_fixture, load_fixture_file};
pub use store::{IncludeTree, MemoryStore, Predicate, RecordGraph, Selection, StoredRecord};
