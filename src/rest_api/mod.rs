//! # REST API Module
//!
//! The HTTP surface: entity endpoints, `/sessions`, `/ping` and the search
//! API, served with axum.

pub mod errors;
pub mod handler;
pub mod parser;
pub mod search;
pub mod server;

pub use errors::ErrorResponse;
pub use server::RestServer;
