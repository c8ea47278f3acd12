//! # Database
//!
//! The relational-mirror backend: rows, the query compiled from filters,
//! the row store that runs it, and sessions for the mirror.

pub mod errors;
pub mod operations;
pub mod query;
pub mod row;
pub mod session;
pub mod store;

pub use errors::{SessionError, SessionResult};
pub use query::{FieldPath, RowCondition, RowQuery, MAX_FIELD_DEPTH};
pub use row::{table_name, RelatedRows, Row};
pub use session::{
    requires_valid_session, InMemorySessionRepository, Session, SessionConfig, SessionManager,
    SessionRepository,
};
pub use store::{entity_for_table, MemoryRowStore, RowOutput, RowStore};
