//! # Common
//!
//! Error taxonomy and the date format contract shared by every backend.

pub mod date;
pub mod errors;

pub use date::{datetime_to_str, str_to_datetime, ACCEPTED_DATE_FORMAT};
pub use errors::{GatewayError, GatewayResult};
