//! CLI module for DataGateway
//!
//! Provides command-line interface for:
//! - serve: Start the HTTP server
//! - check-config: Validate a configuration file
//! - query: One-shot filtered read

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check_config, init_logging, query, run, run_command, serve};
pub use config::{ApiConfig, BackendKind, Config, SearchApiConfig, Services, UserCredentials};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
