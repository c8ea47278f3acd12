//! CLI argument definitions using clap
//!
//! Commands:
//! - datagateway serve --config <path>
//! - datagateway check-config --config <path>
//! - datagateway query --config <path> --entity <name> [--filters <json>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DataGateway - REST gateway over a scientific metadata catalog
#[derive(Parser, Debug)]
#[command(name = "datagateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,
    },

    /// Load and validate a configuration file
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,
    },

    /// Run one filtered read against the configured backend and exit
    Query {
        /// Path to configuration file
        #[arg(long, default_value = "./config.json")]
        config: PathBuf,

        /// Endpoint name, e.g. `datasets`
        #[arg(long)]
        entity: String,

        /// JSON list of filter objects, e.g. `[{"limit": 2}]`
        #[arg(long, default_value = "[]")]
        filters: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_arguments() {
        let cli = Cli::try_parse_from([
            "datagateway",
            "query",
            "--entity",
            "datasets",
            "--filters",
            r#"[{"limit": 1}]"#,
        ])
        .unwrap();
        match cli.command {
            Command::Query { config, entity, filters } => {
                assert_eq!(config, PathBuf::from("./config.json"));
                assert_eq!(entity, "datasets");
                assert_eq!(filters, r#"[{"limit": 1}]"#);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
