//! CLI command implementations

use std::path::Path;

use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::backend::LoginRequest;
use crate::filters::parse_filter_list;
use crate::rest_api::RestServer;

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config } => serve(&config),
        Command::CheckConfig { config } => check_config(&config),
        Command::Query { config, entity, filters } => query(&config, &entity, &filters),
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &Config) {
    let directives = if config.debug_mode {
        format!("{},tower_http=debug", config.log_level)
    } else {
        config.log_level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    // a subscriber may already be installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Load the configuration, build the services and serve HTTP until stopped
pub fn serve(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    init_logging(&config);

    let services = config.build()?;
    let addr = config.socket_addr()?;
    let mut server = RestServer::new(services.backend);
    if let Some(search_api) = services.search_api {
        info!("Search API enabled under /search-api");
        server = server.with_search_api(search_api);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.start(addr))?;
    Ok(())
}

/// Validate a configuration file and report what it would serve
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(err) => {
            write_error(&err)?;
            return Err(err);
        }
    };
    write_response(json!({
        "backend": config.datagateway_api.backend,
        "search_api": config.search_api.is_some(),
        "address": config.socket_addr()?.to_string(),
    }))
}

/// Log in with the configured credentials, run one filtered read and log out
pub fn query(config_path: &Path, entity: &str, filters: &str) -> CliResult<()> {
    let config = Config::load(config_path)?;
    init_logging(&config);

    let filters: Value = serde_json::from_str(filters)
        .map_err(|e| CliError::request_failed(format!("Invalid filters JSON: {}", e)))?;
    let filters = parse_filter_list(&filters)?;

    let credentials = config
        .query_credentials()
        .ok_or_else(|| CliError::config_error("no credentials configured for the query command"))?;
    let backend = config.build()?.backend;
    let session = backend.login(&LoginRequest::new(
        &credentials.mechanism,
        &credentials.username,
        &credentials.password,
    ))?;

    let result = backend.get_with_filters(&session, entity, filters);
    if let Err(err) = backend.logout(&session) {
        warn!(error = %err, "Logout after query failed");
    }

    match result {
        Ok(records) => write_response(Value::Array(records)),
        Err(err) => {
            let err = CliError::from(err);
            write_error(&err)?;
            Err(err)
        }
    }
}
