//! Configuration file and the services built from it.
//!
//! ```json
//! {
//!   "datagateway_api": {
//!     "backend": "python_icat",
//!     "fixture_path": "demos/fixture.json",
//!     "catalog_users": [{"mechanism": "simple", "username": "root", "password": "pw"}]
//!   },
//!   "search_api": {"max_entities": 100, "anon_mechanism": "anon"},
//!   "log_level": "info",
//!   "host": "127.0.0.1",
//!   "port": 5000
//! }
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::backend::{Backend, CatalogBackend, DatabaseBackend, DEFAULT_MECHANISM};
use crate::catalog::MemoryCatalog;
use crate::database::{InMemorySessionRepository, MemoryRowStore, SessionConfig, SessionManager};
use crate::entity::Schema;
use crate::memory::{load_fixture_file, MemoryStore};
use crate::search_api::{Mappings, SearchApi, SearchClientManager, DEFAULT_MAX_ENTITIES};

use super::errors::{CliError, CliResult};

/// Which backend serves the entity endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    PythonIcat,
    Db,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    #[serde(default = "default_mechanism")]
    pub mechanism: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub backend: BackendKind,

    /// Connection string of the relational mirror
    #[serde(default)]
    pub db_url: Option<String>,

    #[serde(default)]
    pub icat_url: Option<String>,

    #[serde(default = "default_true")]
    pub icat_check_cert: bool,

    /// JSON fixture the in-process stores are seeded from
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,

    /// Credentials accepted by the relational mirror
    #[serde(default)]
    pub db_credentials: Option<UserCredentials>,

    /// Users known to the catalog
    #[serde(default)]
    pub catalog_users: Vec<UserCredentials>,

    /// Window bound applied when a skip arrives without a limit
    #[serde(default)]
    pub max_entities: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchApiConfig {
    #[serde(default)]
    pub icat_url: Option<String>,

    #[serde(default = "default_max_entities")]
    pub max_entities: u64,

    #[serde(default = "default_anon_mechanism")]
    pub anon_mechanism: String,
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub datagateway_api: ApiConfig,

    #[serde(default)]
    pub search_api: Option<SearchApiConfig>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub debug_mode: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_mechanism() -> String {
    DEFAULT_MECHANISM.to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_entities() -> u64 {
    DEFAULT_MAX_ENTITIES
}
fn default_anon_mechanism() -> String {
    "anon".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}

/// The services a configuration describes
pub struct Services {
    pub backend: Arc<dyn Backend>,
    pub search_api: Option<Arc<SearchApi>>,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CliResult<()> {
        EnvFilter::try_new(&self.log_level).map_err(|e| {
            CliError::config_error(format!("Invalid log_level '{}': {}", self.log_level, e))
        })?;

        if self.port == 0 {
            return Err(CliError::config_error("port must be > 0"));
        }

        let api = &self.datagateway_api;
        match api.backend {
            BackendKind::Db if api.db_credentials.is_none() => {
                return Err(CliError::config_error(
                    "db_credentials are required when the db backend is selected",
                ))
            }
            BackendKind::PythonIcat if api.catalog_users.is_empty() && self.search_api.is_none() => {
                return Err(CliError::config_error(
                    "catalog_users must name at least one user for the python_icat backend",
                ))
            }
            _ => {}
        }
        if api.max_entities == Some(0) {
            return Err(CliError::config_error("datagateway_api.max_entities must be > 0"));
        }

        if let Some(search) = &self.search_api {
            if search.max_entities == 0 {
                return Err(CliError::config_error("search_api.max_entities must be > 0"));
            }
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> CliResult<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| CliError::config_error(format!("Invalid host/port: {}", e)))
    }

    /// Credentials the `query` command logs in with
    pub fn query_credentials(&self) -> Option<&UserCredentials> {
        let api = &self.datagateway_api;
        match api.backend {
            BackendKind::Db => api.db_credentials.as_ref(),
            BackendKind::PythonIcat => api.catalog_users.first(),
        }
    }

    fn seeded_store(&self) -> CliResult<MemoryStore> {
        let mut store = MemoryStore::new(Schema::icat());
        if let Some(path) = &self.datagateway_api.fixture_path {
            let loaded = load_fixture_file(&mut store, path)
                .map_err(|e| CliError::config_error(format!("Fixture error: {}", e)))?;
            info!(path = %path.display(), records = loaded, "Loaded fixture");
        }
        Ok(store)
    }

    fn catalog(&self) -> CliResult<Arc<MemoryCatalog>> {
        let api = &self.datagateway_api;
        if let Some(url) = &api.icat_url {
            info!(url = %url, check_cert = api.icat_check_cert, "Catalog location");
        }
        let mut catalog = MemoryCatalog::new(self.seeded_store()?).with_max_entities(api.max_entities);
        for user in &api.catalog_users {
            catalog = catalog.with_user(&user.mechanism, &user.username, &user.password);
        }
        if let Some(search) = &self.search_api {
            catalog = catalog.with_user(&search.anon_mechanism, "", "");
        }
        Ok(Arc::new(catalog))
    }

    /// Build the backend and, when configured, the search API
    pub fn build(&self) -> CliResult<Services> {
        let api = &self.datagateway_api;
        let catalog = self.catalog()?;

        let backend: Arc<dyn Backend> = match api.backend {
            BackendKind::PythonIcat => Arc::new(CatalogBackend::new(Arc::new(Arc::clone(&catalog)))),
            BackendKind::Db => {
                let credentials = api
                    .db_credentials
                    .as_ref()
                    .ok_or_else(|| CliError::config_error("db_credentials missing"))?;
                if let Some(url) = &api.db_url {
                    info!(url = %url, "Relational mirror location");
                }
                Arc::new(DatabaseBackend::new(
                    Arc::new(MemoryRowStore::new(self.seeded_store()?)),
                    SessionManager::new(
                        SessionConfig::default(),
                        InMemorySessionRepository::new(),
                        &credentials.username,
                        &credentials.password,
                    ),
                ))
            }
        };

        let search_api = self.search_api.as_ref().map(|search| {
            Arc::new(SearchApi::new(
                Mappings::icat(),
                SearchClientManager::new(Arc::new(Arc::clone(&catalog)), search.anon_mechanism.clone()),
                search.max_entities,
            ))
        });

        Ok(Services { backend, search_api })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(
            r#"{"datagateway_api": {"backend": "db", "db_credentials": {"username": "u", "password": "p"}}}"#,
        )
        .unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.port, 5000);
        assert!(config.search_api.is_none());
        assert_eq!(config.query_credentials().unwrap().mechanism, "simple");
        assert_eq!(config.socket_addr().unwrap().port(), 5000);
    }

    #[test]
    fn test_validation() {
        assert!(Config::from_json(r#"{"datagateway_api": {"backend": "db"}}"#).is_err());
        assert!(Config::from_json(r#"{"datagateway_api": {"backend": "python_icat"}}"#).is_err());
        assert!(Config::from_json(
            r#"{"datagateway_api": {"backend": "python_icat", "catalog_users": [{"username": "root"}]}, "port": 0}"#
        )
        .is_err());
        assert!(Config::from_json(r#"{"datagateway_api": {"backend": "sqlite"}}"#).is_err());
    }

    #[test]
    fn test_build_catalog_services() {
        let config = Config::from_json(
            r#"{
                "datagateway_api": {"backend": "python_icat", "catalog_users": [{"username": "root", "password": "pw"}]},
                "search_api": {}
            }"#,
        )
        .unwrap();
        let services = config.build().unwrap();
        assert!(services.search_api.is_some());
        assert_eq!(services.backend.ping().unwrap(), "DataGateway API OK");
    }
}
