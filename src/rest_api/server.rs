//! # REST API HTTP Server
//!
//! Axum router over a backend and, when configured, the search API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backend::Backend;
use crate::search_api::SearchApi;

use super::handler;
use super::search;

/// HTTP server for the gateway
pub struct RestServer {
    backend: Arc<dyn Backend>,
    search: Option<Arc<SearchApi>>,
}

impl RestServer {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            search: None,
        }
    }

    /// Also serve the search API under `/search-api`
    pub fn with_search_api(mut self, search: Arc<SearchApi>) -> Self {
        self.search = Some(search);
        self
    }

    /// Build the Axum router
    pub fn router(self) -> Router {
        let mut router = Router::new()
            .route("/ping", get(handler::ping))
            .route(
                "/sessions",
                get(handler::session_details)
                    .post(handler::login)
                    .put(handler::refresh)
                    .delete(handler::logout),
            )
            .route(
                "/:entity",
                get(handler::list).post(handler::create).patch(handler::update),
            )
            .route("/:entity/findone", get(handler::find_one))
            .route("/:entity/count", get(handler::count))
            .route(
                "/:entity/:id",
                get(handler::get_by_id)
                    .patch(handler::update_by_id)
                    .delete(handler::delete_by_id),
            )
            .with_state(self.backend);

        if let Some(api) = self.search {
            router = router.merge(search_routes(api));
        }

        router
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
    }

    /// Serve on `addr` until the process is stopped
    pub async fn start(self, addr: SocketAddr) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "DataGateway API listening");
        axum::serve(listener, self.router()).await
    }
}

fn search_routes(api: Arc<SearchApi>) -> Router {
    Router::new()
        .route("/search-api/:entity", get(search::search))
        .route("/search-api/:entity/count", get(search::count))
        .route("/search-api/:entity/:pid", get(search::with_pid))
        .route("/search-api/:entity/:pid/files", get(search::files))
        .route("/search-api/:entity/:pid/files/count", get(search::files_count))
        .with_state(api)
}
