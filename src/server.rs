//! HTTP surface of the uploader.
//!
//! A single route, `POST /api/upload`, open to any origin. Handlers share an
//! immutable [`AppState`]: the configuration plus the writer and counter
//! components, both bound to the same remote repository client.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::post,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{
    config::{Backend, Config},
    counter::CounterUpdater,
    remote::{GithubClient, MemoryRepository, RepositoryClient},
    writer::ContentWriter,
};

pub mod upload;

/// Shared state injected into handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub writer: ContentWriter,
    pub counter: CounterUpdater,
}

impl AppState {
    pub fn new(config: Config, client: Arc<dyn RepositoryClient>) -> Self {
        let writer = ContentWriter::new(client.clone(), config.branch.clone());
        let counter = CounterUpdater::new(
            client,
            config.counter_file_path.trim_start_matches('/'),
            config.branch.clone(),
        );
        Self {
            config: Arc::new(config),
            writer,
            counter,
        }
    }
}

/// Build the remote repository client selected by the configuration
pub fn build_client(config: &Config) -> Result<Arc<dyn RepositoryClient>> {
    match config.backend {
        Backend::Github => {
            let client = GithubClient::new(
                &config.api_url,
                config.repo_owner.clone(),
                config.repo_name.clone(),
                config.github_token.as_deref(),
            )?;
            Ok(Arc::new(client))
        }
        Backend::Memory => Ok(Arc::new(MemoryRepository::new(config.repository()))),
    }
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

/// All routes with their middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(upload::upload))
        // Size is bounded by the remote, not here
        .layer(DefaultBodyLimit::disable())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until ctrl-c
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

/// Start the uploader with the given configuration
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;
    if config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set; uploads will be rejected");
    }

    let client = build_client(&config)?;
    let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        "Using backend={}, repository={}, branch={}, counter={}",
        config.backend,
        config.repository(),
        config.branch,
        config.counter_file_path
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("GitHub Uploader API listening on port {}", config.port);

    serve(listener, AppState::new(config, client)).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received termination signal shutting down");
}
