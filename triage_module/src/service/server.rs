use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::security_headers::security_headers_layer;
use crate::session::{InMemorySessionStore, SessionStore};

use super::config::ServiceConfig;
use super::handlers::{
    delegate_action, health, parse_watch_keywords, run_command, watch_keywords, COMMANDS_ROUTE,
    DELEGATE_ROUTE, WATCH_KEYWORDS_PARSE_ROUTE, WATCH_KEYWORDS_ROUTE,
};
use super::state::AppState;
use super::BoxError;

pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route(WATCH_KEYWORDS_ROUTE, get(watch_keywords))
        .route(WATCH_KEYWORDS_PARSE_ROUTE, post(parse_watch_keywords))
        .route(DELEGATE_ROUTE, post(delegate_action))
        .route(COMMANDS_ROUTE, post(run_command))
        .with_state(state)
        .layer(middleware::from_fn(security_headers_layer))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(
    config: ServiceConfig,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), BoxError> {
    let sessions: Arc<dyn SessionStore> = match &config.session_store_path {
        Some(path) => {
            let store = InMemorySessionStore::from_file(path)?;
            info!("loaded {} sessions from {}", store.len(), path.display());
            Arc::new(store)
        }
        None => {
            info!("SESSION_STORE_PATH not set; every authenticated route will answer 401");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let host: IpAddr = config
        .host
        .parse()
        .map_err(|_| format!("invalid host: {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    info!(
        "rate limit {} requests per {}s",
        config.rate_limit_max_requests,
        config.rate_limit_window.as_secs()
    );

    let app = build_router(AppState::new(config, sessions));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("triage gateway listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolve once `signal` fires. If the signal source fails to install this
/// never resolves.
pub async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!("failed to install shutdown signal handler: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

pub async fn ctrl_c_shutdown() {
    shutdown_on(tokio::signal::ctrl_c()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_completes_when_signal_fires() {
        shutdown_on(async { Ok::<(), io::Error>(()) }).await;
    }

    #[tokio::test]
    async fn failed_signal_install_never_triggers_shutdown() {
        let fired = tokio::select! {
            biased;
            _ = shutdown_on(async { Err::<(), _>(io::Error::other("no signal driver")) }) => true,
            _ = tokio::task::yield_now() => false,
        };
        assert!(!fired);
    }
}
