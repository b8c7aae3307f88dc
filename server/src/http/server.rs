use anyhow::Result;
use axum::{middleware, routing::get, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::{handlers, state::AppState};
use crate::auth::require_auth;

pub fn build_router(state: AppState) -> Router {
    let auth = state.auth.clone();

    // Reads pass the auth layer untouched; it only guards writes
    let config_routes = Router::new()
        .route("/config", get(handlers::list_configs))
        .route("/config/json", get(handlers::resolved_configs))
        .route(
            "/config/:name",
            get(handlers::get_config)
                .post(handlers::set_config)
                .delete(handlers::delete_config),
        )
        .route(
            "/config/:name/country/:country",
            get(handlers::get_config_for_country),
        )
        .route("/config/:name/history", get(handlers::list_history))
        .route(
            "/config/:name/history/:version",
            get(handlers::get_history_entry),
        )
        .route_layer(middleware::from_fn_with_state(auth, require_auth));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(config_routes)
        .with_state(Arc::new(state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves on an already bound listener until the listener fails
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

pub async fn start_server(state: AppState, bind_address: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!("Server listening on {}", listener.local_addr()?);

    serve(listener, state).await
}
