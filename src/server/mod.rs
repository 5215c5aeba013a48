use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::storage::Catalog;

pub mod routes;

/// Server state
pub struct AppState {
    pub catalog: Catalog,
}

/// CORS policy: permissive unless specific origins are configured
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Build the API router
pub fn router(catalog: Catalog) -> Router {
    let state = Arc::new(AppState { catalog });

    Router::new()
        .route("/health", get(routes::health))
        .route("/items", get(routes::list_items))
        .route("/items/{id}", get(routes::get_item).patch(routes::update_item))
        .route("/sql", post(routes::execute_sql))
        .route("/categories", get(routes::get_categories))
        .route("/regions", get(routes::get_regions))
        .route("/stats", get(routes::get_stats))
        .route("/stats/regions", get(routes::get_region_stats))
        .route("/stats/categories", get(routes::get_category_stats))
        .route("/sessions", get(routes::list_sessions).post(routes::create_session))
        .route("/sessions/{id}", get(routes::get_session).delete(routes::delete_session))
        .route("/sessions/{id}/save", post(routes::save_session))
        .route("/sessions/{id}/clear", post(routes::clear_session))
        .route("/sessions/{id}/items", post(routes::add_session_item))
        .route("/sessions/{id}/items/{item_id}", axum::routing::delete(routes::remove_session_item))
        .with_state(state)
}

pub async fn start_server(port: u16, catalog: Catalog, allowed_origins: &[String]) -> anyhow::Result<()> {
    let app = router(catalog)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
