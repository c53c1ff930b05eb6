mod app_state;

use axum::{routing::get, Router};
use helios_config::load_config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    helios_common::logging::init();

    let config = Arc::new(load_config().expect("Failed to load config"));
    let state = app_state::build(config.clone())
        .await
        .expect("Failed to build application state");

    let api_router = Router::new()
        .route("/", get(|| async { "Helios scheduling API" }))
        .merge(helios_oauth::routes::routes(state.google_auth))
        .merge(helios_scheduling::routes::routes(state.scheduling));

    let app = Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
