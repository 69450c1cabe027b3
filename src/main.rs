use std::sync::Arc;

use tower_http::cors::CorsLayer;

use economy_backend::api::{self, AppState};
use economy_backend::config::Config;
use economy_backend::db::Database;
use economy_backend::flavor::Flavor;
use economy_backend::metrics;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load().expect("Invalid configuration");
    let flavor = Flavor::load(&config.data_dir).expect("Failed to load flavor texts");

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    metrics::register_metrics();

    let port = config.port;
    let state = AppState::new(config, db, flavor);
    let app = api::router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to port {port}: {e}"));

    tracing::info!("Economy backend listening on port {port}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
