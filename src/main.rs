use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use recognition_server::api::{
    health::health_handler,
    params::{get_params_handler, put_params_handler},
    recognize::recognize_handler,
    tracks::{delete_track_handler, get_track_handler, ingest_handler, list_tracks_handler},
    AppState,
};
use recognition_server::index::{FingerprintIndex, SqliteIndex};
use recognition_server::params::ParameterStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    tracing::info!("Starting Recognition Server v{}", env!("CARGO_PKG_VERSION"));

    let db_path =
        std::env::var("RECOGNITION_DB").unwrap_or_else(|_| "recognition.db".to_string());
    let params_path =
        std::env::var("RECOGNITION_PARAMS").unwrap_or_else(|_| "parameters.json".to_string());

    let index = SqliteIndex::open(&db_path)
        .with_context(|| format!("failed to open fingerprint index at {db_path}"))?;
    index
        .create_hash_index()
        .context("failed to build the hash index")?;

    let state = AppState {
        index: Arc::new(index),
        params: Arc::new(ParameterStore::new(&params_path)),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/recognize", post(recognize_handler))
        .route("/tracks", post(ingest_handler).get(list_tracks_handler))
        .route(
            "/tracks/:track_id",
            get(get_track_handler).delete(delete_track_handler),
        )
        .route("/params", get(get_params_handler).put(put_params_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state);

    // Bind to socket
    let addr = SocketAddr::from(([127, 0, 0, 1], 8750));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!("Server listening on {} (index: {})", addr, db_path);

    // Run server
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
