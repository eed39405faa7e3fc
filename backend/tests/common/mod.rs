use axum::Router;
use taskboard::api::router;
use taskboard::config::DatabaseConfig;
use taskboard::db;
use taskboard::state::AppState;

pub async fn setup_app() -> Router {
    let pool = db::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("Failed to create test db");

    router(AppState { db: pool })
}

/// Serves a fresh app on an ephemeral port and returns its base URL.
#[allow(dead_code)]
pub async fn spawn_server() -> String {
    let app = setup_app().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });

    format!("http://{}", addr)
}
