use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde_json::json;
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use gallery_api::{config, database, handlers};

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting gallery API in {:?} mode", config.environment);

    let pool = database::connect()
        .await
        .unwrap_or_else(|e| panic!("failed to connect database: {}", e));

    let app = app(pool);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Gallery API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app(pool: PgPool) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(handlers::users::routes())
        .merge(handlers::photos::routes())
        .merge(handlers::session::routes())
        .merge(handlers::describe::routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

async fn health(State(pool): State<PgPool>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match database::health_check(&pool).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "message": "SUCCESS",
                "info": { "status": "ok", "timestamp": now }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "error_id": "StoreError",
                "message": "Database unavailable",
                "info": { "status": "degraded", "timestamp": now, "detail": e.to_string() }
            })),
        ),
    }
}
