use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use rusqlite::params;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use photolog::config::{Cli, Config};
use photolog::state::AppState;
use photolog::store::FsAssetStore;
use photolog::{db, routes, session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    // Build app state
    let assets = Arc::new(FsAssetStore::new(config.uploads_path()));
    let state = AppState::new(pool, config.clone(), assets);

    // Build router
    let mut app = Router::new()
        .route("/media/{*path}", get(routes::media::serve))
        .merge(routes::posts::router())
        .merge(routes::social::router())
        .merge(routes::archive::router());

    // Test-only seed endpoint: creates a user + session, returns session cookie
    if std::env::var("PHOTOLOG_TEST_SEED").is_ok() {
        app = app.route("/test/seed", get(test_seed));
    }

    let app = app
        .layer(DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Test-only: seed a user + session and return the session cookie.
/// Only mounted when PHOTOLOG_TEST_SEED env var is set.
async fn test_seed(State(state): State<AppState>) -> impl IntoResponse {
    let conn = state.db.get().unwrap();
    let user_id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT OR IGNORE INTO users (id, name, email) VALUES (?1, 'testuser', 'test@example.com')",
        params![user_id],
    )
    .unwrap();

    // Get the actual user id (may already exist from previous seed call)
    let uid: String = conn
        .query_row(
            "SELECT id FROM users WHERE email = 'test@example.com'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    drop(conn);

    let token = session::create_session(&state.db, &uid, state.config.auth.session_hours).unwrap();

    let cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=3600",
        state.config.auth.cookie_name, token
    );

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        format!("{{\"user_id\":\"{}\",\"name\":\"testuser\"}}", uid),
    )
}
