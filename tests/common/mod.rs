#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;

use kanban_reorder::api::{create_router, AppState};
use kanban_reorder::auth::jwt;
use kanban_reorder::config::{Config, RankingConfig};
use kanban_reorder::domain::Card;
use kanban_reorder::infrastructure::db;
use kanban_reorder::services::Notifier;

pub const JWT_SECRET: &str = "test-secret";
pub const OWNER: &str = "user-owner";
pub const STRANGER: &str = "user-stranger";

/// File-backed so that several pooled connections share one database.
pub struct TestDb {
    pub pool: SqlitePool,
    pub url: String,
    _dir: TempDir,
}

pub async fn setup_test_db() -> TestDb {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let pool = db::init_db(&url)
        .await
        .expect("Failed to create test database");

    TestDb {
        pool,
        url,
        _dir: dir,
    }
}

pub fn ranking() -> RankingConfig {
    RankingConfig {
        min_gap: 1e-6,
        spacing: 1000.0,
        max_attempts: 3,
        retry_base_delay_ms: 1,
    }
}

pub fn test_config(database_url: &str) -> Config {
    Config {
        port: 0,
        database_url: database_url.to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        request_timeout_ms: 10_000,
        ranking: ranking(),
    }
}

pub fn notifier() -> Notifier {
    let (tx, _rx) = broadcast::channel(100);
    Notifier::new(tx)
}

pub fn test_state(db: &TestDb) -> AppState {
    AppState::new(
        db.pool.clone(),
        notifier(),
        Arc::new(test_config(&db.url)),
        CancellationToken::new(),
    )
}

pub fn test_app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);
    create_router(state, &config)
}

pub fn token_for(user_id: &str) -> String {
    jwt::create_token(JWT_SECRET.as_bytes(), user_id, 3600).expect("Failed to create token")
}

/// `n`-th microsecond of a fixed day; larger `n` means created later.
pub fn created_at(n: u32) -> String {
    format!("2026-01-01T00:00:00.{:06}Z", n)
}

pub async fn seed_board(pool: &SqlitePool, owner_id: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO boards (id, owner_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(owner_id)
        .bind("Board")
        .bind(created_at(0))
        .execute(pool)
        .await
        .expect("Failed to seed board");
    id
}

pub async fn seed_column(pool: &SqlitePool, board_id: &str, position: i64) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO columns (id, board_id, name, position) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(board_id)
        .bind(format!("Column {}", position))
        .bind(position)
        .execute(pool)
        .await
        .expect("Failed to seed column");
    id
}

pub async fn seed_card(pool: &SqlitePool, column_id: &str, rank: f64, created: u32) -> Card {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO cards (id, column_id, title, rank, version, created_at, updated_at) VALUES (?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(column_id)
    .bind(format!("Card {}", created))
    .bind(rank)
    .bind(created_at(created))
    .bind(created_at(created))
    .execute(pool)
    .await
    .expect("Failed to seed card");

    load_card(pool, &id).await
}

pub async fn load_card(pool: &SqlitePool, id: &str) -> Card {
    sqlx::query_as(
        "SELECT id, column_id, title, rank, version, created_at, updated_at FROM cards WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await
    .expect("Card not found")
}

/// `(id, rank)` in display order.
pub async fn ranks(pool: &SqlitePool, column_id: &str) -> Vec<(String, f64)> {
    sqlx::query_as(
        "SELECT id, rank FROM cards WHERE column_id = ? ORDER BY rank ASC, created_at ASC, id ASC",
    )
    .bind(column_id)
    .fetch_all(pool)
    .await
    .expect("Failed to read ranks")
}

/// Makes every same-column rank write to 1000 or above a silent no-op, so
/// each rebalance write affects zero rows.
pub async fn block_rebalance_writes(pool: &SqlitePool) {
    sqlx::query(
        r#"
        CREATE TRIGGER block_rebalance BEFORE UPDATE OF rank ON cards
        WHEN NEW.column_id = OLD.column_id AND NEW.rank >= 1000
        BEGIN
            SELECT RAISE(IGNORE);
        END;
        "#,
    )
    .execute(pool)
    .await
    .expect("Failed to install trigger");
}

pub async fn make_request(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<String>,
    token: Option<&str>,
) -> (StatusCode, String) {
    let mut request = Request::builder().uri(uri).method(method);

    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    if let Some(token) = token {
        request = request.header("authorization", format!("Bearer {}", token));
    }

    let request = request
        .body(Body::from(body.unwrap_or_default()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body_str = String::from_utf8(body.to_vec()).unwrap();

    (status, body_str)
}
