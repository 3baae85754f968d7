use std::sync::Arc;

use atrium_bootstrap::{Application, Database, Launcher, RunMode, ServerConfig};
use atrium_server::{
    AtriumFactory,
    db::{DatabaseConfig, SqliteDatabase},
    routes,
    state::AppState,
};
use axum::{Router, extract::State};

async fn in_memory_database() -> Arc<SqliteDatabase> {
    let database = Arc::new(SqliteDatabase::connect(&DatabaseConfig::in_memory()).unwrap());
    let app = Application::new(RunMode::Testing, Router::new());
    let ctx = app.enter();
    database.create_all(&ctx).await.unwrap();
    database
}

#[tokio::test]
async fn schema_init_creates_tables() {
    let database = in_memory_database().await;

    let (count,): (i64,) = sqlx::query_as(
        "SELECT count(*) FROM sqlite_master \
         WHERE type = 'table' AND name IN ('users', 'notes')",
    )
    .fetch_one(database.pool())
    .await
    .unwrap();
    assert_eq!(count, 2);

    // create_all is idempotent, re-running must not fail
    let app = Application::new(RunMode::Testing, Router::new());
    let ctx = app.enter();
    database.create_all(&ctx).await.unwrap();
}

#[tokio::test]
async fn launcher_builds_and_initializes_the_atrium_app() {
    unsafe {
        std::env::remove_var(RunMode::ENV_VAR);
        std::env::remove_var(ServerConfig::PORT_ENV);
    }
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[database]\nurl = \"sqlite::memory:\"\nmax_connections = 1\n",
    )
    .unwrap();

    let mut launcher = Launcher::builder()
        .default_mode(RunMode::Testing)
        .initialize_logging(false)
        .config_dir(Some(dir.path().to_path_buf()))
        .build();
    launcher.initialize().unwrap();

    let app = launcher.build(&AtriumFactory).unwrap();
    assert_eq!(app.mode(), RunMode::Testing);
    assert!(app.database().is_some());

    launcher.initialize_schema(&app).await.unwrap();
    assert_eq!(app.active_contexts(), 0);
}

#[tokio::test]
async fn healthz_reports_ok_with_a_live_database() {
    let database = in_memory_database().await;
    let state = AppState {
        database,
        mode: RunMode::Testing,
    };
    assert!(routes::healthz(State(state)).await.is_ok());
}

#[tokio::test]
async fn healthz_reports_unavailable_when_the_database_is_broken() {
    let config = DatabaseConfig::new("sqlite:///no/such/directory/atrium.db", 1);
    let database = Arc::new(SqliteDatabase::connect(&config).unwrap());
    let state = AppState {
        database,
        mode: RunMode::Testing,
    };
    assert!(routes::healthz(State(state)).await.is_err());
}

#[tokio::test]
async fn index_reports_the_run_mode() {
    let database = in_memory_database().await;
    let state = AppState {
        database,
        mode: RunMode::Production,
    };
    let info = routes::index(State(state)).await;
    assert_eq!(info.0.mode(), "production");
}
