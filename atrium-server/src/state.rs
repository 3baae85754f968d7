use std::sync::Arc;

use atrium_bootstrap::RunMode;

use crate::db::SqliteDatabase;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<SqliteDatabase>,
    pub mode: RunMode,
}
