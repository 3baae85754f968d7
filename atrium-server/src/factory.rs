use std::sync::Arc;

use anyhow::Context as _;
use atrium_bootstrap::{AppFactory, Application, Config, RunMode};
use di::ServiceProvider;
use tower_http::trace::TraceLayer;

use crate::{
    db::{DatabaseConfig, SqliteDatabase},
    routes,
    state::AppState,
};

/// Application factory for the atrium service.
///
/// Resolves the database settings from the launcher's configuration,
/// assembles the router, and hands back the application handle. In
/// development the router additionally traces every request.
pub struct AtriumFactory;

impl AppFactory for AtriumFactory {
    fn create(&self, mode: RunMode, services: &ServiceProvider) -> anyhow::Result<Application> {
        let config = services
            .get::<Config>()
            .context("configuration service is not registered")?;
        let db_config: DatabaseConfig = config.get()?;
        let database = Arc::new(SqliteDatabase::connect(&db_config)?);

        let state = AppState {
            database: database.clone(),
            mode,
        };
        let mut router = routes::router(state);
        if mode.debug() {
            router = router.layer(TraceLayer::new_for_http());
        }

        Ok(Application::new(mode, router).with_database(database))
    }
}
