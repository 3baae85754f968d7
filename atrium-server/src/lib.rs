//! The atrium web application: a small HTTP service with a SQLite-backed
//! data layer, assembled by [`AtriumFactory`] and started through the
//! bootstrap launcher.
//!
//! Importing this crate only gives access to the factory and its parts; the
//! deployment binaries under `src/bin/` are the only places that create the
//! schema and bind the listener.

pub mod db;
pub mod factory;
pub mod routes;
pub mod state;

pub use factory::AtriumFactory;

use atrium_bootstrap::{LaunchError, Launcher, RunMode};

/// Entry point used by the deployment binaries. The variants differ only in
/// the run mode used when `APP_ENV` is absent.
pub async fn run(default_mode: RunMode) -> Result<(), LaunchError> {
    Launcher::builder()
        .default_mode(default_mode)
        .initialize_logging(true)
        .show_config(true)
        .modules(vec![])
        .build()
        .run(&AtriumFactory)
        .await
}
