//! Bootstrap launcher for the atrium web application.
//!
//! The launcher owns the startup sequence: resolve the run mode and the
//! listener settings from the process environment, load layered
//! configuration, initialize logging, obtain a configured [`Application`]
//! from an [`AppFactory`], optionally create the database schema inside a
//! scoped [`AppContext`], and finally bind the HTTP listener.
//!
//! Importing this crate has no side effects. Schema initialization and
//! serving only happen when a binary drives [`Launcher::run`].

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod context;
pub mod error;
pub mod log;
pub mod module;
pub mod serde;

pub use app::{AppFactory, Application, Database};
pub use bootstrap::Launcher;
pub use config::{Config, ConfigPrefix, RunMode, ServerConfig};
pub use context::AppContext;
pub use error::LaunchError;
pub use module::Module;
