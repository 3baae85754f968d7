use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::Router;
use di::ServiceProvider;
use tokio::net::TcpListener;

use crate::{config::RunMode, context::AppContext, error::LaunchError};

/// Builds a configured [`Application`] for the given run mode.
///
/// The factory is the seam between the launcher and the web application
/// proper. Whatever it returns is treated as opaque: the launcher passes
/// the handle to schema initialization and serving without inspecting it.
/// Factory failures propagate unmodified inside
/// [`LaunchError::FactoryError`].
pub trait AppFactory {
    fn create(&self, mode: RunMode, services: &ServiceProvider) -> anyhow::Result<Application>;
}

/// Database collaborator owned by the application.
///
/// Connection lifecycle belongs to the implementor; the launcher only ever
/// invokes schema creation, and only inside a live [`AppContext`].
#[async_trait]
pub trait Database: Send + Sync {
    /// Creates all tables the application needs. Must be idempotent.
    async fn create_all(&self, ctx: &AppContext<'_>) -> anyhow::Result<()>;
}

/// A configured application instance as produced by an [`AppFactory`].
pub struct Application {
    mode: RunMode,
    router: Router,
    database: Option<Arc<dyn Database>>,
    active_contexts: AtomicUsize,
}

impl Application {
    pub fn new(mode: RunMode, router: Router) -> Self {
        Self {
            mode,
            router,
            database: None,
            active_contexts: AtomicUsize::new(0),
        }
    }

    pub fn with_database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn database(&self) -> Option<&Arc<dyn Database>> {
        self.database.as_ref()
    }

    /// Opens a scoped application context. The context is released when the
    /// returned guard drops.
    pub fn enter(&self) -> AppContext<'_> {
        AppContext::new(self)
    }

    pub fn active_contexts(&self) -> usize {
        self.active_contexts.load(Ordering::SeqCst)
    }

    pub(crate) fn context_entered(&self) {
        self.active_contexts.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn context_exited(&self) {
        self.active_contexts.fetch_sub(1, Ordering::SeqCst);
    }

    /// Binds `host:port` and serves requests until SIGINT or SIGTERM.
    ///
    /// The debug flag is cosmetic; request handling is identical, only the
    /// verbosity of what gets logged differs.
    pub async fn serve(self, host: &str, port: u16, debug: bool) -> Result<(), LaunchError> {
        let listener = bind(host, port).await?;
        let addr = listener.local_addr().map_err(LaunchError::ServeError)?;
        // `debug` as a bare field value collides with `tracing::field::debug`,
        // which the macro brings into scope; alias it so the value resolves to
        // the local flag while the logged field stays named `debug`.
        let debug_flag = debug;
        tracing::info!(%addr, mode = %self.mode, debug = debug_flag, "http server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(LaunchError::ServeError)
    }
}

pub async fn bind(host: &str, port: u16) -> Result<TcpListener, LaunchError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|source| LaunchError::BindError { addr, source })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_an_ephemeral_port() {
        let listener = bind("127.0.0.1", 0).await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn bind_reports_the_failing_address() {
        let err = bind("definitely-not-a-host", 0).await.unwrap_err();
        match err {
            LaunchError::BindError { addr, .. } => {
                assert_eq!(addr, "definitely-not-a-host:0");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
