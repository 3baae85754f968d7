use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("unable to load configuration: {0}")]
    ConfigLoadError(#[source] config::ConfigError),
    #[error("invalid configuration value: {0}")]
    InvalidConfigValueError(String),
    #[error("unable to render configuration: {0}")]
    ConfigShowError(#[source] config::ConfigError),
    #[error("unable to create log file: {0}")]
    LogFileCreationError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("unable to initialize tracing subscriber: {0}")]
    TracingSubscriberInitError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("unable to build service provider: {0}")]
    ServiceRegistryError(String),
    #[error("launcher is in an invalid state: {0}")]
    InvalidStateError(&'static str),
    #[error("application factory failed: {0}")]
    FactoryError(#[source] anyhow::Error),
    #[error("schema initialization failed: {0}")]
    SchemaInitError(#[source] anyhow::Error),
    #[error("unable to bind {addr}: {source}")]
    BindError {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("http server failed: {0}")]
    ServeError(#[source] std::io::Error),
}
