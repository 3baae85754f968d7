use std::{path::PathBuf, sync::RwLock};

use di::{Ref, ServiceCollection, ServiceProvider, singleton_as_self};
use typed_builder::TypedBuilder;

use crate::{
    app::{AppFactory, Application},
    config::{Config, RunMode, ServerConfig},
    error::LaunchError,
    log::{AppenderGuard, LoggingConfig},
    module::Module,
};

/// The launcher drives the whole startup sequence: resolve the run mode,
/// load configuration, initialize logging, build the application through a
/// factory, create the database schema, and serve.
///
/// Each deployment binary owns one launcher. Library consumers stop after
/// [`Launcher::build`]; only [`Launcher::run`], called from a binary's
/// `main`, performs schema initialization and binds the listener.
///
/// # Example
/// ```no_run
/// use atrium_bootstrap::{Launcher, RunMode};
///
/// let mut launcher = Launcher::builder()
///     .default_mode(RunMode::Development)
///     .build();
/// launcher.initialize().unwrap();
/// ```
#[derive(TypedBuilder)]
pub struct Launcher {
    /// Run mode used when `APP_ENV` is absent. Deployment variants differ
    /// only in this default.
    default_mode: RunMode,
    /// Whether to install the global tracing subscriber.
    #[builder(default = true)]
    initialize_logging: bool,
    /// Whether to log the flattened effective configuration after startup.
    #[builder(default = false)]
    show_config: bool,

    /// Prefix of environment variables that override config file values.
    #[builder(default = Some("ATRIUM".to_string()))]
    env_config_prefix: Option<String>,
    /// Separator splitting such variables into nested config keys.
    #[builder(default = "__".to_string())]
    env_config_split: String,
    /// Folder holding `config.toml`. Defaults to the standard lookup
    /// (`ATRIUM_CONFIG`, then `etc/` next to the manifest or executable).
    #[builder(default = None)]
    config_dir: Option<PathBuf>,

    /// Modules contributing application services to the collection.
    #[builder(default = vec![])]
    modules: Vec<Box<dyn Module>>,

    #[builder(default = RwLock::new(ServiceCollection::new()), setter(skip))]
    service_collection: RwLock<ServiceCollection>,

    #[builder(default = None, setter(skip))]
    mode: Option<RunMode>,
    #[builder(default = None, setter(skip))]
    config: Option<Ref<Config>>,
    #[builder(default = None, setter(skip))]
    server: Option<ServerConfig>,
    #[builder(default = None, setter(skip))]
    logging_config: Option<Ref<LoggingConfig>>,
    #[builder(default = None, setter(skip))]
    appender_guard: Option<Ref<AppenderGuard>>,
}

impl Launcher {
    /// Resolves environment and configuration. Must run before
    /// [`Launcher::build`]; configuration is always read before the
    /// application is constructed.
    pub fn initialize(&mut self) -> Result<(), LaunchError> {
        let mode = RunMode::from_env(self.default_mode)?;
        self.mode = Some(mode);
        self.initialize_config()?;
        self.initialize_logging(mode)?;
        if self.show_config {
            self.show_config()?;
        }
        tracing::info!(%mode, "launcher initialized");
        Ok(())
    }

    fn initialize_config(&mut self) -> Result<(), LaunchError> {
        let prefix = self.env_config_prefix.as_deref();
        let split = self.env_config_split.as_str();
        let config = match &self.config_dir {
            Some(dir) => Config::from_folder(dir, prefix, split),
            None => Config::load(prefix, split),
        }
        .map_err(LaunchError::ConfigLoadError)?;

        self.server = Some(ServerConfig::resolve(&config)?);
        self.config = Some(Ref::new(config));
        Ok(())
    }

    fn initialize_logging(&mut self, mode: RunMode) -> Result<(), LaunchError> {
        if !self.initialize_logging {
            return Ok(());
        }
        let Some(config) = &self.config else {
            return Err(LaunchError::InvalidStateError(
                "configuration must be loaded before logging",
            ));
        };
        let logging = LoggingConfig::from_config(config.as_ref())
            .map_err(LaunchError::ConfigLoadError)?;
        let guard = crate::log::init(&logging, mode)?;
        self.logging_config = Some(Ref::new(logging));
        self.appender_guard = Some(Ref::new(guard));
        Ok(())
    }

    fn show_config(&self) -> Result<(), LaunchError> {
        if let Some(config) = &self.config {
            let properties = config.to_properties().map_err(LaunchError::ConfigShowError)?;
            for (key, value) in properties.iter() {
                tracing::info!("load config {key}={value}");
            }
        }
        Ok(())
    }

    fn configure_services(&self) -> Result<ServiceProvider, LaunchError> {
        let base = BaseModule {
            config: self.config.clone(),
            logging_config: self.logging_config.clone(),
            appender_guard: self.appender_guard.clone(),
        };
        base.configure(&self.service_collection);
        for module in &self.modules {
            module.configure(&self.service_collection);
        }
        self.service_collection
            .write()
            .map_err(|_| {
                LaunchError::ServiceRegistryError("service collection lock poisoned".to_string())
            })?
            .build_provider()
            .map_err(|e| LaunchError::ServiceRegistryError(e.to_string()))
    }

    /// Calls the factory with the resolved run mode and the built service
    /// provider, returning the application handle. Building performs no
    /// schema initialization and no serving.
    pub fn build(&self, factory: &dyn AppFactory) -> Result<Application, LaunchError> {
        let Some(mode) = self.mode else {
            return Err(LaunchError::InvalidStateError(
                "initialize() must run before build()",
            ));
        };
        let provider = self.configure_services()?;
        factory
            .create(mode, &provider)
            .map_err(LaunchError::FactoryError)
    }

    /// Creates the application's database schema inside a scoped context.
    /// The context is released on every exit path. Applications without a
    /// database skip this step.
    pub async fn initialize_schema(&self, app: &Application) -> Result<(), LaunchError> {
        let Some(database) = app.database() else {
            tracing::debug!("application has no database, skipping schema initialization");
            return Ok(());
        };
        let ctx = app.enter();
        database
            .create_all(&ctx)
            .await
            .map_err(LaunchError::SchemaInitError)
    }

    /// Binds the configured listener and blocks until shutdown. The debug
    /// flag is on exactly when the run mode is development.
    pub async fn serve(&self, app: Application) -> Result<(), LaunchError> {
        let Some(server) = self.server.clone() else {
            return Err(LaunchError::InvalidStateError(
                "initialize() must run before serve()",
            ));
        };
        let debug = app.mode().debug();
        app.serve(server.host(), server.port(), debug).await
    }

    /// Full entry-point sequence for deployment binaries. Library consumers
    /// building an application for embedding should call
    /// [`Launcher::initialize`] and [`Launcher::build`] instead.
    pub async fn run(mut self, factory: &dyn AppFactory) -> Result<(), LaunchError> {
        self.initialize()?;
        let app = self.build(factory)?;
        self.initialize_schema(&app).await?;
        self.serve(app).await
    }
}

struct BaseModule {
    config: Option<Ref<Config>>,
    logging_config: Option<Ref<LoggingConfig>>,
    appender_guard: Option<Ref<AppenderGuard>>,
}

impl Module for BaseModule {
    fn configure(&self, binder: &RwLock<ServiceCollection>) {
        register_service(&self.config, binder);
        register_service(&self.logging_config, binder);
        register_service(&self.appender_guard, binder);
    }
}

fn register_service<T: Send + Sync + 'static>(
    service: &Option<Ref<T>>,
    binder: &RwLock<ServiceCollection>,
) {
    let Some(service) = service.clone() else {
        return;
    };
    if let Ok(mut collection) = binder.write() {
        collection.add(singleton_as_self::<T>().from(move |_| service.clone()));
    }
}
