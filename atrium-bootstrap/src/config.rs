use std::{
    collections::{BTreeMap, HashMap},
    env, fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::LazyLock,
};

use config::{ConfigError, File, ValueKind};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::LaunchError;

static DEFAULT_CONFIG_FOLDER: LazyLock<PathBuf> = LazyLock::new(|| {
    // explicit override first, then the manifest folder under `cargo run`,
    // then a folder next to the executable
    if let Ok(dir) = env::var("ATRIUM_CONFIG") {
        return PathBuf::from(dir);
    }
    let mut root = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    root.push("etc");
    root
});

/// Configuration profile selector.
///
/// Resolved once at startup from `APP_ENV`; each deployment binary supplies
/// its own default. The selected mode is handed to the application factory
/// and decides the debug flag.
#[derive(Debug, Copy, Clone, Serialize, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Testing,
    Production,
}

impl RunMode {
    pub const ENV_VAR: &'static str = "APP_ENV";

    /// Reads the mode selector from the environment, falling back to the
    /// deployment variant's default when the variable is absent.
    pub fn from_env(default: RunMode) -> Result<RunMode, LaunchError> {
        match env::var(Self::ENV_VAR) {
            Ok(raw) => raw.parse().map_err(|_| {
                LaunchError::InvalidConfigValueError(format!("{}={raw}", Self::ENV_VAR))
            }),
            Err(_) => Ok(default),
        }
    }

    /// Debug rendering and verbose logging are enabled in development only.
    pub fn debug(self) -> bool {
        matches!(self, RunMode::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Testing => "testing",
            RunMode::Production => "production",
        }
    }
}

impl<'de> Deserialize<'de> for RunMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        const VARIANTS: [&str; 3] = ["development", "testing", "production"];

        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| <D::Error as serde::de::Error>::unknown_variant(&s, &VARIANTS))
    }
}

#[non_exhaustive]
#[derive(Debug)]
pub struct ParseRunModeError;

impl FromStr for RunMode {
    type Err = ParseRunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            s if s.eq_ignore_ascii_case("development") => Ok(RunMode::Development),
            s if s.eq_ignore_ascii_case("testing") => Ok(RunMode::Testing),
            s if s.eq_ignore_ascii_case("production") => Ok(RunMode::Production),
            _ => Err(ParseRunModeError),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Layered application configuration.
///
/// Loaded from `config.toml` in the configuration folder, with environment
/// variables layered on top. The folder defaults to `etc/` next to the
/// manifest (or the executable) and can be pointed elsewhere with
/// `ATRIUM_CONFIG`.
#[derive(Clone)]
pub struct Config {
    inner: config::Config,
}

impl Config {
    pub fn new(inner: config::Config) -> Self {
        Self { inner }
    }

    pub fn load(
        env_config_prefix: Option<&str>,
        env_config_split: &str,
    ) -> Result<Self, ConfigError> {
        Self::from_folder(
            DEFAULT_CONFIG_FOLDER.as_path(),
            env_config_prefix,
            env_config_split,
        )
    }

    pub fn from_folder(
        path: &Path,
        env_config_prefix: Option<&str>,
        env_config_split: &str,
    ) -> Result<Self, ConfigError> {
        let cfg = path.join("config.toml");
        let mut builder = config::Config::builder();

        if cfg.exists() {
            builder = builder.add_source(File::from(cfg));
        } else {
            tracing::warn!("not found config `{}`", cfg.display());
        }
        // environment variables override file values
        if let Some(prefix) = env_config_prefix {
            builder = builder
                .add_source(config::Environment::with_prefix(prefix).separator(env_config_split));
        } else {
            builder =
                builder.add_source(config::Environment::default().separator(env_config_split));
        }
        let config = builder.build()?;

        Ok(Self { inner: config })
    }

    /// Deserializes the section named by `T::PREFIX`. A section that is
    /// absent entirely deserializes from an empty table, so sections with
    /// serde defaults fall back to those defaults.
    pub fn get<'de, T>(&self) -> Result<T, ConfigError>
    where
        T: ConfigPrefix + Deserialize<'de>,
    {
        match self.inner.get::<T>(T::PREFIX) {
            Ok(o) => Ok(o),
            Err(e) => {
                let ConfigError::NotFound(_) = &e else {
                    return Err(e);
                };
                let v = config::Value::new(None, ValueKind::Table(Default::default()));

                match T::deserialize(v) {
                    Ok(o) => Ok(o),
                    Err(_) => Err(e),
                }
            }
        }
    }

    pub fn to_properties(&self) -> Result<Properties, ConfigError> {
        Properties::from_config(self)
    }
}

/// Names the configuration section a type deserializes from.
pub trait ConfigPrefix {
    const PREFIX: &'static str;
}

/// Listener settings for the HTTP server.
///
/// `PORT` always wins over the configured port; deployment environments
/// set it straight on the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(deserialize_with = "crate::serde::non_empty")]
    host: String,
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ConfigPrefix for ServerConfig {
    const PREFIX: &'static str = "server";
}

impl ServerConfig {
    pub const PORT_ENV: &'static str = "PORT";

    pub fn resolve(config: &Config) -> Result<Self, LaunchError> {
        let mut server: ServerConfig = config.get().map_err(LaunchError::ConfigLoadError)?;
        if let Ok(raw) = env::var(Self::PORT_ENV) {
            server.port = raw.parse().map_err(|_| {
                LaunchError::InvalidConfigValueError(format!("{}={raw}", Self::PORT_ENV))
            })?;
        }
        Ok(server)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Flattened `key = value` view of the loaded configuration, used when the
/// launcher is asked to log the effective settings.
pub struct Properties {
    properties: BTreeMap<String, String>,
}

impl Properties {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut properties = BTreeMap::new();
        let config_map: HashMap<String, config::Value> = config.inner.clone().try_deserialize()?;
        Self::flatten("", &config_map, &mut properties);
        Ok(Self { properties })
    }

    fn flatten(
        prefix: &str,
        map: &HashMap<String, config::Value>,
        properties: &mut BTreeMap<String, String>,
    ) {
        for (key, value) in map {
            let full_key = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            Self::record(&full_key, value, properties);
        }
    }

    fn record(key: &str, value: &config::Value, properties: &mut BTreeMap<String, String>) {
        match &value.kind {
            ValueKind::Table(nested) => Self::flatten(key, nested, properties),
            ValueKind::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    Self::record(&format!("{key}[{index}]"), item, properties);
                }
            }
            ValueKind::String(s) => {
                properties.insert(key.to_string(), s.clone());
            }
            ValueKind::Nil => {
                properties.insert(key.to_string(), "null".to_string());
            }
            _ => {
                properties.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.properties.iter()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_env;

    #[rstest]
    #[case("development", RunMode::Development)]
    #[case("DEVELOPMENT", RunMode::Development)]
    #[case("Testing", RunMode::Testing)]
    #[case("production", RunMode::Production)]
    fn parses_known_modes(#[case] raw: &str, #[case] expected: RunMode) {
        assert_eq!(raw.parse::<RunMode>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!("staging".parse::<RunMode>().is_err());
    }

    #[rstest]
    #[case(RunMode::Development, true)]
    #[case(RunMode::Testing, false)]
    #[case(RunMode::Production, false)]
    fn debug_only_in_development(#[case] mode: RunMode, #[case] expected: bool) {
        assert_eq!(mode.debug(), expected);
    }

    #[test]
    fn server_config_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.host(), "0.0.0.0");
        assert_eq!(server.port(), 5000);
    }

    #[test]
    fn loads_sections_from_folder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[server]\nhost = \"127.0.0.1\"\nport = 8081\n",
        )
        .unwrap();
        let config = Config::from_folder(dir.path(), Some("ATRIUM"), "__").unwrap();
        let server: ServerConfig = config.get().unwrap();
        assert_eq!(server.host(), "127.0.0.1");
        assert_eq!(server.port(), 8081);
    }

    #[test]
    fn missing_section_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[logging]\n").unwrap();
        let config = Config::from_folder(dir.path(), Some("ATRIUM"), "__").unwrap();
        let server: ServerConfig = config.get().unwrap();
        assert_eq!(server.port(), 5000);
    }

    #[test]
    fn empty_host_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[server]\nhost = \"\"\n").unwrap();
        let config = Config::from_folder(dir.path(), Some("ATRIUM"), "__").unwrap();
        assert!(config.get::<ServerConfig>().is_err());
    }

    #[test]
    fn renders_flattened_properties() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[server]\nhost = \"0.0.0.0\"\nport = 5000\n",
        )
        .unwrap();
        let config = Config::from_folder(dir.path(), Some("ATRIUM"), "__").unwrap();
        let properties = config.to_properties().unwrap();
        let rendered: Vec<String> = properties
            .iter()
            .map(|(k, v)| format!("{k} = {v}"))
            .collect();
        assert!(rendered.contains(&"server.host = 0.0.0.0".to_string()));
        assert!(rendered.contains(&"server.port = 5000".to_string()));
    }

    #[test]
    fn environment_overrides() {
        let _env = test_env::lock();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_folder(dir.path(), Some("ATRIUM"), "__").unwrap();

        unsafe {
            env::remove_var(RunMode::ENV_VAR);
            env::remove_var(ServerConfig::PORT_ENV);
        }
        assert_eq!(
            RunMode::from_env(RunMode::Production).unwrap(),
            RunMode::Production
        );
        assert_eq!(ServerConfig::resolve(&config).unwrap().port(), 5000);

        unsafe {
            env::set_var(RunMode::ENV_VAR, "development");
            env::set_var(ServerConfig::PORT_ENV, "8080");
        }
        assert_eq!(
            RunMode::from_env(RunMode::Production).unwrap(),
            RunMode::Development
        );
        assert_eq!(ServerConfig::resolve(&config).unwrap().port(), 8080);

        unsafe {
            env::set_var(ServerConfig::PORT_ENV, "fifty");
        }
        assert!(matches!(
            ServerConfig::resolve(&config),
            Err(LaunchError::InvalidConfigValueError(_))
        ));

        unsafe {
            env::remove_var(RunMode::ENV_VAR);
            env::remove_var(ServerConfig::PORT_ENV);
        }
    }
}
