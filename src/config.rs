//! Top-level configuration
//!
//! One TOML file, every key optional. Looked up from the first command line
//! argument, then `CUL2MQTT_CONFIG`, then `<config dir>/cul2mqtt/config.toml`.

use crate::bridge::BridgeSettings;
use crate::cul::config::CulConfig;
use crate::mqtt::config::MqttConfig;
use crate::telemetry::TopicMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, Level};

pub const CONFIG_ENV: &str = "CUL2MQTT_CONFIG";
const CONFIG_DIR: &str = "cul2mqtt";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Topic map {path} is not a JSON object of strings: {source}")]
    TopicMap {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    pub fn level(self) -> Level {
        match self {
            Verbosity::Error => Level::ERROR,
            Verbosity::Warn => Level::WARN,
            Verbosity::Info => Level::INFO,
            Verbosity::Debug => Level::DEBUG,
            Verbosity::Trace => Level::TRACE,
        }
    }

    /// Value for `RUST_LOG` when the environment does not set one.
    pub fn as_filter(self) -> &'static str {
        match self {
            Verbosity::Error => "error",
            Verbosity::Warn => "warn",
            Verbosity::Info => "info",
            Verbosity::Debug => "debug",
            Verbosity::Trace => "trace",
        }
    }
}

/// Where the configuration comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named on the command line or in the environment; must exist
    Explicit(PathBuf),
    /// Per-user default location; may be absent
    Default(PathBuf),
    /// No config directory on this platform
    Builtin,
}

impl ConfigSource {
    pub fn locate(arg: Option<String>, env: Option<String>) -> Self {
        if let Some(path) = arg.or(env).filter(|path| !path.is_empty()) {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
        match dirs::config_dir() {
            Some(mut path) => {
                path.push(CONFIG_DIR);
                path.push(CONFIG_FILE);
                ConfigSource::Default(path)
            }
            None => ConfigSource::Builtin,
        }
    }

    /// Reads the process arguments and environment.
    pub fn from_env() -> Self {
        Self::locate(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok())
    }
}

/// Where a loaded configuration actually came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// Default location had no file
    MissingDefault(PathBuf),
    Builtin,
}

impl ConfigOrigin {
    pub fn is_defaults(&self) -> bool {
        !matches!(self, ConfigOrigin::File(_))
    }
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOrigin::File(path) => write!(f, "loaded from {}", path.display()),
            ConfigOrigin::MissingDefault(path) => {
                write!(f, "{} does not exist, using defaults", path.display())
            }
            ConfigOrigin::Builtin => write!(f, "no configuration directory, using defaults"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Status namespace
    pub name: String,
    /// Command namespace, defaults to `name`
    pub prefix: Option<String>,
    pub verbosity: Verbosity,
    pub map_file: Option<PathBuf>,
    pub drop_telemetry_while_offline: bool,
    pub mqtt: MqttConfig,
    pub cul: CulConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "cul".to_string(),
            prefix: None,
            verbosity: Verbosity::default(),
            map_file: None,
            drop_telemetry_while_offline: false,
            mqtt: MqttConfig::default(),
            cul: CulConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration and reports where it came from.
    ///
    /// Nothing is logged here; the caller logs the origin once logging is set up.
    pub async fn load(source: &ConfigSource) -> Result<(Self, ConfigOrigin), ConfigError> {
        match source {
            ConfigSource::Explicit(path) => {
                Ok((Self::from_file(path).await?, ConfigOrigin::File(path.clone())))
            }
            ConfigSource::Default(path) => {
                let exists = tokio::fs::try_exists(path)
                    .await
                    .map_err(|source| ConfigError::Read {
                        path: path.clone(),
                        source,
                    })?;
                if exists {
                    Ok((Self::from_file(path).await?, ConfigOrigin::File(path.clone())))
                } else {
                    Ok((Self::default(), ConfigOrigin::MissingDefault(path.clone())))
                }
            }
            ConfigSource::Builtin => Ok((Self::default(), ConfigOrigin::Builtin)),
        }
    }

    async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the fragment-to-topic table once; no file means no mappings.
    pub async fn load_topic_map(&self) -> Result<TopicMap, ConfigError> {
        let Some(path) = &self.map_file else {
            debug!("No map file configured");
            return Ok(TopicMap::default());
        };

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
        let entries: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|source| ConfigError::TopicMap {
                path: path.clone(),
                source,
            })?;
        info!("Loaded {} topic mappings from {}", entries.len(), path.display());
        Ok(TopicMap::new(entries))
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            name: self.name.clone(),
            prefix: self.prefix.clone().unwrap_or_else(|| self.name.clone()),
            drop_telemetry_while_offline: self.drop_telemetry_while_offline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cul::config::CulMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn argument_wins_over_environment() {
        assert_eq!(
            ConfigSource::locate(Some("a.toml".into()), Some("b.toml".into())),
            ConfigSource::Explicit(PathBuf::from("a.toml"))
        );
        assert_eq!(
            ConfigSource::locate(None, Some("b.toml".into())),
            ConfigSource::Explicit(PathBuf::from("b.toml"))
        );
        assert!(!matches!(
            ConfigSource::locate(None, None),
            ConfigSource::Explicit(_)
        ));
    }

    #[tokio::test]
    async fn full_file() {
        let file = file_with(
            r#"
            name = "culgw"
            prefix = "home"
            verbosity = "debug"
            drop-telemetry-while-offline = true

            [mqtt]
            url = "mqtt://broker:1884"
            username = "bridge"
            password = "secret"

            [cul]
            serialport = "/dev/ttyUSB1"
            mode = "MORITZ"
            scc = true
            "#,
        );

        let (config, origin) = Config::load(&ConfigSource::Explicit(file.path().to_path_buf()))
            .await
            .expect("valid config");

        assert_eq!(origin, ConfigOrigin::File(file.path().to_path_buf()));
        assert!(!origin.is_defaults());
        assert_eq!(config.verbosity.level(), Level::DEBUG);
        assert_eq!(config.mqtt.credentials(), Some(("bridge", "secret")));
        assert_eq!(config.cul.mode, CulMode::Moritz);
        assert_eq!(config.cul.baudrate, 9600);
        assert_eq!(
            config.bridge_settings(),
            BridgeSettings {
                name: "culgw".to_string(),
                prefix: "home".to_string(),
                drop_telemetry_while_offline: true,
            }
        );
    }

    #[tokio::test]
    async fn prefix_defaults_to_name() {
        let file = file_with("name = \"attic\"\n");
        let (config, _) = Config::load(&ConfigSource::Explicit(file.path().to_path_buf()))
            .await
            .expect("valid config");

        let settings = config.bridge_settings();
        assert_eq!(settings.command_filter(), "attic/set/#");
        assert_eq!(settings.status_topic(), "attic/connected");
    }

    #[tokio::test]
    async fn missing_default_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = ConfigSource::Default(dir.path().join("config.toml"));

        let (config, origin) = Config::load(&source).await.expect("defaults");
        assert_eq!(config, Config::default());
        assert!(origin.is_defaults());
        assert_eq!(
            origin.to_string(),
            format!("{} does not exist, using defaults", dir.path().join("config.toml").display())
        );

        let (_, origin) = Config::load(&ConfigSource::Builtin).await.expect("defaults");
        assert_eq!(origin, ConfigOrigin::Builtin);
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = ConfigSource::Explicit(dir.path().join("nope.toml"));

        assert!(matches!(
            Config::load(&source).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_toml_is_an_error() {
        let file = file_with("name = [\n");
        assert!(matches!(
            Config::load(&ConfigSource::Explicit(file.path().to_path_buf())).await,
            Err(ConfigError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn topic_map_from_json() {
        let map = file_with(r#"{"FS20/123401": "livingroom/lamp"}"#);
        let config = Config {
            map_file: Some(map.path().to_path_buf()),
            ..Config::default()
        };

        let topics = config.load_topic_map().await.expect("valid map");
        assert_eq!(topics.map("FS20/123401"), "livingroom/lamp");
        assert_eq!(topics.map("EM/0105"), "EM/0105");
    }

    #[tokio::test]
    async fn topic_map_must_be_string_object() {
        let map = file_with(r#"["FS20/123401"]"#);
        let config = Config {
            map_file: Some(map.path().to_path_buf()),
            ..Config::default()
        };

        assert!(matches!(
            config.load_topic_map().await,
            Err(ConfigError::TopicMap { .. })
        ));
        assert!(Config::default().load_topic_map().await.expect("no map").is_empty());
    }
}
