//! Configuration management for flightbridge.
//!
//! Configuration is loaded with figment from a TOML file plus environment
//! variables, then overridden by CLI flags at the binary boundary. Only the
//! orchestrator reads configuration; every other component receives plain
//! values.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "flightbridge";

/// Default HTTP page-server port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default WebSocket streaming port.
pub const DEFAULT_STREAM_PORT: u16 = 8081;

/// Default location of the native pipeline executable.
const DEFAULT_PIPELINE_EXECUTABLE: &str = ".pio/build/native-replay/program";

/// Default location of the page fragments.
const DEFAULT_ASSET_ROOT: &str = "src/Web";

/// Application configuration.
///
/// Loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FLIGHTBRIDGE_`, `__` separating
///    nested keys)
/// 2. TOML config file at `~/.config/flightbridge/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server ports.
    pub server: ServerConfig,
    /// Native pipeline configuration.
    pub pipeline: PipelineConfig,
    /// Page asset configuration.
    pub assets: AssetConfig,
}

/// Server-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the HTTP page server listens on.
    pub http_port: u16,
    /// Port the WebSocket streaming server listens on.
    pub stream_port: u16,
}

/// Native pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the native pipeline executable.
    pub executable: PathBuf,
    /// Optional calibration config forwarded to the pipeline.
    pub calibration: Option<PathBuf>,
}

/// Page asset configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Directory holding the page fragments.
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            stream_port: DEFAULT_STREAM_PORT,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from(DEFAULT_PIPELINE_EXECUTABLE),
            calibration: None,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ASSET_ROOT),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("FLIGHTBRIDGE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.http_port == 0 {
            return Err(Error::ConfigValidation {
                message: "server.http_port must be greater than 0".to_string(),
            });
        }
        if self.server.stream_port == 0 {
            return Err(Error::ConfigValidation {
                message: "server.stream_port must be greater than 0".to_string(),
            });
        }
        if self.server.http_port == self.server.stream_port {
            return Err(Error::ConfigValidation {
                message: format!(
                    "page and streaming servers cannot share port {}",
                    self.server.http_port
                ),
            });
        }
        Ok(())
    }
}
