//! Error types for flightbridge.
//!
//! Startup failures (missing pipeline executable, missing input files, bad
//! configuration, port binds) are fatal and reported before any server is
//! running. Everything that happens per-connection or per-exchange is handled
//! locally and only surfaces as log output.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for flightbridge operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Startup errors ===
    /// The native pipeline executable does not exist.
    #[error("pipeline executable not found: {path} (build it with `pio run -e native-replay`)")]
    ProcessNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The replay input file does not exist.
    #[error("replay input not found: {path}")]
    InputNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// A calibration config was given but does not exist.
    #[error("calibration config not found: {path}")]
    CalibrationNotFound {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The page-fragment directory does not exist.
    #[error("asset root not found: {path}")]
    AssetRootMissing {
        /// Path that was checked.
        path: PathBuf,
    },

    /// A server socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that was requested.
        addr: SocketAddr,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Configuration errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Pipeline errors ===
    /// The pipeline process could not be spawned.
    #[error("failed to spawn pipeline {path}: {source}")]
    PipelineSpawn {
        /// The executable that was invoked.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Page assembly errors ===
    /// A page fragment file is missing from the asset root.
    #[error("page fragment missing: {path}")]
    FragmentMissing {
        /// The fragment file that could not be read.
        path: PathBuf,
    },

    // === I/O / serialization ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for flightbridge operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a missing-pipeline-executable error.
    #[must_use]
    pub fn process_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ProcessNotFound { path: path.into() }
    }

    /// Create a missing-replay-input error.
    #[must_use]
    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Create a missing-calibration-config error.
    #[must_use]
    pub fn calibration_not_found(path: impl Into<PathBuf>) -> Self {
        Self::CalibrationNotFound { path: path.into() }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check whether this error is a fail-fast startup condition.
    #[must_use]
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            Self::ProcessNotFound { .. }
                | Self::InputNotFound { .. }
                | Self::CalibrationNotFound { .. }
                | Self::AssetRootMissing { .. }
                | Self::Bind { .. }
                | Self::PipelineSpawn { .. }
                | Self::ConfigLoad(_)
                | Self::ConfigValidation { .. }
        )
    }
}
