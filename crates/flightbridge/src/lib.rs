//! `flightbridge` - development-time telemetry relay for the AoA web UI
//!
//! This library bridges one of three interchangeable flight-data sources to
//! WebSocket clients while serving the visualization pages over HTTP: a
//! synthetic 50 Hz generator, a CSV replay through the native numerical
//! pipeline, or an interactive mode where connected control panels drive the
//! pipeline's inputs and every client sees its outputs.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod assets;
pub mod broadcast;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pages;
pub mod pipeline;
pub mod record;
pub mod relay;
pub mod source;
pub mod stream;

pub use broadcast::ClientRegistry;
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use record::{ControlInput, TelemetryRecord};
pub use relay::{Mode, Relay};
pub use source::{SampleSource, Source, SourceState};
