//! Command-line interface for flightbridge.
//!
//! Flags mirror the configuration surface: ports, the optional calibration
//! config, and exactly one of the three data-source modes (simulate is the
//! default when no mode flag is given).

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::logging::Verbosity;
use crate::relay::Mode;

/// flightbridge - telemetry relay for front-end development
///
/// Bridges synthetic, replayed, or interactively driven flight data to the
/// web UI over WebSocket, and serves the visualization pages over HTTP.
#[derive(Debug, Parser)]
#[command(name = "flightbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// HTTP page-server port
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// WebSocket streaming port
    #[arg(short = 'w', long = "ws-port", value_name = "PORT")]
    pub ws_port: Option<u16>,

    /// Calibration config (.cfg) forwarded to the pipeline
    #[arg(short = 'c', long, value_name = "CFG")]
    pub calibration: Option<PathBuf>,

    /// Path to the native pipeline executable
    #[arg(long, value_name = "BIN")]
    pub pipeline: Option<PathBuf>,

    /// Directory containing the page fragments
    #[arg(long, value_name = "DIR")]
    pub assets: Option<PathBuf>,

    /// Replay a CSV flight log through the native pipeline
    #[arg(short = 'r', long, value_name = "CSV", group = "mode")]
    pub replay: Option<PathBuf>,

    /// Generate synthetic flight data (default)
    #[arg(short = 's', long, group = "mode")]
    pub simulate: bool,

    /// Drive the pipeline interactively from the control panel
    #[arg(short = 'i', long, group = "mode")]
    pub interactive: bool,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Resolve the selected data-source mode.
    ///
    /// The three mode flags are mutually exclusive (enforced by clap);
    /// with none given the relay simulates.
    #[must_use]
    pub fn mode(&self) -> Mode {
        if let Some(csv) = &self.replay {
            Mode::Replay(csv.clone())
        } else if self.interactive {
            Mode::Interactive
        } else {
            Mode::Simulate
        }
    }

    /// Apply CLI overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.http_port = port;
        }
        if let Some(port) = self.ws_port {
            config.server.stream_port = port;
        }
        if let Some(cfg) = &self.calibration {
            config.pipeline.calibration = Some(cfg.clone());
        }
        if let Some(bin) = &self.pipeline {
            config.pipeline.executable = bin.clone();
        }
        if let Some(dir) = &self.assets {
            config.assets.root = dir.clone();
        }
    }
}
