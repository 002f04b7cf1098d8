//! Relay orchestration.
//!
//! The orchestrator resolves exactly one data-source mode, validates every
//! file the mode needs before any socket is bound, then runs the page server
//! and the streaming server concurrently until interrupted. Stopping the
//! source (and with it any owned pipeline process) happens on every exit
//! path.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::assets::PageAssets;
use crate::broadcast::ClientRegistry;
use crate::config::Config;
use crate::error::Result;
use crate::pages::{PageContext, PageServer};
use crate::pipeline::PipelineSpec;
use crate::source::{InteractiveBridge, ReplayBridge, Source, SyntheticSource};
use crate::stream::StreamServer;

/// The selected data-source mode for one relay run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Synthetic flight data, no pipeline.
    Simulate,
    /// Replay the given CSV through the pipeline.
    Replay(PathBuf),
    /// Let connected clients drive the pipeline.
    Interactive,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simulate => write!(f, "simulate"),
            Self::Replay(csv) => write!(f, "replay {}", csv.display()),
            Self::Interactive => write!(f, "interactive"),
        }
    }
}

/// One configured relay run.
#[derive(Debug)]
pub struct Relay {
    http_port: u16,
    stream_port: u16,
    source: Arc<Source>,
    context: Arc<PageContext>,
}

impl Relay {
    /// Resolve configuration and mode into a runnable relay.
    ///
    /// Validates the asset root and, for the pipeline-backed modes, the
    /// executable and every input file — all before any network setup.
    ///
    /// # Errors
    ///
    /// Returns a descriptive startup error for the first missing resource.
    pub fn new(config: &Config, mode: Mode) -> Result<Self> {
        let assets = PageAssets::new(&config.assets.root)?;

        let executable = &config.pipeline.executable;
        let calibration = config.pipeline.calibration.clone();
        let source = match mode {
            Mode::Simulate => Source::Synthetic(SyntheticSource::new()),
            Mode::Replay(csv) => {
                let spec = PipelineSpec::replay(executable, calibration, csv);
                spec.validate()?;
                Source::Replay(ReplayBridge::new(spec))
            }
            Mode::Interactive => {
                let spec = PipelineSpec::interactive(executable, calibration);
                spec.validate()?;
                let registry = Arc::new(ClientRegistry::new());
                Source::Interactive(InteractiveBridge::new(spec, registry))
            }
        };

        Ok(Self {
            http_port: config.server.http_port,
            stream_port: config.server.stream_port,
            source: Arc::new(source),
            context: Arc::new(PageContext {
                assets,
                stream_port: config.server.stream_port,
            }),
        })
    }

    /// The active source (exposed for integration tests).
    #[must_use]
    pub fn source(&self) -> &Arc<Source> {
        &self.source
    }

    /// Start the source and serve both channels until interrupted.
    ///
    /// # Errors
    ///
    /// Returns the source's startup error, a bind error, or whichever server
    /// error ended the run. The source is stopped before returning,
    /// regardless of how the run ended.
    pub async fn run(self) -> Result<()> {
        self.source.start().await?;
        info!(source = self.source.name(), "data source started");
        info!(
            "live view at http://localhost:{}/live, calibration at /calwiz",
            self.http_port
        );
        if self.source.as_interactive().is_some() {
            info!("control panel at http://localhost:{}/control", self.http_port);
        }

        let pages = PageServer::new(self.http_port, self.context.clone());
        let stream = StreamServer::new(self.stream_port, self.source.clone());

        let outcome = tokio::select! {
            result = pages.run() => result,
            result = stream.run() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                Ok(())
            }
        };

        self.source.stop().await;
        outcome
    }
}
