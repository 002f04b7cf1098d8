//! Interactive pipeline bridge.
//!
//! The pipeline runs in `--interactive` mode: one control-input line on its
//! stdin yields exactly one record line on its stdout. A single exclusive
//! lock guards the write-flush-read round trip (and the broadcast that
//! follows it), so concurrent submitters cannot interleave exchanges and the
//! pipeline's strict half-duplex contract holds.

use std::sync::Arc;
use std::sync::OnceLock;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::broadcast::ClientRegistry;
use crate::error::{Error, Result};
use crate::pipeline::{PipelineProcess, PipelineSpec};
use crate::record::{ControlInput, TelemetryRecord};
use crate::source::{SourceState, StateCell};

/// The pipeline's stdio pair, locked as one unit per exchange.
#[derive(Debug)]
struct ExchangeIo {
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

/// Sample source that exchanges one record per control input.
///
/// Unlike the pull sources, the interactive bridge is driven by connected
/// clients: each well-formed control input is forwarded to the pipeline and
/// the response is broadcast to every client in the shared registry.
#[derive(Debug)]
pub struct InteractiveBridge {
    spec: PipelineSpec,
    state: StateCell,
    registry: Arc<ClientRegistry>,
    process: OnceLock<PipelineProcess>,
    io: Mutex<Option<ExchangeIo>>,
}

impl InteractiveBridge {
    /// Create a bridge bound to the given client registry (not yet started).
    #[must_use]
    pub fn new(spec: PipelineSpec, registry: Arc<ClientRegistry>) -> Self {
        Self {
            spec,
            state: StateCell::new(),
            registry,
            process: OnceLock::new(),
            io: Mutex::new(None),
        }
    }

    /// The name of this source (for logging).
    #[must_use]
    pub fn name(&self) -> &'static str {
        "interactive"
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SourceState {
        self.state.get()
    }

    /// The registry every connected streaming client joins.
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Launch the pipeline in interactive mode.
    ///
    /// # Errors
    ///
    /// Returns a startup error if the executable or calibration config is
    /// missing, or if the spawn fails.
    pub async fn start(&self) -> Result<()> {
        if !self.state.advance(SourceState::Running) {
            debug!(state = %self.state.get(), "interactive bridge not restarted");
            return Ok(());
        }

        let (process, io) = PipelineProcess::spawn(&self.spec)?;
        let stdin = io
            .stdin
            .ok_or_else(|| Error::internal("interactive pipeline stdin was not piped"))?;
        *self.io.lock().await = Some(ExchangeIo {
            stdin,
            lines: BufReader::new(io.stdout).lines(),
        });
        let _ = self.process.set(process);
        Ok(())
    }

    /// One request/response round trip with the pipeline.
    ///
    /// Exchanges are serialized: at most one is in flight at a time. A broken
    /// or closed pipe yields `None` rather than an error; the submitting
    /// client simply sees no update for that request.
    pub async fn exchange(&self, input: &ControlInput) -> Option<TelemetryRecord> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut()?;
        Self::round_trip(io, input).await
    }

    /// Exchange, then broadcast the response to every registered client.
    ///
    /// The exchange lock is held across the broadcast, so responses reach
    /// clients in exchange order.
    pub async fn exchange_and_broadcast(&self, input: &ControlInput) -> Option<TelemetryRecord> {
        let mut guard = self.io.lock().await;
        let io = guard.as_mut()?;
        let record = Self::round_trip(io, input).await?;
        self.registry.broadcast(&record).await;
        Some(record)
    }

    async fn round_trip(io: &mut ExchangeIo, input: &ControlInput) -> Option<TelemetryRecord> {
        let mut line = input.to_line();
        line.push('\n');

        if let Err(error) = io.stdin.write_all(line.as_bytes()).await {
            warn!(%error, "pipeline stdin write failed");
            return None;
        }
        if let Err(error) = io.stdin.flush().await {
            warn!(%error, "pipeline stdin flush failed");
            return None;
        }

        match io.lines.next_line().await {
            Ok(Some(response)) => {
                let record = TelemetryRecord::parse_line(&response);
                if record.is_none() {
                    debug!(%response, "dropping non-record pipeline response");
                }
                record
            }
            Ok(None) => {
                warn!("pipeline closed its stdout mid-session");
                None
            }
            Err(error) => {
                warn!(%error, "pipeline stdout read failed");
                None
            }
        }
    }

    /// Shut the bridge down: close the pipeline's stdin, terminate it, wait.
    pub async fn stop(&self) {
        self.state.advance(SourceState::Stopped);
        // Dropping the io pair closes stdin so the pipeline can exit on its own.
        self.io.lock().await.take();
        if let Some(process) = self.process.get() {
            process.stop().await;
        }
    }
}
