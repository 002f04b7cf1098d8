//! CSV replay through the native pipeline.
//!
//! `start` launches the pipeline with the recorded flight log; every
//! `next_record` pulls one line from its stdout. End of stream is the
//! Finished state, not an error. Lines that are not record lines (status
//! text the pipeline prints to stdout) are logged and dropped.

use std::sync::OnceLock;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::ChildStdout;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::pipeline::{PipelineProcess, PipelineSpec};
use crate::record::TelemetryRecord;
use crate::source::{SampleSource, SourceState, StateCell};

/// Sample source replaying a flight log through the pipeline.
#[derive(Debug)]
pub struct ReplayBridge {
    spec: PipelineSpec,
    state: StateCell,
    process: OnceLock<PipelineProcess>,
    reader: Mutex<Option<Lines<BufReader<ChildStdout>>>>,
}

impl ReplayBridge {
    /// Create a bridge for the given pipeline spec (not yet started).
    #[must_use]
    pub fn new(spec: PipelineSpec) -> Self {
        Self {
            spec,
            state: StateCell::new(),
            process: OnceLock::new(),
            reader: Mutex::new(None),
        }
    }

    /// The spec this bridge was built from.
    #[must_use]
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }
}

#[async_trait::async_trait]
impl SampleSource for ReplayBridge {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    async fn start(&self) -> Result<()> {
        if !self.state.advance(SourceState::Running) {
            debug!(state = %self.state.get(), "replay bridge not restarted");
            return Ok(());
        }

        let (process, io) = PipelineProcess::spawn(&self.spec)?;
        *self.reader.lock().await = Some(BufReader::new(io.stdout).lines());
        let _ = self.process.set(process);
        Ok(())
    }

    async fn next_record(&self) -> Option<TelemetryRecord> {
        loop {
            if self.state.get() != SourceState::Running {
                return None;
            }

            let mut guard = self.reader.lock().await;
            let lines = guard.as_mut()?;
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(record) = TelemetryRecord::parse_line(&line) {
                        return Some(record);
                    }
                    debug!(%line, "dropping non-record pipeline output");
                }
                Ok(None) => {
                    drop(guard);
                    if self.state.advance(SourceState::Finished) {
                        info!("replay stream exhausted");
                    }
                    return None;
                }
                Err(error) => {
                    drop(guard);
                    warn!(%error, "replay read failed, treating stream as exhausted");
                    self.state.advance(SourceState::Finished);
                    return None;
                }
            }
        }
    }

    async fn stop(&self) {
        self.state.advance(SourceState::Stopped);
        if let Some(process) = self.process.get() {
            process.stop().await;
        }
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("program");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "t,Pfwd,P45\n").unwrap();
        path
    }

    /// Emits three records, a status line, and stderr noise.
    const REPLAY_BODY: &str = r#"
echo "Replaying flight log" >&2
echo '{"AOA":4.10,"IAS":101.0}'
echo 'CSV parsed: 3 rows'
echo '{"AOA":4.20,"IAS":102.0}'
echo '{"AOA":4.30,"IAS":103.0}'
echo "done" >&2
"#;

    #[tokio::test]
    async fn test_replay_produces_each_record_then_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), REPLAY_BODY);
        let csv = touch(dir.path(), "flight.csv");

        let bridge = ReplayBridge::new(PipelineSpec::replay(exe, None, csv));
        assert_eq!(bridge.state(), SourceState::NotStarted);
        bridge.start().await.unwrap();
        assert_eq!(bridge.state(), SourceState::Running);

        let mut aoas = Vec::new();
        while let Some(record) = bridge.next_record().await {
            aoas.push(record.number("AOA").unwrap());
        }

        // The status line was dropped; the three records arrived in order.
        assert_eq!(aoas, vec![4.10, 4.20, 4.30]);
        assert_eq!(bridge.state(), SourceState::Finished);

        // Exhausted is not an error: later pulls just return no data.
        assert!(bridge.next_record().await.is_none());

        bridge.stop().await;
        assert_eq!(bridge.state(), SourceState::Finished);
    }

    #[tokio::test]
    async fn test_missing_executable_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let csv = touch(dir.path(), "flight.csv");
        let bridge = ReplayBridge::new(PipelineSpec::replay(
            dir.path().join("missing-program"),
            None,
            csv,
        ));
        assert!(matches!(
            bridge.start().await,
            Err(crate::error::Error::ProcessNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_csv_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "true");
        let bridge = ReplayBridge::new(PipelineSpec::replay(
            exe,
            None,
            dir.path().join("missing.csv"),
        ));
        assert!(matches!(
            bridge.start().await,
            Err(crate::error::Error::InputNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stop_mid_replay_tears_down_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(
            dir.path(),
            "echo '{\"AOA\":1.0}'\nsleep 30\necho '{\"AOA\":2.0}'",
        );
        let csv = touch(dir.path(), "flight.csv");

        let bridge = ReplayBridge::new(PipelineSpec::replay(exe, None, csv));
        bridge.start().await.unwrap();
        assert!(bridge.next_record().await.is_some());

        bridge.stop().await;
        assert_eq!(bridge.state(), SourceState::Stopped);
        assert!(bridge.next_record().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_without_start_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let exe = script(dir.path(), "true");
        let csv = touch(dir.path(), "flight.csv");
        let bridge = ReplayBridge::new(PipelineSpec::replay(exe, None, csv));

        bridge.stop().await;
        assert_eq!(bridge.state(), SourceState::Stopped);
    }
}
