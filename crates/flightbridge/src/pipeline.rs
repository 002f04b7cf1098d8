//! External process bridge for the native numerical pipeline.
//!
//! The pipeline is an opaque, separately built program that consumes
//! line-delimited JSON (or a CSV file) and produces line-delimited JSON.
//! This module owns the process spawn, the argument construction, and the
//! three standard streams. Standard error is always drained on its own task
//! for the lifetime of the process, independent of stdout consumption, so a
//! verbose pipeline cannot deadlock on a full stderr buffer.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Log target for diagnostic lines drained from the pipeline's stderr.
pub const PIPELINE_LOG_TARGET: &str = "pipeline";

/// How the pipeline process consumes its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineMode {
    /// Replay the given CSV flight log, emitting records until exhausted.
    Replay(PathBuf),
    /// Read one control-input line per record from stdin.
    Interactive,
}

/// Everything needed to launch one pipeline process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Path to the pipeline executable.
    pub executable: PathBuf,
    /// Optional calibration config passed as `--config <path>`.
    pub calibration: Option<PathBuf>,
    /// Input mode.
    pub mode: PipelineMode,
}

impl PipelineSpec {
    /// Spec for a CSV replay run.
    #[must_use]
    pub fn replay(
        executable: impl Into<PathBuf>,
        calibration: Option<PathBuf>,
        csv: impl Into<PathBuf>,
    ) -> Self {
        Self {
            executable: executable.into(),
            calibration,
            mode: PipelineMode::Replay(csv.into()),
        }
    }

    /// Spec for an interactive run.
    #[must_use]
    pub fn interactive(executable: impl Into<PathBuf>, calibration: Option<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            calibration,
            mode: PipelineMode::Interactive,
        }
    }

    /// Check that every file the spec references exists.
    ///
    /// Called before any network setup so a misconfigured relay fails fast.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProcessNotFound`], [`Error::CalibrationNotFound`], or
    /// [`Error::InputNotFound`] for the first missing file.
    pub fn validate(&self) -> Result<()> {
        if !self.executable.is_file() {
            return Err(Error::process_not_found(&self.executable));
        }
        if let Some(cfg) = &self.calibration {
            if !cfg.is_file() {
                return Err(Error::calibration_not_found(cfg));
            }
        }
        if let PipelineMode::Replay(csv) = &self.mode {
            if !csv.is_file() {
                return Err(Error::input_not_found(csv));
            }
        }
        Ok(())
    }

    /// Build the argument vector: `[--config <path>]? (--interactive | <csv>)`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        if let Some(cfg) = &self.calibration {
            args.push(OsString::from("--config"));
            args.push(cfg.clone().into_os_string());
        }
        match &self.mode {
            PipelineMode::Replay(csv) => args.push(csv.clone().into_os_string()),
            PipelineMode::Interactive => args.push(OsString::from("--interactive")),
        }
        args
    }

    fn wants_stdin(&self) -> bool {
        matches!(self.mode, PipelineMode::Interactive)
    }
}

/// The pipeline's standard streams, handed to the owning sample source.
///
/// `stdin` is present only for interactive runs. stderr never appears here:
/// the process handle drains it itself.
#[derive(Debug)]
pub struct PipelineIo {
    /// Write half, for interactive control input.
    pub stdin: Option<ChildStdin>,
    /// Read half carrying record lines.
    pub stdout: ChildStdout,
}

/// Handle owning one running pipeline process.
///
/// Exactly one sample source owns a handle at a time. [`stop`] terminates
/// the process and waits for exit; it is idempotent. As a backstop the child
/// is spawned with kill-on-drop, so an abnormal relay shutdown cannot orphan
/// the pipeline.
///
/// [`stop`]: PipelineProcess::stop
#[derive(Debug)]
pub struct PipelineProcess {
    child: Mutex<Option<Child>>,
    executable: PathBuf,
}

impl PipelineProcess {
    /// Validate the spec, spawn the process, and start the stderr drain.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing files, or
    /// [`Error::PipelineSpawn`] if the OS refuses the spawn.
    pub fn spawn(spec: &PipelineSpec) -> Result<(Self, PipelineIo)> {
        spec.validate()?;

        let mut command = Command::new(&spec.executable);
        command
            .args(spec.args())
            .stdin(if spec.wants_stdin() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| Error::PipelineSpawn {
            path: spec.executable.clone(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::internal("pipeline stdout was not piped"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::internal("pipeline stderr was not piped"))?;
        let stdin = child.stdin.take();

        tokio::spawn(drain_stderr(stderr));

        info!(
            executable = %spec.executable.display(),
            mode = ?spec.mode,
            "pipeline process started"
        );

        Ok((
            Self {
                child: Mutex::new(Some(child)),
                executable: spec.executable.clone(),
            },
            PipelineIo { stdin, stdout },
        ))
    }

    /// Terminate the process and wait for it to exit.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn stop(&self) {
        let Some(mut child) = self.child.lock().await.take() else {
            return;
        };
        match child.kill().await {
            Ok(()) => info!(executable = %self.executable.display(), "pipeline process stopped"),
            Err(error) => {
                warn!(%error, "pipeline process did not stop cleanly");
            }
        }
    }

    /// Check whether the handle still owns a process.
    pub async fn is_running(&self) -> bool {
        self.child.lock().await.is_some()
    }
}

/// Forward every pipeline stderr line as a diagnostic log event.
///
/// Runs until the pipeline closes its stderr; never blocks stdout reads.
async fn drain_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: PIPELINE_LOG_TARGET, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "x").unwrap();
        path
    }

    #[test]
    fn test_replay_args_without_calibration() {
        let spec = PipelineSpec::replay("/bin/program", None, "flight.csv");
        assert_eq!(spec.args(), vec![OsString::from("flight.csv")]);
    }

    #[test]
    fn test_replay_args_with_calibration() {
        let spec = PipelineSpec::replay(
            "/bin/program",
            Some(PathBuf::from("onspeed.cfg")),
            "flight.csv",
        );
        assert_eq!(
            spec.args(),
            vec![
                OsString::from("--config"),
                OsString::from("onspeed.cfg"),
                OsString::from("flight.csv"),
            ]
        );
    }

    #[test]
    fn test_interactive_args() {
        let spec = PipelineSpec::interactive("/bin/program", None);
        assert_eq!(spec.args(), vec![OsString::from("--interactive")]);
        assert!(spec.wants_stdin());
    }

    #[test]
    fn test_replay_does_not_want_stdin() {
        let spec = PipelineSpec::replay("/bin/program", None, "flight.csv");
        assert!(!spec.wants_stdin());
    }

    #[test]
    fn test_validate_missing_executable() {
        let spec = PipelineSpec::replay("/nonexistent/program", None, "flight.csv");
        assert!(matches!(
            spec.validate(),
            Err(Error::ProcessNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let exe = touch(dir.path(), "program");
        let spec = PipelineSpec::replay(exe, None, dir.path().join("missing.csv"));
        assert!(matches!(spec.validate(), Err(Error::InputNotFound { .. })));
    }

    #[test]
    fn test_validate_missing_calibration() {
        let dir = tempfile::tempdir().unwrap();
        let exe = touch(dir.path(), "program");
        let csv = touch(dir.path(), "flight.csv");
        let spec = PipelineSpec::replay(exe, Some(dir.path().join("missing.cfg")), csv);
        assert!(matches!(
            spec.validate(),
            Err(Error::CalibrationNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_complete_spec() {
        let dir = tempfile::tempdir().unwrap();
        let exe = touch(dir.path(), "program");
        let csv = touch(dir.path(), "flight.csv");
        let cfg = touch(dir.path(), "onspeed.cfg");
        let spec = PipelineSpec::replay(exe, Some(cfg), csv);
        assert!(spec.validate().is_ok());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        #[tokio::test]
        async fn test_spawn_and_stop() {
            let dir = tempfile::tempdir().unwrap();
            let exe = script(dir.path(), "program", "sleep 30");
            let csv = touch(dir.path(), "flight.csv");
            let spec = PipelineSpec::replay(exe, None, csv);

            let (process, io) = PipelineProcess::spawn(&spec).unwrap();
            assert!(io.stdin.is_none());
            assert!(process.is_running().await);

            process.stop().await;
            assert!(!process.is_running().await);
        }

        #[tokio::test]
        async fn test_stop_is_idempotent() {
            let dir = tempfile::tempdir().unwrap();
            let exe = script(dir.path(), "program", "sleep 30");
            let csv = touch(dir.path(), "flight.csv");
            let spec = PipelineSpec::replay(exe, None, csv);

            let (process, _io) = PipelineProcess::spawn(&spec).unwrap();
            process.stop().await;
            process.stop().await;
            assert!(!process.is_running().await);
        }

        #[tokio::test]
        async fn test_interactive_spawn_pipes_stdin() {
            let dir = tempfile::tempdir().unwrap();
            let exe = script(dir.path(), "program", "while read -r line; do echo \"$line\"; done");
            let spec = PipelineSpec::interactive(exe, None);

            let (process, io) = PipelineProcess::spawn(&spec).unwrap();
            assert!(io.stdin.is_some());
            process.stop().await;
        }
    }
}
