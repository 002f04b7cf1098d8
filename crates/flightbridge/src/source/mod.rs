//! Sample sources: the three interchangeable data-source strategies.
//!
//! Every source follows the same contract: produce zero or more telemetry
//! records after `start`, until `stop` or natural exhaustion. The synthetic
//! generator and the replay bridge are pull-style ([`SampleSource`]); the
//! interactive bridge exchanges one record per control input and broadcasts
//! the result itself.

pub mod interactive;
pub mod replay;
pub mod synthetic;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::error::Result;
use crate::record::TelemetryRecord;

pub use interactive::InteractiveBridge;
pub use replay::ReplayBridge;
pub use synthetic::SyntheticSource;

/// Lifecycle state shared by every sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// Constructed, not yet started.
    NotStarted,
    /// Producing (or ready to exchange) records.
    Running,
    /// The data stream ran dry on its own (replay only). Terminal.
    Finished,
    /// Explicitly shut down. Terminal.
    Stopped,
}

impl SourceState {
    /// Check whether no transition leaves this state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Stopped)
    }

    /// Check whether `next` is a legal successor of this state.
    #[must_use]
    pub fn can_become(self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Running) | (Self::Running, Self::Finished) => true,
            (from, Self::Stopped) => !from.is_terminal(),
            _ => false,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Finished,
            3 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::NotStarted => 0,
            Self::Running => 1,
            Self::Finished => 2,
            Self::Stopped => 3,
        }
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Atomic state cell enforcing the legal transitions.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(SourceState::NotStarted.as_u8()))
    }

    pub(crate) fn get(&self) -> SourceState {
        SourceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempt the transition to `next`; false if it was illegal.
    pub(crate) fn advance(&self, next: SourceState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if !SourceState::from_u8(current).can_become(next) {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

/// Pull contract shared by the synthetic and replay sources.
///
/// `next_record` suspends until the next record is available and returns
/// `None` once the source has nothing more to produce (finished or stopped).
#[async_trait]
pub trait SampleSource: Send + Sync {
    /// The name of this source (for logging).
    fn name(&self) -> &'static str;

    /// Current lifecycle state.
    fn state(&self) -> SourceState;

    /// Start producing records.
    ///
    /// # Errors
    ///
    /// Returns a startup error if the source's resources (pipeline
    /// executable, input file) cannot be acquired.
    async fn start(&self) -> Result<()>;

    /// Produce the next record, or `None` when there is no more data.
    async fn next_record(&self) -> Option<TelemetryRecord>;

    /// Shut the source down, tearing down any owned process.
    async fn stop(&self);
}

/// The configured data source for one relay run.
#[derive(Debug)]
pub enum Source {
    /// In-process 50 Hz waveform generator.
    Synthetic(SyntheticSource),
    /// CSV replay through the native pipeline.
    Replay(ReplayBridge),
    /// Client-driven pipeline exchange.
    Interactive(InteractiveBridge),
}

impl Source {
    /// The name of the active variant (for logging).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Synthetic(s) => s.name(),
            Self::Replay(s) => s.name(),
            Self::Interactive(s) => s.name(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SourceState {
        match self {
            Self::Synthetic(s) => s.state(),
            Self::Replay(s) => s.state(),
            Self::Interactive(s) => s.state(),
        }
    }

    /// Start the source.
    ///
    /// # Errors
    ///
    /// Propagates the variant's startup error.
    pub async fn start(&self) -> Result<()> {
        match self {
            Self::Synthetic(s) => s.start().await,
            Self::Replay(s) => s.start().await,
            Self::Interactive(s) => s.start().await,
        }
    }

    /// Stop the source, tearing down any owned pipeline process.
    pub async fn stop(&self) {
        match self {
            Self::Synthetic(s) => s.stop().await,
            Self::Replay(s) => s.stop().await,
            Self::Interactive(s) => s.stop().await,
        }
    }

    /// View the source through the pull contract, if it has one.
    ///
    /// Interactive sources are push-driven and return `None`.
    #[must_use]
    pub fn as_pull(&self) -> Option<&dyn SampleSource> {
        match self {
            Self::Synthetic(s) => Some(s),
            Self::Replay(s) => Some(s),
            Self::Interactive(_) => None,
        }
    }

    /// View the interactive bridge, if that is the active variant.
    #[must_use]
    pub fn as_interactive(&self) -> Option<&InteractiveBridge> {
        match self {
            Self::Interactive(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use SourceState::{Finished, NotStarted, Running, Stopped};
        assert!(NotStarted.can_become(Running));
        assert!(Running.can_become(Finished));
        assert!(NotStarted.can_become(Stopped));
        assert!(Running.can_become(Stopped));
    }

    #[test]
    fn test_terminal_states_absorb() {
        use SourceState::{Finished, NotStarted, Running, Stopped};
        for terminal in [Finished, Stopped] {
            assert!(terminal.is_terminal());
            for next in [NotStarted, Running, Finished, Stopped] {
                assert!(!terminal.can_become(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_illegal_forward_jumps() {
        use SourceState::{Finished, NotStarted, Running};
        assert!(!NotStarted.can_become(Finished));
        assert!(!Running.can_become(Running));
        assert!(!Running.can_become(NotStarted));
    }

    #[test]
    fn test_state_cell_walks_the_lifecycle() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), SourceState::NotStarted);

        assert!(cell.advance(SourceState::Running));
        assert_eq!(cell.get(), SourceState::Running);

        assert!(cell.advance(SourceState::Finished));
        assert_eq!(cell.get(), SourceState::Finished);

        // Finished is terminal: explicit stop no longer changes the state.
        assert!(!cell.advance(SourceState::Stopped));
        assert_eq!(cell.get(), SourceState::Finished);
    }

    #[test]
    fn test_state_cell_rejects_double_start() {
        let cell = StateCell::new();
        assert!(cell.advance(SourceState::Running));
        assert!(!cell.advance(SourceState::Running));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SourceState::NotStarted.to_string(), "not started");
        assert_eq!(SourceState::Running.to_string(), "running");
        assert_eq!(SourceState::Finished.to_string(), "finished");
        assert_eq!(SourceState::Stopped.to_string(), "stopped");
    }
}
