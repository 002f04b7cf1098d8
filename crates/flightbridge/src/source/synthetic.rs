//! Synthetic flight-data generator.
//!
//! Pure in-process computation, no pipeline involved: every tick advances a
//! simulated clock and recomputes all fields as smooth sinusoids of that
//! clock plus small bounded jitter. The jitter is uniform, so each field
//! always stays inside its declared envelope.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::record::TelemetryRecord;
use crate::source::{SampleSource, SourceState, StateCell};

/// Nominal update period (50 Hz).
pub const TICK: Duration = Duration::from_millis(20);

/// The generated angle of attack always stays within these bounds (degrees).
pub const AOA_BOUNDS: (f64, f64) = (-5.0, 20.0);

/// One generated telemetry frame, serialized with the pipeline's wire names.
#[derive(Debug, Serialize)]
struct Frame {
    #[serde(rename = "AOA")]
    aoa: f64,
    #[serde(rename = "IAS")]
    ias: f64,
    #[serde(rename = "PAlt")]
    pressure_alt: f64,
    #[serde(rename = "verticalGLoad")]
    vertical_g: f64,
    #[serde(rename = "lateralGLoad")]
    lateral_g: f64,
    #[serde(rename = "Pitch")]
    pitch: f64,
    #[serde(rename = "Roll")]
    roll: f64,
    #[serde(rename = "kalmanVSI")]
    vsi: f64,
    #[serde(rename = "flightPath")]
    flight_path: f64,
    #[serde(rename = "PitchRate")]
    pitch_rate: f64,
    #[serde(rename = "dataMark")]
    data_mark: u8,
    #[serde(rename = "flapsPos")]
    flaps_pos: u8,
    #[serde(rename = "CP")]
    cp: f64,
    #[serde(rename = "LDmax")]
    ld_max: f64,
    #[serde(rename = "OnspeedFast")]
    onspeed_fast: f64,
    #[serde(rename = "OnspeedSlow")]
    onspeed_slow: f64,
    #[serde(rename = "OnspeedWarn")]
    onspeed_warn: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Compute the frame for simulated time `t` (seconds).
fn frame_at(t: f64) -> Frame {
    let mut rng = rand::thread_rng();

    let pitch = 3.0 + 2.0 * (t * 0.3).sin();
    let aoa = 5.0 + 3.0 * (t * 0.15).sin() + rng.gen_range(-0.1..=0.1);
    let ias = 100.0 + 10.0 * (t * 0.1).sin() + rng.gen_range(-0.5..=0.5);

    Frame {
        aoa: round_to(aoa, 2),
        ias: round_to(ias, 1),
        pressure_alt: round_to(3000.0 + 100.0 * (t * 0.05).sin(), 0),
        vertical_g: round_to(1.0 + 0.1 * t.sin(), 2),
        lateral_g: round_to(0.05 * (t * 2.0).sin(), 2),
        pitch: round_to(pitch, 2),
        roll: round_to(5.0 * (t * 0.2).sin(), 2),
        vsi: round_to(500.0 * (t * 0.05).cos(), 0),
        flight_path: round_to(pitch - aoa, 2),
        pitch_rate: round_to(2.0 * (t * 0.3).cos(), 2),
        data_mark: 0,
        flaps_pos: 0,
        cp: round_to(0.5 + 0.3 * (aoa / 15.0), 4),
        ld_max: 3.0,
        onspeed_fast: 6.0,
        onspeed_slow: 8.0,
        onspeed_warn: 12.0,
    }
}

/// Sample source producing synthetic flight data at a fixed 50 Hz cadence.
///
/// Never reaches [`SourceState::Finished`]; it produces until stopped.
#[derive(Debug)]
pub struct SyntheticSource {
    state: StateCell,
    clock: Mutex<f64>,
}

impl SyntheticSource {
    /// Create a generator with its simulated clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StateCell::new(),
            clock: Mutex::new(0.0),
        }
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SampleSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn state(&self) -> SourceState {
        self.state.get()
    }

    async fn start(&self) -> Result<()> {
        if !self.state.advance(SourceState::Running) {
            debug!(state = %self.state.get(), "synthetic source not restarted");
        }
        Ok(())
    }

    async fn next_record(&self) -> Option<TelemetryRecord> {
        if self.state.get() != SourceState::Running {
            return None;
        }
        tokio::time::sleep(TICK).await;

        let t = {
            let mut clock = self.clock.lock().await;
            *clock += TICK.as_secs_f64();
            *clock
        };
        let value = serde_json::to_value(frame_at(t)).ok()?;
        TelemetryRecord::from_value(value)
    }

    /// Nothing to tear down; only marks the source stopped.
    async fn stop(&self) {
        self.state.advance(SourceState::Stopped);
    }
}
