//! PPSDO Telemetry
//!
//! Telemetry is a snapshot of the control loop state. The firmware renders it
//! as JSON and logs it whenever the calibration phase changes.
use heapless::String;
use serde::Serialize;

use crate::calibration::TamerPhase;

/// Snapshot of the tamer control loop for reporting.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Telemetry {
    /// The enable input state.
    pub enabled: bool,

    /// The current calibration phase.
    pub phase: TamerPhase,

    /// The most recently written trim DAC code.
    pub trim: u16,

    /// Calibration line slope in codes per error count.
    pub slope: f32,

    /// Calibration line y-intercept, the coarse zero error code.
    pub y_intercept: u16,

    /// Number of error samples lost because they were not taken in time.
    pub overruns: u32,
}

impl Telemetry {
    /// Render as JSON.
    ///
    /// # Returns
    /// `None` if the rendering does not fit into `N` bytes.
    pub fn to_json<const N: usize>(&self) -> Option<String<N>> {
        serde_json_core::to_string(self).ok()
    }
}
