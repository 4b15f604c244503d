//! Two point coarse calibration followed by proportional fine tuning of the
//! trim DAC.
//!
//! The coarse phase measures the frequency error with the DAC at both ends
//! of its range. The two points define a line of DAC code over error whose
//! y-intercept is the best first estimate of the zero error code. The fine
//! phase then corrects the code proportionally to each new error, using the
//! line slope as gain.
use num_traits::float::FloatCore;
use serde::Serialize;
use vctcxo_tamer::{ErrorSample, Registers, VctcxoTamer, Window};

use crate::settings::DacRange;

/// Value of the state register once coarse calibration is complete.
pub const STATE_CALIBRATED: u8 = 1;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub enum TamerPhase {
    /// Drive the DAC to its minimum.
    #[default]
    CoarseMin,
    /// Record the error at minimum and drive the DAC to its maximum.
    CoarseMax,
    /// Record the error at maximum and solve the calibration line.
    CoarseDone,
    /// Steady state proportional correction.
    Fine,
}

/// A measured error for a given trim code.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: u16,
}

/// DAC code over frequency error.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct CalibrationLine {
    /// Measurements at the minimum and maximum code.
    pub points: [Point; 2],
    /// Codes per error count.
    pub slope: f32,
    /// Code for zero error.
    pub y_intercept: u16,
}

impl CalibrationLine {
    pub fn new(range: &DacRange) -> Self {
        Self {
            points: [
                Point {
                    x: 0,
                    y: range.min(),
                },
                Point {
                    x: 0,
                    y: range.max(),
                },
            ],
            slope: 0.0,
            y_intercept: 0,
        }
    }

    /// Compute slope and y-intercept from the two points.
    ///
    /// If both points have the same error, the line is undefined: the slope
    /// is left unchanged and the intercept is set to `default`.
    ///
    /// Returns the y-intercept, clamped into `range`.
    pub fn solve(&mut self, range: &DacRange, default: u16) -> u16 {
        let [p0, p1] = self.points;
        let dx = p1.x as i64 - p0.x as i64;
        self.y_intercept = if dx != 0 {
            self.slope = (p1.y as f32 - p0.y as f32) / dx as f32;
            range.clamp(
                (p0.y as i64).saturating_sub(round(self.slope * p0.x as f32)),
            )
        } else {
            log::warn!("Degenerate calibration line, using default trim");
            default
        };
        self.y_intercept
    }
}

/// Round half away from zero, saturating.
fn round(x: f32) -> i64 {
    FloatCore::round(x) as i64
}

/// Trim code correction for an error count measured over `window`.
///
/// The product of error and slope is rounded before it is scaled down by
/// the window length (truncating).
pub fn correction(error: i32, slope: f32, window: Window) -> i64 {
    round(error as f32 * slope) / window.length() as i64
}

/// Apply a proportional correction to `trim`, clamped into `range`.
pub fn adjust_trim(
    trim: u16,
    error: i32,
    slope: f32,
    window: Window,
    range: &DacRange,
) -> u16 {
    let code = (trim as i64).saturating_sub(correction(error, slope, window));
    range.clamp(code)
}

/// Calibration state machine.
#[derive(Clone, Debug)]
pub struct Calibrator {
    phase: TamerPhase,
    line: CalibrationLine,
    range: DacRange,
    default_trim: u16,
}

impl Calibrator {
    pub fn new(range: DacRange, default_trim: u16) -> Self {
        Self {
            phase: TamerPhase::default(),
            line: CalibrationLine::new(&range),
            range,
            default_trim,
        }
    }

    /// Restart calibration from [TamerPhase::CoarseMin].
    pub fn reset(&mut self) {
        self.phase = TamerPhase::CoarseMin;
        self.line = CalibrationLine::new(&self.range);
    }

    pub fn phase(&self) -> TamerPhase {
        self.phase
    }

    pub fn line(&self) -> &CalibrationLine {
        &self.line
    }

    pub fn range(&self) -> &DacRange {
        &self.range
    }

    /// Process one consumed sample and advance the phase.
    pub fn step<R: Registers>(
        &mut self,
        tamer: &mut VctcxoTamer<R>,
        sample: &ErrorSample,
    ) -> TamerPhase {
        let next = match self.phase {
            TamerPhase::CoarseMin => self.coarse_min(tamer),
            TamerPhase::CoarseMax => self.coarse_max(tamer, sample),
            TamerPhase::CoarseDone => self.coarse_done(tamer, sample),
            TamerPhase::Fine => self.fine(tamer, sample),
        };
        if next != self.phase {
            log::info!("Calibration {:?} -> {:?}", self.phase, next);
        }
        self.phase = next;
        next
    }

    fn coarse_min<R: Registers>(
        &mut self,
        tamer: &mut VctcxoTamer<R>,
    ) -> TamerPhase {
        tamer.write_trim_dac(self.line.points[0].y);
        tamer.reset_counters(true);
        TamerPhase::CoarseMax
    }

    fn coarse_max<R: Registers>(
        &mut self,
        tamer: &mut VctcxoTamer<R>,
        sample: &ErrorSample,
    ) -> TamerPhase {
        self.line.points[0].x = sample.error(Window::Short);
        tamer.write_trim_dac(self.line.points[1].y);
        tamer.reset_counters(true);
        TamerPhase::CoarseDone
    }

    fn coarse_done<R: Registers>(
        &mut self,
        tamer: &mut VctcxoTamer<R>,
        sample: &ErrorSample,
    ) -> TamerPhase {
        tamer.set_state(STATE_CALIBRATED);
        self.line.points[1].x = sample.error(Window::Short);
        let code = self.line.solve(&self.range, self.default_trim);
        log::info!(
            "Calibration line: {:?}, slope {}, intercept {}",
            self.line.points,
            self.line.slope,
            code
        );
        tamer.write_trim_dac(code);
        TamerPhase::Fine
    }

    fn fine<R: Registers>(
        &mut self,
        tamer: &mut VctcxoTamer<R>,
        sample: &ErrorSample,
    ) -> TamerPhase {
        if let Some((window, error)) = sample.shortest_complete() {
            let code = adjust_trim(
                tamer.trim(),
                error,
                self.line.slope,
                window,
                &self.range,
            );
            log::debug!("{window:?} error {error}: trim {code}");
            tamer.write_trim_dac(code);
        }
        TamerPhase::Fine
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn line(x0: i32, x1: i32) -> CalibrationLine {
        let mut line = CalibrationLine::new(&DacRange::default());
        line.points[0].x = x0;
        line.points[1].x = x1;
        line
    }

    #[test]
    fn solve() {
        let mut l = line(100, -50);
        assert_eq!(l.solve(&DacRange::default(), 0x77fa), 43690);
        assert!((l.slope + 436.9).abs() < 1e-3);
    }

    #[test]
    fn solve_degenerate() {
        let mut l = line(42, 42);
        l.points[1].y = 1234;
        assert_eq!(l.solve(&DacRange::default(), 0x77fa), 0x77fa);
        assert_eq!(l.slope, 0.0);
    }

    #[test]
    fn solve_clamps() {
        // Zero error beyond the maximum code
        let mut l = line(-200, -100);
        assert_eq!(l.solve(&DacRange::default(), 0x77fa), 65535);
        // and below the minimum
        let mut l = line(100, 200);
        assert_eq!(l.solve(&DacRange::default(), 0x77fa), 0);
    }

    #[test]
    fn solve_extreme() {
        let mut l = line(i32::MIN, i32::MAX);
        let range = DacRange::default();
        let code = l.solve(&range, 0x77fa);
        assert!((32766..=32769).contains(&code));
    }

    #[test]
    fn correction_scaled() {
        assert_eq!(correction(10, -436.9, Window::Short), -4369);
        assert_eq!(correction(10, -436.9, Window::Medium), -436);
        assert_eq!(correction(10, -436.9, Window::Long), -43);
        // rounding before truncation
        assert_eq!(correction(1, 149.5, Window::Long), 1);
        assert_eq!(correction(-1, 149.5, Window::Long), -1);
        assert_eq!(correction(0, 149.5, Window::Short), 0);
    }

    #[test]
    fn adjust_clamps() {
        let range = DacRange::default();
        assert_eq!(adjust_trim(43690, 10, -436.9, Window::Short, &range), 48059);
        assert_eq!(
            adjust_trim(43690, 1_000_000, -436.9, Window::Short, &range),
            65535
        );
        assert_eq!(
            adjust_trim(43690, -1_000_000, -436.9, Window::Short, &range),
            0
        );
        assert_eq!(
            adjust_trim(100, i32::MAX, f32::MAX, Window::Long, &range),
            0
        );
        assert_eq!(
            adjust_trim(100, i32::MIN, f32::MAX, Window::Short, &range),
            65535
        );
    }

    #[test]
    fn adjust_monotonic() {
        let range = DacRange::from_bits(12).unwrap();
        let mut last = u16::MAX;
        for error in (-5000..5000).step_by(37) {
            let code = adjust_trim(2000, error, 0.9, Window::Medium, &range);
            assert!(code <= range.max());
            assert!(code <= last);
            last = code;
        }
    }
}
