//! Two-point linear calibration from raw millivolts to pH.

use serde::{Deserialize, Serialize};

/// Calibration points `(v_low, ph_low)` and `(v_high, ph_high)`.
///
/// Any field may be missing; the transform is only defined once all four are present and the
/// two voltages differ. Values outside the calibrated span are extrapolated, never clamped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub v_low: Option<f64>,
    pub v_high: Option<f64>,
    pub ph_low: Option<f64>,
    pub ph_high: Option<f64>,
}

impl Calibration {
    pub fn new(
        v_low: Option<f64>,
        v_high: Option<f64>,
        ph_low: Option<f64>,
        ph_high: Option<f64>,
    ) -> Self {
        Self {
            v_low,
            v_high,
            ph_low,
            ph_high,
        }
    }

    pub fn two_point(v_low: f64, v_high: f64, ph_low: f64, ph_high: f64) -> Self {
        Self::new(Some(v_low), Some(v_high), Some(ph_low), Some(ph_high))
    }

    /// Returns `(slope, v_low, ph_low)` for a complete calibration.
    fn line(&self) -> Option<(f64, f64, f64)> {
        let (v_low, v_high, ph_low, ph_high) =
            (self.v_low?, self.v_high?, self.ph_low?, self.ph_high?);
        if v_high == v_low {
            return None;
        }
        Some(((ph_high - ph_low) / (v_high - v_low), v_low, ph_low))
    }

    pub fn is_complete(&self) -> bool {
        self.line().is_some()
    }

    /// Some parameters were given but not enough for a usable line.
    pub fn is_partial(&self) -> bool {
        let given = [self.v_low, self.v_high, self.ph_low, self.ph_high]
            .iter()
            .filter(|p| p.is_some())
            .count();
        given > 0 && !self.is_complete()
    }

    pub fn transform(&self, raw: f64) -> Option<f64> {
        let (slope, v_low, ph_low) = self.line()?;
        Some(ph_low + (raw - v_low) * slope)
    }
}
