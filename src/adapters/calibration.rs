//! Calibration step implementations

use crate::config::CalibrationConfig;
use crate::error::ComputeError;
use crate::types::{SampleStream, Triaxial};

use super::Calibrator;

/// Passes every stream through uncorrected
pub struct NoCalibration;

impl Calibrator for NoCalibration {
    fn calibrate(&self, _stream: &SampleStream) -> Result<Option<SampleStream>, ComputeError> {
        Ok(None)
    }
}

/// Applies externally estimated per-axis coefficients: `(x + offset) * scale`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearCalibration {
    pub offset: [f32; 3],
    pub scale: [f32; 3],
}

impl LinearCalibration {
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            offset: config.offset,
            scale: config.scale,
        }
    }

    fn apply(&self, sample: Triaxial) -> Triaxial {
        let [v, ml, ap] = sample.to_array();
        Triaxial::new(
            (v + self.offset[0]) * self.scale[0],
            (ml + self.offset[1]) * self.scale[1],
            (ap + self.offset[2]) * self.scale[2],
        )
    }
}

impl Calibrator for LinearCalibration {
    fn calibrate(&self, stream: &SampleStream) -> Result<Option<SampleStream>, ComputeError> {
        if self.offset.iter().chain(self.scale.iter()).any(|c| !c.is_finite()) {
            return Err(ComputeError::Configuration(
                "calibration coefficients must be finite".to_string(),
            ));
        }
        if self.offset == [0.0; 3] && self.scale == [1.0; 3] {
            return Ok(None);
        }
        Ok(Some(stream.map_samples(|s| self.apply(s))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn stream() -> SampleStream {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SampleStream::new(start, 1, vec![Triaxial::new(0.98, 0.01, -0.02); 4]).unwrap()
    }

    #[test]
    fn test_no_calibration_reports_no_correction() {
        assert!(NoCalibration.calibrate(&stream()).unwrap().is_none());
    }

    #[test]
    fn test_linear_calibration_keeps_timeline() {
        let calibration = LinearCalibration {
            offset: [0.02, -0.01, 0.02],
            scale: [1.0, 2.0, 1.0],
        };
        let input = stream();
        let corrected = calibration.calibrate(&input).unwrap().unwrap();

        assert_eq!(corrected.start, input.start);
        assert_eq!(corrected.sample_rate_hz, input.sample_rate_hz);
        assert_eq!(corrected.len(), input.len());
        assert!((corrected.samples[0].v - 1.0).abs() < 1e-6);
        assert!(corrected.samples[0].ml.abs() < 1e-6);
    }

    #[test]
    fn test_identity_coefficients_report_no_correction() {
        let calibration = LinearCalibration::from_config(&CalibrationConfig::default());
        assert!(calibration.calibrate(&stream()).unwrap().is_none());
    }
}
