//! External collaborator adapters
//!
//! Ingestion, count generation and calibration happen outside the core. This
//! module defines the contracts the pipeline consumes them through, plus the
//! plain file-backed implementations used by the CLI.

mod calibration;
mod csv_input;

pub use calibration::{LinearCalibration, NoCalibration};
pub use csv_input::{read_count_rows, read_samples, CsvSampleProvider, PrecomputedCounts};

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::error::ComputeError;
use crate::types::SampleStream;

/// Source of a normalized, uniformly sampled, minute-aligned stream
pub trait SampleProvider {
    fn load(&self) -> Result<SampleStream, ComputeError>;
}

/// Maps raw samples to per-axis counts at `epoch_secs` resolution
pub trait CountGenerator {
    /// One `[v, ml, ap]` row per epoch
    fn counts(&self, stream: &SampleStream, epoch_secs: u32)
        -> Result<Vec<[f64; 3]>, ComputeError>;
}

/// Optional sensor calibration step
pub trait Calibrator {
    /// Corrected stream on the same timeline, or `None` when no correction applies
    fn calibrate(&self, stream: &SampleStream) -> Result<Option<SampleStream>, ComputeError>;
}

/// Drop the leading partial minute so the stream starts on a whole minute.
///
/// The first kept sample is the first one at or after the next minute
/// boundary; a stream already on a boundary is returned unchanged.
pub fn align_to_minute(mut stream: SampleStream) -> Result<SampleStream, ComputeError> {
    let start = stream.start;
    if start.second() == 0 && start.nanosecond() == 0 {
        return Ok(stream);
    }

    let minute_floor: NaiveDateTime = start
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| ComputeError::DateParseError(format!("cannot truncate {start}")))?;
    let next_minute = minute_floor + Duration::minutes(1);

    let gap_ms = (next_minute - start).num_milliseconds() as u64;
    let hz = stream.sample_rate_hz as u64;
    let skip = ((gap_ms * hz + 999) / 1000) as usize;

    let skip = skip.min(stream.samples.len());
    stream.samples.drain(..skip);
    stream.start = next_minute;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Triaxial;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_aligned_stream_is_untouched() {
        let stream = SampleStream::new(at(9, 0, 0), 30, vec![Triaxial::default(); 100]).unwrap();
        let aligned = align_to_minute(stream.clone()).unwrap();
        assert_eq!(aligned, stream);
    }

    #[test]
    fn test_leading_partial_minute_is_dropped() {
        let samples: Vec<Triaxial> = (0..30 * 120)
            .map(|i| Triaxial::new(i as f32, 0.0, 0.0))
            .collect();
        let stream = SampleStream::new(at(9, 0, 45), 30, samples).unwrap();
        let aligned = align_to_minute(stream).unwrap();

        assert_eq!(aligned.start, at(9, 1, 0));
        assert_eq!(aligned.samples.len(), 30 * 120 - 15 * 30);
        assert_eq!(aligned.samples[0].v, (15 * 30) as f32);
    }

    #[test]
    fn test_fractional_start_rounds_up_to_next_sample() {
        let start = at(9, 0, 59) + Duration::milliseconds(500);
        let stream = SampleStream::new(start, 10, vec![Triaxial::default(); 50]).unwrap();
        let aligned = align_to_minute(stream).unwrap();

        assert_eq!(aligned.start, at(9, 1, 0));
        assert_eq!(aligned.samples.len(), 45);
    }
}
