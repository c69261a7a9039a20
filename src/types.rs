//! Core types for the pa-flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: the raw sample stream, count epochs, wear flags, the resampled
//! epoch tables and the daily summary rows.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Seconds in one count epoch
pub const COUNT_EPOCH_SECS: u32 = 60;

/// Acceleration axis, in body-frame naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Vertical,
    Mediolateral,
    AnteriorPosterior,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Vertical, Axis::Mediolateral, Axis::AnteriorPosterior];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Vertical => "v",
            Axis::Mediolateral => "ml",
            Axis::AnteriorPosterior => "ap",
        }
    }
}

/// One triaxial acceleration reading in g
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Triaxial {
    pub v: f32,
    pub ml: f32,
    pub ap: f32,
}

impl Triaxial {
    pub fn new(v: f32, ml: f32, ap: f32) -> Self {
        Self { v, ml, ap }
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::Vertical => self.v,
            Axis::Mediolateral => self.ml,
            Axis::AnteriorPosterior => self.ap,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.v, self.ml, self.ap]
    }
}

/// Uniformly sampled triaxial recording.
///
/// Gaps are resolved upstream; sample `i` sits at `start + i / sample_rate_hz`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStream {
    /// Timestamp of the first sample (wall-clock, minute aligned)
    pub start: NaiveDateTime,
    /// Samples per second
    pub sample_rate_hz: u32,
    pub samples: Vec<Triaxial>,
}

impl SampleStream {
    pub fn new(
        start: NaiveDateTime,
        sample_rate_hz: u32,
        samples: Vec<Triaxial>,
    ) -> Result<Self, ComputeError> {
        if sample_rate_hz == 0 {
            return Err(ComputeError::Configuration(
                "sample rate must be at least 1 Hz".to_string(),
            ));
        }
        Ok(Self {
            start,
            sample_rate_hz,
            samples,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copy of the stream with every sample passed through `f`
    pub fn map_samples<F>(&self, f: F) -> SampleStream
    where
        F: Fn(Triaxial) -> Triaxial,
    {
        SampleStream {
            start: self.start,
            sample_rate_hz: self.sample_rate_hz,
            samples: self.samples.iter().copied().map(f).collect(),
        }
    }
}

/// Count aggregate for one 60 second epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CountEpoch {
    pub v: f64,
    pub ml: f64,
    pub ap: f64,
    /// Vector magnitude of the three axis counts
    pub vm: f64,
}

impl CountEpoch {
    pub fn from_axes(v: f64, ml: f64, ap: f64) -> Self {
        Self {
            v,
            ml,
            ap,
            vm: crate::magnitude::norm([v, ml, ap]),
        }
    }

    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Vertical => self.v,
            Axis::Mediolateral => self.ml,
            Axis::AnteriorPosterior => self.ap,
        }
    }
}

/// Binary wear label, serialized as 0 (not worn) / 1 (worn)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Wear {
    NotWorn,
    #[default]
    Worn,
}

impl Wear {
    pub fn is_worn(self) -> bool {
        matches!(self, Wear::Worn)
    }

    pub fn as_f64(self) -> f64 {
        u8::from(self) as f64
    }

    /// Label from an aggregated level: only a full 1.0 counts as worn.
    pub fn from_level(level: f64) -> Self {
        if level >= 1.0 {
            Wear::Worn
        } else {
            Wear::NotWorn
        }
    }
}

impl From<Wear> for u8 {
    fn from(wear: Wear) -> Self {
        match wear {
            Wear::NotWorn => 0,
            Wear::Worn => 1,
        }
    }
}

impl TryFrom<u8> for Wear {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Wear::NotWorn),
            1 => Ok(Wear::Worn),
            other => Err(format!("wear flag must be 0 or 1, got {other}")),
        }
    }
}

/// Fixed-rate series of records anchored at an absolute start time
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSeries<T> {
    pub start: NaiveDateTime,
    /// Length of one row in seconds
    pub epoch_secs: u32,
    pub rows: Vec<T>,
}

impl<T> EpochSeries<T> {
    pub fn new(start: NaiveDateTime, epoch_secs: u32, rows: Vec<T>) -> Self {
        Self {
            start,
            epoch_secs,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamp of row `index`, computed from the start with integer seconds
    pub fn timestamp_at(&self, index: usize) -> NaiveDateTime {
        self.start + Duration::seconds(index as i64 * self.epoch_secs as i64)
    }

    pub fn iter_timestamped(&self) -> impl Iterator<Item = (NaiveDateTime, &T)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(move |(i, row)| (self.timestamp_at(i), row))
    }
}

/// One row of the 10 second ENMO table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnmoRecord {
    /// Mean ENMO in mg
    pub enmo: f64,
    pub wear_vanhees: Wear,
}

/// One row of the combined 60 second table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinuteRecord {
    pub counts: CountEpoch,
    pub wear_choi: Wear,
    /// Mean ENMO in mg
    pub enmo: f64,
    pub wear_vanhees: Wear,
}

/// Minutes spent in each intensity band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntensityBands {
    /// Light
    pub lpa: u32,
    /// Moderate
    pub mpa: u32,
    /// Moderate to vigorous
    pub mvpa: u32,
    /// Vigorous
    pub vpa: u32,
}

/// One calendar day of wear time and intensity minutes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub weartime_choi: u32,
    pub weartime_vanhees: u32,
    pub weartime_choi_waking: u32,
    pub weartime_vanhees_waking: u32,
    /// Absent when no count cutpoints were supplied
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub counts_bands: Option<IntensityBands>,
    /// Absent when no ENMO cutpoints were supplied
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub enmo_bands: Option<IntensityBands>,
}

/// Quality flag indicating data issues found while processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// Count series shorter than the Choi minimum period; no run could be committed
    InsufficientEpochs,
    /// Calibration was requested but no correction was applied
    CalibrationUnavailable,
    /// A trailing partial minute was dropped when joining the 60 s tables
    TrailingPartialEpoch,
    /// Neither algorithm reports a single worn minute
    NoWearDetected,
}

/// Report producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Report provenance information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    pub source: String,
    pub start: NaiveDateTime,
    pub sample_rate_hz: u32,
    pub calibrated: bool,
    pub computed_at_utc: String,
}

/// Report quality summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQuality {
    pub minutes: usize,
    pub worn_minutes_choi: usize,
    pub worn_minutes_vanhees: usize,
    pub flags: Vec<QualityFlag>,
}

/// Complete JSON report for one recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    pub days: Vec<DailySummary>,
}
