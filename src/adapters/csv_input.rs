//! CSV-backed sample provider and count source
//!
//! Both files are headered with `v,ml,ap` columns: raw samples in g, or
//! per-epoch counts produced by an external count library. Count files may
//! carry a leading `timestamp` column anchoring each epoch.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use tracing::{debug, info};

use crate::encoder::parse_timestamp;
use crate::error::ComputeError;
use crate::types::{SampleStream, Triaxial, COUNT_EPOCH_SECS};

use super::{align_to_minute, CountGenerator, SampleProvider};

#[derive(Debug, Deserialize)]
struct CountRow {
    #[serde(default)]
    timestamp: Option<String>,
    v: f64,
    ml: f64,
    ap: f64,
}

/// Read `v,ml,ap` acceleration rows
pub fn read_samples<R: Read>(reader: R) -> Result<Vec<Triaxial>, ComputeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut samples = Vec::new();
    for (row_idx, result) in reader.deserialize::<Triaxial>().enumerate() {
        let sample = result.map_err(|e| {
            ComputeError::ParseError(format!("sample row {}: {}", row_idx + 1, e))
        })?;
        if sample.to_array().iter().any(|a| !a.is_finite()) {
            return Err(ComputeError::ParseError(format!(
                "sample row {}: acceleration must be finite",
                row_idx + 1
            )));
        }
        samples.push(sample);
    }
    Ok(samples)
}

/// Count rows of one file, with the time of the first epoch when the file has one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountTable {
    pub start: Option<NaiveDateTime>,
    pub rows: Vec<[f64; 3]>,
}

/// Read `v,ml,ap` count rows, one per 60 s epoch.
///
/// With a `timestamp` column every row must have one and rows must be
/// consecutive minutes.
pub fn read_count_rows<R: Read>(reader: R) -> Result<CountTable, ComputeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut start: Option<NaiveDateTime> = None;
    let mut rows = Vec::new();
    for (row_idx, result) in reader.deserialize::<CountRow>().enumerate() {
        let row = result.map_err(|e| {
            ComputeError::ParseError(format!("count row {}: {}", row_idx + 1, e))
        })?;
        match (row.timestamp.as_deref(), row_idx == 0, start) {
            (Some(raw), true, _) => start = Some(parse_timestamp(raw)?),
            (None, true, _) | (None, false, None) => {}
            (Some(raw), false, Some(origin)) => {
                let timestamp = parse_timestamp(raw)?;
                let expected = origin + Duration::seconds(row_idx as i64 * COUNT_EPOCH_SECS as i64);
                if timestamp != expected {
                    return Err(ComputeError::ParseError(format!(
                        "count row {}: expected {expected}, found {timestamp}",
                        row_idx + 1
                    )));
                }
            }
            _ => {
                return Err(ComputeError::ParseError(format!(
                    "count row {}: timestamps must be given on every row or none",
                    row_idx + 1
                )));
            }
        }
        if [row.v, row.ml, row.ap].iter().any(|c| !c.is_finite() || *c < 0.0) {
            return Err(ComputeError::ParseError(format!(
                "count row {}: counts must be finite and non-negative",
                row_idx + 1
            )));
        }
        rows.push([row.v, row.ml, row.ap]);
    }
    Ok(CountTable { start, rows })
}

/// Loads a sample CSV whose start time and rate are known from elsewhere
/// (device header, study log) and aligns it to the first whole minute.
#[derive(Debug, Clone)]
pub struct CsvSampleProvider {
    pub path: PathBuf,
    pub start: NaiveDateTime,
    pub sample_rate_hz: u32,
}

impl CsvSampleProvider {
    pub fn new(path: impl AsRef<Path>, start: NaiveDateTime, sample_rate_hz: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            start,
            sample_rate_hz,
        }
    }
}

impl SampleProvider for CsvSampleProvider {
    fn load(&self) -> Result<SampleStream, ComputeError> {
        let file = File::open(&self.path)?;
        let samples = read_samples(file)?;
        debug!(path = %self.path.display(), rows = samples.len(), "read sample file");

        let stream = align_to_minute(SampleStream::new(self.start, self.sample_rate_hz, samples)?)?;
        info!(
            start = %stream.start,
            samples = stream.len(),
            hz = stream.sample_rate_hz,
            "loaded sample stream"
        );
        Ok(stream)
    }
}

/// Counts computed ahead of time by an external count library.
///
/// When `start` is known the epochs must begin exactly at the stream start;
/// without it only the epoch count is checked against the stream length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecomputedCounts {
    pub start: Option<NaiveDateTime>,
    pub epochs: Vec<[f64; 3]>,
}

impl PrecomputedCounts {
    pub fn new(epochs: Vec<[f64; 3]>) -> Self {
        Self { start: None, epochs }
    }

    pub fn anchored(start: NaiveDateTime, epochs: Vec<[f64; 3]>) -> Self {
        Self {
            start: Some(start),
            epochs,
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ComputeError> {
        let table = read_count_rows(reader)?;
        Ok(Self {
            start: table.start,
            epochs: table.rows,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        Self::from_reader(File::open(path)?)
    }
}

impl CountGenerator for PrecomputedCounts {
    fn counts(
        &self,
        stream: &SampleStream,
        epoch_secs: u32,
    ) -> Result<Vec<[f64; 3]>, ComputeError> {
        if epoch_secs != COUNT_EPOCH_SECS {
            return Err(ComputeError::Configuration(format!(
                "precomputed counts are {COUNT_EPOCH_SECS} s epochs, {epoch_secs} s requested"
            )));
        }

        let mismatch = |counts_start: NaiveDateTime, detail: String| ComputeError::TimelineMismatch {
            counts_start,
            enmo_start: stream.start,
            detail,
        };
        if let Some(start) = self.start {
            if start != stream.start {
                return Err(mismatch(
                    start,
                    "count epochs and samples start at different instants".to_string(),
                ));
            }
        }

        // One trailing partial minute is the only tolerated difference
        let per_epoch = (stream.sample_rate_hz as usize * epoch_secs as usize).max(1);
        let expected = stream.len().div_ceil(per_epoch);
        if self.epochs.len().abs_diff(expected) > 1 {
            return Err(mismatch(
                self.start.unwrap_or(stream.start),
                format!(
                    "{} count epochs for {} samples ({expected} minutes)",
                    self.epochs.len(),
                    stream.len()
                ),
            ));
        }

        Ok(self.epochs.clone())
    }
}
