//! Pipeline orchestration
//!
//! This module provides the public API for pa-flux.
//! It runs a recording from its sample provider through to daily summaries.

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::adapters::{Calibrator, CountGenerator, LinearCalibration, NoCalibration, SampleProvider};
use crate::config::PipelineConfig;
use crate::daily::DailyAggregator;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::reducer::{ReducedRecording, SignalReducer};
use crate::types::{
    DailySummary, EpochSeries, MinuteRecord, QualityFlag, SampleStream, COUNT_EPOCH_SECS,
};

/// Everything produced for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRecording {
    pub start: NaiveDateTime,
    pub sample_rate_hz: u32,
    /// Whether a calibration correction was applied to the ENMO pathway
    pub calibrated: bool,
    pub reduced: ReducedRecording,
    pub days: Vec<DailySummary>,
    pub quality_flags: Vec<QualityFlag>,
}

/// Process one recording through the full pipeline.
///
/// Pipeline stages:
/// 1. SampleProvider - Load the minute-aligned sample stream
/// 2. CountGenerator - Per-axis 60 s counts from the uncalibrated stream
/// 3. Calibrator - Optional correction for the ENMO pathway
/// 4. SignalReducer - Wear flags, ENMO and resampled tables
/// 5. DailyAggregator - One summary per calendar day
pub fn process_recording(
    provider: &dyn SampleProvider,
    counts: &dyn CountGenerator,
    calibrator: &dyn Calibrator,
    config: &PipelineConfig,
) -> Result<ProcessedRecording, ComputeError> {
    config.validate()?;

    // Stage 1: Load samples
    let stream = provider.load()?;
    if stream.sample_rate_hz != config.sampling_hz {
        return Err(ComputeError::Configuration(format!(
            "sample provider delivers {} Hz but sampling_hz is {}",
            stream.sample_rate_hz, config.sampling_hz
        )));
    }

    // Stage 2: Counts
    let count_rows = counts.counts(&stream, COUNT_EPOCH_SECS)?;

    // Stage 3: Calibration
    let mut quality_flags = Vec::new();
    let corrected = if config.calibration.enabled {
        let corrected = calibrator.calibrate(&stream)?;
        match &corrected {
            Some(calibrated) => check_same_timeline(&stream, calibrated)?,
            None => {
                warn!("calibration requested but no correction was applied");
                quality_flags.push(QualityFlag::CalibrationUnavailable);
            }
        }
        corrected
    } else {
        None
    };
    let enmo_stream = corrected.as_ref().unwrap_or(&stream);

    // Stage 4: Reduce
    let reduced = SignalReducer::reduce(enmo_stream, &count_rows, &config.choi, &config.van_hees)?;
    quality_flags.extend(reduced.quality_flags.iter().copied());

    // Stage 5: Daily summaries
    let days = DailyAggregator::aggregate(&reduced.minutes, &config.daily)?;

    let any_worn = reduced
        .minutes
        .rows
        .iter()
        .any(|m| m.wear_choi.is_worn() || m.wear_vanhees.is_worn());
    if !any_worn {
        quality_flags.push(QualityFlag::NoWearDetected);
    }

    info!(
        start = %stream.start,
        days = days.len(),
        minutes = reduced.minutes.len(),
        "processed recording"
    );

    Ok(ProcessedRecording {
        start: stream.start,
        sample_rate_hz: stream.sample_rate_hz,
        calibrated: corrected.is_some(),
        reduced,
        days,
        quality_flags,
    })
}

fn check_same_timeline(raw: &SampleStream, corrected: &SampleStream) -> Result<(), ComputeError> {
    if raw.start != corrected.start
        || raw.sample_rate_hz != corrected.sample_rate_hz
        || raw.len() != corrected.len()
    {
        return Err(ComputeError::TimelineMismatch {
            counts_start: raw.start,
            enmo_start: corrected.start,
            detail: format!(
                "calibration changed the stream shape ({} samples at {} Hz to {} at {} Hz)",
                raw.len(),
                raw.sample_rate_hz,
                corrected.len(),
                corrected.sample_rate_hz
            ),
        });
    }
    Ok(())
}

/// Processor bound to one validated configuration.
///
/// Use this when several recordings share the same settings.
pub struct ActivityProcessor {
    config: PipelineConfig,
    encoder: ReportEncoder,
}

impl ActivityProcessor {
    /// Create a processor, rejecting an invalid configuration up front
    pub fn new(config: PipelineConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a recording, calibrating with the configured coefficients when enabled
    pub fn process(
        &self,
        provider: &dyn SampleProvider,
        counts: &dyn CountGenerator,
    ) -> Result<ProcessedRecording, ComputeError> {
        if self.config.calibration.enabled {
            let calibrator = LinearCalibration::from_config(&self.config.calibration);
            process_recording(provider, counts, &calibrator, &self.config)
        } else {
            process_recording(provider, counts, &NoCalibration, &self.config)
        }
    }

    /// Process a recording and encode the JSON report
    pub fn process_to_json(
        &self,
        provider: &dyn SampleProvider,
        counts: &dyn CountGenerator,
        source: &str,
    ) -> Result<(ProcessedRecording, String), ComputeError> {
        let recording = self.process(provider, counts)?;
        let json = self.encoder.encode_to_json(&recording, source)?;
        Ok((recording, json))
    }

    /// Daily summaries for an existing minute table
    pub fn summarize(
        &self,
        minutes: &EpochSeries<MinuteRecord>,
    ) -> Result<Vec<DailySummary>, ComputeError> {
        DailyAggregator::aggregate(minutes, &self.config.daily)
    }
}
