//! Pipeline configuration
//!
//! Every effect-bearing knob of the pipeline lives here: the two wear
//! algorithms, calibration, cutpoints and the waking-hours window.
//! Configs deserialize from JSON with per-field defaults and are validated
//! once, before any processing starts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;
use crate::types::Axis;

/// Which count channel feeds the Choi state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChoiChannel {
    Vertical,
    Mediolateral,
    AnteriorPosterior,
    VectorMagnitude,
    /// Run each axis separately; an epoch is worn only if all three agree
    AllAxes,
}

impl ChoiChannel {
    pub fn axis(&self) -> Option<Axis> {
        match self {
            ChoiChannel::Vertical => Some(Axis::Vertical),
            ChoiChannel::Mediolateral => Some(Axis::Mediolateral),
            ChoiChannel::AnteriorPosterior => Some(Axis::AnteriorPosterior),
            ChoiChannel::VectorMagnitude | ChoiChannel::AllAxes => None,
        }
    }
}

/// Parameters of the count-based (Choi 2011) non-wear algorithm.
///
/// All lengths are in 60 second epochs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiConfig {
    /// Counts at or below this value are treated as "zero"
    pub activity_threshold: f64,
    /// Shortest candidate run that is committed as non-wear
    pub min_period_len: usize,
    /// Consecutive spikes allowed inside a run; one more ends it
    pub spike_tolerance: usize,
    /// Length of the upstream/downstream windows checked around a spike
    pub min_window_len: usize,
    /// Non-zero epochs tolerated inside either surrounding window
    pub window_spike_tolerance: usize,
    pub channel: ChoiChannel,
}

impl Default for ChoiConfig {
    fn default() -> Self {
        Self {
            activity_threshold: 0.0,
            min_period_len: 90,
            spike_tolerance: 2,
            min_window_len: 30,
            window_spike_tolerance: 0,
            channel: ChoiChannel::AllAxes,
        }
    }
}

/// Longest epoch span any Choi length setting may take: one week of minutes
pub const MAX_CHOI_EPOCHS: usize = 7 * 24 * 60;

/// Longest van Hees window or step: one day
pub const MAX_VAN_HEES_MINUTES: usize = 24 * 60;

impl ChoiConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        let lengths = [
            ("min_period_len", self.min_period_len),
            ("spike_tolerance", self.spike_tolerance),
            ("min_window_len", self.min_window_len),
            ("window_spike_tolerance", self.window_spike_tolerance),
        ];
        if let Some((name, value)) = lengths.iter().find(|(_, v)| *v > MAX_CHOI_EPOCHS) {
            return Err(ComputeError::Configuration(format!(
                "choi.{name} must be at most {MAX_CHOI_EPOCHS} epochs, got {value}"
            )));
        }
        if self.min_period_len == 0 {
            return Err(ComputeError::Configuration(
                "choi.min_period_len must be at least 1".to_string(),
            ));
        }
        if !self.activity_threshold.is_finite() || self.activity_threshold < 0.0 {
            return Err(ComputeError::Configuration(format!(
                "choi.activity_threshold must be a non-negative number, got {}",
                self.activity_threshold
            )));
        }
        Ok(())
    }
}

/// How overlapping van Hees windows combine at shared samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Each window writes its verdict over its whole span, in scan order
    LastWriteWins,
    /// Windows only ever write non-wear; once non-wear, always non-wear
    UnionNonWear,
}

/// Parameters of the raw-signal (van Hees 2013) non-wear algorithm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VanHeesConfig {
    /// Window length in minutes
    pub window_minutes: usize,
    /// Step between window starts in minutes
    pub overlap_minutes: usize,
    pub std_threshold_mg: f64,
    pub std_min_axes: usize,
    pub range_threshold_mg: f64,
    pub range_min_axes: usize,
    pub overlap_policy: OverlapPolicy,
}

impl Default for VanHeesConfig {
    fn default() -> Self {
        Self {
            window_minutes: 60,
            overlap_minutes: 15,
            std_threshold_mg: 3.0,
            std_min_axes: 2,
            range_threshold_mg: 50.0,
            range_min_axes: 2,
            overlap_policy: OverlapPolicy::LastWriteWins,
        }
    }
}

impl VanHeesConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.window_minutes == 0 || self.overlap_minutes == 0 {
            return Err(ComputeError::Configuration(format!(
                "van_hees window ({}) and overlap ({}) must both be at least one minute",
                self.window_minutes, self.overlap_minutes
            )));
        }
        if self.window_minutes > MAX_VAN_HEES_MINUTES || self.overlap_minutes > MAX_VAN_HEES_MINUTES {
            return Err(ComputeError::Configuration(format!(
                "van_hees window ({}) and overlap ({}) must be at most {MAX_VAN_HEES_MINUTES} minutes",
                self.window_minutes, self.overlap_minutes
            )));
        }
        if self.std_min_axes > 3 || self.range_min_axes > 3 {
            return Err(ComputeError::Configuration(
                "van_hees axis counts cannot exceed 3".to_string(),
            ));
        }
        Ok(())
    }
}

/// Three ascending thresholds delimiting light, moderate and vigorous activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutpoints(pub [f64; 3]);

impl Cutpoints {
    pub fn new(values: [f64; 3]) -> Result<Self, ComputeError> {
        let cutpoints = Self(values);
        cutpoints.validate()?;
        Ok(cutpoints)
    }

    /// Build from a user-supplied list, which must hold exactly three values
    pub fn from_slice(values: &[f64]) -> Result<Self, ComputeError> {
        let array: [f64; 3] = values.try_into().map_err(|_| {
            ComputeError::Configuration(format!(
                "cutpoints need exactly 3 values, got {}",
                values.len()
            ))
        })?;
        Self::new(array)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        let [c0, c1, c2] = self.0;
        if [c0, c1, c2].iter().any(|c| !c.is_finite()) || !(c0 < c1 && c1 < c2) {
            return Err(ComputeError::Configuration(format!(
                "cutpoints must be strictly ascending, got [{c0}, {c1}, {c2}]"
            )));
        }
        Ok(())
    }

    pub fn low(&self) -> f64 {
        self.0[0]
    }

    pub fn moderate(&self) -> f64 {
        self.0[1]
    }

    pub fn vigorous(&self) -> f64 {
        self.0[2]
    }
}

/// Half-open hour window `[start_hour, end_hour)` counted as waking time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WakingHours {
    fn default() -> Self {
        Self {
            start_hour: 7,
            end_hour: 22,
        }
    }
}

impl WakingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Result<Self, ComputeError> {
        let hours = Self {
            start_hour,
            end_hour,
        };
        hours.validate()?;
        Ok(hours)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.start_hour >= 24 || self.end_hour >= 24 {
            return Err(ComputeError::Configuration(format!(
                "waking hours must lie in [0, 24), got [{}, {})",
                self.start_hour, self.end_hour
            )));
        }
        if self.start_hour >= self.end_hour {
            return Err(ComputeError::Configuration(format!(
                "waking hours start ({}) must precede end ({})",
                self.start_hour, self.end_hour
            )));
        }
        Ok(())
    }

    pub fn contains(&self, hour: u32) -> bool {
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Settings for daily aggregation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyConfig {
    pub counts_cutpoints: Option<Cutpoints>,
    pub enmo_cutpoints: Option<Cutpoints>,
    pub waking_hours: WakingHours,
}

impl DailyConfig {
    pub fn validate(&self) -> Result<(), ComputeError> {
        if let Some(cutpoints) = &self.counts_cutpoints {
            cutpoints.validate()?;
        }
        if let Some(cutpoints) = &self.enmo_cutpoints {
            cutpoints.validate()?;
        }
        self.waking_hours.validate()
    }
}

/// Externally estimated calibration coefficients, applied as `(x + offset) * scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub enabled: bool,
    pub offset: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            offset: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

/// Full configuration of one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Sampling frequency of the raw stream
    pub sampling_hz: u32,
    pub calibration: CalibrationConfig,
    pub choi: ChoiConfig,
    pub van_hees: VanHeesConfig,
    pub daily: DailyConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_hz: 30,
            calibration: CalibrationConfig::default(),
            choi: ChoiConfig::default(),
            van_hees: VanHeesConfig::default(),
            daily: DailyConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.sampling_hz == 0 {
            return Err(ComputeError::Configuration(
                "sampling_hz must be at least 1".to_string(),
            ));
        }
        self.choi.validate()?;
        self.van_hees.validate()?;
        self.daily.validate()
    }
}
