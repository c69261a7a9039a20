//! Signal reduction
//!
//! Produces the two parallel epoch series of a recording on one shared
//! timeline:
//! 1. count epochs (60 s) with the Choi wear flag
//! 2. per-sample ENMO with the van Hees wear flag
//! 3. native rate → 1 s: mean ENMO, minimum wear flag
//! 4. 1 s → 10 s and 60 s: mean ENMO, floored mean wear flag
//! 5. join of the 60 s ENMO and count series on the shared start time

use std::num::NonZeroUsize;

use tracing::{info, warn};

use crate::config::{ChoiConfig, VanHeesConfig};
use crate::error::ComputeError;
use crate::magnitude::{enmo_mg, vector_magnitude, MagnitudeOptions};
use crate::nonwear::{choi_wear_flags, van_hees_nonwear};
use crate::resample::{reduce_enmo, resample_series, Aggregation};
use crate::types::{
    CountEpoch, EnmoRecord, EpochSeries, MinuteRecord, QualityFlag, SampleStream, Wear,
    COUNT_EPOCH_SECS,
};

/// Output of the reducer for one recording
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedRecording {
    /// Combined 60 s table: counts, Choi wear, ENMO, van Hees wear
    pub minutes: EpochSeries<MinuteRecord>,
    /// 10 s ENMO table
    pub ten_seconds: EpochSeries<EnmoRecord>,
    pub quality_flags: Vec<QualityFlag>,
}

/// Reducer turning a sample stream and its counts into epoch tables
pub struct SignalReducer;

impl SignalReducer {
    /// Reduce one recording.
    ///
    /// `counts` are per-minute `[v, ml, ap]` rows anchored at `stream.start`.
    pub fn reduce(
        stream: &SampleStream,
        counts: &[[f64; 3]],
        choi: &ChoiConfig,
        van_hees: &VanHeesConfig,
    ) -> Result<ReducedRecording, ComputeError> {
        let hz = NonZeroUsize::new(stream.sample_rate_hz as usize).ok_or_else(|| {
            ComputeError::Configuration("sample rate must be at least 1 Hz".to_string())
        })?;
        let mut quality_flags = Vec::new();

        // Stage 1: count epochs
        let vm = vector_magnitude(counts, MagnitudeOptions::default());
        let epochs: Vec<CountEpoch> = counts
            .iter()
            .zip(vm)
            .map(|(&[v, ml, ap], vm)| CountEpoch { v, ml, ap, vm })
            .collect();
        if epochs.len() < choi.min_period_len {
            quality_flags.push(QualityFlag::InsufficientEpochs);
        }

        // Stages 1-2: the two wear scans share nothing and run side by side
        let (choi_flags, enmo_path) = rayon::join(
            || choi_wear_flags(&epochs, choi),
            || -> Result<(Vec<f64>, Vec<Wear>), ComputeError> {
                let flags = van_hees_nonwear(&stream.samples, stream.sample_rate_hz, van_hees)?;
                Ok((enmo_mg(stream), flags))
            },
        );
        let (enmo, van_hees_flags) = enmo_path?;

        // Stage 3: native rate to 1 Hz
        let seconds = EpochSeries::new(
            stream.start,
            1,
            reduce_enmo(&enmo, &van_hees_flags, hz, Aggregation::Min),
        );

        // Stage 4: 1 Hz to 10 s and 60 s
        let ten_seconds = resample_series(&seconds, 10)?;
        let enmo_minutes = resample_series(&seconds, COUNT_EPOCH_SECS)?;

        // Stage 5: join on the shared timeline
        let count_series = EpochSeries::new(stream.start, COUNT_EPOCH_SECS, epochs);
        let (minutes, trimmed) = join_minutes(&count_series, &choi_flags, &enmo_minutes)?;
        if trimmed {
            quality_flags.push(QualityFlag::TrailingPartialEpoch);
        }

        info!(
            minutes = minutes.len(),
            ten_second_rows = ten_seconds.len(),
            "reduced recording"
        );

        Ok(ReducedRecording {
            minutes,
            ten_seconds,
            quality_flags,
        })
    }
}

/// Join 60 s count and ENMO series row by row.
///
/// Both series must start at the same instant. Their lengths may differ by one
/// trailing partial minute, which is dropped; any larger difference is a
/// timeline mismatch. Returns whether a row was dropped.
pub fn join_minutes(
    counts: &EpochSeries<CountEpoch>,
    choi_flags: &[Wear],
    enmo: &EpochSeries<EnmoRecord>,
) -> Result<(EpochSeries<MinuteRecord>, bool), ComputeError> {
    let mismatch = |detail: String| ComputeError::TimelineMismatch {
        counts_start: counts.start,
        enmo_start: enmo.start,
        detail,
    };

    if counts.epoch_secs != COUNT_EPOCH_SECS || enmo.epoch_secs != COUNT_EPOCH_SECS {
        return Err(mismatch(format!(
            "expected {COUNT_EPOCH_SECS} s epochs, got {} s counts and {} s ENMO",
            counts.epoch_secs, enmo.epoch_secs
        )));
    }
    if counts.start != enmo.start {
        return Err(mismatch("series start at different instants".to_string()));
    }
    if choi_flags.len() != counts.len() {
        return Err(mismatch(format!(
            "{} Choi flags for {} count epochs",
            choi_flags.len(),
            counts.len()
        )));
    }

    let len = counts.len().min(enmo.len());
    let surplus = counts.len().max(enmo.len()) - len;
    if surplus > 1 {
        return Err(mismatch(format!(
            "{} count epochs against {} ENMO minutes",
            counts.len(),
            enmo.len()
        )));
    }
    if surplus == 1 {
        warn!(
            counts = counts.len(),
            enmo = enmo.len(),
            "dropping trailing partial minute at join"
        );
    }

    let rows = counts.rows[..len]
        .iter()
        .zip(&choi_flags[..len])
        .zip(&enmo.rows[..len])
        .map(|((count, &wear_choi), enmo_row)| MinuteRecord {
            counts: *count,
            wear_choi,
            enmo: enmo_row.enmo,
            wear_vanhees: enmo_row.wear_vanhees,
        })
        .collect();

    Ok((EpochSeries::new(counts.start, COUNT_EPOCH_SECS, rows), surplus == 1))
}
