//! Multi-resolution resampling
//!
//! Every resolution change is the same operation: split a column into
//! consecutive fixed-size buckets (`bucket = index / size`, integer division)
//! and reduce each bucket with one aggregation rule. A trailing partial bucket
//! is reduced over the values it has.

use std::num::NonZeroUsize;

use crate::error::ComputeError;
use crate::types::{EnmoRecord, EpochSeries, Wear};

/// Reduction applied to one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Min,
    /// Mean rounded down; for 0/1 flags this is 1 only when every value is 1
    FloorMean,
}

impl Aggregation {
    pub fn apply(self, bucket: &[f64]) -> f64 {
        match self {
            Aggregation::Mean => mean(bucket),
            Aggregation::Min => bucket.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::FloorMean => mean(bucket).floor(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Reduce `values` bucket by bucket
pub fn bucketize(values: &[f64], bucket_size: NonZeroUsize, rule: Aggregation) -> Vec<f64> {
    values
        .chunks(bucket_size.get())
        .map(|bucket| rule.apply(bucket))
        .collect()
}

/// Reduce parallel ENMO and wear columns: ENMO by mean, wear by `wear_rule`
pub fn reduce_enmo(
    enmo: &[f64],
    wear: &[Wear],
    bucket_size: NonZeroUsize,
    wear_rule: Aggregation,
) -> Vec<EnmoRecord> {
    let levels: Vec<f64> = wear.iter().map(|w| w.as_f64()).collect();
    bucketize(enmo, bucket_size, Aggregation::Mean)
        .into_iter()
        .zip(bucketize(&levels, bucket_size, wear_rule))
        .map(|(enmo, level)| EnmoRecord {
            enmo,
            wear_vanhees: Wear::from_level(level),
        })
        .collect()
}

/// Resample an ENMO series to a coarser epoch, keeping its start time.
///
/// Wear flags are averaged and floored, so a coarse epoch is worn only when
/// all of its sub-epochs are.
pub fn resample_series(
    series: &EpochSeries<EnmoRecord>,
    target_secs: u32,
) -> Result<EpochSeries<EnmoRecord>, ComputeError> {
    if series.epoch_secs == 0 || target_secs % series.epoch_secs != 0 {
        return Err(ComputeError::Configuration(format!(
            "cannot resample {} s epochs to {} s",
            series.epoch_secs, target_secs
        )));
    }
    let factor = NonZeroUsize::new((target_secs / series.epoch_secs) as usize).ok_or_else(|| {
        ComputeError::Configuration(format!("target epoch must be positive, got {target_secs} s"))
    })?;

    let enmo: Vec<f64> = series.rows.iter().map(|r| r.enmo).collect();
    let wear: Vec<Wear> = series.rows.iter().map(|r| r.wear_vanhees).collect();

    Ok(EpochSeries::new(
        series.start,
        target_secs,
        reduce_enmo(&enmo, &wear, factor, Aggregation::FloorMean),
    ))
}
