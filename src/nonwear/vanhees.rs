//! Raw-signal non-wear detection (van Hees et al. 2013)
//!
//! A window of raw samples is non-wear when enough axes are nearly still:
//! standard deviation below `std_threshold_mg`, or peak-to-peak range below
//! `range_threshold_mg`. Windows slide by `overlap_minutes`; a trailing
//! partial window is never evaluated.

use tracing::debug;

use crate::config::{OverlapPolicy, VanHeesConfig};
use crate::error::ComputeError;
use crate::types::{Axis, Triaxial, Wear};

/// Spread of one axis within a window, in g
#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisSpread {
    std: f64,
    range: f64,
}

fn axis_spread(window: &[Triaxial], axis: Axis) -> AxisSpread {
    let len = window.len() as f64;
    let mean = window.iter().map(|s| s.axis(axis) as f64).sum::<f64>() / len;

    let mut sum_sq = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for sample in window {
        let value = sample.axis(axis) as f64;
        sum_sq += (value - mean) * (value - mean);
        min = min.min(value);
        max = max.max(value);
    }

    AxisSpread {
        std: (sum_sq / len).sqrt(),
        range: max - min,
    }
}

fn classify_window(window: &[Triaxial], config: &VanHeesConfig) -> Wear {
    let std_threshold = config.std_threshold_mg / 1000.0;
    let range_threshold = config.range_threshold_mg / 1000.0;

    let spreads = Axis::ALL.map(|axis| axis_spread(window, axis));
    let still_std = spreads.iter().filter(|s| s.std < std_threshold).count();
    let still_range = spreads.iter().filter(|s| s.range < range_threshold).count();

    if still_std >= config.std_min_axes || still_range >= config.range_min_axes {
        Wear::NotWorn
    } else {
        Wear::Worn
    }
}

/// Label every raw sample as worn or not worn.
///
/// Fails with `InsufficientData` when not even one full window fits, since
/// no sample could then be classified.
pub fn van_hees_nonwear(
    samples: &[Triaxial],
    sample_rate_hz: u32,
    config: &VanHeesConfig,
) -> Result<Vec<Wear>, ComputeError> {
    config.validate()?;
    if sample_rate_hz == 0 {
        return Err(ComputeError::Configuration(
            "sample rate must be at least 1 Hz".to_string(),
        ));
    }

    let per_minute = sample_rate_hz as usize * 60;
    let span = |minutes: usize| {
        minutes.checked_mul(per_minute).ok_or_else(|| {
            ComputeError::Configuration(format!(
                "{minutes} minutes at {sample_rate_hz} Hz overflows the sample index"
            ))
        })
    };
    let window_len = span(config.window_minutes)?;
    let step = span(config.overlap_minutes)?;
    let n = samples.len();

    if n < window_len {
        return Err(ComputeError::InsufficientData(format!(
            "{n} samples cannot form one {}-minute window ({window_len} samples at {sample_rate_hz} Hz)",
            config.window_minutes
        )));
    }

    let mut flags = vec![Wear::Worn; n];
    let mut windows = 0usize;
    let mut start = 0usize;
    while start + window_len <= n {
        let span = start..start + window_len;
        let verdict = classify_window(&samples[span.clone()], config);
        match (verdict, config.overlap_policy) {
            (Wear::NotWorn, _) => flags[span].fill(Wear::NotWorn),
            (Wear::Worn, OverlapPolicy::LastWriteWins) => flags[span].fill(Wear::Worn),
            (Wear::Worn, OverlapPolicy::UnionNonWear) => {}
        }
        windows += 1;
        start += step;
    }

    debug!(
        windows,
        unclassified_tail = n - (start - step + window_len),
        "van Hees scan complete"
    );
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HZ: u32 = 1;

    fn still(minutes: usize) -> Vec<Triaxial> {
        vec![Triaxial::new(1.0, 0.0, 0.0); minutes * 60]
    }

    fn moving(minutes: usize) -> Vec<Triaxial> {
        (0..minutes * 60)
            .map(|i| {
                let s = if i % 2 == 0 { 0.1 } else { -0.1 };
                Triaxial::new(1.0 + s, s, s)
            })
            .collect()
    }

    #[test]
    fn test_zero_variance_window_is_non_wear() {
        let flags = van_hees_nonwear(&still(60), HZ, &VanHeesConfig::default()).unwrap();
        assert!(flags.iter().all(|f| *f == Wear::NotWorn));
    }

    #[test]
    fn test_moving_window_is_worn() {
        let flags = van_hees_nonwear(&moving(60), HZ, &VanHeesConfig::default()).unwrap();
        assert!(flags.iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_too_short_stream_is_insufficient() {
        let result = van_hees_nonwear(&still(59), HZ, &VanHeesConfig::default());
        assert!(matches!(result, Err(ComputeError::InsufficientData(_))));
    }

    #[test]
    fn test_trailing_partial_window_stays_worn() {
        let flags = van_hees_nonwear(&still(70), HZ, &VanHeesConfig::default()).unwrap();
        assert!(flags[..3600].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[3600..].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_single_outlier_fails_std_criterion() {
        let mut samples = still(60);
        samples[1800] = Triaxial::new(1.1, 0.1, 0.1);
        // Range is 100 mg on every axis, but std stays under 3 mg
        let flags = van_hees_nonwear(&samples, HZ, &VanHeesConfig::default()).unwrap();
        assert!(flags.iter().all(|f| *f == Wear::NotWorn));
    }

    #[test]
    fn test_later_worn_window_overwrites_by_default() {
        let mut samples = still(60);
        samples.extend(moving(30));

        let flags = van_hees_nonwear(&samples, HZ, &VanHeesConfig::default()).unwrap();
        assert!(flags[..15 * 60].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[15 * 60..].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_union_policy_keeps_non_wear() {
        let mut samples = still(60);
        samples.extend(moving(30));
        let config = VanHeesConfig {
            overlap_policy: OverlapPolicy::UnionNonWear,
            ..Default::default()
        };

        let flags = van_hees_nonwear(&samples, HZ, &config).unwrap();
        assert!(flags[..60 * 60].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[60 * 60..].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_oversized_window_is_a_configuration_error() {
        let config = VanHeesConfig {
            window_minutes: 1_152_921_504_606_846_976,
            ..Default::default()
        };
        let result = van_hees_nonwear(&still(60), HZ, &config);
        assert!(matches!(result, Err(ComputeError::Configuration(_))));
    }

    #[test]
    fn test_window_scales_with_sample_rate() {
        let samples = vec![Triaxial::new(0.0, 0.0, 1.0); 30 * 60 * 60];
        let flags = van_hees_nonwear(&samples, 30, &VanHeesConfig::default()).unwrap();
        assert!(flags.iter().all(|f| *f == Wear::NotWorn));
        assert!(van_hees_nonwear(&samples[1..], 30, &VanHeesConfig::default()).is_err());
    }
}
