//! Count-based non-wear detection (Choi et al. 2011)
//!
//! A non-wear run is a stretch of "zero" count epochs at least
//! `min_period_len` long. Up to `spike_tolerance` consecutive spikes are
//! allowed inside a run as long as the upstream and downstream windows around
//! each spike are free of activity.

use tracing::{debug, warn};

use crate::config::{ChoiChannel, ChoiConfig};
use crate::types::{Axis, CountEpoch, Wear};

/// Scan cursor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Not inside a candidate run
    Idle,
    /// Inside a run that began at `start`, with `spikes` consecutive spikes so far
    Accumulating { start: usize, spikes: usize },
}

/// Label every epoch of a single count channel.
///
/// Runs shorter than `min_period_len` are discarded; a series shorter than
/// that can never commit a run and is reported with a warning only.
pub fn choi_nonwear(counts: &[f64], config: &ChoiConfig) -> Vec<Wear> {
    let n = counts.len();
    let mut flags = vec![Wear::Worn; n];

    if n < config.min_period_len {
        warn!(
            epochs = n,
            min_period_len = config.min_period_len,
            "count series shorter than the minimum non-wear period"
        );
    }

    let mut state = ScanState::Idle;
    for (i, &count) in counts.iter().enumerate() {
        let (start, spikes) = match state {
            ScanState::Idle if count <= config.activity_threshold => (i, 0),
            ScanState::Idle => continue,
            ScanState::Accumulating { start, spikes } => (start, spikes),
        };

        let spikes = if count > config.activity_threshold {
            spikes + 1
        } else {
            0
        };
        let spike_limit = spikes > config.spike_tolerance;
        let window_invalid = count > 0.0 && has_surrounding_activity(counts, i, config);
        let series_end = i + 1 == n;

        state = if spike_limit || window_invalid || series_end {
            // A run closed by activity stops before the closing epoch; a run
            // that reaches the end of the data covers it.
            let end = if spike_limit || window_invalid { i } else { n };
            if end - start >= config.min_period_len {
                debug!(start, end, "committing non-wear run");
                flags[start..end].fill(Wear::NotWorn);
            }
            ScanState::Idle
        } else {
            ScanState::Accumulating { start, spikes }
        };
    }

    flags
}

/// True when the window after or before a spike holds too many non-zero epochs.
///
/// Upstream is `[i + spike_tolerance, i + min_window_len]`, downstream is
/// `[i - min_window_len, i - 1)`; both skip the epochs adjacent to the spike.
fn has_surrounding_activity(counts: &[f64], i: usize, config: &ChoiConfig) -> bool {
    let n = counts.len();

    let up_start = i.saturating_add(config.spike_tolerance).min(n);
    let up_end = i
        .saturating_add(config.min_window_len)
        .saturating_add(1)
        .min(n)
        .max(up_start);
    let down_start = i.saturating_sub(config.min_window_len);
    let down_end = i.saturating_sub(1).max(down_start);

    let active = |window: &[f64]| window.iter().filter(|&&c| c > 0.0).count();

    active(&counts[up_start..up_end]) > config.window_spike_tolerance
        || active(&counts[down_start..down_end]) > config.window_spike_tolerance
}

/// Label a count-epoch series using the channel selected in the config
pub fn choi_wear_flags(epochs: &[CountEpoch], config: &ChoiConfig) -> Vec<Wear> {
    match config.channel {
        ChoiChannel::VectorMagnitude => {
            let channel: Vec<f64> = epochs.iter().map(|e| e.vm).collect();
            choi_nonwear(&channel, config)
        }
        ChoiChannel::AllAxes => {
            let per_axis: Vec<Vec<Wear>> = Axis::ALL
                .iter()
                .map(|&axis| {
                    let flags = choi_nonwear(&axis_channel(epochs, axis), config);
                    debug!(
                        axis = axis.as_str(),
                        non_wear = flags.iter().filter(|f| !f.is_worn()).count(),
                        "choi axis scan"
                    );
                    flags
                })
                .collect();
            (0..epochs.len())
                .map(|i| {
                    if per_axis.iter().all(|flags| flags[i].is_worn()) {
                        Wear::Worn
                    } else {
                        Wear::NotWorn
                    }
                })
                .collect()
        }
        single => {
            let axis = single.axis().unwrap_or(Axis::Vertical);
            choi_nonwear(&axis_channel(epochs, axis), config)
        }
    }
}

fn axis_channel(epochs: &[CountEpoch], axis: Axis) -> Vec<f64> {
    epochs.iter().map(|e| e.axis(axis)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worn_count(flags: &[Wear]) -> usize {
        flags.iter().filter(|f| f.is_worn()).count()
    }

    fn series(parts: &[(f64, usize)]) -> Vec<f64> {
        parts
            .iter()
            .flat_map(|&(value, len)| std::iter::repeat(value).take(len))
            .collect()
    }

    #[test]
    fn test_run_of_exactly_min_period_is_non_wear() {
        let config = ChoiConfig::default();
        let counts = series(&[(0.0, 90), (500.0, 40)]);
        let flags = choi_nonwear(&counts, &config);

        assert!(flags[..90].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[90..].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_run_one_short_of_min_period_is_worn() {
        let config = ChoiConfig::default();
        let counts = series(&[(0.0, 89), (500.0, 40)]);
        let flags = choi_nonwear(&counts, &config);

        assert_eq!(worn_count(&flags), counts.len());
    }

    #[test]
    fn test_isolated_spike_does_not_break_run() {
        let config = ChoiConfig::default();
        let counts = series(&[(0.0, 50), (1.0, 1), (0.0, 50), (300.0, 20)]);
        let flags = choi_nonwear(&counts, &config);

        // The spike sits inside the committed run
        assert!(flags[..101].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[101..].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_three_consecutive_spikes_end_the_run() {
        let config = ChoiConfig {
            // Isolate the spike counter from the window check
            window_spike_tolerance: usize::MAX,
            ..Default::default()
        };
        let counts = series(&[(0.0, 100), (5.0, 3), (0.0, 100)]);
        let flags = choi_nonwear(&counts, &config);

        // Run ends at the third spike, which stays worn
        assert!(flags[..102].iter().all(|f| *f == Wear::NotWorn));
        assert!(flags[102].is_worn());
        // A fresh run starts after the spikes and reaches the end of data
        assert!(flags[103..].iter().all(|f| *f == Wear::NotWorn));
    }

    #[test]
    fn test_two_spikes_are_tolerated_without_window_check() {
        let config = ChoiConfig {
            window_spike_tolerance: usize::MAX,
            ..Default::default()
        };
        let counts = series(&[(0.0, 60), (5.0, 2), (0.0, 60)]);
        let flags = choi_nonwear(&counts, &config);

        assert_eq!(worn_count(&flags), 0);
    }

    #[test]
    fn test_spike_with_active_neighbourhood_invalidates_run() {
        let config = ChoiConfig::default();
        // Spike at 60 has activity 10 epochs later, inside its upstream window
        let counts = series(&[(0.0, 60), (4.0, 1), (0.0, 9), (4.0, 1), (0.0, 60)]);
        let flags = choi_nonwear(&counts, &config);

        // First candidate [0, 60) is too short and discarded
        assert!(flags[..61].iter().all(|f| f.is_worn()));
    }

    #[test]
    fn test_run_reaching_end_of_series_is_committed() {
        let config = ChoiConfig::default();
        let counts = series(&[(250.0, 10), (0.0, 120)]);
        let flags = choi_nonwear(&counts, &config);

        assert!(flags[..10].iter().all(|f| f.is_worn()));
        assert!(flags[10..].iter().all(|f| *f == Wear::NotWorn));
    }

    #[test]
    fn test_short_series_stays_worn() {
        let config = ChoiConfig::default();
        let flags = choi_nonwear(&vec![0.0; 45], &config);
        assert_eq!(worn_count(&flags), 45);
    }

    #[test]
    fn test_huge_window_lengths_clamp_to_series() {
        let config = ChoiConfig {
            spike_tolerance: usize::MAX,
            min_window_len: usize::MAX,
            ..Default::default()
        };
        let counts = series(&[(0.0, 100), (50.0, 1), (0.0, 100)]);
        let flags = choi_nonwear(&counts, &config);

        assert_eq!(flags.len(), 201);
        assert_eq!(worn_count(&flags), 0);
    }

    #[test]
    fn test_activity_threshold_treats_low_counts_as_zero() {
        let config = ChoiConfig {
            activity_threshold: 10.0,
            window_spike_tolerance: usize::MAX,
            ..Default::default()
        };
        let counts = series(&[(7.0, 95), (800.0, 5)]);
        let flags = choi_nonwear(&counts, &config);

        assert!(flags[..95].iter().all(|f| *f == Wear::NotWorn));
    }

    #[test]
    fn test_all_axes_requires_every_axis_worn() {
        let config = ChoiConfig::default();
        let mut epochs: Vec<CountEpoch> = (0..200)
            .map(|_| CountEpoch::from_axes(400.0, 300.0, 200.0))
            .collect();
        // Only the anterior-posterior axis goes quiet for two hours
        for epoch in &mut epochs[40..160] {
            *epoch = CountEpoch::from_axes(400.0, 300.0, 0.0);
        }

        let all_axes = choi_wear_flags(&epochs, &config);
        assert!(all_axes[40..160].iter().all(|f| *f == Wear::NotWorn));
        assert!(all_axes[..40].iter().all(|f| f.is_worn()));

        let vm_config = ChoiConfig {
            channel: ChoiChannel::VectorMagnitude,
            ..Default::default()
        };
        let vm = choi_wear_flags(&epochs, &vm_config);
        assert_eq!(worn_count(&vm), 200);

        let v_config = ChoiConfig {
            channel: ChoiChannel::Vertical,
            ..Default::default()
        };
        assert_eq!(worn_count(&choi_wear_flags(&epochs, &v_config)), 200);
    }
}
