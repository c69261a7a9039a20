//! Daily aggregation
//!
//! Buckets the combined 60 s table by calendar day and reports wear time and
//! minutes per intensity band. Bands only count minutes the matching wear
//! algorithm reports as worn: Choi for counts, van Hees for ENMO.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use tracing::debug;

use crate::config::{Cutpoints, DailyConfig};
use crate::error::ComputeError;
use crate::types::{DailySummary, EpochSeries, IntensityBands, MinuteRecord, COUNT_EPOCH_SECS};

/// Count-based bands: `(c0, c1]`, `(c1, c2]`, `> c1`, `> c2`
pub fn classify_counts(values: &[f64], cutpoints: &Cutpoints) -> IntensityBands {
    let (c0, c1, c2) = (cutpoints.low(), cutpoints.moderate(), cutpoints.vigorous());
    let count = |pred: &dyn Fn(f64) -> bool| values.iter().filter(|&&x| pred(x)).count() as u32;

    IntensityBands {
        lpa: count(&|x| x > c0 && x <= c1),
        mpa: count(&|x| x > c1 && x <= c2),
        mvpa: count(&|x| x > c1),
        vpa: count(&|x| x > c2),
    }
}

/// ENMO bands: `(c0, c1)`, `(c1, c2)`, `>= c1`, `>= c2`.
///
/// The upper cutpoints are inclusive here, unlike `classify_counts`; a value
/// exactly on `c1` is moderate-to-vigorous without being light or moderate.
pub fn classify_enmo(values: &[f64], cutpoints: &Cutpoints) -> IntensityBands {
    let (c0, c1, c2) = (cutpoints.low(), cutpoints.moderate(), cutpoints.vigorous());
    let count = |pred: &dyn Fn(f64) -> bool| values.iter().filter(|&&x| pred(x)).count() as u32;

    IntensityBands {
        lpa: count(&|x| x > c0 && x < c1),
        mpa: count(&|x| x > c1 && x < c2),
        mvpa: count(&|x| x >= c1),
        vpa: count(&|x| x >= c2),
    }
}

#[derive(Debug, Default)]
struct DayAccumulator {
    weartime_choi: u32,
    weartime_vanhees: u32,
    weartime_choi_waking: u32,
    weartime_vanhees_waking: u32,
    /// Vector magnitude counts of Choi-worn minutes
    worn_counts_vm: Vec<f64>,
    /// ENMO of van Hees-worn minutes
    worn_enmo: Vec<f64>,
}

impl DayAccumulator {
    fn add(&mut self, record: &MinuteRecord, waking: bool) {
        if record.wear_choi.is_worn() {
            self.weartime_choi += 1;
            if waking {
                self.weartime_choi_waking += 1;
            }
            self.worn_counts_vm.push(record.counts.vm);
        }
        if record.wear_vanhees.is_worn() {
            self.weartime_vanhees += 1;
            if waking {
                self.weartime_vanhees_waking += 1;
            }
            self.worn_enmo.push(record.enmo);
        }
    }

    fn finish(self, date: NaiveDate, config: &DailyConfig) -> DailySummary {
        DailySummary {
            date,
            weartime_choi: self.weartime_choi,
            weartime_vanhees: self.weartime_vanhees,
            weartime_choi_waking: self.weartime_choi_waking,
            weartime_vanhees_waking: self.weartime_vanhees_waking,
            counts_bands: config
                .counts_cutpoints
                .as_ref()
                .map(|c| classify_counts(&self.worn_counts_vm, c)),
            enmo_bands: config
                .enmo_cutpoints
                .as_ref()
                .map(|c| classify_enmo(&self.worn_enmo, c)),
        }
    }
}

/// Aggregator producing one summary per calendar day
pub struct DailyAggregator;

impl DailyAggregator {
    /// Summarize every calendar day present in the minute table, in date order
    pub fn aggregate(
        minutes: &EpochSeries<MinuteRecord>,
        config: &DailyConfig,
    ) -> Result<Vec<DailySummary>, ComputeError> {
        config.validate()?;
        if minutes.epoch_secs != COUNT_EPOCH_SECS {
            return Err(ComputeError::Configuration(format!(
                "daily aggregation needs {COUNT_EPOCH_SECS} s rows, got {} s",
                minutes.epoch_secs
            )));
        }

        let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
        for (timestamp, record) in minutes.iter_timestamped() {
            let waking = config.waking_hours.contains(timestamp.hour());
            days.entry(timestamp.date())
                .or_default()
                .add(record, waking);
        }

        debug!(days = days.len(), minutes = minutes.len(), "aggregated days");

        Ok(days
            .into_iter()
            .map(|(date, day)| day.finish(date, config))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WakingHours;
    use crate::types::{CountEpoch, Wear};
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn minute(vm: f64, enmo: f64, wear_choi: Wear, wear_vanhees: Wear) -> MinuteRecord {
        MinuteRecord {
            counts: CountEpoch::from_axes(vm, 0.0, 0.0),
            wear_choi,
            enmo,
            wear_vanhees,
        }
    }

    #[test]
    fn test_count_band_boundaries() {
        let cutpoints = Cutpoints::new([100.0, 2000.0, 6000.0]).unwrap();
        let bands = classify_counts(&[100.0, 100.5, 2000.0, 2000.5, 6000.0, 6000.5], &cutpoints);
        assert_eq!(
            bands,
            IntensityBands {
                lpa: 2,
                mpa: 2,
                mvpa: 3,
                vpa: 1,
            }
        );
    }

    #[test]
    fn test_enmo_band_boundaries_are_inclusive_above() {
        let cutpoints = Cutpoints::new([30.0, 100.0, 400.0]).unwrap();
        let bands = classify_enmo(&[30.0, 50.0, 100.0, 150.0, 400.0, 450.0], &cutpoints);
        assert_eq!(
            bands,
            IntensityBands {
                lpa: 1,
                mpa: 1,
                mvpa: 4,
                vpa: 2,
            }
        );
    }

    #[test]
    fn test_days_and_waking_hours() {
        // 23:58 on day 1 through 00:02 on day 2, plus waking minutes on day 2
        let mut rows = vec![minute(0.0, 0.0, Wear::Worn, Wear::Worn); 4];
        rows[1].wear_vanhees = Wear::NotWorn;
        let series = EpochSeries::new(at(1, 23, 58), 60, rows);

        let summaries = DailyAggregator::aggregate(&series, &DailyConfig::default()).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].date, at(1, 0, 0).date());
        assert_eq!(summaries[0].weartime_choi, 2);
        assert_eq!(summaries[0].weartime_vanhees, 1);
        assert_eq!(summaries[0].weartime_choi_waking, 0);
        assert_eq!(summaries[1].weartime_choi, 2);
        assert!(summaries[1].counts_bands.is_none());
        assert!(summaries[1].enmo_bands.is_none());
    }

    #[test]
    fn test_bands_only_count_worn_minutes() {
        let rows = vec![
            minute(3000.0, 150.0, Wear::Worn, Wear::Worn),
            minute(3000.0, 150.0, Wear::NotWorn, Wear::Worn),
            minute(3000.0, 150.0, Wear::Worn, Wear::NotWorn),
        ];
        let series = EpochSeries::new(at(3, 10, 0), 60, rows);
        let config = DailyConfig {
            counts_cutpoints: Some(Cutpoints::new([100.0, 2690.0, 6167.0]).unwrap()),
            enmo_cutpoints: Some(Cutpoints::new([30.0, 100.0, 400.0]).unwrap()),
            waking_hours: WakingHours::default(),
        };

        let summaries = DailyAggregator::aggregate(&series, &config).unwrap();
        let day = &summaries[0];
        assert_eq!(day.weartime_choi_waking, 2);
        assert_eq!(day.counts_bands.unwrap().mpa, 2);
        assert_eq!(day.enmo_bands.unwrap().mpa, 2);
        assert_eq!(day.enmo_bands.unwrap().lpa, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_aggregation() {
        let series = EpochSeries::new(at(3, 10, 0), 60, vec![]);
        let config = DailyConfig {
            counts_cutpoints: Some(Cutpoints([5.0, 1.0, 0.0])),
            ..Default::default()
        };
        assert!(matches!(
            DailyAggregator::aggregate(&series, &config),
            Err(ComputeError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_non_minute_rows() {
        let series = EpochSeries::new(at(3, 10, 0), 10, vec![]);
        assert!(DailyAggregator::aggregate(&series, &DailyConfig::default()).is_err());
    }
}
