//! Output encoding
//!
//! Writes the epoch tables and daily summaries as CSV, reads a minute table
//! back for a separate daily pass, and builds the JSON report payload.

use std::io::{Read, Write};

use chrono::{Duration, NaiveDateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;
use crate::pipeline::ProcessedRecording;
use crate::types::{
    ActivityReport, CountEpoch, DailySummary, EnmoRecord, EpochSeries, IntensityBands,
    MinuteRecord, ReportProducer, ReportProvenance, ReportQuality, Wear, COUNT_EPOCH_SECS,
};
use crate::{FLUX_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Timestamp layout used in every table
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize, Deserialize)]
struct MinuteRow {
    timestamp: String,
    counts_v: f64,
    counts_ml: f64,
    counts_ap: f64,
    counts_vm: f64,
    wear_choi: Wear,
    enmo: f64,
    wear_vanhees: Wear,
}

#[derive(Debug, Serialize)]
struct TenSecondRow {
    timestamp: String,
    enmo: f64,
    wear_vanhees: Wear,
}

/// Parse a table or command-line timestamp, with or without the `T` separator
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ComputeError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| ComputeError::DateParseError(format!("{raw}: {e}")))
}

/// Write the combined 60 s table
pub fn write_minute_table<W: Write>(
    writer: W,
    table: &EpochSeries<MinuteRecord>,
) -> Result<(), ComputeError> {
    let mut csv = WriterBuilder::new().from_writer(writer);
    for (timestamp, record) in table.iter_timestamped() {
        csv.serialize(MinuteRow {
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            counts_v: record.counts.v,
            counts_ml: record.counts.ml,
            counts_ap: record.counts.ap,
            counts_vm: record.counts.vm,
            wear_choi: record.wear_choi,
            enmo: record.enmo,
            wear_vanhees: record.wear_vanhees,
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the 10 s ENMO table
pub fn write_ten_second_table<W: Write>(
    writer: W,
    table: &EpochSeries<EnmoRecord>,
) -> Result<(), ComputeError> {
    let mut csv = WriterBuilder::new().from_writer(writer);
    for (timestamp, record) in table.iter_timestamped() {
        csv.serialize(TenSecondRow {
            timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
            enmo: record.enmo,
            wear_vanhees: record.wear_vanhees,
        })?;
    }
    csv.flush()?;
    Ok(())
}

/// Read a minute table written by [`write_minute_table`].
///
/// Rows must be consecutive minutes; any gap or reordering is rejected.
pub fn read_minute_table<R: Read>(reader: R) -> Result<EpochSeries<MinuteRecord>, ComputeError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut start: Option<NaiveDateTime> = None;
    let mut rows = Vec::new();
    for (row_idx, result) in csv.deserialize::<MinuteRow>().enumerate() {
        let row = result.map_err(|e| {
            ComputeError::ParseError(format!("minute row {}: {}", row_idx + 1, e))
        })?;
        let timestamp = parse_timestamp(&row.timestamp)?;
        let origin = *start.get_or_insert(timestamp);
        let expected = origin + Duration::seconds(row_idx as i64 * COUNT_EPOCH_SECS as i64);
        if timestamp != expected {
            return Err(ComputeError::ParseError(format!(
                "minute row {}: expected {expected}, found {timestamp}",
                row_idx + 1
            )));
        }

        rows.push(MinuteRecord {
            counts: CountEpoch {
                v: row.counts_v,
                ml: row.counts_ml,
                ap: row.counts_ap,
                vm: row.counts_vm,
            },
            wear_choi: row.wear_choi,
            enmo: row.enmo,
            wear_vanhees: row.wear_vanhees,
        });
    }

    let start =
        start.ok_or_else(|| ComputeError::InsufficientData("minute table has no rows".to_string()))?;
    Ok(EpochSeries::new(start, COUNT_EPOCH_SECS, rows))
}

fn band_fields(bands: &IntensityBands) -> [String; 4] {
    [bands.lpa, bands.mpa, bands.mvpa, bands.vpa].map(|m| m.to_string())
}

/// Write one row per day; band columns appear only for metrics that have them
pub fn write_daily_table<W: Write>(
    writer: W,
    summaries: &[DailySummary],
) -> Result<(), ComputeError> {
    let with_counts = summaries.iter().any(|d| d.counts_bands.is_some());
    let with_enmo = summaries.iter().any(|d| d.enmo_bands.is_some());

    let mut header = vec![
        "date",
        "weartime_choi",
        "weartime_vanhees",
        "weartime_choi_waking",
        "weartime_vanhees_waking",
    ];
    if with_counts {
        header.extend(["lpa_counts", "mpa_counts", "mvpa_counts", "vpa_counts"]);
    }
    if with_enmo {
        header.extend(["lpa_enmo", "mpa_enmo", "mvpa_enmo", "vpa_enmo"]);
    }

    let mut csv = WriterBuilder::new().from_writer(writer);
    csv.write_record(&header)?;
    for day in summaries {
        let mut record = vec![
            day.date.format("%Y-%m-%d").to_string(),
            day.weartime_choi.to_string(),
            day.weartime_vanhees.to_string(),
            day.weartime_choi_waking.to_string(),
            day.weartime_vanhees_waking.to_string(),
        ];
        if with_counts {
            record.extend(band_fields(&day.counts_bands.unwrap_or_default()));
        }
        if with_enmo {
            record.extend(band_fields(&day.enmo_bands.unwrap_or_default()));
        }
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Report encoder for producing JSON payloads
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Encode a processed recording into a report
    pub fn encode(&self, recording: &ProcessedRecording, source: &str) -> ActivityReport {
        let minutes = &recording.reduced.minutes.rows;

        ActivityReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                source: source.to_string(),
                start: recording.start,
                sample_rate_hz: recording.sample_rate_hz,
                calibrated: recording.calibrated,
                computed_at_utc: Utc::now().to_rfc3339(),
            },
            quality: ReportQuality {
                minutes: minutes.len(),
                worn_minutes_choi: minutes.iter().filter(|m| m.wear_choi.is_worn()).count(),
                worn_minutes_vanhees: minutes.iter().filter(|m| m.wear_vanhees.is_worn()).count(),
                flags: recording.quality_flags.clone(),
            },
            days: recording.days.clone(),
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        recording: &ProcessedRecording,
        source: &str,
    ) -> Result<String, ComputeError> {
        let report = self.encode(recording, source);
        serde_json::to_string_pretty(&report).map_err(ComputeError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    }

    fn table() -> EpochSeries<MinuteRecord> {
        EpochSeries::new(
            start(),
            60,
            vec![
                MinuteRecord {
                    counts: CountEpoch::from_axes(3.0, 4.0, 0.0),
                    wear_choi: Wear::Worn,
                    enmo: 21.25,
                    wear_vanhees: Wear::NotWorn,
                },
                MinuteRecord {
                    counts: CountEpoch::from_axes(0.0, 0.0, 0.0),
                    wear_choi: Wear::NotWorn,
                    enmo: 0.0,
                    wear_vanhees: Wear::Worn,
                },
            ],
        )
    }

    #[test]
    fn test_minute_table_reads_back() {
        let mut buffer = Vec::new();
        write_minute_table(&mut buffer, &table()).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with(
            "timestamp,counts_v,counts_ml,counts_ap,counts_vm,wear_choi,enmo,wear_vanhees\n"
        ));
        assert!(text.contains("2024-06-01 07:31:00"));

        let parsed = read_minute_table(buffer.as_slice()).unwrap();
        assert_eq!(parsed, table());
    }

    #[test]
    fn test_minute_table_gap_is_rejected() {
        let csv = "timestamp,counts_v,counts_ml,counts_ap,counts_vm,wear_choi,enmo,wear_vanhees\n\
                   2024-06-01 07:30:00,0,0,0,0,1,0,1\n\
                   2024-06-01 07:32:00,0,0,0,0,1,0,1\n";
        assert!(read_minute_table(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_daily_table_omits_missing_bands() {
        let day = DailySummary {
            date: start().date(),
            weartime_choi: 600,
            weartime_vanhees: 580,
            weartime_choi_waking: 590,
            weartime_vanhees_waking: 570,
            counts_bands: None,
            enmo_bands: Some(IntensityBands {
                lpa: 120,
                mpa: 30,
                mvpa: 35,
                vpa: 5,
            }),
        };
        let mut buffer = Vec::new();
        write_daily_table(&mut buffer, &[day]).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "date,weartime_choi,weartime_vanhees,weartime_choi_waking,weartime_vanhees_waking,\
             lpa_enmo,mpa_enmo,mvpa_enmo,vpa_enmo\n\
             2024-06-01,600,580,590,570,120,30,35,5\n"
        );
    }

    #[test]
    fn test_ten_second_table_layout() {
        let series = EpochSeries::new(
            start(),
            10,
            vec![
                EnmoRecord {
                    enmo: 4.5,
                    wear_vanhees: Wear::Worn
                };
                2
            ],
        );
        let mut buffer = Vec::new();
        write_ten_second_table(&mut buffer, &series).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "timestamp,enmo,wear_vanhees\n2024-06-01 07:30:00,4.5,1\n2024-06-01 07:30:10,4.5,1\n"
        );
    }

    #[test]
    fn test_report_counts_worn_minutes() {
        let recording = ProcessedRecording {
            start: start(),
            sample_rate_hz: 30,
            calibrated: true,
            reduced: crate::reducer::ReducedRecording {
                minutes: table(),
                ten_seconds: EpochSeries::new(start(), 10, vec![]),
                quality_flags: vec![],
            },
            days: vec![],
            quality_flags: vec![crate::types::QualityFlag::TrailingPartialEpoch],
        };
        let encoder = ReportEncoder::with_instance_id("bench-7".to_string());
        let report = encoder.encode(&recording, "wrist.csv");

        assert_eq!(report.report_version, REPORT_VERSION);
        assert_eq!(report.producer.instance_id, "bench-7");
        assert!(report.provenance.calibrated);
        assert_eq!(report.quality.minutes, 2);
        assert_eq!(report.quality.worn_minutes_choi, 1);
        assert_eq!(report.quality.worn_minutes_vanhees, 1);

        let json = encoder.encode_to_json(&recording, "wrist.csv").unwrap();
        assert!(json.contains("\"trailing_partial_epoch\""));
    }
}
