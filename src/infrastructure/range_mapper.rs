use crate::domain::models::{parse_hhmm, CoverageRange, TimeRange};
use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};

/// A range as exchanged with the schedule store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RangeRecord {
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct BusyTimeBatchRequest<'a> {
    pub busy_times: &'a [RangeRecord],
}

/// List endpoints answer either with a bare array or a paginated envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RangeListBody {
    Plain(Vec<RangeRecord>),
    Paginated { results: Vec<RangeRecord> },
}

impl RangeListBody {
    pub fn into_records(self) -> Vec<RangeRecord> {
        match self {
            Self::Plain(records) | Self::Paginated { results: records } => records,
        }
    }
}

pub fn encode_range(range: &TimeRange) -> RangeRecord {
    RangeRecord {
        day_of_week: range.day,
        start_time: range.start_time(),
        end_time: range.end_time(),
    }
}

pub fn decode_record(record: &RangeRecord) -> Result<CoverageRange, InfraError> {
    let start_minute = parse_hhmm(&record.start_time).ok_or_else(|| {
        InfraError::Fetch(format!("invalid start_time '{}'", record.start_time))
    })?;
    let end_minute = parse_hhmm(&record.end_time)
        .ok_or_else(|| InfraError::Fetch(format!("invalid end_time '{}'", record.end_time)))?;
    let coverage = CoverageRange {
        day: record.day_of_week,
        start_minute,
        end_minute,
    };
    coverage.validate().map_err(InfraError::Fetch)?;
    Ok(coverage)
}

/// Decodes what can be decoded; malformed records are logged and dropped.
pub fn decode_records(records: &[RangeRecord]) -> Vec<CoverageRange> {
    records
        .iter()
        .filter_map(|record| match decode_record(record) {
            Ok(coverage) => Some(coverage),
            Err(error) => {
                tracing::warn!(
                    day_of_week = record.day_of_week,
                    start_time = %record.start_time,
                    end_time = %record.end_time,
                    %error,
                    "skipping malformed coverage record"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_uses_end_of_day_sentinel() {
        let range = TimeRange::new(3, 46, 48).expect("valid range");
        assert_eq!(
            encode_range(&range),
            RangeRecord {
                day_of_week: 3,
                start_time: "23:00".to_string(),
                end_time: "23:59".to_string(),
            }
        );
    }

    #[test]
    fn busy_batch_payload_shape() {
        let records = vec![encode_range(&TimeRange::new(0, 18, 20).expect("valid range"))];
        let payload = serde_json::to_value(BusyTimeBatchRequest { busy_times: &records })
            .expect("serialize payload");
        assert_eq!(
            payload,
            serde_json::json!({
                "busy_times": [{"day_of_week": 0, "start_time": "09:00", "end_time": "10:00"}]
            })
        );
    }

    #[test]
    fn decode_normalises_seconds_and_validates_order() {
        let record = RangeRecord {
            day_of_week: 1,
            start_time: "09:00:00".to_string(),
            end_time: "10:30:00".to_string(),
        };
        assert_eq!(
            decode_record(&record).expect("decode"),
            CoverageRange {
                day: 1,
                start_minute: 540,
                end_minute: 630
            }
        );

        let reversed = RangeRecord {
            day_of_week: 1,
            start_time: "10:00".to_string(),
            end_time: "09:00".to_string(),
        };
        assert!(matches!(decode_record(&reversed), Err(InfraError::Fetch(_))));
    }

    #[test]
    fn decode_records_skips_malformed_entries() {
        let records = vec![
            RangeRecord {
                day_of_week: 9,
                start_time: "09:00".to_string(),
                end_time: "10:00".to_string(),
            },
            RangeRecord {
                day_of_week: 2,
                start_time: "later".to_string(),
                end_time: "10:00".to_string(),
            },
            RangeRecord {
                day_of_week: 2,
                start_time: "08:00".to_string(),
                end_time: "08:30".to_string(),
            },
        ];
        assert_eq!(decode_records(&records).len(), 1);
    }

    #[test]
    fn list_body_accepts_plain_and_paginated_forms() {
        let plain: RangeListBody = serde_json::from_str(
            r#"[{"id": 4, "day_of_week": 0, "day_name": "Monday", "start_time": "09:00:00", "end_time": "10:00:00"}]"#,
        )
        .expect("plain body");
        assert_eq!(plain.into_records().len(), 1);

        let paginated: RangeListBody = serde_json::from_str(
            r#"{"count": 1, "results": [{"day_of_week": 6, "start_time": "23:30:00", "end_time": "23:59:00"}]}"#,
        )
        .expect("paginated body");
        let records = paginated.into_records();
        assert_eq!(decode_record(&records[0]).expect("decode").end_time(), "23:59");
    }
}
