//! Cleaning of raw Fitbit sleep logs into the fixed sleep table layout

use chrono::{NaiveDateTime, Timelike};
use serde_json::Value;

use crate::clean::{coerce_json, parse_datetime_str};
use crate::error::{EtlError, EtlResult};
use crate::models::{CellValue, ColumnSpec, ColumnType, TableSchema, TypedTable};

/// Longest sleep, in hours, that can still count as a nap
const NAP_HOURS: i64 = 3;

/// Classification of a sleep log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepType {
    Nap,
    Full,
}

impl std::fmt::Display for SleepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SleepType::Nap => write!(f, "nap"),
            SleepType::Full => write!(f, "full"),
        }
    }
}

/// Classify a sleep as a nap or a full night
///
/// `duration_hours` is the duration rounded to whole hours.
pub fn nap_or_full(duration_hours: i64, start: NaiveDateTime, end: NaiveDateTime) -> SleepType {
    let start_hour = start.hour();
    let same_day = start.date() == end.date();

    if (8..=18).contains(&start_hour) && duration_hours <= NAP_HOURS {
        SleepType::Nap
    } else if same_day && (7..=18).contains(&start_hour) && duration_hours <= 6 {
        SleepType::Nap
    } else if same_day && duration_hours > NAP_HOURS {
        SleepType::Full
    } else if !same_day {
        SleepType::Full
    } else {
        SleepType::Nap
    }
}

/// Render milliseconds the way a `days, H:MM:SS[.ffffff]` duration prints
pub fn format_duration_hhmmss(millis: i64) -> String {
    const MICROS_PER_DAY: i64 = 86_400_000_000;

    let total_micros = millis.saturating_mul(1_000);
    let days = total_micros.div_euclid(MICROS_PER_DAY);
    let rest = total_micros.rem_euclid(MICROS_PER_DAY);

    let micros = rest % 1_000_000;
    let seconds = rest / 1_000_000;
    let mut out = String::new();
    if days != 0 {
        let plural = if days.abs() == 1 { "" } else { "s" };
        out.push_str(&format!("{} day{}, ", days, plural));
    }
    out.push_str(&format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    ));
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Fixed layout of the sleep table
pub fn sleep_schema(name: &str) -> TableSchema {
    use ColumnType::*;

    let columns = [
        ("date", Timestamp),
        ("duration_milliseconds", Integer),
        ("duration_seconds", Integer),
        ("duration_minutes", Integer),
        ("duration_hours", Real),
        ("duration_hhmmss", Text),
        ("sleep_type", Text),
        ("start_time", Timestamp),
        ("start_time_ymdhm", Text),
        ("end_time", Timestamp),
        ("end_time_ymdhm", Text),
        ("efficiency", Integer),
        ("minutes_asleep", Integer),
        ("minutes_awake", Integer),
        ("main_sleep", Boolean),
        ("deep_sleep_count", Integer),
        ("deep_sleep_minutes", Integer),
        ("light_sleep_count", Integer),
        ("light_sleep_minutes", Integer),
        ("rem_sleep_count", Integer),
        ("rem_sleep_minutes", Integer),
        ("wake_count", Integer),
        ("wake_minutes", Integer),
        ("asleep_count", Integer),
        ("asleep_minutes", Integer),
        ("awake_count", Integer),
        ("awake_minutes", Integer),
        ("restless_count", Integer),
        ("restless_minutes", Integer),
        ("sleep_log_type", Text),
    ];

    TableSchema::new(
        name,
        columns
            .into_iter()
            .map(|(column, ty)| ColumnSpec::new(column, ty, "sleep"))
            .collect(),
    )
}

fn required_time(entry: &Value, field: &str, index: usize) -> EtlResult<NaiveDateTime> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .and_then(parse_datetime_str)
        .ok_or_else(|| {
            EtlError::SleepSource(format!("sleep log {} has no valid '{}'", index, field))
        })
}

fn summary_field(summary: Option<&Value>, level: &str, field: &str) -> CellValue {
    summary
        .and_then(|s| s.get(level))
        .and_then(|l| l.get(field))
        .map(|v| coerce_json(v, ColumnType::Integer))
        .unwrap_or(CellValue::Null)
}

fn entry_field(entry: &Value, field: &str, ty: ColumnType) -> CellValue {
    entry
        .get(field)
        .map(|v| coerce_json(v, ty))
        .unwrap_or(CellValue::Null)
}

/// Count classic-log segments at `level`; stage logs report no such counts
fn classic_count(entry: &Value, is_classic: bool, level: &str) -> CellValue {
    if !is_classic {
        return CellValue::Null;
    }
    let count = entry
        .get("levels")
        .and_then(|l| l.get("data"))
        .and_then(Value::as_array)
        .map(|data| {
            data.iter()
                .filter(|segment| segment.get("level").and_then(Value::as_str) == Some(level))
                .count()
        })
        .unwrap_or(0);
    CellValue::Integer(count as i64)
}

fn clean_entry(entry: &Value, index: usize) -> EtlResult<Vec<CellValue>> {
    let duration = entry.get("duration").and_then(Value::as_i64).unwrap_or(0);
    let start = required_time(entry, "startTime", index)?;
    let end = required_time(entry, "endTime", index)?;
    let sleep_date = entry
        .get("dateOfSleep")
        .and_then(Value::as_str)
        .and_then(parse_datetime_str)
        .ok_or_else(|| {
            EtlError::SleepSource(format!("sleep log {} has no valid 'dateOfSleep'", index))
        })?;

    let hours = duration as f64 / 3_600_000.0;
    let sleep_type = nap_or_full(hours.round_ties_even() as i64, start, end);
    let log_type = entry
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let is_classic = log_type == "classic";
    let summary = entry.get("levels").and_then(|l| l.get("summary"));

    Ok(vec![
        CellValue::Timestamp(sleep_date),
        CellValue::Integer(duration),
        CellValue::Integer((duration as f64 / 1_000.0).round_ties_even() as i64),
        CellValue::Integer((duration as f64 / 60_000.0).round_ties_even() as i64),
        CellValue::Real(round_to(hours, 1)),
        CellValue::Text(format_duration_hhmmss(duration)),
        CellValue::Text(sleep_type.to_string()),
        CellValue::Timestamp(start),
        CellValue::Text(start.format("%Y-%m-%d %H:%M").to_string()),
        CellValue::Timestamp(end),
        CellValue::Text(end.format("%Y-%m-%d %H:%M").to_string()),
        entry_field(entry, "efficiency", ColumnType::Integer),
        entry_field(entry, "minutesAsleep", ColumnType::Integer),
        entry_field(entry, "minutesAwake", ColumnType::Integer),
        entry_field(entry, "isMainSleep", ColumnType::Boolean),
        summary_field(summary, "deep", "count"),
        summary_field(summary, "deep", "minutes"),
        summary_field(summary, "light", "count"),
        summary_field(summary, "light", "minutes"),
        summary_field(summary, "rem", "count"),
        summary_field(summary, "rem", "minutes"),
        summary_field(summary, "wake", "count"),
        summary_field(summary, "wake", "minutes"),
        classic_count(entry, is_classic, "asleep"),
        summary_field(summary, "asleep", "minutes"),
        classic_count(entry, is_classic, "awake"),
        summary_field(summary, "awake", "minutes"),
        classic_count(entry, is_classic, "restless"),
        summary_field(summary, "restless", "minutes"),
        CellValue::Text(log_type),
    ])
}

/// Clean raw sleep logs into the sleep table
pub fn clean_sleep(table_name: &str, entries: &[Value]) -> EtlResult<TypedTable> {
    let rows = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| clean_entry(entry, index))
        .collect::<EtlResult<Vec<_>>>()?;

    tracing::debug!("Cleaned {} sleep logs", rows.len());
    TypedTable::new(table_name, sleep_schema(table_name), rows).map_err(EtlError::InvalidSchema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_nap_or_full() {
        // afternoon doze
        assert_eq!(nap_or_full(1, at(5, 14, 0), at(5, 15, 0)), SleepType::Nap);
        // long same-day sleep starting early morning
        assert_eq!(nap_or_full(5, at(5, 7, 30), at(5, 12, 30)), SleepType::Nap);
        // overnight
        assert_eq!(nap_or_full(8, at(5, 23, 0), at(6, 7, 0)), SleepType::Full);
        // short sleep across midnight
        assert_eq!(nap_or_full(2, at(5, 23, 0), at(6, 1, 0)), SleepType::Full);
        // after-midnight start, same day, long
        assert_eq!(nap_or_full(7, at(6, 0, 30), at(6, 7, 30)), SleepType::Full);
        // early morning short sleep, same day
        assert_eq!(nap_or_full(2, at(6, 4, 0), at(6, 6, 0)), SleepType::Nap);
    }

    #[test]
    fn test_format_duration_hhmmss() {
        assert_eq!(format_duration_hhmmss(0), "0:00:00");
        assert_eq!(format_duration_hhmmss(27_000_000), "7:30:00");
        assert_eq!(format_duration_hhmmss(3_723_500), "1:02:03.500000");
        assert_eq!(format_duration_hhmmss(90_000_000), "1 day, 1:00:00");
    }

    #[test]
    fn test_clean_stages_log() {
        let entry = json!({
            "dateOfSleep": "2024-01-06",
            "duration": 27_000_000,
            "startTime": "2024-01-05T23:15:00.000",
            "endTime": "2024-01-06T06:45:00.000",
            "efficiency": 93,
            "minutesAsleep": 410,
            "minutesAwake": 40,
            "isMainSleep": true,
            "type": "stages",
            "levels": {
                "summary": {
                    "deep": {"count": 4, "minutes": 80},
                    "light": {"count": 20, "minutes": 230},
                    "rem": {"count": 6, "minutes": 100},
                    "wake": {"count": 22, "minutes": 40}
                },
                "data": []
            }
        });

        let table = clean_sleep("fitbit_sleep", &[entry]).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.value(0, "date"),
            Some(&CellValue::Timestamp(at(6, 0, 0)))
        );
        assert_eq!(table.value(0, "duration_seconds"), Some(&CellValue::Integer(27_000)));
        assert_eq!(table.value(0, "duration_minutes"), Some(&CellValue::Integer(450)));
        assert_eq!(table.value(0, "duration_hours"), Some(&CellValue::Real(7.5)));
        assert_eq!(
            table.value(0, "duration_hhmmss"),
            Some(&CellValue::Text("7:30:00".into()))
        );
        assert_eq!(table.value(0, "sleep_type"), Some(&CellValue::Text("full".into())));
        assert_eq!(
            table.value(0, "start_time_ymdhm"),
            Some(&CellValue::Text("2024-01-05 23:15".into()))
        );
        assert_eq!(table.value(0, "main_sleep"), Some(&CellValue::Boolean(true)));
        assert_eq!(table.value(0, "deep_sleep_count"), Some(&CellValue::Integer(4)));
        assert_eq!(table.value(0, "asleep_count"), Some(&CellValue::Null));
        assert_eq!(table.value(0, "restless_minutes"), Some(&CellValue::Null));
    }

    #[test]
    fn test_clean_classic_log_counts_levels() {
        let entry = json!({
            "dateOfSleep": "2024-01-05",
            "duration": 3_600_000,
            "startTime": "2024-01-05T14:00:00.000",
            "endTime": "2024-01-05T15:00:00.000",
            "efficiency": 88,
            "minutesAsleep": 55,
            "minutesAwake": 5,
            "isMainSleep": false,
            "type": "classic",
            "levels": {
                "summary": {
                    "asleep": {"count": 0, "minutes": 55},
                    "awake": {"count": 0, "minutes": 2},
                    "restless": {"count": 0, "minutes": 3}
                },
                "data": [
                    {"level": "asleep", "seconds": 600},
                    {"level": "restless", "seconds": 60},
                    {"level": "asleep", "seconds": 1200},
                    {"level": "awake", "seconds": 120}
                ]
            }
        });

        let table = clean_sleep("fitbit_sleep", &[entry]).unwrap();
        assert_eq!(table.value(0, "sleep_type"), Some(&CellValue::Text("nap".into())));
        assert_eq!(table.value(0, "asleep_count"), Some(&CellValue::Integer(2)));
        assert_eq!(table.value(0, "awake_count"), Some(&CellValue::Integer(1)));
        assert_eq!(table.value(0, "restless_count"), Some(&CellValue::Integer(1)));
        assert_eq!(table.value(0, "asleep_minutes"), Some(&CellValue::Integer(55)));
        assert_eq!(table.value(0, "deep_sleep_count"), Some(&CellValue::Null));
    }

    #[test]
    fn test_missing_start_time_is_an_error() {
        let entry = json!({"dateOfSleep": "2024-01-05", "duration": 1000});
        let err = clean_sleep("fitbit_sleep", &[entry]).unwrap_err();
        assert!(matches!(err, EtlError::SleepSource(_)));
    }
}
