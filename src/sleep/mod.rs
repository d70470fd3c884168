//! Secondary sleep data source
//!
//! Raw sleep logs come either from a saved Fitbit API response on disk or,
//! with the `fitbit-api` feature, straight from the Fitbit Web API using an
//! already-issued access token.

mod clean;

use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use serde_json::Value;

pub use clean::{SleepType, clean_sleep, format_duration_hhmmss, nap_or_full, sleep_schema};

use crate::clean::parse_datetime_str;
use crate::config::{EtlConfig, SleepSourceKind};
use crate::error::{EtlError, EtlResult};

/// Something that can produce raw sleep logs for a date range
pub trait SleepSource {
    /// Fetch raw sleep log objects whose sleep date falls in `start..=end`
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> EtlResult<Vec<Value>>;

    /// Short description for logging
    fn describe(&self) -> String;
}

/// The `days`-long window ending today
pub fn sleep_window(today: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(i64::from(days)), today)
}

/// Pull the sleep log list out of an API response body
///
/// Accepts `{"sleep": [...]}` or a bare array; anything else yields no logs.
pub fn sleep_logs(response: Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("sleep") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Sleep logs read from a saved API response
#[derive(Debug, Clone)]
pub struct FileSleepSource {
    path: PathBuf,
}

impl FileSleepSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SleepSource for FileSleepSource {
    fn fetch(&self, start: NaiveDate, end: NaiveDate) -> EtlResult<Vec<Value>> {
        if !self.path.exists() {
            return Err(EtlError::MissingFile(self.path.clone()));
        }
        let content =
            std::fs::read_to_string(&self.path).map_err(|e| EtlError::io(&self.path, e))?;
        let response: Value =
            serde_json::from_str(&content).map_err(|e| EtlError::json(&self.path, e))?;

        let in_window = |log: &Value| {
            log.get("dateOfSleep")
                .and_then(Value::as_str)
                .and_then(parse_datetime_str)
                .map(|dt| (start..=end).contains(&dt.date()))
                .unwrap_or(true)
        };
        Ok(sleep_logs(response).into_iter().filter(in_window).collect())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(feature = "fitbit-api")]
pub use api::FitbitApiSource;

#[cfg(feature = "fitbit-api")]
mod api {
    use super::*;

    /// Fitbit Web API sleep endpoint
    pub const FITBIT_API_BASE: &str = "https://api.fitbit.com/1.2/user/-/sleep/date";

    /// Sleep logs fetched from the Fitbit Web API
    ///
    /// Tokens are never refreshed here; an expired token surfaces as an error.
    pub struct FitbitApiSource {
        access_token: String,
        base_url: String,
        client: reqwest::blocking::Client,
    }

    impl FitbitApiSource {
        pub fn new(access_token: impl Into<String>) -> EtlResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| EtlError::SleepSource(format!("HTTP client error: {}", e)))?;
            Ok(Self {
                access_token: access_token.into(),
                base_url: FITBIT_API_BASE.to_string(),
                client,
            })
        }

        /// Read `access_token` from a stored token file
        pub fn from_tokens_file(path: &Path) -> EtlResult<Self> {
            if !path.exists() {
                return Err(EtlError::MissingFile(path.to_path_buf()));
            }
            let content = std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))?;
            let tokens: Value =
                serde_json::from_str(&content).map_err(|e| EtlError::json(path, e))?;
            let token = tokens
                .get("access_token")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    EtlError::SleepSource(format!("{} has no access_token", path.display()))
                })?;
            Self::new(token)
        }

        pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
            self.base_url = base_url.into();
            self
        }

        pub fn url(&self, start: NaiveDate, end: NaiveDate) -> String {
            format!(
                "{}/{}/{}.json",
                self.base_url.trim_end_matches('/'),
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            )
        }
    }

    impl SleepSource for FitbitApiSource {
        fn fetch(&self, start: NaiveDate, end: NaiveDate) -> EtlResult<Vec<Value>> {
            let url = self.url(start, end);
            tracing::info!("Requesting sleep logs from {}", url);

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .map_err(|e| EtlError::SleepSource(format!("request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(EtlError::SleepSource(format!(
                    "Fitbit API returned {}",
                    status.as_u16()
                )));
            }

            let body: Value = response
                .json()
                .map_err(|e| EtlError::SleepSource(format!("invalid response body: {}", e)))?;
            Ok(sleep_logs(body))
        }

        fn describe(&self) -> String {
            format!("Fitbit API {}", self.base_url)
        }
    }

}

/// Build the sleep source selected in the configuration
pub fn source_from_config(config: &EtlConfig) -> EtlResult<Box<dyn SleepSource>> {
    match config.sleep.source {
        SleepSourceKind::File => Ok(Box::new(FileSleepSource::new(config.sleep_file_path()))),
        #[cfg(feature = "fitbit-api")]
        SleepSourceKind::FitbitApi => Ok(Box::new(FitbitApiSource::from_tokens_file(
            &config.sleep_tokens_path(),
        )?)),
        #[cfg(not(feature = "fitbit-api"))]
        SleepSourceKind::FitbitApi => Err(EtlError::Config(
            "sleep source 'fitbit-api' requires the fitbit-api feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sleep_window() {
        assert_eq!(
            sleep_window(date(2024, 3, 31), 90),
            (date(2024, 1, 1), date(2024, 3, 31))
        );
    }

    #[test]
    fn test_sleep_logs_shapes() {
        assert_eq!(sleep_logs(json!({"sleep": [{"logId": 1}]})).len(), 1);
        assert_eq!(sleep_logs(json!([{"logId": 1}, {"logId": 2}])).len(), 2);
        assert!(sleep_logs(json!({"errors": []})).is_empty());
        assert!(sleep_logs(json!("nope")).is_empty());
    }

    #[test]
    fn test_file_source_filters_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fitbit_sleep.json");
        std::fs::write(
            &path,
            json!({"sleep": [
                {"logId": 1, "dateOfSleep": "2023-12-01"},
                {"logId": 2, "dateOfSleep": "2024-01-05"}
            ]})
            .to_string(),
        )
        .unwrap();

        let source = FileSleepSource::new(&path);
        let logs = source.fetch(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["logId"], 2);
    }

    #[test]
    fn test_file_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = FileSleepSource::new(dir.path().join("nope.json"));
        let err = source.fetch(date(2024, 1, 1), date(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, EtlError::MissingFile(_)));
    }
}
