//! Client side of the log analysis service: decode the upload and stats
//! responses, turn them into render patches, and drive the upload workflow.

pub mod api;
#[cfg(feature = "http")]
pub mod client;
pub mod render;
pub mod report;
pub mod view;
pub mod workflow;

use serde::de::{Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

pub use api::{AnalysisApi, ReplayApi, UploadForm};
#[cfg(feature = "http")]
pub use client::HttpApi;
pub use workflow::{RunReport, Stage, UploadWorkflow};

/// Shown when a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "An error occurred while processing the file";
/// Shown when the upload endpoint reports failure without a reason.
pub const UPLOAD_FAILURE: &str = "Failed to upload file";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    #[error("{0}")]
    Transport(String),
    /// `/upload` answered without `success`.
    #[error("{0}")]
    UploadRejected(String),
    /// `/get_stats` answered with an `error` field.
    #[error("{0}")]
    Rejected(String),
    #[error("Server returned invalid JSON. Check backend logs for errors.")]
    InvalidStatsJson,
    #[error("malformed upload response: {0}")]
    MalformedUpload(String),
    #[error("malformed stats response: {0}")]
    MalformedStats(String),
    #[error("invalid server address: {0}")]
    Config(String),
}

impl LensError {
    /// Text for the failure notification.
    pub fn user_message(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            text
        }
    }

    /// Failures that deserve a developer trace on top of the notification.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, LensError::Rejected(_) | LensError::InvalidStatsJson)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelCount {
    pub level: String,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_logs: u64,
    /// Server order is kept; it lists levels by descending count.
    #[serde(with = "level_counts")]
    pub log_levels: Vec<LevelCount>,
    pub time_range: TimeRange,
}

mod level_counts {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(levels: &[LevelCount], s: S) -> Result<S::Ok, S::Error> {
        s.collect_map(levels.iter().map(|l| (&l.level, l.count)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<LevelCount>, D::Error> {
        let map = serde_json::Map::<String, JsonValue>::deserialize(d)?;
        let mut out = Vec::with_capacity(map.len());
        for (level, value) in map {
            match value.as_u64() {
                Some(count) => out.push(LevelCount { level, count }),
                None => {
                    return Err(D::Error::custom(format!(
                        "count for level '{level}' is not a non-negative integer"
                    )))
                }
            }
        }
        Ok(out)
    }
}

fn non_empty_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(d)?.filter(|s| !s.is_empty()))
}

/// Body of `POST /upload`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Stats>,
    #[serde(
        default,
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

/// A successful upload: the correlation filename and its summary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedLog {
    pub filename: String,
    pub stats: Stats,
}

impl UploadResult {
    /// Decode an upload body. A JSON value that is not an object carries no
    /// success flag and therefore decodes as a failed upload.
    pub fn from_body(body: &str) -> Result<Self, LensError> {
        let value: JsonValue =
            serde_json::from_str(body).map_err(|e| LensError::MalformedUpload(e.to_string()))?;
        if !value.is_object() {
            return Ok(UploadResult::default());
        }
        serde_json::from_value(value).map_err(|e| LensError::MalformedUpload(e.to_string()))
    }

    pub fn into_uploaded(self) -> Result<UploadedLog, LensError> {
        if !self.success {
            return Err(LensError::UploadRejected(
                self.error.unwrap_or_else(|| UPLOAD_FAILURE.to_string()),
            ));
        }
        let filename = self
            .filename
            .filter(|f| !f.is_empty())
            .ok_or_else(|| LensError::MalformedUpload("missing filename".into()))?;
        let stats = self
            .stats
            .ok_or_else(|| LensError::MalformedUpload("missing stats".into()))?;
        Ok(UploadedLog { filename, stats })
    }
}

/// A chart serialized to text, passed to the charting library untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartSpec(String);

impl ChartSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        ChartSpec(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ChartSpec {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match JsonValue::deserialize(d)? {
            JsonValue::String(text) => {
                if !text.is_empty() {
                    serde_json::from_str::<IgnoredAny>(&text).map_err(|e| {
                        D::Error::custom(format!("chart spec is not valid JSON: {e}"))
                    })?;
                }
                Ok(ChartSpec(text))
            }
            inline => Ok(ChartSpec(inline.to_string())),
        }
    }
}

impl Serialize for ChartSpec {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

fn present_chart<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ChartSpec>, D::Error> {
    Ok(Option::<ChartSpec>::deserialize(d)?.filter(|c| !c.is_empty()))
}

/// Body of `GET /get_stats/{filename}`. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotsBundle {
    #[serde(default, deserialize_with = "present_chart", skip_serializing_if = "Option::is_none")]
    pub level_distribution: Option<ChartSpec>,
    #[serde(default, deserialize_with = "present_chart", skip_serializing_if = "Option::is_none")]
    pub logs_per_hour: Option<ChartSpec>,
    #[serde(default, deserialize_with = "present_chart", skip_serializing_if = "Option::is_none")]
    pub level_pie: Option<ChartSpec>,
    /// `[message, count]` rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_errors: Option<Vec<Vec<JsonValue>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_messages: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_users: Option<Vec<String>>,
    /// `[start, end, duration_minutes]` rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_periods: Option<Vec<Vec<JsonValue>>>,
    #[serde(
        default,
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

impl PlotsBundle {
    /// Decode a stats body. Unparseable text is [`LensError::InvalidStatsJson`];
    /// a JSON value that is not an object has no fields and decodes empty.
    pub fn from_body(body: &str) -> Result<Self, LensError> {
        let value: JsonValue =
            serde_json::from_str(body).map_err(|_| LensError::InvalidStatsJson)?;
        if !value.is_object() {
            return Ok(PlotsBundle::default());
        }
        serde_json::from_value(value).map_err(|e| LensError::MalformedStats(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upload_body_keeps_level_order() {
        let body = r#"{"success":true,"filename":"a.log","stats":{"total_logs":3,
            "log_levels":{"INFO":1,"ERROR":2},"time_range":{"start":"t0","end":"t1"}}}"#;
        let uploaded = UploadResult::from_body(body).unwrap().into_uploaded().unwrap();
        assert_eq!(uploaded.filename, "a.log");
        let levels: Vec<&str> = uploaded.stats.log_levels.iter().map(|l| l.level.as_str()).collect();
        assert_eq!(levels, ["INFO", "ERROR"]);
    }

    #[test]
    fn failed_upload_uses_server_message_or_fallback() {
        let err = UploadResult::from_body(r#"{"success":false,"error":"bad file"}"#)
            .unwrap()
            .into_uploaded()
            .unwrap_err();
        assert_eq!(err, LensError::UploadRejected("bad file".into()));
        assert!(err.is_unexpected());

        let err = UploadResult::from_body(r#"{"error":""}"#).unwrap().into_uploaded().unwrap_err();
        assert_eq!(err.user_message(), UPLOAD_FAILURE);

        let err = UploadResult::from_body("[1,2]").unwrap().into_uploaded().unwrap_err();
        assert_eq!(err.user_message(), UPLOAD_FAILURE);
    }

    #[test]
    fn successful_upload_needs_filename_and_stats() {
        let err = UploadResult::from_body(r#"{"success":true,"filename":""}"#)
            .unwrap()
            .into_uploaded()
            .unwrap_err();
        assert!(matches!(err, LensError::MalformedUpload(_)));
        assert!(err.is_unexpected());
    }

    #[test]
    fn unparseable_upload_body_is_malformed() {
        let err = UploadResult::from_body("<html>500</html>").unwrap_err();
        assert!(matches!(err, LensError::MalformedUpload(_)));
    }

    #[test]
    fn negative_level_count_is_rejected() {
        let body = r#"{"success":true,"filename":"a.log","stats":{"total_logs":1,
            "log_levels":{"INFO":-1},"time_range":{"start":"t0","end":"t1"}}}"#;
        assert!(matches!(UploadResult::from_body(body), Err(LensError::MalformedUpload(_))));
    }

    #[test]
    fn chart_specs_accept_text_or_inline_json() {
        let bundle = PlotsBundle::from_body(
            r#"{"level_distribution":"{\"data\":[]}","level_pie":{"data":[1]},"logs_per_hour":""}"#,
        )
        .unwrap();
        assert_eq!(bundle.level_distribution.unwrap().as_str(), r#"{"data":[]}"#);
        assert_eq!(bundle.level_pie.unwrap().as_str(), r#"{"data":[1]}"#);
        assert_eq!(bundle.logs_per_hour, None);
    }

    #[test]
    fn chart_text_must_be_json() {
        assert!(matches!(
            PlotsBundle::from_body(r#"{"level_pie":"not json {"}"#),
            Err(LensError::MalformedStats(_))
        ));
    }

    #[test]
    fn stats_body_decoding() {
        assert_eq!(PlotsBundle::from_body("not json"), Err(LensError::InvalidStatsJson));
        assert_eq!(PlotsBundle::from_body("{}").unwrap(), PlotsBundle::default());
        assert_eq!(PlotsBundle::from_body("42").unwrap(), PlotsBundle::default());
        assert_eq!(
            PlotsBundle::from_body(r#"{"error":"no data"}"#).unwrap().error.as_deref(),
            Some("no data")
        );
        assert!(matches!(
            PlotsBundle::from_body(r#"{"unique_messages":7}"#),
            Err(LensError::MalformedStats(_))
        ));
    }

    #[test]
    fn empty_messages_fall_back_to_generic_text() {
        assert_eq!(LensError::Transport(String::new()).user_message(), GENERIC_FAILURE);
        assert_eq!(LensError::Transport("Failed to fetch".into()).user_message(), "Failed to fetch");
        assert!(!LensError::InvalidStatsJson.is_unexpected());
        assert!(!LensError::Rejected("no data".into()).is_unexpected());
    }

    #[test]
    fn stats_serialize_back_to_a_level_map() {
        let stats = Stats {
            total_logs: 2,
            log_levels: vec![LevelCount { level: "WARNING".into(), count: 2 }],
            time_range: TimeRange { start: "a".into(), end: "b".into() },
        };
        assert_eq!(
            serde_json::to_value(&stats).unwrap(),
            json!({"total_logs":2,"log_levels":{"WARNING":2},"time_range":{"start":"a","end":"b"}})
        );
    }
}
