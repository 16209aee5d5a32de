//! Response shapes returned by the analysis backend
//!
//! Everything is deserialized leniently: unknown fields are ignored or kept in
//! an `extra` map, and any field the backend may omit is an `Option`. A missing
//! number means "unknown", never zero.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Backend-assigned identifier. Integer row ids today, but treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisId {
    Number(i64),
    Text(String),
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisId::Number(n) => write!(f, "{}", n),
            AnalysisId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<AnalysisId>,
    #[serde(default)]
    pub disaster_detected: bool,
    #[serde(default)]
    pub disaster_type: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub severity_score: Option<f64>,
    #[serde(default)]
    pub severity_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_details: Option<ExtractedDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal_info: Option<TemporalInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic_info: Option<GeographicInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Submitted text, echoed back on history rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl AnalysisResult {
    /// Severity only counts when a disaster was actually detected
    pub fn effective_severity(&self) -> Option<f64> {
        if self.disaster_detected {
            self.severity_score
        } else {
            None
        }
    }
}

/// Casualty and damage figures pulled out of a text report.
///
/// Values are whatever JSON scalar the backend produced ("dozens", 12, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDetails {
    #[serde(default)]
    pub deaths: Option<serde_json::Value>,
    #[serde(default)]
    pub injuries: Option<serde_json::Value>,
    #[serde(default)]
    pub missing_persons: Option<serde_json::Value>,
    #[serde(default)]
    pub buildings_collapsed: Option<serde_json::Value>,
    #[serde(default)]
    pub roads_damaged: Option<serde_json::Value>,
    #[serde(default)]
    pub financial_loss: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ExtractedDetails {
    /// Labelled, displayable entries in a fixed order. Null values are skipped.
    pub fn entries(&self) -> Vec<(String, String)> {
        let known = [
            ("Deaths", &self.deaths),
            ("Injuries", &self.injuries),
            ("Missing Persons", &self.missing_persons),
            ("Buildings Collapsed", &self.buildings_collapsed),
            ("Roads Damaged", &self.roads_damaged),
            ("Financial Loss", &self.financial_loss),
        ];

        let mut out: Vec<(String, String)> = known
            .iter()
            .filter_map(|(label, v)| v.as_ref().and_then(display_value).map(|s| (label.to_string(), s)))
            .collect();

        for (key, value) in &self.extra {
            if let Some(s) = display_value(value) {
                out.push((title_case(key), s));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub day: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeographicInfo {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub accuracy: Option<String>,
}

impl GeographicInfo {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// One object-detector output from image analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub confidence: Option<f64>,
}

fn default_count() -> u32 {
    1
}

/// A persisted analysis as returned by the history endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(default)]
    pub id: Option<AnalysisId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub result: AnalysisResult,
}

impl HistoryItem {
    /// Row id, falling back to the embedded analysis id
    pub fn display_id(&self) -> Option<&AnalysisId> {
        self.id.as_ref().or(self.result.analysis_id.as_ref())
    }

    /// "Mar 4, 2025, 02:15 PM", or the raw string if it does not parse
    pub fn created_at_display(&self) -> Option<String> {
        self.created_at.as_deref().map(format_timestamp)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub analyses: Vec<HistoryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCoordinate {
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub full_address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Result of the combined detect + geocode call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationResult {
    #[serde(default)]
    pub has_location: bool,
    #[serde(default)]
    pub is_disaster: Option<bool>,
    #[serde(default)]
    pub disaster_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub coordinates: Vec<LocationCoordinate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStats {
    #[serde(default)]
    pub total_feedback: u64,
    #[serde(default)]
    pub training_count: u64,
    #[serde(default)]
    pub should_retrain: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_disaster: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The recent-feedback endpoint has answered both as a bare list and wrapped
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RecentFeedbackBody {
    List(Vec<FeedbackEntry>),
    Wrapped {
        #[serde(default, alias = "recent_feedback", alias = "items")]
        feedback: Vec<FeedbackEntry>,
    },
}

impl RecentFeedbackBody {
    pub(crate) fn into_entries(self) -> Vec<FeedbackEntry> {
        match self {
            RecentFeedbackBody::List(v) => v,
            RecentFeedbackBody::Wrapped { feedback } => feedback,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrainStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accept a string or a number where the backend is loose about it
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(display_value))
}

/// Display form of a JSON scalar; null and empty strings count as absent
pub fn display_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(if *b { "Yes".into() } else { "No".into() }),
        other => Some(other.to_string()),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a backend timestamp for display.
///
/// Rows come back either RFC 3339 or naive ISO-8601 (no offset).
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%b %-d, %Y, %I:%M %p";

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&chrono::Local).format(DISPLAY).to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return dt.format(DISPLAY).to_string();
        }
    }
    raw.to_string()
}
