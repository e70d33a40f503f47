//! Persisted wire shape of the wizard.
//!
//! Form answers sit at the top level next to the reserved keys, so the JSON
//! looks like the form itself plus a handful of bookkeeping entries:
//!
//! ```json
//! { "fullName": "Jane", "goals": ["..."], "selectedAreas": ["..."],
//!   "painPoints": [ ... ], "aiSummary": "", "aiSummaryError": "",
//!   "currentStep": 3, "_savedAt": "2026-01-01T10:00:00Z" }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::form::{FieldValue, FormFields};
use super::pain_point::{BodyView, IntensityLevel};

/// Keys owned by the snapshot itself; never treated as form answers.
pub const RESERVED_KEYS: &[&str] = &[
    "selectedAreas",
    "painPoints",
    "aiSummary",
    "aiSummaryError",
    "currentStep",
    "_savedAt",
];

/// One pain point as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPainPoint {
    pub key: String,
    pub view: BodyView,
    pub region: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub display_name: String,
    pub x_percent: f64,
    pub y_percent: f64,
    pub intensity: u8,
    /// Written for readers of the raw JSON; recomputed from `intensity` on load.
    #[serde(default = "default_level")]
    pub intensity_level: IntensityLevel,
}

fn default_level() -> IntensityLevel {
    IntensityLevel::Low
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSnapshot")]
pub struct Snapshot {
    #[serde(flatten)]
    pub fields: FormFields,
    #[serde(rename = "selectedAreas")]
    pub selected_areas: Vec<String>,
    #[serde(rename = "painPoints")]
    pub pain_points: Vec<SnapshotPainPoint>,
    #[serde(rename = "aiSummary")]
    pub ai_summary: String,
    #[serde(rename = "aiSummaryError")]
    pub ai_summary_error: String,
    #[serde(rename = "currentStep")]
    pub current_step: u8,
    #[serde(rename = "_savedAt", skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Lenient reading side. Unknown top-level values that are neither strings
/// nor string arrays are dropped rather than failing the whole draft.
#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(rename = "selectedAreas", default)]
    selected_areas: Vec<String>,
    #[serde(rename = "painPoints", default)]
    pain_points: Vec<serde_json::Value>,
    #[serde(rename = "aiSummary", default)]
    ai_summary: Option<String>,
    #[serde(rename = "aiSummaryError", default)]
    ai_summary_error: Option<String>,
    #[serde(rename = "currentStep", default)]
    current_step: Option<serde_json::Value>,
    #[serde(rename = "_savedAt", default)]
    saved_at: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl From<RawSnapshot> for Snapshot {
    fn from(raw: RawSnapshot) -> Self {
        let mut fields = FormFields::new();
        for (name, value) in raw.rest {
            if RESERVED_KEYS.contains(&name.as_str()) {
                continue;
            }
            match serde_json::from_value::<FieldValue>(value) {
                Ok(FieldValue::Text(text)) => fields.set_text(&name, &text),
                Ok(FieldValue::Multi(values)) => fields.set_values(&name, values),
                Err(_) => tracing::debug!(field = %name, "Dropping non-string snapshot field"),
            }
        }

        let pain_points = raw
            .pain_points
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<SnapshotPainPoint>(v) {
                Ok(point) => Some(point),
                Err(e) => {
                    tracing::debug!(error = %e, "Dropping malformed snapshot pain point");
                    None
                }
            })
            .collect();

        // Older drafts wrote the step as a string.
        let current_step = match raw.current_step {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(1),
            Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(1),
            _ => 1,
        };

        let saved_at = raw
            .saved_at
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Self {
            fields,
            selected_areas: raw.selected_areas,
            pain_points,
            ai_summary: raw.ai_summary.unwrap_or_default(),
            ai_summary_error: raw.ai_summary_error.unwrap_or_default(),
            current_step: u8::try_from(current_step).unwrap_or(1),
            saved_at,
        }
    }
}
