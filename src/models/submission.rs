use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::form::IntakeAnswers;
use super::snapshot::Snapshot;

/// A received intake, as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRecord {
    pub id: Uuid,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub pain_duration: Option<String>,
    pub pain_intensity: Option<u8>,
    pub pain_start: Option<String>,
    pub timeline: Option<String>,
    pub consent: bool,
    pub ai_summary: Option<String>,
    pub selected_areas: Vec<String>,
    pub red_flags: Vec<String>,
    pub goals: Vec<String>,
    /// Persisted pain point list, exactly as the wizard sent it.
    pub pain_points: serde_json::Value,
    /// All raw form answers.
    pub raw_form_data: serde_json::Value,
    pub created_at: NaiveDateTime,
}

impl SubmissionRecord {
    /// Build a new record from a submitted wizard payload.
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, serde_json::Error> {
        let answers = IntakeAnswers::from_fields(&snapshot.fields);
        let ai_summary = Some(snapshot.ai_summary.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            id: Uuid::new_v4(),
            full_name: answers.personal.full_name,
            email: answers.personal.email,
            phone: answers.personal.phone,
            date_of_birth: answers.personal.date_of_birth,
            pain_duration: answers.pain.duration,
            pain_intensity: answers.pain.intensity,
            pain_start: answers.pain.onset,
            timeline: answers.goals.timeline,
            consent: answers.consent,
            ai_summary,
            selected_areas: snapshot.selected_areas.clone(),
            red_flags: answers.red_flags.reported,
            goals: answers.goals.goals,
            pain_points: serde_json::to_value(&snapshot.pain_points)?,
            raw_form_data: serde_json::to_value(&snapshot.fields)?,
            created_at: Utc::now().naive_utc(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::form::names;

    #[test]
    fn record_picks_typed_fields_from_snapshot() {
        let snapshot = Snapshot::from_json(
            r#"{
                "fullName": "Jane Doe",
                "email": "jane@example.org",
                "painDuration": "1-3 months",
                "painIntensity": "6",
                "redFlags": ["Severe night pain"],
                "consent": "on",
                "selectedAreas": ["Lower Back (Back)"],
                "aiSummary": "  ",
                "currentStep": 5
            }"#,
        )
        .unwrap();

        let record = SubmissionRecord::from_snapshot(&snapshot).unwrap();
        assert_eq!(record.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.pain_intensity, Some(6));
        assert!(record.consent);
        assert!(record.ai_summary.is_none());
        assert_eq!(record.red_flags, vec!["Severe night pain"]);
        assert_eq!(record.selected_areas, vec!["Lower Back (Back)"]);
        assert_eq!(record.raw_form_data[names::EMAIL], "jane@example.org");
        assert!(record.pain_points.as_array().unwrap().is_empty());
    }
}
