//! Review summary for the final step and the red-flag alert.

use serde::Serialize;

use super::state::WizardState;
use crate::models::form::{names, FormFields, IntakeAnswers};

pub const EMPTY_REVIEW_MESSAGE: &str = "No information entered yet.";

pub const RED_FLAG_TITLE: &str = "Important Medical Alert";
pub const RED_FLAG_MESSAGE: &str = "One or more red flag symptoms were selected. If you are \
experiencing any red flag symptoms, please seek immediate medical attention or call emergency services.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSection {
    pub title: &'static str,
    pub items: Vec<ReviewItem>,
}

impl ReviewSection {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            items: Vec::new(),
        }
    }

    fn push(&mut self, label: &'static str, value: Option<String>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.items.push(ReviewItem { label, value });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub sections: Vec<ReviewSection>,
}

impl ReviewSummary {
    /// True when no section has anything to show; the UI then displays
    /// [`EMPTY_REVIEW_MESSAGE`].
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.items.is_empty())
    }
}

fn joined(values: &[String]) -> Option<String> {
    (!values.is_empty()).then(|| values.join(", "))
}

/// Rebuild the review from the current answers.
pub fn build_review(state: &WizardState) -> ReviewSummary {
    let answers = IntakeAnswers::from_fields(&state.fields);
    let mut sections = Vec::new();

    let mut personal = ReviewSection::new("Personal Information");
    personal.push("Name", answers.personal.full_name);
    personal.push("Email", answers.personal.email);
    personal.push("Phone", answers.personal.phone);
    personal.push("Date of Birth", answers.personal.date_of_birth);
    sections.push(personal);

    let mut pain = ReviewSection::new("Pain Information");
    pain.push("Pain Areas", joined(&state.pain_points.selected_areas()));
    pain.push("Duration", answers.pain.duration);
    pain.push("Intensity", answers.pain.intensity.map(|v| format!("{v}/10")));
    sections.push(pain);

    if answers.pain.onset.is_some() || answers.red_flags.any() {
        let mut history = ReviewSection::new("Medical History");
        history.push("How it started", answers.pain.onset);
        history.push("Red Flags", joined(&answers.red_flags.reported));
        sections.push(history);
    }

    if !answers.goals.goals.is_empty() {
        let mut goals = ReviewSection::new("Treatment Goals");
        goals.push("Goals", joined(&answers.goals.goals));
        goals.push("Timeline", answers.goals.timeline);
        sections.push(goals);
    }

    ReviewSummary { sections }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedFlagAlert {
    pub title: &'static str,
    pub message: &'static str,
    pub symptoms: Vec<String>,
}

/// The urgent-care alert, whenever any red flag is selected.
pub fn red_flag_alert(fields: &FormFields) -> Option<RedFlagAlert> {
    let symptoms = fields.values(names::RED_FLAGS);
    (!symptoms.is_empty()).then(|| RedFlagAlert {
        title: RED_FLAG_TITLE,
        message: RED_FLAG_MESSAGE,
        symptoms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BodyView, PainPoint, RelativePosition};

    #[test]
    fn empty_state_reports_empty_review() {
        let review = build_review(&WizardState::new());
        assert!(review.is_empty());
        let titles: Vec<_> = review.sections.iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["Personal Information", "Pain Information"]);
    }

    #[test]
    fn sections_follow_answers() {
        let mut state = WizardState::new();
        state.fields.set_text(names::FULL_NAME, " Jane Doe ");
        state.fields.set_text(names::PAIN_INTENSITY, "6");
        state.fields.set_values(names::GOALS, ["Sleep through the night"]);
        state.fields.set_text(names::TIMELINE, "3 months");
        state.pain_points.insert(PainPoint::new(
            BodyView::Back,
            "lower-back",
            "Lower Back",
            "Lower Back",
            RelativePosition::clamped(50.0, 40.0),
            6,
        ));

        let review = build_review(&state);
        assert!(!review.is_empty());
        assert_eq!(review.sections[0].items[0].value, "Jane Doe");
        let pain: Vec<_> = review.sections[1].items.iter().map(|i| i.value.as_str()).collect();
        assert_eq!(pain, vec!["Lower Back (Back)", "6/10"]);
        // No onset or red flags: no history section.
        assert_eq!(review.sections[2].title, "Treatment Goals");
        assert_eq!(review.sections[2].items.len(), 2);
    }

    #[test]
    fn red_flags_open_history_section_and_alert() {
        let mut state = WizardState::new();
        assert!(red_flag_alert(&state.fields).is_none());

        state.fields.toggle_value(names::RED_FLAGS, "Unexplained weight loss", true);
        let alert = red_flag_alert(&state.fields).unwrap();
        assert_eq!(alert.symptoms, vec!["Unexplained weight loss"]);

        let review = build_review(&state);
        let history = review.sections.iter().find(|s| s.title == "Medical History").unwrap();
        assert_eq!(history.items[0].label, "Red Flags");

        state.fields.toggle_value(names::RED_FLAGS, "Unexplained weight loss", false);
        assert!(red_flag_alert(&state.fields).is_none());
    }
}
