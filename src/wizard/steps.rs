//! Static step layout and per-step validation.

use serde::Serialize;

use crate::config::TOTAL_STEPS;
use crate::models::form::names;
use crate::models::FormFields;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Date,
    Select,
    /// Integer slider, inclusive bounds.
    Range { min: u8, max: u8 },
    Checkboxes,
    Checkbox,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepDef {
    pub number: u8,
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
}

const fn field(name: &'static str, label: &'static str, kind: FieldKind, required: bool) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind,
        required,
    }
}

pub const STEPS: [StepDef; TOTAL_STEPS as usize] = [
    StepDef {
        number: 1,
        title: "Welcome",
        fields: &[
            field(names::FULL_NAME, "Full name", FieldKind::Text, true),
            field(names::EMAIL, "Email", FieldKind::Email, true),
            field(names::PHONE, "Phone", FieldKind::Phone, false),
            field(names::DOB, "Date of birth", FieldKind::Date, false),
        ],
    },
    StepDef {
        number: 2,
        title: "Pain Map",
        fields: &[
            field(names::PAIN_DURATION, "Pain duration", FieldKind::Select, true),
            field(
                names::PAIN_INTENSITY,
                "Overall pain intensity",
                FieldKind::Range { min: 0, max: 10 },
                false,
            ),
            field(names::AGGRAVATORS, "What makes it worse", FieldKind::Checkboxes, false),
            field(names::RELIEVERS, "What makes it better", FieldKind::Checkboxes, false),
            field(
                names::ASSOCIATED_SYMPTOMS,
                "Associated symptoms",
                FieldKind::Checkboxes,
                false,
            ),
        ],
    },
    StepDef {
        number: 3,
        title: "Medical History",
        fields: &[
            field(names::PAIN_START, "How it started", FieldKind::Select, false),
            field(names::PREV_ORTHO, "Previous orthopedic care", FieldKind::Checkboxes, false),
            field(names::CURRENT_TREATMENTS, "Current treatments", FieldKind::Checkboxes, false),
            field(names::MEDICATIONS, "Medications", FieldKind::Checkboxes, false),
            field(names::MOBILITY_AIDS, "Mobility aids", FieldKind::Checkboxes, false),
            field(names::DAILY_IMPACT, "Impact on daily life", FieldKind::Checkboxes, false),
            field(names::ADDITIONAL_HISTORY, "Other conditions", FieldKind::Checkboxes, false),
            field(names::RED_FLAGS, "Warning signs", FieldKind::Checkboxes, false),
        ],
    },
    StepDef {
        number: 4,
        title: "Goals",
        fields: &[
            field(names::GOALS, "Treatment goals", FieldKind::Checkboxes, false),
            field(names::TIMELINE, "Expected timeline", FieldKind::Select, false),
            field(names::MILESTONES, "Milestones", FieldKind::Checkboxes, false),
            field(names::CONCERNS, "Concerns", FieldKind::Checkboxes, false),
        ],
    },
    StepDef {
        number: 5,
        title: "Review",
        fields: &[field(names::CONSENT, "Consent", FieldKind::Checkbox, true)],
    },
];

pub fn step_def(step: u8) -> Option<&'static StepDef> {
    STEPS.iter().find(|s| s.number == step)
}

// ═══════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    InvalidEmail,
    OutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub step: u8,
    pub field: &'static str,
    pub label: &'static str,
    pub kind: IssueKind,
}

/// Every failing field of the validated steps, never short-circuited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub issues: Vec<FieldIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn flagged_fields(&self) -> Vec<&'static str> {
        self.issues.iter().map(|i| i.field).collect()
    }

    fn merge(&mut self, other: ValidationReport) {
        self.issues.extend(other.issues);
    }
}

/// Validate one step. An unknown step has no fields and always passes.
pub fn validate_step(step: u8, fields: &FormFields) -> ValidationReport {
    let mut report = ValidationReport::default();
    let Some(def) = step_def(step) else {
        return report;
    };

    for f in def.fields {
        let issue = |kind| FieldIssue {
            step,
            field: f.name,
            label: f.label,
            kind,
        };

        if !fields.is_filled(f.name) {
            if f.required {
                report.issues.push(issue(IssueKind::Missing));
            }
            continue;
        }

        match f.kind {
            FieldKind::Email => {
                if !fields.text(f.name).is_some_and(is_well_formed_email) {
                    report.issues.push(issue(IssueKind::InvalidEmail));
                }
            }
            FieldKind::Range { min, max } => {
                let in_range = fields
                    .text(f.name)
                    .and_then(|v| v.parse::<i64>().ok())
                    .is_some_and(|v| v >= i64::from(min) && v <= i64::from(max));
                if !in_range {
                    report.issues.push(issue(IssueKind::OutOfRange));
                }
            }
            _ => {}
        }
    }

    report
}

/// Validate every step, collecting all failures.
pub fn validate_all(fields: &FormFields) -> ValidationReport {
    let mut report = ValidationReport::default();
    for def in &STEPS {
        report.merge(validate_step(def.number, fields));
    }
    report
}

/// `local@domain.tld` with no whitespace and a dot inside the domain.
pub fn is_well_formed_email(value: &str) -> bool {
    let value = value.trim();
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty() && !domain.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn welcome_answers() -> FormFields {
        let mut fields = FormFields::new();
        fields.set_text(names::FULL_NAME, "Jane Doe");
        fields.set_text(names::EMAIL, "jane@example.org");
        fields
    }

    #[test]
    fn layout_has_five_numbered_steps() {
        assert_eq!(STEPS.len(), 5);
        for (i, s) in STEPS.iter().enumerate() {
            assert_eq!(s.number as usize, i + 1);
        }
        assert_eq!(step_def(5).unwrap().title, "Review");
        assert!(step_def(6).is_none());
    }

    #[test]
    fn collects_all_missing_required_fields() {
        let report = validate_step(1, &FormFields::new());
        assert!(!report.is_valid());
        assert_eq!(report.flagged_fields(), vec![names::FULL_NAME, names::EMAIL]);
    }

    #[test]
    fn filled_welcome_step_passes() {
        assert!(validate_step(1, &welcome_answers()).is_valid());
    }

    #[test]
    fn malformed_email_is_flagged() {
        let mut fields = welcome_answers();
        fields.set_text(names::EMAIL, "jane@localhost");
        let report = validate_step(1, &fields);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::InvalidEmail);
    }

    #[test]
    fn optional_steps_pass_when_empty() {
        assert!(validate_step(3, &FormFields::new()).is_valid());
        assert!(validate_step(4, &FormFields::new()).is_valid());
    }

    #[test]
    fn intensity_must_be_in_range_when_present() {
        let mut fields = FormFields::new();
        fields.set_text(names::PAIN_DURATION, "2-6 weeks");
        fields.set_text(names::PAIN_INTENSITY, "12");
        let report = validate_step(2, &fields);
        assert_eq!(report.issues[0].kind, IssueKind::OutOfRange);

        fields.set_text(names::PAIN_INTENSITY, "8");
        assert!(validate_step(2, &fields).is_valid());
    }

    #[test]
    fn validate_all_spans_steps() {
        let report = validate_all(&FormFields::new());
        assert_eq!(
            report.flagged_fields(),
            vec![names::FULL_NAME, names::EMAIL, names::PAIN_DURATION, names::CONSENT]
        );
    }

    #[test]
    fn email_shapes() {
        assert!(is_well_formed_email("a@b.co"));
        assert!(is_well_formed_email(" jane.doe+x@mail.example.org "));
        assert!(!is_well_formed_email("a@b"));
        assert!(!is_well_formed_email("@b.co"));
        assert!(!is_well_formed_email("a b@c.co"));
        assert!(!is_well_formed_email("a@@b.co"));
        assert!(!is_well_formed_email("a@.co"));
    }
}
