//! Raw wizard answers and the typed per-section view over them.
//!
//! The wizard stores answers exactly as the form produces them: a map from
//! field name to either a single string or a set of checked values. Everything
//! that interprets answers (review, prompt building, red-flag checks) goes
//! through [`IntakeAnswers`] instead of poking at raw names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Form field names as they appear in the snapshot and submission payloads.
pub mod names {
    pub const FULL_NAME: &str = "fullName";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const DOB: &str = "dob";
    pub const PAIN_DURATION: &str = "painDuration";
    pub const PAIN_INTENSITY: &str = "painIntensity";
    pub const PAIN_START: &str = "painStart";
    pub const AGGRAVATORS: &str = "aggravators";
    pub const RELIEVERS: &str = "relievers";
    pub const ASSOCIATED_SYMPTOMS: &str = "associatedSymptoms";
    pub const PREV_ORTHO: &str = "prevOrtho";
    pub const CURRENT_TREATMENTS: &str = "currentTreatments";
    pub const MEDICATIONS: &str = "medications";
    pub const MOBILITY_AIDS: &str = "mobilityAids";
    pub const DAILY_IMPACT: &str = "dailyImpact";
    pub const ADDITIONAL_HISTORY: &str = "additionalHistory";
    pub const RED_FLAGS: &str = "redFlags";
    pub const GOALS: &str = "goals";
    pub const TIMELINE: &str = "timeline";
    pub const MILESTONES: &str = "milestones";
    pub const CONCERNS: &str = "concerns";
    pub const CONSENT: &str = "consent";
}

/// Checkbox groups. Their values are sets; everything else is a single string.
pub const MULTI_VALUE_FIELDS: &[&str] = &[
    names::AGGRAVATORS,
    names::RELIEVERS,
    names::ASSOCIATED_SYMPTOMS,
    names::PREV_ORTHO,
    names::CURRENT_TREATMENTS,
    names::MEDICATIONS,
    names::MOBILITY_AIDS,
    names::DAILY_IMPACT,
    names::ADDITIONAL_HISTORY,
    names::RED_FLAGS,
    names::GOALS,
    names::MILESTONES,
    names::CONCERNS,
];

pub fn is_multi_value(name: &str) -> bool {
    MULTI_VALUE_FIELDS.contains(&name)
}

// ═══════════════════════════════════════════════════════════
// Raw values
// ═══════════════════════════════════════════════════════════

/// One raw answer. Serializes as a JSON string or a JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Multi(BTreeSet<String>),
}

impl FieldValue {
    /// True when the answer carries something other than whitespace.
    pub fn is_filled(&self) -> bool {
        match self {
            Self::Text(s) => !s.trim().is_empty(),
            Self::Multi(values) => values.iter().any(|v| !v.trim().is_empty()),
        }
    }
}

/// All raw answers keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormFields(BTreeMap<String, FieldValue>);

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: BTreeMap<String, FieldValue>) -> Self {
        Self(map)
    }

    pub fn as_map(&self) -> &BTreeMap<String, FieldValue> {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Set a single-value answer. Values are stored verbatim, including
    /// empty strings, so a restored form shows exactly what was typed.
    pub fn set_text(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.to_string(), FieldValue::Text(value.to_string()));
    }

    /// Replace a checkbox group wholesale. An empty group is removed.
    pub fn set_values<I, S>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_string(), FieldValue::Multi(set));
        }
    }

    /// Check or uncheck one checkbox value. An emptied group is removed.
    pub fn toggle_value(&mut self, name: &str, value: &str, checked: bool) {
        let mut set = match self.0.remove(name) {
            Some(FieldValue::Multi(set)) => set,
            Some(FieldValue::Text(existing)) if !existing.is_empty() => {
                BTreeSet::from([existing])
            }
            _ => BTreeSet::new(),
        };
        if checked {
            set.insert(value.to_string());
        } else {
            set.remove(value);
        }
        if !set.is_empty() {
            self.0.insert(name.to_string(), FieldValue::Multi(set));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.0.remove(name)
    }

    /// Trimmed single value, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) if !s.trim().is_empty() => Some(s.trim()),
            _ => None,
        }
    }

    /// Checked values of a group. A lone text value counts as one entry.
    pub fn values(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(FieldValue::Multi(set)) => set.iter().cloned().collect(),
            Some(FieldValue::Text(s)) if !s.trim().is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn is_filled(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(FieldValue::is_filled)
    }

    /// Count of answers that carry content.
    pub fn filled_count(&self) -> usize {
        self.0.values().filter(|v| v.is_filled()).count()
    }
}

// ═══════════════════════════════════════════════════════════
// Typed sections
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonalInfo {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PainTiming {
    /// How it started (sudden injury, gradual, after surgery, ...).
    pub onset: Option<String>,
    pub duration: Option<String>,
    /// Overall slider rating; `None` when absent or not a 0–10 integer.
    pub intensity: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Aggravators {
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Relievers {
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssociatedSymptoms {
    pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MedicalHistory {
    pub prior_orthopedic: Vec<String>,
    pub current_treatments: Vec<String>,
    pub medications: Vec<String>,
    pub mobility_aids: Vec<String>,
    pub daily_impact: Vec<String>,
    pub conditions: Vec<String>,
}

impl MedicalHistory {
    pub fn is_empty(&self) -> bool {
        self.prior_orthopedic.is_empty()
            && self.current_treatments.is_empty()
            && self.medications.is_empty()
            && self.mobility_aids.is_empty()
            && self.daily_impact.is_empty()
            && self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RedFlags {
    pub reported: Vec<String>,
}

impl RedFlags {
    pub fn any(&self) -> bool {
        !self.reported.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreatmentGoals {
    pub goals: Vec<String>,
    pub timeline: Option<String>,
    pub milestones: Vec<String>,
    pub concerns: Vec<String>,
}

/// Typed projection of [`FormFields`], one record per form section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeAnswers {
    pub personal: PersonalInfo,
    pub pain: PainTiming,
    pub aggravators: Aggravators,
    pub relievers: Relievers,
    pub associated: AssociatedSymptoms,
    pub history: MedicalHistory,
    pub red_flags: RedFlags,
    pub goals: TreatmentGoals,
    pub consent: bool,
}

impl IntakeAnswers {
    pub fn from_fields(fields: &FormFields) -> Self {
        let text = |name: &str| fields.text(name).map(str::to_string);
        Self {
            personal: PersonalInfo {
                full_name: text(names::FULL_NAME),
                email: text(names::EMAIL),
                phone: text(names::PHONE),
                date_of_birth: text(names::DOB),
            },
            pain: PainTiming {
                onset: text(names::PAIN_START),
                duration: text(names::PAIN_DURATION),
                intensity: fields
                    .text(names::PAIN_INTENSITY)
                    .and_then(|v| v.parse::<u8>().ok())
                    .filter(|v| *v <= 10),
            },
            aggravators: Aggravators {
                factors: fields.values(names::AGGRAVATORS),
            },
            relievers: Relievers {
                factors: fields.values(names::RELIEVERS),
            },
            associated: AssociatedSymptoms {
                symptoms: fields.values(names::ASSOCIATED_SYMPTOMS),
            },
            history: MedicalHistory {
                prior_orthopedic: fields.values(names::PREV_ORTHO),
                current_treatments: fields.values(names::CURRENT_TREATMENTS),
                medications: fields.values(names::MEDICATIONS),
                mobility_aids: fields.values(names::MOBILITY_AIDS),
                daily_impact: fields.values(names::DAILY_IMPACT),
                conditions: fields.values(names::ADDITIONAL_HISTORY),
            },
            red_flags: RedFlags {
                reported: fields.values(names::RED_FLAGS),
            },
            goals: TreatmentGoals {
                goals: fields.values(names::GOALS),
                timeline: text(names::TIMELINE),
                milestones: fields.values(names::MILESTONES),
                concerns: fields.values(names::CONCERNS),
            },
            consent: fields.is_filled(names::CONSENT),
        }
    }
}
