//! Clinical summary prompt.
//!
//! Built from the wizard payload: patient details, pain map, timing,
//! modifying factors, history, red flags and goals, followed by fixed
//! analysis instructions. Patient text never contains backticks.

use std::fmt::Write as _;

use crate::models::{IntakeAnswers, Snapshot};

/// Output cap for the streamed summary.
pub const STREAM_MAX_TOKENS: u32 = 1500;
/// Output cap for the single-shot summary.
pub const GENERATE_MAX_TOKENS: u32 = 1024;

const INSTRUCTIONS: &str = "
=================================================================================
CLINICAL ANALYSIS INSTRUCTIONS:
=================================================================================
Your task is to provide a comprehensive clinical analysis for a healthcare provider.

ANALYSIS REQUIREMENTS:
1. **Pain Presentation**: Synthesize the pain location(s), intensity, timing, and pattern
2. **Symptom Complex**: Integrate associated symptoms, aggravating/relieving factors
3. **Functional Impact**: Assess how pain affects daily activities and quality of life
4. **Medical Context**: Consider relevant history and prior or current treatments
5. **Red Flag Assessment**: Evaluate urgency based on red flag symptoms:
   - HIGH_URGENCY: Bowel/bladder dysfunction, saddle anesthesia, progressive weakness, severe neurological deficits
   - MODERATE_URGENCY: Fever, unexplained weight loss, night pain, cancer history with new pain
   - LOW_URGENCY: No significant red flags
6. **Treatment Alignment**: Address the patient's stated goals and concerns
7. **Clinical Reasoning**: Provide differential considerations (NOT definitive diagnoses)
8. **Recommendations**: Suggest appropriate next steps and triage level

RESPONSE FORMAT:
Structure your response as follows:

**Clinical Overview**
[Synthesize the complete pain presentation in 2-3 sentences]

**Key Findings**
- Pain Pattern: [Distribution, timing]
- Associated Features: [Relevant symptoms and functional impact]
- Medical Context: [Pertinent history and treatments]
- Red Flags: [List any present, or state \"None identified\"]

**Clinical Considerations**
[Discuss possible pathologies to consider - use conditional language, NOT definitive diagnoses]

**Recommendations**
- Urgency: [HIGH_URGENCY, MODERATE_URGENCY, or LOW_URGENCY]
- Next Steps: [Specific actions for healthcare provider]
- Patient Goals: [How to address treatment preferences]

Write professionally for a clinician audience. Be thorough but concise. Use clinical terminology appropriately.
";

fn clean(text: &str) -> String {
    text.replace('`', "'").trim().to_string()
}

fn or_missing(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(clean)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "Not provided".to_string())
}

fn bullet_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for item in items {
        let _ = writeln!(out, "- {}", clean(item));
    }
}

/// Build the prompt. `None` when the payload is not a wizard object.
pub fn build_prompt(payload: &serde_json::Value) -> Option<String> {
    if !payload.is_object() {
        return None;
    }
    let snapshot: Snapshot = serde_json::from_value(payload.clone()).ok()?;
    let answers = IntakeAnswers::from_fields(&snapshot.fields);
    let mut out = String::new();

    out.push_str("You are a clinical AI assistant analyzing a comprehensive pain assessment form.\n\n");
    out.push_str("PATIENT INFORMATION:\n");
    let _ = writeln!(out, "- Name: {}", or_missing(&answers.personal.full_name));
    let _ = writeln!(out, "- Email: {}", or_missing(&answers.personal.email));
    if let Some(dob) = &answers.personal.date_of_birth {
        let _ = writeln!(out, "- Date of Birth: {}", clean(dob));
    }
    if let Some(phone) = &answers.personal.phone {
        let _ = writeln!(out, "- Phone: {}", clean(phone));
    }

    out.push_str("\nPAIN MAPPING DATA:\n");
    if !snapshot.pain_points.is_empty() {
        for point in &snapshot.pain_points {
            let region = if point.region.is_empty() {
                &point.original_name
            } else {
                &point.region
            };
            let _ = writeln!(
                out,
                "- Region: {} ({}), Intensity: {}/10",
                clean(region),
                point.view.label(),
                point.intensity
            );
        }
    } else if !snapshot.selected_areas.is_empty() {
        for area in &snapshot.selected_areas {
            let _ = writeln!(out, "- {}", clean(area));
        }
    } else {
        out.push_str("No pain areas marked\n");
    }

    let pain = &answers.pain;
    if pain.onset.is_some() || pain.duration.is_some() || pain.intensity.is_some() {
        out.push_str("\nPAIN TIMING & PATTERN:\n");
        if let Some(onset) = &pain.onset {
            let _ = writeln!(out, "- Onset: {}", clean(&onset.replace('_', " ")));
        }
        if let Some(duration) = &pain.duration {
            let _ = writeln!(out, "- Duration: {}", clean(duration));
        }
        if let Some(intensity) = pain.intensity {
            let _ = writeln!(out, "- Overall intensity: {intensity}/10");
        }
    }

    bullet_section(&mut out, "AGGRAVATING FACTORS", &answers.aggravators.factors);
    bullet_section(&mut out, "RELIEVING FACTORS", &answers.relievers.factors);
    bullet_section(&mut out, "ASSOCIATED SYMPTOMS", &answers.associated.symptoms);

    let history = &answers.history;
    if !history.is_empty() {
        out.push_str("\nMEDICAL HISTORY:\n");
        for (label, values) in [
            ("Prior orthopedic history", &history.prior_orthopedic),
            ("Current treatments", &history.current_treatments),
            ("Current medications", &history.medications),
            ("Mobility aids", &history.mobility_aids),
            ("Daily impact", &history.daily_impact),
            ("Medical conditions", &history.conditions),
        ] {
            if !values.is_empty() {
                let joined: Vec<_> = values.iter().map(|v| clean(v)).collect();
                let _ = writeln!(out, "- {label}: {}", joined.join(", "));
            }
        }
    }

    out.push_str("\nRED FLAG SYMPTOMS:\n");
    if answers.red_flags.any() {
        out.push_str("RED FLAGS PRESENT\n");
        for flag in &answers.red_flags.reported {
            let _ = writeln!(out, "- {}", clean(flag));
        }
    } else {
        out.push_str("No red flag symptoms reported\n");
    }

    out.push_str("\nTREATMENT GOALS:\n");
    let goals = &answers.goals;
    if goals.goals.is_empty() {
        out.push_str("Not specified by patient\n");
    } else {
        for goal in &goals.goals {
            let _ = writeln!(out, "- {}", clean(goal));
        }
    }
    if let Some(timeline) = &goals.timeline {
        let _ = writeln!(out, "- Timeline: {}", clean(timeline));
    }
    if !goals.milestones.is_empty() {
        let joined: Vec<_> = goals.milestones.iter().map(|v| clean(v)).collect();
        let _ = writeln!(out, "- Milestones: {}", joined.join(", "));
    }
    if !goals.concerns.is_empty() {
        let joined: Vec<_> = goals.concerns.iter().map(|v| clean(v)).collect();
        let _ = writeln!(out, "- Concerns: {}", joined.join(", "));
    }

    out.push('\n');
    out.push_str(INSTRUCTIONS);
    Some(out)
}
