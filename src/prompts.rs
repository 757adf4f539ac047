//! The extraction prompt sent to the vision model with every image.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the per-field rules are generated from
//!    [`Field::ALL`], so the keys the model is told to emit are exactly the
//!    keys the parser accepts.
//!
//! 2. **Testability**: unit tests can inspect the prompt directly without
//!    spinning up a real VLM, making prompt regressions easy to catch.
//!
//! Callers can override the default via [`crate::config::ExtractionConfig::prompt`];
//! [`EXTRACTION_PROMPT`] is used only when no override is provided.

use crate::schema::{FeeType, Field, FieldKind};
use once_cell::sync::Lazy;

/// Role-priming preamble.
const PREAMBLE: &str = "\
**Role**: You are a Senior Academic Data Extraction Specialist with 20+ years of experience in educational content analysis.

**Task**: Analyze the attached course advertisement image and extract structured information. \
Extract only what is literally printed in the image. Do not infer, guess or hallucinate any value. \
If a field is ambiguous or missing, set its value to null.";

/// Fee-conflict policy: trial and demo prices are not the course fee.
const FEE_POLICY: &str = "\
**Fee Rules**:
- A free demo, free trial, free orientation, promotional or introductory price is NOT the course fee.
- Never report the course fee as 0 or the fee type as \"Free\" because of a free demo, trial or orientation.
- Only use \"Free\" when the course itself is explicitly advertised as free.";

/// Hard output constraint.
const OUTPUT_RULES: &str = "\
**Output Format Rules**:
- Output only a single valid JSON object with exactly the keys listed above, and no other keys.
- Every key must be present; use null for any field that is ambiguous or not present.
- Values must come only from information explicitly shown in the image. Do not fabricate or infer content.
- Ignore text artifacts, watermarks and logos.
- Remove any information not related to the course.";

/// Hints about what the images usually look like.
const IMAGE_CONTEXT: &str = "\
**Image Context**:
- Academic brochure/flyer format.
- Common sections: Title, Schedule, Fees, Curriculum.";

/// The rule line for one field, chosen by the shape of value it carries.
fn field_rule(field: Field) -> String {
    match field.kind() {
        FieldKind::Text => {
            "Extract the official program title only (exclude any institution names).".to_string()
        }
        FieldKind::Duration => {
            "Extract the total length and its unit exactly as given (e.g. \"8 weeks\").".to_string()
        }
        FieldKind::Date => "Extract the start date in YYYY-MM-DD format.\n   \
             - If the year is missing, return the date in MM-DD format.\n   \
             - If only the month and year are given, return YYYY-MM.\n   \
             - Otherwise, if no clear start date is provided, return null."
            .to_string(),
        FieldKind::Weekdays => "Extract the weekday names from the schedule as a comma-separated \
             string of full names (e.g. \"Monday, Wednesday\")."
            .to_string(),
        FieldKind::Numeric => "Extract only the numerical value of the course fee as digits. \
             Remove any currency symbols and non-numeric characters."
            .to_string(),
        FieldKind::FeeType => {
            let labels: Vec<String> = FeeType::ALL
                .iter()
                .map(|ft| format!("\"{}\"", ft.label()))
                .collect();
            format!(
                "Extract exactly one of the following values: {}. \
                 If none is explicitly mentioned, return null.",
                labels.join(", ")
            )
        }
        FieldKind::FreeText => "List the key modules/topics from the curriculum, outline or \
             headlines. If no module list is given but there is descriptive text about the \
             course's goals or content, use that text. Otherwise return null."
            .to_string(),
    }
}

/// Assemble the full instruction text from the schema.
///
/// Pure and deterministic: every call returns the same string.
pub fn build_prompt() -> String {
    let mut out = String::with_capacity(3072);
    out.push_str(PREAMBLE);
    out.push_str("\n\n**Required Fields**:\n");
    for (i, field) in Field::ALL.iter().enumerate() {
        out.push_str(&format!("{}. \"{}\": {}\n", i + 1, field.key(), field_rule(*field)));
    }
    out.push('\n');
    out.push_str(FEE_POLICY);
    out.push_str("\n\n");
    out.push_str(OUTPUT_RULES);
    out.push_str("\n\n");
    out.push_str(IMAGE_CONTEXT);
    out.push_str("\n\n**Output**:\n");
    out
}

/// The default prompt, built once.
pub static EXTRACTION_PROMPT: Lazy<String> = Lazy::new(build_prompt);
