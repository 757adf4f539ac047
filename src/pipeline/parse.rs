//! Response parsing: untrusted model text → schema-conformant fields.
//!
//! The model is told to answer with a bare JSON object, but in practice it
//! wraps the object in ` ```json ` fences, adds a sentence before it, or
//! returns something that is not JSON at all. Parsing is therefore a small
//! combinator with three steps, each a pure function:
//!
//! 1. [`strip_fences`]: keep the fenced block if there is one, drop stray
//!    fence markers otherwise, trim.
//! 2. [`parse_response`]: decode a JSON object and project it onto the
//!    schema (unknown keys dropped, missing keys null).
//! 3. [`parse_or_fallback`]: absorb any decode failure into the all-null
//!    record, logging it instead of returning it.
//!
//! There is deliberately no general JSON-in-prose search: text that is still
//! not a JSON object after fence stripping is a decode failure.

use crate::error::ResponseDecodeError;
use crate::record::{CourseFields, CourseRecord};
use crate::schema::Field;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::warn;

/// A complete fenced block, optionally tagged `json`.
static RE_FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?si)```[ \t]*(?:json)?[ \t]*\r?\n?(.*?)```").unwrap());

/// A stray opening or closing marker left after an unterminated fence.
static RE_FENCE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

/// Remove markdown code-fence markers around the payload.
pub fn strip_fences(raw: &str) -> String {
    if let Some(caps) = RE_FENCED_BLOCK.captures(raw) {
        return caps[1].trim().to_string();
    }
    RE_FENCE_MARKER.replace_all(raw, "").trim().to_string()
}

/// Decode `raw` into schema fields.
///
/// Keys outside the schema are ignored and missing keys stay `None`. String
/// values pass through untouched; see [`value_to_text`] for other JSON types.
pub fn parse_response(raw: &str) -> Result<CourseFields, ResponseDecodeError> {
    let payload = strip_fences(raw);
    let value: Value =
        serde_json::from_str(&payload).map_err(|e| ResponseDecodeError::NotJson {
            detail: e.to_string(),
        })?;

    match value {
        Value::Object(map) => Ok(project(&map)),
        other => Err(ResponseDecodeError::NotAnObject {
            found: json_type_name(&other),
        }),
    }
}

/// Like [`parse_response`], but a decode failure yields the all-null fields.
pub fn parse_or_fallback(raw: &str) -> CourseFields {
    match parse_response(raw) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("Error parsing model response, using fallback: {}", e);
            CourseFields::empty()
        }
    }
}

/// Parse `raw` and attach the source file name.
///
/// Never fails: every input, including the empty string, yields a record with
/// exactly the schema's fields plus `Source File`.
pub fn parse_record(raw: &str, source_file: impl Into<String>) -> CourseRecord {
    CourseRecord::new(source_file, parse_or_fallback(raw))
}

/// Keep only the exact schema keys; anything else is dropped.
fn project(map: &Map<String, Value>) -> CourseFields {
    let mut fields = CourseFields::empty();
    for (key, value) in map {
        if let Some(field) = Field::from_key(key) {
            fields.set(field, value_to_text(value));
        }
    }
    fields
}

/// Render a JSON value as the record's text form.
///
/// Strings are returned verbatim; booleans as their literal; arrays as their
/// elements joined with `", "`; objects as compact JSON. `null` and blanks
/// become `None`.
///
/// Numbers arrive already parsed, so their printed form is gone: `499.00`
/// and `499` are the same value. Whole numbers render without a fractional
/// part (`"499"`), others in their shortest decimal form (`"12.5"`).
pub fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_text(n),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn number_to_text(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => format!("{f}"),
        _ => n.to_string(),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{"Course name": "X", "Course duration": "8 weeks", "Course start date": "2024-03-01", "Class day": "Monday, Wednesday", "Course fee": "499", "Fee type": "One-time", "Course Outline / Summary": "Python, stats"}"#;

    fn assert_closed(rec: &CourseRecord) {
        let v = serde_json::to_value(rec).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 8, "unexpected keys: {:?}", obj.keys());
        assert!(obj.contains_key("Source File"));
        for f in Field::ALL {
            assert!(obj.contains_key(f.key()));
        }
    }

    #[test]
    fn strip_fences_json_tag() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("```JSON\n{}\n```\n"), "{}");
        assert_eq!(strip_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_fences("  {} \n"), "{}");
    }

    #[test]
    fn strip_fences_with_surrounding_prose() {
        let raw = "Here is the extracted data:\n```json\n{\"a\": 1}\n```\nLet me know!";
        assert_eq!(strip_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_unterminated() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn fenced_round_trip_recovers_payload() {
        let raw = format!("```json\n{FULL}\n```");
        let fields = parse_response(&raw).unwrap();
        let expected: Value = serde_json::from_str(FULL).unwrap();
        assert_eq!(serde_json::to_value(&fields).unwrap(), expected);
    }

    #[test]
    fn not_json_falls_back_to_nulls() {
        let rec = parse_record("not json at all", "flyer.png");
        assert_eq!(rec.source_file, "flyer.png");
        assert!(rec.fields.is_empty());
        assert_closed(&rec);
    }

    #[test]
    fn never_fails_on_odd_input() {
        for raw in ["", "   ", "```", "```json\n```", "{", "[1,2]", "null", "\"str\"", "{\"Course name\": "] {
            let rec = parse_record(raw, "x.png");
            assert!(rec.fields.is_empty(), "input {raw:?}");
            assert_closed(&rec);
        }
    }

    #[test]
    fn decode_errors_are_typed() {
        assert!(matches!(
            parse_response("nope"),
            Err(ResponseDecodeError::NotJson { .. })
        ));
        assert_eq!(
            parse_response("[1]"),
            Err(ResponseDecodeError::NotAnObject { found: "an array" })
        );
    }

    #[test]
    fn extra_keys_are_dropped() {
        let rec = parse_record(r#"{"Course name":"X","Extra":"Y"}"#, "a.png");
        assert_eq!(rec.get(Field::CourseName), Some("X"));
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("Extra"));
        assert_closed(&rec);
    }

    #[test]
    fn missing_keys_become_null() {
        let fields = parse_response(r#"{"Course fee": "120"}"#).unwrap();
        assert_eq!(fields.get(Field::CourseFee), Some("120"));
        assert_eq!(fields.filled(), 1);
    }

    #[test]
    fn strings_pass_through_uncoerced() {
        let fields = parse_response(r#"{"Course fee": "$1,200 per term"}"#).unwrap();
        assert_eq!(fields.get(Field::CourseFee), Some("$1,200 per term"));
    }

    #[test]
    fn non_string_values_rendered_as_text() {
        let fields = parse_response(
            r#"{"Course fee": 499, "Class day": ["Monday", "Wednesday"], "Course name": "", "Fee type": null}"#,
        )
        .unwrap();
        assert_eq!(fields.get(Field::CourseFee), Some("499"));
        assert_eq!(fields.get(Field::ClassDay), Some("Monday, Wednesday"));
        assert_eq!(fields.get(Field::CourseName), None);
        assert_eq!(fields.get(Field::FeeType), None);
    }

    #[test]
    fn near_miss_keys_are_not_schema_keys() {
        let rec = parse_record(r#"{"course name":"X","COURSE FEE":"10"}"#, "a.png");
        assert_eq!(rec.get(Field::CourseName), None);
        assert_eq!(rec.get(Field::CourseFee), None);
        assert!(rec.fields.is_empty());
        assert_closed(&rec);

        let fields =
            parse_response(r#"{"Course name": "exact", " Course name ": "padded"}"#).unwrap();
        assert_eq!(fields.get(Field::CourseName), Some("exact"));
    }

    #[test]
    fn whole_number_fee_keeps_digits_only() {
        let fields =
            parse_response(r#"{"Course fee": 499.00, "Course duration": 12.5, "Class day": 3}"#)
                .unwrap();
        assert_eq!(fields.get(Field::CourseFee), Some("499"));
        assert_eq!(fields.get(Field::CourseDuration), Some("12.5"));
        assert_eq!(fields.get(Field::ClassDay), Some("3"));
    }

    #[test]
    fn data_science_scenario() {
        let raw = "```json\n{\"Course name\":\"Intro to Data Science\",\"Course duration\":\"8 weeks\",\
            \"Course start date\":\"2024-03\",\"Class day\":\"Monday, Wednesday\",\"Course fee\":\"499\",\
            \"Fee type\":\"One-time\",\"Course Outline / Summary\":\"Python, stats, ML basics\"}\n```";
        let rec = parse_record(raw, "ds.jpg");
        assert_eq!(rec.get(Field::CourseName), Some("Intro to Data Science"));
        assert_eq!(rec.get(Field::CourseDuration), Some("8 weeks"));
        assert_eq!(rec.get(Field::CourseStartDate), Some("2024-03"));
        assert_eq!(rec.get(Field::ClassDay), Some("Monday, Wednesday"));
        assert_eq!(rec.get(Field::CourseFee), Some("499"));
        assert_eq!(rec.fields.fee_type(), Some(crate::schema::FeeType::OneTime));
        assert_eq!(rec.get(Field::CourseOutline), Some("Python, stats, ML basics"));
    }
}
