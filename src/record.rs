//! Course record types produced by the extraction pipeline.

use crate::schema::{FeeType, Field};
use serde::{Deserialize, Serialize};

/// The seven schema fields of one extracted course.
///
/// Every field is `Option<String>`: `None` serialises as an explicit JSON
/// `null` and is never skipped, so every record carries exactly the schema's
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseFields {
    #[serde(rename = "Course name", default)]
    pub course_name: Option<String>,
    #[serde(rename = "Course duration", default)]
    pub course_duration: Option<String>,
    #[serde(rename = "Course start date", default)]
    pub course_start_date: Option<String>,
    #[serde(rename = "Class day", default)]
    pub class_day: Option<String>,
    #[serde(rename = "Course fee", default)]
    pub course_fee: Option<String>,
    #[serde(rename = "Fee type", default)]
    pub fee_type: Option<String>,
    #[serde(rename = "Course Outline / Summary", default)]
    pub course_outline: Option<String>,
}

impl CourseFields {
    /// The deterministic fallback: every field `null`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.slot(field).as_deref()
    }

    /// Set one field. Blank strings are stored as `None`.
    pub fn set(&mut self, field: Field, value: Option<String>) {
        *self.slot_mut(field) = value.filter(|v| !v.trim().is_empty());
    }

    /// `true` when the model found nothing at all.
    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.get(*f).is_none())
    }

    /// Number of fields holding a value.
    pub fn filled(&self) -> usize {
        Field::ALL.iter().filter(|f| self.get(**f).is_some()).count()
    }

    /// Typed view of `Fee type`; `None` when absent or not a known label.
    pub fn fee_type(&self) -> Option<FeeType> {
        self.fee_type.as_deref().and_then(FeeType::parse)
    }

    fn slot(&self, field: Field) -> &Option<String> {
        match field {
            Field::CourseName => &self.course_name,
            Field::CourseDuration => &self.course_duration,
            Field::CourseStartDate => &self.course_start_date,
            Field::ClassDay => &self.class_day,
            Field::CourseFee => &self.course_fee,
            Field::FeeType => &self.fee_type,
            Field::CourseOutline => &self.course_outline,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::CourseName => &mut self.course_name,
            Field::CourseDuration => &mut self.course_duration,
            Field::CourseStartDate => &mut self.course_start_date,
            Field::ClassDay => &mut self.class_day,
            Field::CourseFee => &mut self.course_fee,
            Field::FeeType => &mut self.fee_type,
            Field::CourseOutline => &mut self.course_outline,
        }
    }
}

/// One row of the result table: the extracted fields plus the name of the
/// image they came from.
///
/// Immutable once built; the table only ever appends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(rename = "Source File")]
    pub source_file: String,
    #[serde(flatten)]
    pub fields: CourseFields,
}

impl CourseRecord {
    pub fn new(source_file: impl Into<String>, fields: CourseFields) -> Self {
        Self {
            source_file: source_file.into(),
            fields,
        }
    }

    /// All-null record for an image whose extraction failed.
    pub fn fallback(source_file: impl Into<String>) -> Self {
        Self::new(source_file, CourseFields::empty())
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.fields.get(field)
    }

    /// Cells in column order, `None` for nulls.
    pub fn cells(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        std::iter::once(Some(self.source_file.as_str()))
            .chain(Field::ALL.into_iter().map(|f| self.fields.get(f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn fallback_serialises_explicit_nulls() {
        let rec = CourseRecord::fallback("flyer.png");
        let v: Value = serde_json::to_value(&rec).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert_eq!(obj["Source File"], "flyer.png");
        for field in Field::ALL {
            assert!(obj[field.key()].is_null(), "{field} should be null");
        }
    }

    #[test]
    fn serialised_key_order_matches_columns() {
        let rec = CourseRecord::fallback("x.jpg");
        let json = serde_json::to_string(&rec).unwrap();
        let mut last = 0;
        for col in crate::schema::columns() {
            let pos = json.find(&format!("\"{col}\"")).unwrap();
            assert!(pos >= last, "{col} out of order in {json}");
            last = pos;
        }
    }

    #[test]
    fn set_normalises_blank_to_none() {
        let mut f = CourseFields::empty();
        f.set(Field::CourseFee, Some("   ".into()));
        assert_eq!(f.get(Field::CourseFee), None);
        f.set(Field::CourseFee, Some("499".into()));
        assert_eq!(f.get(Field::CourseFee), Some("499"));
        assert_eq!(f.filled(), 1);
        assert!(!f.is_empty());
    }

    #[test]
    fn fee_type_typed_view() {
        let mut f = CourseFields::empty();
        assert_eq!(f.fee_type(), None);
        f.set(Field::FeeType, Some("Monthly".into()));
        assert_eq!(f.fee_type(), Some(FeeType::Monthly));
        f.set(Field::FeeType, Some("Per term".into()));
        assert_eq!(f.fee_type(), None);
    }

    #[test]
    fn cells_follow_column_order() {
        let mut fields = CourseFields::empty();
        fields.set(Field::CourseName, Some("Rust 101".into()));
        let rec = CourseRecord::new("a.png", fields);
        let cells: Vec<_> = rec.cells().collect();
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[0], Some("a.png"));
        assert_eq!(cells[1], Some("Rust 101"));
        assert!(cells[2..].iter().all(Option::is_none));
    }

    #[test]
    fn deserialise_round_trip() {
        let json = r#"{"Source File":"b.png","Course name":"X","Course duration":null,
            "Course start date":null,"Class day":null,"Course fee":"10",
            "Fee type":"Free","Course Outline / Summary":null}"#;
        let rec: CourseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.source_file, "b.png");
        assert_eq!(rec.get(Field::CourseFee), Some("10"));
    }
}
