//! The fixed extraction schema: which fields a course record has, in which
//! order, and what kind of value each one carries.
//!
//! Every other module (prompt, parser, table export) iterates [`Field::ALL`]
//! rather than listing keys by hand, so the column order can never drift
//! between the prompt the model sees and the CSV the user downloads.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header of the provenance column that precedes the schema fields.
pub const SOURCE_FILE_COLUMN: &str = "Source File";

/// One field of the extraction schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CourseName,
    CourseDuration,
    CourseStartDate,
    ClassDay,
    CourseFee,
    FeeType,
    CourseOutline,
}

/// Semantic type of a field's value.
///
/// All values travel as strings; the kind documents the shape the prompt asks
/// the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form single-line text.
    Text,
    /// Length plus unit, kept exactly as printed ("8 weeks", "3 months").
    Duration,
    /// `YYYY-MM-DD`, `YYYY-MM` or `MM-DD`.
    Date,
    /// Comma-separated weekday names.
    Weekdays,
    /// Digits only, no currency symbol.
    Numeric,
    /// One of the [`FeeType`] labels.
    FeeType,
    /// Multi-line prose or a topic list.
    FreeText,
}

impl Field {
    /// All schema fields in export order.
    pub const ALL: [Field; 7] = [
        Field::CourseName,
        Field::CourseDuration,
        Field::CourseStartDate,
        Field::ClassDay,
        Field::CourseFee,
        Field::FeeType,
        Field::CourseOutline,
    ];

    /// The exact key used in the model's JSON and in the exported header.
    pub const fn key(self) -> &'static str {
        match self {
            Field::CourseName => "Course name",
            Field::CourseDuration => "Course duration",
            Field::CourseStartDate => "Course start date",
            Field::ClassDay => "Class day",
            Field::CourseFee => "Course fee",
            Field::FeeType => "Fee type",
            Field::CourseOutline => "Course Outline / Summary",
        }
    }

    pub const fn kind(self) -> FieldKind {
        match self {
            Field::CourseName => FieldKind::Text,
            Field::CourseDuration => FieldKind::Duration,
            Field::CourseStartDate => FieldKind::Date,
            Field::ClassDay => FieldKind::Weekdays,
            Field::CourseFee => FieldKind::Numeric,
            Field::FeeType => FieldKind::FeeType,
            Field::CourseOutline => FieldKind::FreeText,
        }
    }

    /// Every field is nullable: a value absent from the image is `null`.
    pub const fn nullable(self) -> bool {
        true
    }

    /// Look a field up by its exact key. Case and surrounding whitespace
    /// matter: `"course name"` is not a schema key.
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Full header row: `Source File` followed by the schema keys.
pub fn columns() -> [&'static str; 8] {
    let mut cols = [SOURCE_FILE_COLUMN; 8];
    for (i, field) in Field::ALL.iter().enumerate() {
        cols[i + 1] = field.key();
    }
    cols
}

/// How the course is billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeType {
    #[serde(rename = "One-time")]
    OneTime,
    Monthly,
    Weekly,
    Free,
}

impl FeeType {
    pub const ALL: [FeeType; 4] = [
        FeeType::OneTime,
        FeeType::Monthly,
        FeeType::Weekly,
        FeeType::Free,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            FeeType::OneTime => "One-time",
            FeeType::Monthly => "Monthly",
            FeeType::Weekly => "Weekly",
            FeeType::Free => "Free",
        }
    }

    /// Parse a label as the model writes it. Tolerates case and the common
    /// "one time" / "onetime" spellings; anything else is `None`.
    pub fn parse(s: &str) -> Option<FeeType> {
        let norm: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | ' ' | '_'))
            .flat_map(char::to_lowercase)
            .collect();
        match norm.as_str() {
            "onetime" => Some(FeeType::OneTime),
            "monthly" => Some(FeeType::Monthly),
            "weekly" => Some(FeeType::Weekly),
            "free" => Some(FeeType::Free),
            _ => None,
        }
    }
}

impl fmt::Display for FeeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
