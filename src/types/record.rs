//! Named in-memory record structures.
//!
//! These are what the rest of the pipeline works with. Positional/array
//! encoding lives strictly at the serialization boundary in
//! [`crate::types::encoded`]; nothing here stores a table index.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One crawl unit: a term code derived from a year plus a sub-period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermCode(String);

impl TermCode {
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable term name for manifest entries, e.g. `202609` →
    /// `"Fall 2026"`. Unrecognized sub-periods fall back to the raw code.
    #[must_use]
    pub fn name(&self) -> String {
        if self.0.len() == 6 {
            let (year, period) = self.0.split_at(4);
            let season = match period {
                "01" => Some("Spring"),
                "06" => Some("Summer"),
                "09" => Some("Fall"),
                "12" => Some("Winter"),
                _ => None,
            };
            if let Some(season) = season {
                return format!("{season} {year}");
            }
        }
        format!("Term {}", self.0)
    }
}

impl fmt::Display for TermCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one fetchable catalog entity, stable across runs.
/// Used as the resume de-duplication key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CatalogKey {
    /// Subdivision the key belongs to, e.g. `"CSCI"`.
    pub subject: String,
    /// Catalog number within the subdivision, e.g. `"1100"`.
    pub number: String,
}

impl CatalogKey {
    #[must_use]
    pub fn new(subject: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            number: number.into(),
        }
    }

    /// Parses the display form (`"CSCI 1100"`) back into a key. A string
    /// without a separator becomes a subject-only key.
    #[must_use]
    pub fn parse(display: &str) -> Self {
        match display.split_once(' ') {
            Some((subject, number)) => Self::new(subject, number),
            None => Self::new(display, ""),
        }
    }
}

impl fmt::Display for CatalogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subject, self.number)
    }
}

/// A meeting time slot. Arbitrary inputs collapse onto exactly three
/// encodings: timed, arranged, or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimePeriod {
    /// Concrete start/end as minute-of-day (0..1440).
    Timed { start_minute: u16, end_minute: u16 },
    /// Meets by arrangement; no fixed slot.
    Arranged,
    /// Slot not published (TBA).
    Unknown,
}

/// A physical meeting place, optionally resolved to coordinates by an
/// external collaborator. Compared by canonical-serialized equality when
/// interned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub building: String,
    pub room: String,
    pub coordinates: Option<(f64, f64)>,
}

/// First and last meeting date of a section's meeting pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

/// One meeting pattern of a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    /// Day pattern, e.g. `"MWF"`.
    pub days: String,
    pub period: TimePeriod,
    pub location: Option<Location>,
    pub instructors: Vec<String>,
    pub date_range: Option<DateRange>,
    /// Final exam date, if published.
    pub final_date: Option<String>,
    /// Final exam time slot, if published.
    pub final_time: Option<TimePeriod>,
}

/// One offered section of a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section reference number (registration id).
    pub crn: String,
    pub credits: f32,
    pub schedule_type: String,
    pub campus: String,
    pub grade_basis: String,
    pub attributes: Vec<String>,
    pub restrictions: Vec<String>,
    pub meetings: Vec<Meeting>,
}

/// The structured result of fetching one catalog key. Immutable once
/// produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub key: CatalogKey,
    pub title: String,
    pub description: String,
    pub prerequisites: Vec<CatalogKey>,
    pub corequisites: Vec<CatalogKey>,
    pub sections: Vec<Section>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_name_known_seasons() {
        assert_eq!(TermCode::new("202609").name(), "Fall 2026");
        assert_eq!(TermCode::new("202701").name(), "Spring 2027");
        assert_eq!(TermCode::new("202606").name(), "Summer 2026");
    }

    #[test]
    fn term_name_falls_back_to_code() {
        assert_eq!(TermCode::new("202642").name(), "Term 202642");
        assert_eq!(TermCode::new("weird").name(), "Term weird");
    }

    #[test]
    fn catalog_key_display_round_trips() {
        let key = CatalogKey::new("CSCI", "1100");
        assert_eq!(key.to_string(), "CSCI 1100");
        assert_eq!(CatalogKey::parse("CSCI 1100"), key);
    }
}
