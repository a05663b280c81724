//! Positional tuple forms of records, sections, and meetings.
//!
//! These are the serialization-boundary types: tuple structs serialize as
//! arrays, so shard files and merged datasets stay compact. Every `u32` is
//! an index into a category table in [`crate::intern::TableSet`]. Conversion
//! to and from the named structures happens only in [`crate::encode`].
//!
//! The `V1` shapes predate the date-range and final-exam fields; version-1
//! shards decode through them and are upgraded on load (see
//! [`crate::shard`]).

use serde::{Deserialize, Serialize};

/// Encoded meeting: `(days, period, location, instructors, date_range,
/// final_date, final_time)`.
///
/// `period` always resolves; the table carries the `arranged` / `unknown`
/// sentinels. The optional fields stay `None` when the source published
/// nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedMeeting(
    pub String,
    pub u32,
    pub Option<u32>,
    pub Vec<String>,
    pub Option<u32>,
    pub Option<u32>,
    pub Option<u32>,
);

/// Legacy meeting shape: `(days, period, location, instructors)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedMeetingV1(pub String, pub u32, pub Option<u32>, pub Vec<String>);

impl From<EncodedMeetingV1> for EncodedMeeting {
    fn from(m: EncodedMeetingV1) -> Self {
        Self(m.0, m.1, m.2, m.3, None, None, None)
    }
}

/// Encoded section: `(crn, credits, schedule_type, campus, grade_basis,
/// attributes, restrictions, meetings)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSection(
    pub String,
    pub f32,
    pub u32,
    pub u32,
    pub u32,
    pub Vec<u32>,
    pub Vec<u32>,
    pub Vec<EncodedMeeting>,
);

/// Legacy section shape; identical except for its meetings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSectionV1(
    pub String,
    pub f32,
    pub u32,
    pub u32,
    pub u32,
    pub Vec<u32>,
    pub Vec<u32>,
    pub Vec<EncodedMeetingV1>,
);

impl From<EncodedSectionV1> for EncodedSection {
    fn from(s: EncodedSectionV1) -> Self {
        Self(
            s.0,
            s.1,
            s.2,
            s.3,
            s.4,
            s.5,
            s.6,
            s.7.into_iter().map(EncodedMeeting::from).collect(),
        )
    }
}

/// Encoded course: `(key, title, description, prerequisites, corequisites,
/// sections)`. The key is the catalog key's display form (`"CSCI 1100"`),
/// which is also the record's identity in shards and merged datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedCourse(
    pub String,
    pub String,
    pub String,
    pub Vec<String>,
    pub Vec<String>,
    pub Vec<EncodedSection>,
);

impl EncodedCourse {
    /// The record's catalog key display form.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.0
    }
}

/// Legacy course shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedCourseV1(
    pub String,
    pub String,
    pub String,
    pub Vec<String>,
    pub Vec<String>,
    pub Vec<EncodedSectionV1>,
);

impl From<EncodedCourseV1> for EncodedCourse {
    fn from(c: EncodedCourseV1) -> Self {
        Self(
            c.0,
            c.1,
            c.2,
            c.3,
            c.4,
            c.5.into_iter().map(EncodedSection::from).collect(),
        )
    }
}
