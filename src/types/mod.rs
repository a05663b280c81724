//! Public data model: named in-memory structures and their positional
//! encoded forms.

pub mod encoded;
pub mod record;

pub use encoded::{
    EncodedCourse, EncodedCourseV1, EncodedMeeting, EncodedMeetingV1, EncodedSection,
    EncodedSectionV1,
};
pub use record::{
    CatalogKey, CourseRecord, DateRange, Location, Meeting, Section, TermCode, TimePeriod,
};
