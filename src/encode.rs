//! Value-interning encoder: named records in, compact tuples out.
//!
//! An [`Encoder`] is stateful across calls within one subject's encoding
//! session: every categorical field value is looked up or inserted into the
//! matching [`TableSet`] category and replaced by its index. Encoding is
//! pure with respect to already-seen values; the same logical value always
//! yields the same index within a session.
//!
//! [`decode_course`] is the inverse transform used by downstream consumers.
//! It is lenient: a dangling index decodes to the category's unknown/absent
//! form instead of failing, mirroring the merge engine's policy.

use crate::intern::{PeriodValue, TableSet, date_range_key, location_key, period_key};
use crate::types::{
    CatalogKey, CourseRecord, EncodedCourse, EncodedMeeting, EncodedSection, Meeting, Section,
    TimePeriod,
};

/// Stateful encoding session over one growing [`TableSet`].
#[derive(Debug, Default)]
pub struct Encoder {
    tables: TableSet,
}

impl Encoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes a session over tables loaded from an existing shard. The
    /// tables must already be rehydrated (shard loading does this).
    #[must_use]
    pub fn resume(tables: TableSet) -> Self {
        Self { tables }
    }

    #[must_use]
    pub fn tables(&self) -> &TableSet {
        &self.tables
    }

    #[must_use]
    pub fn into_tables(self) -> TableSet {
        self.tables
    }

    /// Encodes one record into its positional form, interning every
    /// categorical field value.
    pub fn encode(&mut self, record: &CourseRecord) -> EncodedCourse {
        EncodedCourse(
            record.key.to_string(),
            record.title.clone(),
            record.description.clone(),
            record.prerequisites.iter().map(ToString::to_string).collect(),
            record.corequisites.iter().map(ToString::to_string).collect(),
            record
                .sections
                .iter()
                .map(|section| self.encode_section(section))
                .collect(),
        )
    }

    fn encode_section(&mut self, section: &Section) -> EncodedSection {
        EncodedSection(
            section.crn.clone(),
            section.credits,
            intern_string(&mut self.tables.schedule_types, &section.schedule_type),
            intern_string(&mut self.tables.campuses, &section.campus),
            intern_string(&mut self.tables.grade_bases, &section.grade_basis),
            section
                .attributes
                .iter()
                .map(|a| intern_string(&mut self.tables.attributes, a))
                .collect(),
            section
                .restrictions
                .iter()
                .map(|r| intern_string(&mut self.tables.restrictions, r))
                .collect(),
            section
                .meetings
                .iter()
                .map(|meeting| self.encode_meeting(meeting))
                .collect(),
        )
    }

    fn encode_meeting(&mut self, meeting: &Meeting) -> EncodedMeeting {
        let period = self.intern_period(&meeting.period);
        let location = meeting.location.as_ref().map(|location| {
            self.tables
                .locations
                .intern(location_key(location), || location.clone())
        });
        let date_range = meeting.date_range.as_ref().map(|range| {
            self.tables
                .date_ranges
                .intern(date_range_key(range), || range.clone())
        });
        let final_date = meeting
            .final_date
            .as_ref()
            .map(|date| intern_string(&mut self.tables.final_dates, date));
        let final_time = meeting.final_time.as_ref().map(|period| {
            let value = PeriodValue::from_period(period);
            self.tables
                .final_times
                .intern(period_key(&value), || value.clone())
        });
        EncodedMeeting(
            meeting.days.clone(),
            period,
            location,
            meeting.instructors.clone(),
            date_range,
            final_date,
            final_time,
        )
    }

    fn intern_period(&mut self, period: &TimePeriod) -> u32 {
        let value = PeriodValue::from_period(period);
        self.tables
            .periods
            .intern(period_key(&value), || value.clone())
    }
}

fn intern_string(table: &mut crate::intern::InternTable<String>, value: &str) -> u32 {
    table.intern(value.to_string(), || value.to_string())
}

/// Decodes one encoded course back into its named form against `tables`.
#[must_use]
pub fn decode_course(course: &EncodedCourse, tables: &TableSet) -> CourseRecord {
    CourseRecord {
        key: CatalogKey::parse(&course.0),
        title: course.1.clone(),
        description: course.2.clone(),
        prerequisites: course.3.iter().map(|k| CatalogKey::parse(k)).collect(),
        corequisites: course.4.iter().map(|k| CatalogKey::parse(k)).collect(),
        sections: course
            .5
            .iter()
            .map(|section| decode_section(section, tables))
            .collect(),
    }
}

fn decode_section(section: &EncodedSection, tables: &TableSet) -> Section {
    Section {
        crn: section.0.clone(),
        credits: section.1,
        schedule_type: decode_string(&tables.schedule_types, section.2),
        campus: decode_string(&tables.campuses, section.3),
        grade_basis: decode_string(&tables.grade_bases, section.4),
        attributes: section
            .5
            .iter()
            .map(|&index| decode_string(&tables.attributes, index))
            .collect(),
        restrictions: section
            .6
            .iter()
            .map(|&index| decode_string(&tables.restrictions, index))
            .collect(),
        meetings: section
            .7
            .iter()
            .map(|meeting| decode_meeting(meeting, tables))
            .collect(),
    }
}

fn decode_meeting(meeting: &EncodedMeeting, tables: &TableSet) -> Meeting {
    Meeting {
        days: meeting.0.clone(),
        period: tables
            .periods
            .get(meeting.1)
            .map_or(TimePeriod::Unknown, PeriodValue::to_period),
        location: meeting
            .2
            .and_then(|index| tables.locations.get(index).cloned()),
        instructors: meeting.3.clone(),
        date_range: meeting
            .4
            .and_then(|index| tables.date_ranges.get(index).cloned()),
        final_date: meeting
            .5
            .and_then(|index| tables.final_dates.get(index).cloned()),
        final_time: meeting
            .6
            .and_then(|index| tables.final_times.get(index).map(PeriodValue::to_period)),
    }
}

fn decode_string(table: &crate::intern::InternTable<String>, index: u32) -> String {
    table
        .get(index)
        .cloned()
        .unwrap_or_else(|| crate::constants::UNKNOWN_LABEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DateRange, Location};

    fn sample_record() -> CourseRecord {
        CourseRecord {
            key: CatalogKey::new("CSCI", "1100"),
            title: "Computer Science I".into(),
            description: "Introductory programming.".into(),
            prerequisites: vec![],
            corequisites: vec![CatalogKey::new("CSCI", "1190")],
            sections: vec![Section {
                crn: "92453".into(),
                credits: 4.0,
                schedule_type: "Lecture".into(),
                campus: "Main".into(),
                grade_basis: "Letter".into(),
                attributes: vec!["Communication Intensive".into()],
                restrictions: vec!["Undergraduate only".into()],
                meetings: vec![
                    Meeting {
                        days: "MR".into(),
                        period: TimePeriod::Timed {
                            start_minute: 720,
                            end_minute: 830,
                        },
                        location: Some(Location {
                            building: "DCC".into(),
                            room: "308".into(),
                            coordinates: Some((42.68, -73.68)),
                        }),
                        instructors: vec!["Turing".into(), "Hopper".into()],
                        date_range: Some(DateRange {
                            start: "2026-08-27".into(),
                            end: "2026-12-09".into(),
                        }),
                        final_date: Some("2026-12-14".into()),
                        final_time: Some(TimePeriod::Timed {
                            start_minute: 540,
                            end_minute: 660,
                        }),
                    },
                    Meeting {
                        days: String::new(),
                        period: TimePeriod::Arranged,
                        location: None,
                        instructors: vec![],
                        date_range: None,
                        final_date: None,
                        final_time: None,
                    },
                ],
            }],
        }
    }

    #[test]
    fn round_trip_reproduces_semantic_fields() {
        let record = sample_record();
        let mut encoder = Encoder::new();
        let encoded = encoder.encode(&record);
        let decoded = decode_course(&encoded, encoder.tables());
        assert_eq!(decoded, record);
    }

    #[test]
    fn round_trip_preserves_sentinels() {
        let mut record = sample_record();
        record.sections[0].meetings[1].period = TimePeriod::Unknown;
        let mut encoder = Encoder::new();
        let encoded = encoder.encode(&record);
        let decoded = decode_course(&encoded, encoder.tables());
        assert_eq!(
            decoded.sections[0].meetings[1].period,
            TimePeriod::Unknown
        );
    }

    #[test]
    fn repeated_values_share_one_index() {
        let record = sample_record();
        let mut encoder = Encoder::new();
        let first = encoder.encode(&record);
        let second = encoder.encode(&record);
        assert_eq!(first.5[0].2, second.5[0].2, "schedule type index stable");
        assert_eq!(encoder.tables().schedule_types.len(), 1);
        assert_eq!(encoder.tables().locations.len(), 1);
    }

    #[test]
    fn arranged_inputs_collapse_onto_one_encoding() {
        let mut encoder = Encoder::new();
        let mut a = sample_record();
        a.sections[0].meetings.truncate(1);
        a.sections[0].meetings[0].period = TimePeriod::Arranged;
        let mut b = a.clone();
        b.key = CatalogKey::new("MATH", "1010");
        let ea = encoder.encode(&a);
        let eb = encoder.encode(&b);
        assert_eq!(ea.5[0].7[0].1, eb.5[0].7[0].1);
        assert_eq!(encoder.tables().periods.len(), 1);
    }

    #[test]
    fn dangling_index_decodes_to_unknown() {
        let mut encoder = Encoder::new();
        let mut encoded = encoder.encode(&sample_record());
        encoded.5[0].2 = 999; // schedule type index with no table entry
        encoded.5[0].7[0].1 = 999; // period index with no table entry
        let decoded = decode_course(&encoded, encoder.tables());
        assert_eq!(decoded.sections[0].schedule_type, "Unknown");
        assert_eq!(decoded.sections[0].meetings[0].period, TimePeriod::Unknown);
    }
}
