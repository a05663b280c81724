//! Bijective interning tables with per-category canonicalization.
//!
//! An [`InternTable`] maps a canonical value to a stable integer index and
//! back. Tables are append-only within one encoding session: interning the
//! same logical value twice always yields the same index. Primitive string
//! categories use the value itself as the dedup key; structured categories
//! (periods, locations, date ranges) use a canonical serialized form, so
//! both share one mechanism.
//!
//! Only the value vector is persisted. The reverse lookup is rebuilt after
//! deserialization via [`TableSet::rehydrate`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{DateRange, Location, TimePeriod};

/// Canonical zero-padded four-digit representation of a minute-of-day,
/// e.g. `720` → `"1200"`.
#[must_use]
pub fn canonical_minutes(minute_of_day: u16) -> String {
    format!("{:02}{:02}", minute_of_day / 60, minute_of_day % 60)
}

/// Inverse of [`canonical_minutes`]. Returns `None` for anything that is not
/// a valid zero-padded `HHMM` string.
#[must_use]
pub fn minutes_from_canonical(canonical: &str) -> Option<u16> {
    if canonical.len() != 4 || !canonical.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: u16 = canonical[..2].parse().ok()?;
    let minutes: u16 = canonical[2..].parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Table value for the period and final-time categories.
///
/// The two sentinels have fixed dedup keys, so arbitrary inputs collapse
/// onto one of three encodings: timed, arranged, or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodValue {
    /// Canonical `HHMM` start/end strings.
    Timed { start: String, end: String },
    Arranged,
    Unknown,
}

impl PeriodValue {
    /// Canonicalizes an in-memory time period into its table value.
    #[must_use]
    pub fn from_period(period: &TimePeriod) -> Self {
        match period {
            TimePeriod::Timed {
                start_minute,
                end_minute,
            } => Self::Timed {
                start: canonical_minutes(*start_minute),
                end: canonical_minutes(*end_minute),
            },
            TimePeriod::Arranged => Self::Arranged,
            TimePeriod::Unknown => Self::Unknown,
        }
    }

    /// Decodes back into the in-memory representation. A timed value whose
    /// canonical strings fail to parse degrades to `Unknown` rather than
    /// failing the decode.
    #[must_use]
    pub fn to_period(&self) -> TimePeriod {
        match self {
            Self::Timed { start, end } => {
                match (minutes_from_canonical(start), minutes_from_canonical(end)) {
                    (Some(start_minute), Some(end_minute)) => TimePeriod::Timed {
                        start_minute,
                        end_minute,
                    },
                    _ => TimePeriod::Unknown,
                }
            }
            Self::Arranged => TimePeriod::Arranged,
            Self::Unknown => TimePeriod::Unknown,
        }
    }
}

/// Fixed dedup key per period value.
#[must_use]
pub fn period_key(value: &PeriodValue) -> String {
    match value {
        PeriodValue::Timed { start, end } => format!("{start}-{end}"),
        PeriodValue::Arranged => "arranged".to_string(),
        PeriodValue::Unknown => "unknown".to_string(),
    }
}

/// Canonical-serialized key for locations. Coordinates participate so two
/// resolutions of the same room name to different coordinates stay distinct.
#[must_use]
pub fn location_key(value: &Location) -> String {
    let coords = match value.coordinates {
        Some((lat, lon)) => format!("{lat};{lon}"),
        None => String::new(),
    };
    format!("{}|{}|{coords}", value.building, value.room)
}

/// Canonical key for date ranges.
#[must_use]
pub fn date_range_key(value: &DateRange) -> String {
    format!("{}|{}", value.start, value.end)
}

/// A named category mapping canonical values to stable integer indices.
///
/// Serializes transparently as its value vector; call
/// [`InternTable::rehydrate`] (or [`TableSet::rehydrate`]) after loading to
/// rebuild the reverse lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternTable<T> {
    values: Vec<T>,
    #[serde(skip)]
    lookup: HashMap<String, u32>,
}

impl<T> Default for InternTable<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<T> InternTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.values.get(index as usize)
    }

    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Looks up `key`, inserting `make()` under a fresh index when unseen.
    pub fn intern(&mut self, key: String, make: impl FnOnce() -> T) -> u32 {
        if let Some(&index) = self.lookup.get(&key) {
            return index;
        }
        let index = self.values.len() as u32;
        self.values.push(make());
        self.lookup.insert(key, index);
        index
    }

    /// Rebuilds the reverse lookup from the persisted values. Must run
    /// before any `intern` call on a deserialized table.
    pub fn rehydrate(&mut self, keyer: impl Fn(&T) -> String) {
        self.lookup = self
            .values
            .iter()
            .enumerate()
            .map(|(index, value)| (keyer(value), index as u32))
            .collect();
    }
}

/// The full set of interning categories for one encoding session, shard, or
/// merged dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSet {
    pub periods: InternTable<PeriodValue>,
    pub locations: InternTable<Location>,
    pub schedule_types: InternTable<String>,
    pub campuses: InternTable<String>,
    pub attributes: InternTable<String>,
    pub grade_bases: InternTable<String>,
    pub date_ranges: InternTable<DateRange>,
    pub final_dates: InternTable<String>,
    pub final_times: InternTable<PeriodValue>,
    pub restrictions: InternTable<String>,
}

impl TableSet {
    /// Rebuilds every category's reverse lookup after deserialization.
    pub fn rehydrate(&mut self) {
        self.periods.rehydrate(period_key);
        self.locations.rehydrate(location_key);
        self.schedule_types.rehydrate(Clone::clone);
        self.campuses.rehydrate(Clone::clone);
        self.attributes.rehydrate(Clone::clone);
        self.grade_bases.rehydrate(Clone::clone);
        self.date_ranges.rehydrate(date_range_key);
        self.final_dates.rehydrate(Clone::clone);
        self.final_times.rehydrate(period_key);
        self.restrictions.rehydrate(Clone::clone);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_minutes_zero_pads() {
        assert_eq!(canonical_minutes(720), "1200");
        assert_eq!(canonical_minutes(0), "0000");
        assert_eq!(canonical_minutes(9 * 60 + 5), "0905");
        assert_eq!(canonical_minutes(23 * 60 + 59), "2359");
    }

    #[test]
    fn minutes_round_trip() {
        for m in [0u16, 1, 59, 60, 720, 830, 1439] {
            assert_eq!(minutes_from_canonical(&canonical_minutes(m)), Some(m));
        }
        assert_eq!(minutes_from_canonical("2460"), None);
        assert_eq!(minutes_from_canonical("12:00"), None);
        assert_eq!(minutes_from_canonical(""), None);
    }

    #[test]
    fn intern_dedups_by_key() {
        let mut table = InternTable::new();
        let a = table.intern("Lecture".into(), || "Lecture".to_string());
        let b = table.intern("Lab".into(), || "Lab".to_string());
        let again = table.intern("Lecture".into(), || "Lecture".to_string());
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(a), Some(&"Lecture".to_string()));
    }

    #[test]
    fn period_sentinels_have_fixed_keys() {
        assert_eq!(period_key(&PeriodValue::Arranged), "arranged");
        assert_eq!(period_key(&PeriodValue::Unknown), "unknown");
        let timed = PeriodValue::from_period(&TimePeriod::Timed {
            start_minute: 720,
            end_minute: 830,
        });
        assert_eq!(period_key(&timed), "1200-1350");
    }

    #[test]
    fn rehydrate_restores_dedup_after_round_trip() {
        let mut table = InternTable::new();
        table.intern("arranged".into(), || PeriodValue::Arranged);
        table.intern("1200-1350".into(), || PeriodValue::Timed {
            start: "1200".into(),
            end: "1350".into(),
        });

        let json = serde_json::to_string(&table).unwrap();
        let mut loaded: InternTable<PeriodValue> = serde_json::from_str(&json).unwrap();
        loaded.rehydrate(period_key);

        let index = loaded.intern("arranged".into(), || PeriodValue::Arranged);
        assert_eq!(index, 0, "rehydrated table must reuse existing entries");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn location_key_distinguishes_coordinates() {
        let a = Location {
            building: "DCC".into(),
            room: "308".into(),
            coordinates: Some((42.68, -73.68)),
        };
        let mut b = a.clone();
        b.coordinates = None;
        assert_ne!(location_key(&a), location_key(&b));
    }
}
