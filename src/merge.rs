//! Merge engine: recombines per-subject shards into one globally
//! deduplicated dataset.
//!
//! For each shard, every local table entry is inserted into the growing
//! global table under the category's equality rule, producing a
//! local-index → global-index map; every record's indices are then remapped
//! through it, for every section and every meeting, before the record joins
//! the global map keyed by catalog key.
//!
//! Duplicate keys across shards take last-shard-wins, which is safe only
//! because catalog keys are unique per subject and shards are partitioned
//! by subject. A dangling local index never crashes the merge: required
//! categories fall back to the category's `unknown` sentinel, optional
//! references drop to `None`, both with a warning. The two fallbacks are
//! the same policy in different shapes: required fields always carry an
//! index, so "unknown" must live in the table; optional fields already
//! express absence as `None`, so that is their unknown form.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{DATASET_FORMAT_VERSION, UNKNOWN_LABEL};
use crate::error::Result;
use crate::intern::{
    InternTable, PeriodValue, TableSet, date_range_key, location_key, period_key,
};
use crate::shard::{Shard, load_all_shards};
use crate::types::{EncodedCourse, EncodedMeeting, EncodedSection};

/// The merged, publishable dataset for one term. Produced only here, never
/// incrementally mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedDataset {
    pub format_version: u32,
    pub generated_at: DateTime<Utc>,
    /// Global records map keyed by catalog key display form.
    pub courses: BTreeMap<String, EncodedCourse>,
    pub tables: TableSet,
}

/// Local-index → global-index maps for one shard, one per category.
struct ShardMaps {
    periods: Vec<u32>,
    locations: Vec<u32>,
    schedule_types: Vec<u32>,
    campuses: Vec<u32>,
    attributes: Vec<u32>,
    grade_bases: Vec<u32>,
    date_ranges: Vec<u32>,
    final_dates: Vec<u32>,
    final_times: Vec<u32>,
    restrictions: Vec<u32>,
}

impl ShardMaps {
    fn build(global: &mut TableSet, local: &TableSet) -> Self {
        Self {
            periods: merge_table(&mut global.periods, &local.periods, period_key),
            locations: merge_table(&mut global.locations, &local.locations, location_key),
            schedule_types: merge_table(
                &mut global.schedule_types,
                &local.schedule_types,
                Clone::clone,
            ),
            campuses: merge_table(&mut global.campuses, &local.campuses, Clone::clone),
            attributes: merge_table(&mut global.attributes, &local.attributes, Clone::clone),
            grade_bases: merge_table(&mut global.grade_bases, &local.grade_bases, Clone::clone),
            date_ranges: merge_table(&mut global.date_ranges, &local.date_ranges, date_range_key),
            final_dates: merge_table(&mut global.final_dates, &local.final_dates, Clone::clone),
            final_times: merge_table(&mut global.final_times, &local.final_times, period_key),
            restrictions: merge_table(
                &mut global.restrictions,
                &local.restrictions,
                Clone::clone,
            ),
        }
    }
}

/// Inserts every local entry into the global table under the category's
/// equality rule, returning the local-index → global-index map.
fn merge_table<T: Clone>(
    global: &mut InternTable<T>,
    local: &InternTable<T>,
    keyer: impl Fn(&T) -> String,
) -> Vec<u32> {
    local
        .values()
        .iter()
        .map(|value| global.intern(keyer(value), || value.clone()))
        .collect()
}

/// Merges already-loaded shards into one dataset.
#[must_use]
pub fn merge_shards(shards: &[Shard]) -> MergedDataset {
    let mut tables = TableSet::default();
    let mut courses = BTreeMap::new();

    for shard in shards {
        let maps = ShardMaps::build(&mut tables, &shard.tables);
        for course in &shard.records {
            let remapped = remap_course(course, &maps, &mut tables);
            if courses.insert(remapped.0.clone(), remapped).is_some() {
                tracing::warn!(
                    shard.subject = %shard.subject,
                    "duplicate catalog key across shards; later shard wins"
                );
            }
        }
        tracing::debug!(
            shard.subject = %shard.subject,
            shard.records = shard.records.len(),
            "shard merged"
        );
    }

    MergedDataset {
        format_version: DATASET_FORMAT_VERSION,
        generated_at: Utc::now(),
        courses,
        tables,
    }
}

/// Loads every shard under `shard_dir` and merges them.
pub fn merge_term(shard_dir: &Path) -> Result<MergedDataset> {
    let shards = load_all_shards(shard_dir)?;
    tracing::info!(shards = shards.len(), "merging term shards");
    Ok(merge_shards(&shards))
}

fn remap_course(course: &EncodedCourse, maps: &ShardMaps, tables: &mut TableSet) -> EncodedCourse {
    EncodedCourse(
        course.0.clone(),
        course.1.clone(),
        course.2.clone(),
        course.3.clone(),
        course.4.clone(),
        course
            .5
            .iter()
            .map(|section| remap_section(section, maps, tables))
            .collect(),
    )
}

fn remap_section(
    section: &EncodedSection,
    maps: &ShardMaps,
    tables: &mut TableSet,
) -> EncodedSection {
    EncodedSection(
        section.0.clone(),
        section.1,
        remap_required(section.2, &maps.schedule_types, || {
            unknown_string(&mut tables.schedule_types)
        }),
        remap_required(section.3, &maps.campuses, || {
            unknown_string(&mut tables.campuses)
        }),
        remap_required(section.4, &maps.grade_bases, || {
            unknown_string(&mut tables.grade_bases)
        }),
        section
            .5
            .iter()
            .map(|&index| {
                remap_required(index, &maps.attributes, || {
                    unknown_string(&mut tables.attributes)
                })
            })
            .collect(),
        section
            .6
            .iter()
            .map(|&index| {
                remap_required(index, &maps.restrictions, || {
                    unknown_string(&mut tables.restrictions)
                })
            })
            .collect(),
        section
            .7
            .iter()
            .map(|meeting| remap_meeting(meeting, maps, tables))
            .collect(),
    )
}

fn remap_meeting(
    meeting: &EncodedMeeting,
    maps: &ShardMaps,
    tables: &mut TableSet,
) -> EncodedMeeting {
    EncodedMeeting(
        meeting.0.clone(),
        remap_required(meeting.1, &maps.periods, || unknown_period(&mut tables.periods)),
        remap_optional(meeting.2, &maps.locations),
        meeting.3.clone(),
        remap_optional(meeting.4, &maps.date_ranges),
        remap_optional(meeting.5, &maps.final_dates),
        remap_optional(meeting.6, &maps.final_times),
    )
}

/// Remaps a required index; a dangling reference falls back to the
/// category's unknown sentinel rather than crashing the merge.
fn remap_required(index: u32, map: &[u32], unknown: impl FnOnce() -> u32) -> u32 {
    match map.get(index as usize) {
        Some(&global) => global,
        None => {
            tracing::warn!(index, "dangling table reference; using unknown sentinel");
            unknown()
        }
    }
}

/// Remaps an optional index; a dangling reference drops to `None`, the
/// optional categories' equivalent of the unknown sentinel.
fn remap_optional(index: Option<u32>, map: &[u32]) -> Option<u32> {
    let index = index?;
    let mapped = map.get(index as usize).copied();
    if mapped.is_none() {
        tracing::warn!(index, "dangling optional table reference; dropping");
    }
    mapped
}

fn unknown_string(table: &mut InternTable<String>) -> u32 {
    table.intern(UNKNOWN_LABEL.to_string(), || UNKNOWN_LABEL.to_string())
}

fn unknown_period(table: &mut InternTable<PeriodValue>) -> u32 {
    table.intern(period_key(&PeriodValue::Unknown), || PeriodValue::Unknown)
}
