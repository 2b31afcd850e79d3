use crate::db;
use crate::legacy;
use crate::shape;
use crate::store;
use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub conflicts_found: usize,
    pub resolved_count: usize,
    pub errors: Vec<String>,
    pub removed_legacy_entries: usize,
}

/// Ids present in both the unified student collection and the legacy student
/// store. These are leftovers of a migration that raced a legacy writer, or
/// of the period where both write paths were live.
pub fn find_conflicts(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let doc = match store::load(conn)? {
        Some(doc) => doc,
        None => return Ok(Vec::new()),
    };
    let legacy_ids: HashSet<String> = legacy::read_students(conn)?
        .iter()
        .filter_map(|s| shape::record_id(s).map(|id| id.to_string()))
        .collect();

    Ok(doc
        .students
        .iter()
        .filter_map(|s| shape::record_id(s))
        .filter(|id| legacy_ids.contains(*id))
        .map(|id| id.to_string())
        .collect())
}

/// Merges every conflicting student pair field by field and, once no
/// conflicts remain, drops the now-redundant legacy entries for exactly the
/// ids that were merged. One failed merge never aborts the rest; the summary
/// carries a partial-success count plus the error list.
pub fn resolve_conflicts(conn: &Connection) -> anyhow::Result<MergeSummary> {
    let conflicts = find_conflicts(conn)?;
    resolve_conflict_ids(conn, &conflicts)
}

/// Applies the merge for a conflict list detected earlier. Detection and
/// application may be separated by other writes; an id that no longer
/// resolves on both sides lands in `errors` instead of aborting the batch,
/// and any error leaves the legacy store untouched.
pub fn resolve_conflict_ids(conn: &Connection, conflicts: &[String]) -> anyhow::Result<MergeSummary> {
    let mut summary = MergeSummary::default();
    summary.conflicts_found = conflicts.len();
    if conflicts.is_empty() {
        return Ok(summary);
    }

    let legacy_students = legacy::read_students(conn)?;
    let mut merged_ids: Vec<String> = Vec::new();

    for id in conflicts {
        match merge_one(conn, id, &legacy_students) {
            Ok(()) => {
                summary.resolved_count += 1;
                merged_ids.push(id.clone());
            }
            Err(e) => summary.errors.push(format!("{id}: {e:#}")),
        }
    }

    // Never delete legacy data speculatively: only once every detected
    // conflict merged cleanly, and then only the entries that were merged.
    let zero_conflicts_remain =
        summary.errors.is_empty() && summary.resolved_count == summary.conflicts_found;
    if zero_conflicts_remain && !merged_ids.is_empty() {
        let merged: HashSet<&str> = merged_ids.iter().map(|s| s.as_str()).collect();
        let remaining: Vec<Value> = legacy::read_students(conn)?
            .into_iter()
            .filter(|s| !shape::record_id(s).map(|id| merged.contains(id)).unwrap_or(false))
            .collect();
        summary.removed_legacy_entries = legacy_students.len().saturating_sub(remaining.len());
        if remaining.is_empty() {
            db::storage_remove(conn, legacy::KEY_STUDENTS)?;
        } else {
            db::storage_set_json(conn, legacy::KEY_STUDENTS, &Value::Array(remaining))?;
        }
    }

    Ok(summary)
}

fn merge_one(conn: &Connection, id: &str, legacy_students: &[Value]) -> anyhow::Result<()> {
    let legacy_record = legacy_students
        .iter()
        .find(|s| shape::record_id(s) == Some(id))
        .context("legacy record disappeared during merge")?;
    let unified_record = store::get_student(conn, id)?
        .context("unified record disappeared during merge")?;

    let patch = merge_student_fields(&unified_record, legacy_record)?;
    if let Some(obj) = patch.as_object() {
        if obj.is_empty() {
            return Ok(());
        }
    }
    store::update_student(conn, id, &patch)?
        .context("update produced no result for conflicting id")?;
    Ok(())
}

/// Field-level precedence: the unified value wins wherever it is a real
/// value; legacy fills only absent/falsy fields. Either side can hold the
/// only current value for a given field, so whole-record precedence would
/// drop data. Returns the patch to apply to the unified record.
pub fn merge_student_fields(unified: &Value, legacy_record: &Value) -> anyhow::Result<Value> {
    let mut patch = serde_json::Map::new();
    let Some(legacy_obj) = legacy_record.as_object() else {
        return Ok(Value::Object(patch));
    };

    for (field, legacy_value) in legacy_obj {
        if field == "id" || legacy_value.is_null() {
            continue;
        }
        // The goal block is authoritative on the unified side; never let a
        // pre-embedding legacy record clobber it.
        if field == "goals" || field == "dataPoints" {
            continue;
        }

        if field == "accommodations" {
            let union = union_lists(unified.get(field), Some(legacy_value));
            // Content comparison, not length: a duplicate inside the unified
            // list must not mask a legacy contribution.
            let unchanged = match unified.get(field).and_then(|v| v.as_array()) {
                Some(current) => *current == union,
                None => union.is_empty(),
            };
            if !unchanged {
                patch.insert(field.clone(), Value::Array(union));
            }
            continue;
        }

        if shape::is_falsy_field(unified.get(field)) {
            patch.insert(field.clone(), legacy_value.clone());
        }
    }

    Ok(Value::Object(patch))
}

/// Order-stable deduplicated union, unified side first.
fn union_lists(unified: Option<&Value>, legacy_value: Option<&Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for source in [unified, legacy_value] {
        let Some(items) = source.and_then(|v| v.as_array()) else {
            continue;
        };
        for item in items {
            let key = match item.as_str() {
                Some(s) => s.to_string(),
                None => item.to_string(),
            };
            if seen.insert(key) {
                out.push(item.clone());
            }
        }
    }
    out
}
