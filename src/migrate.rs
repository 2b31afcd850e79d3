use crate::legacy;
use crate::store::{self, Document};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationSummary {
    pub created_document: bool,
    pub students_migrated: usize,
    pub goals_embedded: usize,
    pub data_points_embedded: usize,
    pub staff_migrated: usize,
    pub behavior_commitments_migrated: usize,
    pub daily_highlights_migrated: usize,
    pub independent_choices_migrated: usize,
    pub settings_migrated: bool,
    pub skipped_collections: Vec<String>,
}

/// Populates the unified document from the legacy stores. Conservative by
/// design: only fills collections that are still empty, never overwrites one
/// that has received a write. Safe to run any number of times; the second
/// run over a populated store is a no-op.
pub fn migrate_all_legacy_data(conn: &Connection) -> anyhow::Result<MigrationSummary> {
    let mut summary = MigrationSummary::default();

    let mut doc = match store::load(conn)? {
        Some(doc) => doc,
        None => {
            summary.created_document = true;
            Document::default()
        }
    };

    if doc.students.is_empty() {
        let students = migrate_students(conn, &mut summary)?;
        summary.students_migrated = students.len();
        doc.students = students;
    } else {
        summary.skipped_collections.push("students".into());
    }

    if doc.staff.is_empty() {
        let staff = legacy::read_staff(conn)?;
        summary.staff_migrated = staff.len();
        doc.staff = staff;
    } else {
        summary.skipped_collections.push("staff".into());
    }

    if doc.calendar.behavior_commitments.is_empty() {
        let entries = legacy::read_calendar_map(conn, legacy::KEY_BEHAVIOR_COMMITMENTS)?;
        summary.behavior_commitments_migrated = entries.len();
        doc.calendar.behavior_commitments = entries;
    } else {
        summary.skipped_collections.push("behaviorCommitments".into());
    }

    if doc.calendar.daily_highlights.is_empty() {
        let entries = legacy::read_calendar_map(conn, legacy::KEY_DAILY_HIGHLIGHTS)?;
        summary.daily_highlights_migrated = entries.len();
        doc.calendar.daily_highlights = entries;
    } else {
        summary.skipped_collections.push("dailyHighlights".into());
    }

    if doc.calendar.independent_choices.is_empty() {
        let entries = legacy::read_calendar_map(conn, legacy::KEY_INDEPENDENT_CHOICES)?;
        summary.independent_choices_migrated = entries.len();
        doc.calendar.independent_choices = entries;
    } else {
        summary.skipped_collections.push("independentChoices".into());
    }

    if doc.settings.is_empty() {
        let settings = legacy::read_settings(conn)?;
        summary.settings_migrated = !settings.is_empty();
        doc.settings = settings;
    } else {
        summary.skipped_collections.push("settings".into());
    }

    doc.metadata.version = store::SCHEMA_VERSION.to_string();
    let filled_any = summary.created_document
        || summary.students_migrated > 0
        || summary.staff_migrated > 0
        || summary.behavior_commitments_migrated > 0
        || summary.daily_highlights_migrated > 0
        || summary.independent_choices_migrated > 0
        || summary.settings_migrated;
    // A pure no-op run leaves the document byte-for-byte unchanged, so the
    // second run over a populated store really is a no-op.
    if filled_any {
        doc.metadata.migrated_at = Some(chrono::Utc::now().to_rfc3339());
        doc.recompute_metadata();
        store::save(conn, &doc)?;
    }

    Ok(summary)
}

/// Legacy students predate goal embedding: goals and data points lived in
/// their own flat stores keyed by `studentId`. Reattach them here and give
/// every student the nested blocks the unified schema requires.
fn migrate_students(
    conn: &Connection,
    summary: &mut MigrationSummary,
) -> anyhow::Result<Vec<Value>> {
    let mut students = legacy::read_students(conn)?;

    let mut goals_by_student: HashMap<String, Vec<Value>> = HashMap::new();
    for goal in legacy::read_goals(conn)? {
        let Some(student_id) = goal.get("studentId").and_then(|v| v.as_str()) else {
            continue;
        };
        goals_by_student
            .entry(student_id.to_string())
            .or_default()
            .push(goal.clone());
    }

    let mut points_by_student: HashMap<String, Vec<Value>> = HashMap::new();
    for point in legacy::read_data_points(conn)? {
        let Some(student_id) = point.get("studentId").and_then(|v| v.as_str()) else {
            continue;
        };
        points_by_student
            .entry(student_id.to_string())
            .or_default()
            .push(point.clone());
    }

    for student in &mut students {
        store::ensure_student_blocks(student);
        let Some(id) = student
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
        else {
            continue;
        };

        if let Some(goals) = goals_by_student.remove(&id) {
            summary.goals_embedded += goals.len();
            if let Some(arr) = student.get_mut("goals").and_then(|v| v.as_array_mut()) {
                arr.extend(goals);
            }
        }
        if let Some(points) = points_by_student.remove(&id) {
            summary.data_points_embedded += points.len();
            if let Some(arr) = student.get_mut("dataPoints").and_then(|v| v.as_array_mut()) {
                arr.extend(points);
            }
        }
    }

    Ok(students)
}
