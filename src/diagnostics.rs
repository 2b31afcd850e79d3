use crate::db;
use crate::legacy;
use crate::shape;
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub unified_present: bool,
    pub storage_keys: Vec<String>,
    pub legacy_keys_present: Vec<String>,
    pub counts: HashMap<String, usize>,
    pub duplicate_ids: HashMap<String, Vec<String>>,
    pub structural_violations: Vec<String>,
    pub cross_source_conflicts: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Read-only audit over the unified document and the legacy stores. Works on
/// the raw persisted shape, not the self-healed load, so it can report the
/// drift a normal read would paper over. Never mutates anything; the
/// remediation list tells the operator which maintenance action to run next.
pub fn run_diagnostics(conn: &Connection) -> anyhow::Result<DiagnosticsReport> {
    let mut report = DiagnosticsReport {
        storage_keys: db::storage_keys(conn)?,
        legacy_keys_present: legacy::present_keys(conn)?,
        ..DiagnosticsReport::default()
    };

    let raw = db::storage_get_json(conn, store::KEY_UNIFIED)?;
    let raw = raw.filter(|v| v.is_object());
    report.unified_present = raw.is_some();

    if let Some(raw) = &raw {
        let students = shape::coerce_records(raw.get("students").unwrap_or(&Value::Null));
        audit_collection(&mut report, "students", &students);
        audit_collection(
            &mut report,
            "staff",
            &shape::coerce_records(raw.get("staff").unwrap_or(&Value::Null)),
        );
        audit_collection(
            &mut report,
            "activities",
            &shape::coerce_records(raw.get("activities").unwrap_or(&Value::Null)),
        );

        let calendar = raw.get("calendar").cloned().unwrap_or(Value::Null);
        for kind in ["behaviorCommitments", "dailyHighlights", "independentChoices"] {
            audit_collection(
                &mut report,
                kind,
                &shape::coerce_records(calendar.get(kind).unwrap_or(&Value::Null)),
            );
        }

        audit_student_structure(&mut report, &students);

        let legacy_ids: HashSet<String> = legacy::read_students(conn)?
            .iter()
            .filter_map(|s| shape::record_id(s).map(|id| id.to_string()))
            .collect();
        report.cross_source_conflicts = students
            .iter()
            .filter_map(|s| shape::record_id(s))
            .filter(|id| legacy_ids.contains(*id))
            .map(|id| id.to_string())
            .collect();
    }

    build_recommendations(&mut report);
    Ok(report)
}

fn audit_collection(report: &mut DiagnosticsReport, name: &str, records: &[Value]) {
    report.counts.insert(name.to_string(), records.len());

    let mut seen: HashSet<&str> = HashSet::new();
    let mut dups: Vec<String> = Vec::new();
    for record in records {
        match shape::record_id(record) {
            Some(id) => {
                if !seen.insert(id) && !dups.iter().any(|d| d == id) {
                    dups.push(id.to_string());
                }
            }
            None => report
                .structural_violations
                .push(format!("{name}: record without a non-empty string id")),
        }
    }
    if !dups.is_empty() {
        report.duplicate_ids.insert(name.to_string(), dups);
    }
}

fn audit_student_structure(report: &mut DiagnosticsReport, students: &[Value]) {
    let mut goal_count = 0usize;
    let mut point_count = 0usize;
    for student in students {
        let label = shape::record_id(student).unwrap_or("<no id>");
        for field in ["goals", "dataPoints"] {
            match student.get(field) {
                Some(Value::Array(items)) => {
                    let n = items.iter().filter(|v| v.is_object()).count();
                    if field == "goals" {
                        goal_count += n;
                    } else {
                        point_count += n;
                    }
                    if n != items.len() {
                        report
                            .structural_violations
                            .push(format!("student {label}: non-record entries in {field}"));
                    }
                }
                Some(_) => report
                    .structural_violations
                    .push(format!("student {label}: {field} is not a sequence")),
                None => report
                    .structural_violations
                    .push(format!("student {label}: missing {field} block")),
            }
        }
    }
    report.counts.insert("goals".into(), goal_count);
    report.counts.insert("dataPoints".into(), point_count);
}

fn build_recommendations(report: &mut DiagnosticsReport) {
    if !report.unified_present {
        report
            .recommendations
            .push("unified document missing or unreadable: run maintenance.migrate".into());
        return;
    }
    if !report.cross_source_conflicts.is_empty() {
        report.recommendations.push(format!(
            "{} student id(s) exist in both the unified store and the legacy store: run maintenance.resolveConflicts",
            report.cross_source_conflicts.len()
        ));
    }
    if !report.duplicate_ids.is_empty() {
        report.recommendations.push(format!(
            "duplicate identifiers in: {}",
            report
                .duplicate_ids
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if !report.structural_violations.is_empty() {
        report.recommendations.push(format!(
            "{} structural violation(s); inspect before further migration",
            report.structural_violations.len()
        ));
    }
    if report
        .legacy_keys_present
        .iter()
        .any(|k| k == legacy::KEY_DATA_POINTS)
    {
        report.recommendations.push(
            "legacy data-point store still present: consider maintenance.recoverDataPoints".into(),
        );
    }
    if !report.legacy_keys_present.is_empty() && report.cross_source_conflicts.is_empty() {
        report.recommendations.push(format!(
            "{} legacy storage key(s) still present after unification",
            report.legacy_keys_present.len()
        ));
    }
}
