mod test_support;

use classroomd::{diagnostics, legacy, store};
use serde_json::json;
use test_support::{open_workspace, seed_json};

#[test]
fn report_flags_duplicates_violations_and_conflicts() {
    let (_ws, conn) = open_workspace("classroom-diag-flags");
    seed_json(
        &conn,
        store::KEY_UNIFIED,
        &json!({
            "students": [
                { "id": "s1", "name": "Avery", "goals": [], "dataPoints": [] },
                { "id": "s1", "name": "Avery Again", "goals": [], "dataPoints": [] },
                { "id": "s2", "name": "Broken", "goals": "not a list", "dataPoints": [] },
                { "name": "No Id", "goals": [], "dataPoints": [] }
            ],
            "staff": [],
            "activities": [],
            "calendar": { "behaviorCommitments": [], "dailyHighlights": [], "independentChoices": [] },
            "settings": {},
            "metadata": { "version": "2.0" }
        }),
    );
    seed_json(
        &conn,
        legacy::KEY_STUDENTS,
        &json!([{ "id": "s2", "name": "Broken" }]),
    );

    let report = diagnostics::run_diagnostics(&conn).expect("diagnostics");
    assert!(report.unified_present);
    assert_eq!(report.counts.get("students"), Some(&4));
    assert_eq!(
        report.duplicate_ids.get("students"),
        Some(&vec!["s1".to_string()])
    );
    assert!(report
        .structural_violations
        .iter()
        .any(|v| v.contains("s2") && v.contains("goals")));
    assert!(report
        .structural_violations
        .iter()
        .any(|v| v.contains("without a non-empty string id")));
    assert_eq!(report.cross_source_conflicts, vec!["s2".to_string()]);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("resolveConflicts")));
}

#[test]
fn report_lists_legacy_key_sprawl() {
    let (_ws, conn) = open_workspace("classroom-diag-sprawl");
    seed_json(&conn, store::KEY_UNIFIED, &json!({ "students": [] }));
    seed_json(&conn, legacy::KEY_DATA_POINTS, &json!([]));
    seed_json(&conn, legacy::KEY_SETTINGS, &json!({}));

    let report = diagnostics::run_diagnostics(&conn).expect("diagnostics");
    assert_eq!(
        report.legacy_keys_present,
        vec![
            legacy::KEY_SETTINGS.to_string(),
            legacy::KEY_DATA_POINTS.to_string()
        ]
    );
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("recoverDataPoints")));
}

#[test]
fn missing_document_recommends_migration() {
    let (_ws, conn) = open_workspace("classroom-diag-missing");
    let report = diagnostics::run_diagnostics(&conn).expect("diagnostics");
    assert!(!report.unified_present);
    assert_eq!(report.recommendations.len(), 1);
    assert!(report.recommendations[0].contains("maintenance.migrate"));
}

#[test]
fn diagnostics_never_mutates_storage() {
    let (_ws, conn) = open_workspace("classroom-diag-readonly");
    // A map-shaped document would be healed by a normal load; the auditor
    // must leave it alone.
    seed_json(
        &conn,
        store::KEY_UNIFIED,
        &json!({ "students": { "s1": { "id": "s1" } } }),
    );
    let before = classroomd::db::storage_get(&conn, store::KEY_UNIFIED)
        .expect("read")
        .expect("present");

    diagnostics::run_diagnostics(&conn).expect("diagnostics");

    let after = classroomd::db::storage_get(&conn, store::KEY_UNIFIED)
        .expect("read")
        .expect("present");
    assert_eq!(before, after);
}
