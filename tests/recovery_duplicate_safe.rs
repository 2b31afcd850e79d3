mod test_support;

use classroomd::{legacy, recover, store};
use serde_json::json;
use test_support::{open_workspace, seed_json};

fn seed_reidentified_goals(conn: &rusqlite::Connection) {
    // A past migration re-issued goal ids: "old-g1" became "g1". The legacy
    // measurement store still points at the old id.
    seed_json(
        conn,
        store::KEY_UNIFIED,
        &json!({
            "students": [{
                "id": "s1",
                "name": "Avery",
                "goals": [
                    { "id": "g1", "studentId": "s1", "description": "reads 40 wpm" },
                    { "id": "g2", "studentId": "s1", "shortTermObjective": "raise hand before speaking" }
                ],
                "dataPoints": [
                    { "id": "existing", "goalId": "g1", "date": "2024-01-09", "time": "09:00", "value": 30 }
                ]
            }],
            "staff": [],
            "activities": [],
            "calendar": { "behaviorCommitments": [], "dailyHighlights": [], "independentChoices": [] },
            "settings": {},
            "metadata": { "version": "2.0" }
        }),
    );
    seed_json(
        conn,
        legacy::KEY_GOALS,
        &json!([
            { "id": "old-g1", "studentId": "s1", "description": "reads 40 wpm" },
            { "id": "old-g2", "studentId": "s1", "shortTermObjective": "raise hand before speaking" },
            { "id": "old-g9", "studentId": "nobody", "description": "unmatched everywhere" }
        ]),
    );
    seed_json(
        conn,
        legacy::KEY_DATA_POINTS,
        &json!([
            { "id": "p1", "goalId": "old-g1", "date": "2024-01-10", "time": "09:00", "value": 34 },
            { "id": "p2", "goalId": "old-g2", "date": "2024-01-10", "time": "10:30", "value": 1 },
            { "id": "p3", "goalId": "old-g9", "date": "2024-01-10", "time": "11:00", "value": 2 },
            { "id": "p4", "goalId": "old-g1", "date": "2024-01-09", "time": "09:00", "value": 30 }
        ]),
    );
}

#[test]
fn recovery_relinks_orphans_through_the_goal_map() {
    let (_ws, conn) = open_workspace("classroom-recover-relink");
    seed_reidentified_goals(&conn);

    let summary = recover::recover_missing_data_points(&conn).expect("recover");
    assert_eq!(summary.legacy_data_points, 4);
    // p1 and p2 are recovered; p3 has no match; p4 collides with the point
    // already present at (2024-01-09, 09:00, g1).
    assert_eq!(summary.recovered_count, 2);
    assert_eq!(summary.skipped_duplicates, 1);
    assert_eq!(summary.unmatched, 1);

    // The audit log names the heuristic used per mapping.
    let by_desc = summary
        .matches
        .iter()
        .find(|m| m.legacy_goal_id == "old-g1")
        .expect("old-g1 mapped");
    assert_eq!(by_desc.unified_goal_id, "g1");
    assert_eq!(by_desc.matched_by, "description");
    let by_obj = summary
        .matches
        .iter()
        .find(|m| m.legacy_goal_id == "old-g2")
        .expect("old-g2 mapped");
    assert_eq!(by_obj.unified_goal_id, "g2");
    assert_eq!(by_obj.matched_by, "shortTermObjective");

    // Recovered points carry the re-issued goal id and the owning student.
    let points = store::get_goal_data_points(&conn, "g1").expect("points");
    assert_eq!(points.len(), 2);
    assert!(points
        .iter()
        .all(|p| p.get("studentId").and_then(|v| v.as_str()) == Some("s1")));

    let doc = store::load(&conn).expect("load").expect("doc");
    assert_eq!(doc.metadata.total_data_points, 3);
}

#[test]
fn rerunning_recovery_creates_no_duplicates() {
    let (_ws, conn) = open_workspace("classroom-recover-rerun");
    seed_reidentified_goals(&conn);

    recover::recover_missing_data_points(&conn).expect("first run");
    let summary = recover::recover_missing_data_points(&conn).expect("second run");
    assert_eq!(summary.recovered_count, 0);
    assert_eq!(summary.skipped_duplicates, 3);

    let doc = store::load(&conn).expect("load").expect("doc");
    let points = doc.students[0]
        .get("dataPoints")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    assert_eq!(points.len(), 3);

    // No two points share a (date, time, goalId) triple.
    let mut keys: Vec<(String, String, String)> = points
        .iter()
        .map(|p| {
            let g = |f: &str| p.get(f).and_then(|v| v.as_str()).unwrap_or("").to_string();
            (g("date"), g("time"), g("goalId"))
        })
        .collect();
    let before = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), before);
}

#[test]
fn owning_student_is_the_last_resort_heuristic() {
    let (_ws, conn) = open_workspace("classroom-recover-owner");
    seed_json(
        &conn,
        store::KEY_UNIFIED,
        &json!({
            "students": [{
                "id": "s1",
                "name": "Avery",
                "goals": [{ "id": "g1", "description": "totally rewritten text" }],
                "dataPoints": []
            }],
            "staff": [],
            "activities": [],
            "calendar": { "behaviorCommitments": [], "dailyHighlights": [], "independentChoices": [] },
            "settings": {},
            "metadata": { "version": "2.0" }
        }),
    );
    seed_json(
        &conn,
        legacy::KEY_GOALS,
        &json!([{ "id": "old-g1", "studentId": "s1", "description": "original phrasing" }]),
    );
    seed_json(
        &conn,
        legacy::KEY_DATA_POINTS,
        &json!([{ "id": "p1", "goalId": "old-g1", "date": "2024-02-01", "time": "08:15", "value": 5 }]),
    );

    let summary = recover::recover_missing_data_points(&conn).expect("recover");
    assert_eq!(summary.recovered_count, 1);
    assert_eq!(summary.matches[0].matched_by, "studentId");
    assert_eq!(summary.matches[0].unified_goal_id, "g1");
}

#[test]
fn recovery_without_legacy_points_is_a_no_op() {
    let (_ws, conn) = open_workspace("classroom-recover-empty");
    let summary = recover::recover_missing_data_points(&conn).expect("recover");
    assert_eq!(summary.legacy_data_points, 0);
    assert_eq!(summary.recovered_count, 0);
}
