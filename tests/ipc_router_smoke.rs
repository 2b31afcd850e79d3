mod test_support;

use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("classroom-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "student": { "name": "Avery", "grade": "3" } }),
    );
    let student_id = created
        .get("student")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({}));
    assert_eq!(
        listed.get("students").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let goal = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "goals.addToStudent",
        json!({ "studentId": student_id, "goal": { "domain": "academic", "measurementType": "percentage" } }),
    );
    let goal_id = goal
        .get("goal")
        .and_then(|g| g.get("id"))
        .and_then(|v| v.as_str())
        .expect("goal id")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "dataPoints.add",
        json!({ "dataPoint": { "studentId": student_id, "goalId": goal_id, "value": 80 } }),
    );
    let points = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "dataPoints.listForGoal",
        json!({ "goalId": goal_id }),
    );
    assert_eq!(
        points.get("dataPoints").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    // Dangling references are refused, not silently stored.
    let bad = request(
        &mut stdin,
        &mut reader,
        "8",
        "dataPoints.add",
        json!({ "dataPoint": { "studentId": "ghost", "goalId": goal_id, "value": 1 } }),
    );
    assert_eq!(bad.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        bad.get("error").and_then(|e| e.get("code")).and_then(|v| v.as_str()),
        Some("invalid_reference")
    );

    let staff = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "staff.create",
        json!({ "staffMember": { "name": "Ms. Rivera", "role": "teacher" } }),
    );
    let staff_id = staff
        .get("staffMember")
        .and_then(|s| s.get("id"))
        .and_then(|v| v.as_str())
        .expect("staff id")
        .to_string();
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "staff.delete",
        json!({ "staffId": staff_id }),
    );
    assert_eq!(deleted.get("deleted"), Some(&json!(true)));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "activities.create",
        json!({ "activity": { "name": "Morning circle", "category": "social" } }),
    );

    let entry = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "calendar.create",
        json!({
            "kind": "behaviorCommitments",
            "entry": { "studentId": student_id, "date": "2024-03-04", "status": "kept" }
        }),
    );
    assert!(entry
        .get("entry")
        .and_then(|e| e.get("id"))
        .and_then(|v| v.as_str())
        .is_some());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "settings.update",
        json!({ "patch": { "theme": "calm" } }),
    );
    let settings = request_ok(&mut stdin, &mut reader, "14", "settings.get", json!({}));
    assert_eq!(
        settings.get("settings").and_then(|s| s.get("theme")),
        Some(&json!("calm"))
    );

    let migration = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "maintenance.migrate",
        json!({}),
    );
    assert!(migration.get("migration").is_some());
    let report = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "maintenance.diagnostics",
        json!({}),
    );
    assert_eq!(
        report
            .get("report")
            .and_then(|r| r.get("unifiedPresent"))
            .and_then(|v| v.as_bool()),
        Some(true)
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "maintenance.resolveConflicts",
        json!({}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "maintenance.recoverDataPoints",
        json!({}),
    );

    let bundle = workspace.join("smoke-bundle.zip");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "backup.export",
        json!({ "outPath": bundle.to_string_lossy() }),
    );

    // Students cannot be deleted through the router at all.
    let no_delete = request(
        &mut stdin,
        &mut reader,
        "20",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        no_delete
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn methods_without_a_workspace_are_refused() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let resp = request(&mut stdin, &mut reader, "1", "students.list", json!({}));
    assert_eq!(resp.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        resp.get("error").and_then(|e| e.get("code")).and_then(|v| v.as_str()),
        Some("no_workspace")
    );
    drop(stdin);
    let _ = child.wait();
}
