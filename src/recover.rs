use crate::legacy;
use crate::shape;
use crate::store;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverySummary {
    pub legacy_data_points: usize,
    pub recovered_count: usize,
    pub skipped_duplicates: usize,
    pub unmatched: usize,
    pub matches: Vec<GoalMatch>,
}

/// Audit log entry: which heuristic linked an old goal id to its re-issued
/// id. The matching is best-effort, not a guaranteed-correct join; the log
/// exists so an operator can review what was assumed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMatch {
    pub legacy_goal_id: String,
    pub unified_goal_id: String,
    pub student_id: String,
    pub matched_by: &'static str,
}

/// Re-links data points stranded in the legacy measurement store because
/// their goal was re-identified during an earlier migration. Explicitly
/// operator-triggered; never part of the normal read/write path. Re-running
/// it cannot duplicate points: the (date, time, goalId) triple is the
/// dedupe key.
pub fn recover_missing_data_points(conn: &Connection) -> anyhow::Result<RecoverySummary> {
    let mut summary = RecoverySummary::default();

    let legacy_points = legacy::read_data_points(conn)?;
    summary.legacy_data_points = legacy_points.len();
    if legacy_points.is_empty() {
        return Ok(summary);
    }

    let legacy_goals = legacy::read_goals(conn)?;
    let mut doc = store::ensure_document(conn)?;

    let goal_map = build_goal_map(&legacy_goals, &doc.students, &mut summary.matches);

    // Existing (date, time, goalId) triples across every student.
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    for student in &doc.students {
        let Some(points) = student.get("dataPoints").and_then(|v| v.as_array()) else {
            continue;
        };
        for p in points {
            seen.insert(dedupe_key(p));
        }
    }

    let mut changed = false;
    for point in &legacy_points {
        let Some(old_goal_id) = point.get("goalId").and_then(|v| v.as_str()) else {
            summary.unmatched += 1;
            continue;
        };
        let Some((new_goal_id, student_id)) = goal_map.get(old_goal_id) else {
            summary.unmatched += 1;
            continue;
        };

        let mut rewritten = point.clone();
        if let Some(obj) = rewritten.as_object_mut() {
            obj.insert("goalId".into(), json!(new_goal_id));
            obj.insert("studentId".into(), json!(student_id));
            let has_id = obj
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if !has_id {
                obj.insert("id".into(), json!(Uuid::new_v4().to_string()));
            }
        }

        let key = dedupe_key(&rewritten);
        if seen.contains(&key) {
            summary.skipped_duplicates += 1;
            continue;
        }

        let Some(student) = doc
            .students
            .iter_mut()
            .find(|s| shape::record_id(s) == Some(student_id.as_str()))
        else {
            summary.unmatched += 1;
            continue;
        };
        store::ensure_student_blocks(student);
        if let Some(points) = student.get_mut("dataPoints").and_then(|v| v.as_array_mut()) {
            points.push(rewritten);
            seen.insert(key);
            summary.recovered_count += 1;
            changed = true;
        }
    }

    if changed {
        doc.recompute_metadata();
        store::save(conn, &doc)?;
    }

    Ok(summary)
}

/// Maps an old goal id to its re-issued (goal id, student id). First match
/// wins: description equality, then short-term-objective equality, then
/// owning-student equality.
fn build_goal_map(
    legacy_goals: &[Value],
    students: &[Value],
    audit: &mut Vec<GoalMatch>,
) -> HashMap<String, (String, String)> {
    let mut map: HashMap<String, (String, String)> = HashMap::new();

    for legacy_goal in legacy_goals {
        let Some(old_id) = shape::record_id(legacy_goal) else {
            continue;
        };
        if let Some((goal, student_id, matched_by)) = match_goal(legacy_goal, students) {
            let Some(new_id) = shape::record_id(goal) else {
                continue;
            };
            audit.push(GoalMatch {
                legacy_goal_id: old_id.to_string(),
                unified_goal_id: new_id.to_string(),
                student_id: student_id.clone(),
                matched_by,
            });
            map.insert(old_id.to_string(), (new_id.to_string(), student_id));
        }
    }

    map
}

fn match_goal<'a>(
    legacy_goal: &Value,
    students: &'a [Value],
) -> Option<(&'a Value, String, &'static str)> {
    let description = text_field(legacy_goal, "description");
    let objective = text_field(legacy_goal, "shortTermObjective");
    let owner = legacy_goal.get("studentId").and_then(|v| v.as_str());

    // Pass order matters: textual matches are stronger evidence than mere
    // ownership, so exhaust them across all students first.
    if let Some(d) = &description {
        if let Some(found) =
            find_goal(students, |g| text_field(g, "description").as_deref() == Some(d.as_str()))
        {
            return Some((found.0, found.1, "description"));
        }
    }
    if let Some(o) = &objective {
        if let Some(found) = find_goal(students, |g| {
            text_field(g, "shortTermObjective").as_deref() == Some(o.as_str())
        }) {
            return Some((found.0, found.1, "shortTermObjective"));
        }
    }
    if let Some(owner) = owner {
        for student in students {
            if shape::record_id(student) != Some(owner) {
                continue;
            }
            let goal = student
                .get("goals")
                .and_then(|v| v.as_array())
                .and_then(|goals| goals.first())?;
            return Some((goal, owner.to_string(), "studentId"));
        }
    }
    None
}

fn find_goal<'a>(
    students: &'a [Value],
    pred: impl Fn(&Value) -> bool,
) -> Option<(&'a Value, String)> {
    for student in students {
        let Some(student_id) = shape::record_id(student) else {
            continue;
        };
        let Some(goals) = student.get("goals").and_then(|v| v.as_array()) else {
            continue;
        };
        if let Some(goal) = goals.iter().find(|g| pred(g)) {
            return Some((goal, student_id.to_string()));
        }
    }
    None
}

fn text_field(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn dedupe_key(point: &Value) -> (String, String, String) {
    let get = |f: &str| {
        point
            .get(f)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    (get("date"), get("time"), get("goalId"))
}
