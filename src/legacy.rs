use crate::db;
use crate::shape;
use rusqlite::Connection;
use serde_json::{Map, Value};

// Historical storage keys from before the unified document existed. Each one
// evolved separately and any of them may be absent or unparseable.
pub const KEY_STUDENTS: &str = "students";
pub const KEY_STAFF: &str = "staffMembers";
pub const KEY_GOALS: &str = "studentGoals";
pub const KEY_DATA_POINTS: &str = "goalDataPoints";
pub const KEY_BEHAVIOR_COMMITMENTS: &str = "behaviorCommitments";
pub const KEY_DAILY_HIGHLIGHTS: &str = "dailyHighlights";
pub const KEY_INDEPENDENT_CHOICES: &str = "independentChoices";
pub const KEY_SETTINGS: &str = "appSettings";

pub const LEGACY_KEYS: [&str; 8] = [
    KEY_STUDENTS,
    KEY_STAFF,
    KEY_GOALS,
    KEY_DATA_POINTS,
    KEY_BEHAVIOR_COMMITMENTS,
    KEY_DAILY_HIGHLIGHTS,
    KEY_INDEPENDENT_CHOICES,
    KEY_SETTINGS,
];

/// Reads a legacy collection as a normalized sequence of records. A missing
/// key or corrupt JSON reads as empty; one bad legacy key must never fail a
/// whole migration.
pub fn read_collection(conn: &Connection, key: &str) -> anyhow::Result<Vec<Value>> {
    let Some(value) = db::storage_get_json(conn, key)? else {
        return Ok(Vec::new());
    };
    Ok(shape::coerce_records(&value))
}

pub fn read_students(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    read_collection(conn, KEY_STUDENTS)
}

pub fn read_staff(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    read_collection(conn, KEY_STAFF)
}

pub fn read_goals(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    read_collection(conn, KEY_GOALS)
}

pub fn read_data_points(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    read_collection(conn, KEY_DATA_POINTS)
}

/// The calendar sub-collections were stored as studentId -> [entries] maps.
/// Flattens to a plain sequence with `studentId` stamped on every record,
/// since entries written by the oldest schema carried no back-reference.
pub fn read_calendar_map(conn: &Connection, key: &str) -> anyhow::Result<Vec<Value>> {
    let Some(value) = db::storage_get_json(conn, key)? else {
        return Ok(Vec::new());
    };

    match value {
        Value::Object(by_student) => {
            let mut out = Vec::new();
            for (student_id, entries) in by_student {
                for mut entry in shape::coerce_records(&entries) {
                    if let Some(obj) = entry.as_object_mut() {
                        obj.entry("studentId")
                            .or_insert_with(|| Value::String(student_id.clone()));
                    }
                    out.push(entry);
                }
            }
            Ok(out)
        }
        // Some writers already flattened these; accept the sequence shape too.
        Value::Array(_) => Ok(shape::coerce_records(&value)),
        _ => Ok(Vec::new()),
    }
}

pub fn read_settings(conn: &Connection) -> anyhow::Result<Map<String, Value>> {
    let Some(value) = db::storage_get_json(conn, KEY_SETTINGS)? else {
        return Ok(Map::new());
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Legacy keys still present in storage (the sprawl the diagnostics report
/// lists).
pub fn present_keys(conn: &Connection) -> anyhow::Result<Vec<String>> {
    let all = db::storage_keys(conn)?;
    Ok(all
        .into_iter()
        .filter(|k| LEGACY_KEYS.contains(&k.as_str()))
        .collect())
}
