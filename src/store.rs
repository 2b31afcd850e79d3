use crate::db;
use crate::shape;
use anyhow::bail;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

pub const KEY_UNIFIED: &str = "unifiedData";
pub const SCHEMA_VERSION: &str = "2.0";

/// The consolidated document. Entity records stay loosely structured
/// (`serde_json::Value` objects) because the whole point of this layer is to
/// absorb shape drift from years of independent legacy writers; only the
/// skeleton is typed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub students: Vec<Value>,
    pub staff: Vec<Value>,
    pub activities: Vec<Value>,
    pub calendar: Calendar,
    pub settings: Map<String, Value>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub behavior_commitments: Vec<Value>,
    pub daily_highlights: Vec<Value>,
    pub independent_choices: Vec<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: String,
    pub migrated_at: Option<String>,
    pub total_goals: u64,
    pub total_data_points: u64,
    pub total_staff: u64,
    pub total_activities: u64,
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            version: SCHEMA_VERSION.to_string(),
            migrated_at: None,
            total_goals: 0,
            total_data_points: 0,
            total_staff: 0,
            total_activities: 0,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Document {
            students: Vec::new(),
            staff: Vec::new(),
            activities: Vec::new(),
            calendar: Calendar::default(),
            settings: Map::new(),
            metadata: Metadata::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    BehaviorCommitments,
    DailyHighlights,
    IndependentChoices,
}

impl CalendarKind {
    pub fn parse(s: &str) -> Option<CalendarKind> {
        match s {
            "behaviorCommitments" => Some(CalendarKind::BehaviorCommitments),
            "dailyHighlights" => Some(CalendarKind::DailyHighlights),
            "independentChoices" => Some(CalendarKind::IndependentChoices),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::BehaviorCommitments => "behaviorCommitments",
            CalendarKind::DailyHighlights => "dailyHighlights",
            CalendarKind::IndependentChoices => "independentChoices",
        }
    }
}

impl Document {
    /// Tolerant construction from whatever is on disk. Collections that
    /// drifted into the id-keyed map shape are coerced back to sequences;
    /// the second return value reports whether anything had to change so the
    /// loader can persist the corrected shape.
    pub fn from_value(value: &Value) -> Option<(Document, bool)> {
        let obj = value.as_object()?;
        let mut healed = false;

        let mut read = |field: &str| -> Vec<Value> {
            match obj.get(field) {
                Some(v) => {
                    if shape::needs_normalization(v) {
                        healed = true;
                    }
                    shape::coerce_records(v)
                }
                None => {
                    healed = true;
                    Vec::new()
                }
            }
        };

        let mut students = read("students");
        let staff = read("staff");
        let activities = read("activities");

        let calendar_value = obj.get("calendar").cloned().unwrap_or(json!({}));
        let mut cal_read = |field: &str| -> Vec<Value> {
            match calendar_value.get(field) {
                Some(v) => {
                    if shape::needs_normalization(v) {
                        healed = true;
                    }
                    shape::coerce_records(v)
                }
                None => {
                    healed = true;
                    Vec::new()
                }
            }
        };
        let calendar = Calendar {
            behavior_commitments: cal_read("behaviorCommitments"),
            daily_highlights: cal_read("dailyHighlights"),
            independent_choices: cal_read("independentChoices"),
        };

        let settings = match obj.get("settings") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };

        let meta = obj.get("metadata");
        let metadata = Metadata {
            version: meta
                .and_then(|m| m.get("version"))
                .and_then(|v| v.as_str())
                .unwrap_or(SCHEMA_VERSION)
                .to_string(),
            migrated_at: meta
                .and_then(|m| m.get("migratedAt"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            total_goals: meta
                .and_then(|m| m.get("totalGoals"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            total_data_points: meta
                .and_then(|m| m.get("totalDataPoints"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            total_staff: meta
                .and_then(|m| m.get("totalStaff"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            total_activities: meta
                .and_then(|m| m.get("totalActivities"))
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
        };

        for student in &mut students {
            if ensure_student_blocks(student) {
                healed = true;
            }
        }

        Some((
            Document {
                students,
                staff,
                activities,
                calendar,
                settings,
                metadata,
            },
            healed,
        ))
    }

    pub fn recompute_metadata(&mut self) {
        let mut goals = 0u64;
        let mut points = 0u64;
        for s in &self.students {
            goals += s.get("goals").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0) as u64;
            points += s
                .get("dataPoints")
                .and_then(|v| v.as_array())
                .map(|a| a.len())
                .unwrap_or(0) as u64;
        }
        self.metadata.total_goals = goals;
        self.metadata.total_data_points = points;
        self.metadata.total_staff = self.staff.len() as u64;
        self.metadata.total_activities = self.activities.len() as u64;
    }

    pub fn calendar_mut(&mut self, kind: CalendarKind) -> &mut Vec<Value> {
        match kind {
            CalendarKind::BehaviorCommitments => &mut self.calendar.behavior_commitments,
            CalendarKind::DailyHighlights => &mut self.calendar.daily_highlights,
            CalendarKind::IndependentChoices => &mut self.calendar.independent_choices,
        }
    }

    pub fn calendar_ref(&self, kind: CalendarKind) -> &Vec<Value> {
        match kind {
            CalendarKind::BehaviorCommitments => &self.calendar.behavior_commitments,
            CalendarKind::DailyHighlights => &self.calendar.daily_highlights,
            CalendarKind::IndependentChoices => &self.calendar.independent_choices,
        }
    }
}

/// Students that predate the goal schema get empty goal/data-point blocks.
/// Blocks that drifted into the map shape are coerced, and embedded records
/// missing their owner's `studentId` get it stamped (the owner is always
/// knowable for an embedded record). Returns true when the record changed.
pub fn ensure_student_blocks(student: &mut Value) -> bool {
    let student_id = shape::record_id(student).map(|s| s.to_string());
    let Some(obj) = student.as_object_mut() else {
        return false;
    };
    let mut changed = false;
    for field in ["goals", "dataPoints"] {
        match obj.get(field) {
            Some(v) if !shape::needs_normalization(v) => {}
            Some(v) => {
                let coerced = shape::coerce_records(v);
                obj.insert(field.to_string(), Value::Array(coerced));
                changed = true;
            }
            None => {
                obj.insert(field.to_string(), Value::Array(Vec::new()));
                changed = true;
            }
        }
    }

    if let Some(student_id) = student_id {
        for field in ["goals", "dataPoints"] {
            let Some(items) = obj.get_mut(field).and_then(|v| v.as_array_mut()) else {
                continue;
            };
            for item in items {
                let Some(rec) = item.as_object_mut() else {
                    continue;
                };
                let has_owner = rec
                    .get("studentId")
                    .and_then(|v| v.as_str())
                    .map(|s| !s.is_empty())
                    .unwrap_or(false);
                if !has_owner {
                    rec.insert("studentId".to_string(), Value::String(student_id.clone()));
                    changed = true;
                }
            }
        }
    }
    changed
}

/// Loads the unified document. Absent or unparseable reads as None (callers
/// fall back to migration). A document whose collections drifted into the
/// map shape is normalized and written back before being returned.
pub fn load(conn: &Connection) -> anyhow::Result<Option<Document>> {
    let Some(value) = db::storage_get_json(conn, KEY_UNIFIED)? else {
        return Ok(None);
    };
    let Some((doc, healed)) = Document::from_value(&value) else {
        // Top-level shape is not even an object; treat as corrupt.
        return Ok(None);
    };
    if healed {
        save(conn, &doc)?;
    }
    Ok(Some(doc))
}

pub fn save(conn: &Connection, doc: &Document) -> anyhow::Result<()> {
    db::storage_set(conn, KEY_UNIFIED, &serde_json::to_string(doc)?)
}

/// Load-or-migrate entry used by every operation: an absent document sends
/// us through the migration pipeline once, after which the store is the only
/// authority.
pub fn ensure_document(conn: &Connection) -> anyhow::Result<Document> {
    if let Some(doc) = load(conn)? {
        return Ok(doc);
    }
    crate::migrate::migrate_all_legacy_data(conn)?;
    Ok(load(conn)?.unwrap_or_default())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Shallow patch merge, the update primitive for every entity type.
fn apply_patch(target: &mut Value, patch: &Value) {
    let (Some(obj), Some(patch)) = (target.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (k, v) in patch {
        // Identifiers are never patchable.
        if k == "id" {
            continue;
        }
        obj.insert(k.clone(), v.clone());
    }
}

fn find_by_id(records: &[Value], id: &str) -> Option<usize> {
    records.iter().position(|r| shape::record_id(r) == Some(id))
}

// ---- students ----------------------------------------------------------
//
// Students support no delete, only deactivation via `isActive: false`.
// That asymmetry with staff/activities is deliberate (records retention).

pub fn get_all_students(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    Ok(ensure_document(conn)?.students)
}

pub fn get_student(conn: &Connection, id: &str) -> anyhow::Result<Option<Value>> {
    let doc = ensure_document(conn)?;
    Ok(find_by_id(&doc.students, id).map(|i| doc.students[i].clone()))
}

pub fn add_student(conn: &Connection, partial: Value) -> anyhow::Result<Value> {
    let mut doc = ensure_document(conn)?;
    let mut student = json!({
        "id": new_id(),
        "isActive": true,
        "accommodations": [],
        "createdAt": now_rfc3339(),
    });
    apply_patch(&mut student, &partial);
    ensure_student_blocks(&mut student);
    doc.students.push(student.clone());
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(student)
}

pub fn update_student(conn: &Connection, id: &str, patch: &Value) -> anyhow::Result<Option<Value>> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.students, id) else {
        return Ok(None);
    };
    apply_patch(&mut doc.students[idx], patch);
    ensure_student_blocks(&mut doc.students[idx]);
    let updated = doc.students[idx].clone();
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(Some(updated))
}

// ---- staff -------------------------------------------------------------

pub fn get_all_staff(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    Ok(ensure_document(conn)?.staff)
}

pub fn get_staff(conn: &Connection, id: &str) -> anyhow::Result<Option<Value>> {
    let doc = ensure_document(conn)?;
    Ok(find_by_id(&doc.staff, id).map(|i| doc.staff[i].clone()))
}

pub fn add_staff(conn: &Connection, partial: Value) -> anyhow::Result<Value> {
    let mut doc = ensure_document(conn)?;
    let mut member = json!({
        "id": new_id(),
        "isActive": true,
        "createdAt": now_rfc3339(),
    });
    apply_patch(&mut member, &partial);
    doc.staff.push(member.clone());
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(member)
}

pub fn update_staff(conn: &Connection, id: &str, patch: &Value) -> anyhow::Result<Option<Value>> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.staff, id) else {
        return Ok(None);
    };
    apply_patch(&mut doc.staff[idx], patch);
    let updated = doc.staff[idx].clone();
    save(conn, &doc)?;
    Ok(Some(updated))
}

pub fn delete_staff(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.staff, id) else {
        return Ok(false);
    };
    doc.staff.remove(idx);
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(true)
}

// ---- activities --------------------------------------------------------

pub fn get_all_activities(conn: &Connection) -> anyhow::Result<Vec<Value>> {
    Ok(ensure_document(conn)?.activities)
}

pub fn get_activity(conn: &Connection, id: &str) -> anyhow::Result<Option<Value>> {
    let doc = ensure_document(conn)?;
    Ok(find_by_id(&doc.activities, id).map(|i| doc.activities[i].clone()))
}

pub fn add_activity(conn: &Connection, partial: Value) -> anyhow::Result<Value> {
    let mut doc = ensure_document(conn)?;
    let mut activity = json!({
        "id": new_id(),
        "isCustom": true,
        "linkedGoalIds": [],
        "createdAt": now_rfc3339(),
    });
    apply_patch(&mut activity, &partial);
    doc.activities.push(activity.clone());
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(activity)
}

pub fn update_activity(conn: &Connection, id: &str, patch: &Value) -> anyhow::Result<Option<Value>> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.activities, id) else {
        return Ok(None);
    };
    apply_patch(&mut doc.activities[idx], patch);
    let updated = doc.activities[idx].clone();
    save(conn, &doc)?;
    Ok(Some(updated))
}

pub fn delete_activity(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.activities, id) else {
        return Ok(false);
    };
    doc.activities.remove(idx);
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(true)
}

// ---- goals and data points --------------------------------------------

pub fn add_goal_to_student(
    conn: &Connection,
    student_id: &str,
    partial: Value,
) -> anyhow::Result<Value> {
    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.students, student_id) else {
        bail!("student not found: {student_id}");
    };

    let mut goal = json!({
        "id": new_id(),
        "studentId": student_id,
        "isActive": true,
        "currentProgress": 0,
        "priority": "medium",
        "createdDate": today(),
    });
    apply_patch(&mut goal, &partial);

    ensure_student_blocks(&mut doc.students[idx]);
    if let Some(goals) = doc.students[idx]
        .get_mut("goals")
        .and_then(|v| v.as_array_mut())
    {
        goals.push(goal.clone());
    }
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(goal)
}

pub fn update_goal(conn: &Connection, goal_id: &str, patch: &Value) -> anyhow::Result<Option<Value>> {
    let mut doc = ensure_document(conn)?;
    let mut updated: Option<Value> = None;
    for student in &mut doc.students {
        let Some(goals) = student.get_mut("goals").and_then(|v| v.as_array_mut()) else {
            continue;
        };
        if let Some(goal) = goals
            .iter_mut()
            .find(|g| shape::record_id(g) == Some(goal_id))
        {
            apply_patch(goal, patch);
            updated = Some(goal.clone());
            break;
        }
    }
    if updated.is_some() {
        doc.recompute_metadata();
        save(conn, &doc)?;
    }
    Ok(updated)
}

pub fn get_student_goals(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<Value>> {
    let doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.students, student_id) else {
        return Ok(Vec::new());
    };
    Ok(doc.students[idx]
        .get("goals")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default())
}

/// Recording a measurement against a goal the student does not own would
/// create a dangling reference, so unlike the other not-found cases this one
/// is a hard error.
pub fn add_data_point(conn: &Connection, partial: Value) -> anyhow::Result<Value> {
    let student_id = partial
        .get("studentId")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let goal_id = partial
        .get("goalId")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if student_id.is_empty() || goal_id.is_empty() {
        bail!("data point requires studentId and goalId");
    }

    let mut doc = ensure_document(conn)?;
    let Some(idx) = find_by_id(&doc.students, student_id.as_str()) else {
        bail!("student not found: {student_id}");
    };

    let owns_goal = doc.students[idx]
        .get("goals")
        .and_then(|v| v.as_array())
        .map(|goals| goals.iter().any(|g| shape::record_id(g) == Some(goal_id.as_str())))
        .unwrap_or(false);
    if !owns_goal {
        bail!("goal {goal_id} does not belong to student {student_id}");
    }

    let mut point = json!({
        "id": new_id(),
        "date": today(),
        "time": chrono::Utc::now().format("%H:%M").to_string(),
        "recordedAt": now_rfc3339(),
    });
    apply_patch(&mut point, &partial);

    ensure_student_blocks(&mut doc.students[idx]);
    if let Some(points) = doc.students[idx]
        .get_mut("dataPoints")
        .and_then(|v| v.as_array_mut())
    {
        points.push(point.clone());
    }
    doc.recompute_metadata();
    save(conn, &doc)?;
    Ok(point)
}

pub fn get_goal_data_points(conn: &Connection, goal_id: &str) -> anyhow::Result<Vec<Value>> {
    let doc = ensure_document(conn)?;
    let mut out = Vec::new();
    for student in &doc.students {
        let Some(points) = student.get("dataPoints").and_then(|v| v.as_array()) else {
            continue;
        };
        out.extend(
            points
                .iter()
                .filter(|p| p.get("goalId").and_then(|v| v.as_str()) == Some(goal_id))
                .cloned(),
        );
    }
    Ok(out)
}

// ---- calendar ----------------------------------------------------------

pub fn get_calendar_entries(conn: &Connection, kind: CalendarKind) -> anyhow::Result<Vec<Value>> {
    Ok(ensure_document(conn)?.calendar_ref(kind).clone())
}

pub fn add_calendar_entry(
    conn: &Connection,
    kind: CalendarKind,
    partial: Value,
) -> anyhow::Result<Value> {
    let student_id = partial
        .get("studentId")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let date = partial
        .get("date")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if student_id.is_empty() {
        bail!("calendar entry requires studentId");
    }
    if chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d").is_err() {
        bail!("calendar entry requires date in YYYY-MM-DD form");
    }

    let mut doc = ensure_document(conn)?;
    if find_by_id(&doc.students, &student_id).is_none() {
        bail!("student not found: {student_id}");
    }

    let mut entry = json!({
        "id": new_id(),
        "createdAt": now_rfc3339(),
    });
    apply_patch(&mut entry, &partial);
    doc.calendar_mut(kind).push(entry.clone());
    save(conn, &doc)?;
    Ok(entry)
}

pub fn update_calendar_entry(
    conn: &Connection,
    kind: CalendarKind,
    id: &str,
    patch: &Value,
) -> anyhow::Result<Option<Value>> {
    let mut doc = ensure_document(conn)?;
    let entries = doc.calendar_mut(kind);
    let Some(idx) = find_by_id(entries, id) else {
        return Ok(None);
    };
    apply_patch(&mut entries[idx], patch);
    let updated = entries[idx].clone();
    save(conn, &doc)?;
    Ok(Some(updated))
}

pub fn delete_calendar_entry(
    conn: &Connection,
    kind: CalendarKind,
    id: &str,
) -> anyhow::Result<bool> {
    let mut doc = ensure_document(conn)?;
    let entries = doc.calendar_mut(kind);
    let Some(idx) = find_by_id(entries, id) else {
        return Ok(false);
    };
    entries.remove(idx);
    save(conn, &doc)?;
    Ok(true)
}

// ---- settings ----------------------------------------------------------

pub fn get_settings(conn: &Connection) -> anyhow::Result<Map<String, Value>> {
    Ok(ensure_document(conn)?.settings)
}

/// Settings are an open configuration document; updates merge shallowly.
pub fn update_settings(
    conn: &Connection,
    patch: Map<String, Value>,
) -> anyhow::Result<Map<String, Value>> {
    let mut doc = ensure_document(conn)?;
    for (k, v) in patch {
        doc.settings.insert(k, v);
    }
    save(conn, &doc)?;
    Ok(doc.settings)
}
