use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{need_db, need_object, need_str, opt_object};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

// Goals follow the student rule: deactivation only, no delete method.

fn handle_add_to_student(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match need_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let partial = opt_object(req, "goal").unwrap_or(json!({}));
    match store::add_goal_to_student(conn, &student_id, partial) {
        Ok(goal) => ok(&req.id, json!({ "goal": goal })),
        Err(e) => err(&req.id, "invalid_reference", e.to_string(), None),
    }
}

fn handle_update(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let goal_id = match need_str(req, "goalId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match need_object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::update_goal(conn, &goal_id, &patch) {
        Ok(Some(goal)) => ok(&req.id, json!({ "goal": goal })),
        Ok(None) => err(&req.id, "not_found", "goal not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_list_for_student(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match need_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_student_goals(conn, &student_id) {
        Ok(goals) => ok(&req.id, json!({ "goals": goals })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_add_data_point(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let partial = match need_object(req, "dataPoint") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // A point for a student or goal that does not exist would be a dangling
    // reference; this is the one class of failure the store surfaces hard.
    match store::add_data_point(conn, partial) {
        Ok(point) => ok(&req.id, json!({ "dataPoint": point })),
        Err(e) => err(&req.id, "invalid_reference", e.to_string(), None),
    }
}

fn handle_list_for_goal(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let goal_id = match need_str(req, "goalId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_goal_data_points(conn, &goal_id) {
        Ok(points) => ok(&req.id, json!({ "dataPoints": points })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "goals.addToStudent" => Some(handle_add_to_student(state, req)),
        "goals.update" => Some(handle_update(state, req)),
        "goals.listForStudent" => Some(handle_list_for_student(state, req)),
        "dataPoints.add" => Some(handle_add_data_point(state, req)),
        "dataPoints.listForGoal" => Some(handle_list_for_goal(state, req)),
        _ => None,
    }
}
