use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{need_db, need_object, need_str, opt_object};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store::get_all_activities(conn) {
        Ok(activities) => ok(&req.id, json!({ "activities": activities })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_get(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let activity_id = match need_str(req, "activityId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_activity(conn, &activity_id) {
        Ok(Some(activity)) => ok(&req.id, json!({ "activity": activity })),
        Ok(None) => err(&req.id, "not_found", "activity not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let partial = opt_object(req, "activity").unwrap_or(json!({}));
    match store::add_activity(conn, partial) {
        Ok(activity) => ok(&req.id, json!({ "activity": activity })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_update(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let activity_id = match need_str(req, "activityId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match need_object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::update_activity(conn, &activity_id, &patch) {
        Ok(Some(activity)) => ok(&req.id, json!({ "activity": activity })),
        Ok(None) => err(&req.id, "not_found", "activity not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let activity_id = match need_str(req, "activityId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_activity(conn, &activity_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "activities.list" => Some(handle_list(state, req)),
        "activities.get" => Some(handle_get(state, req)),
        "activities.create" => Some(handle_create(state, req)),
        "activities.update" => Some(handle_update(state, req)),
        "activities.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
