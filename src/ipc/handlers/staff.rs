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
    match store::get_all_staff(conn) {
        Ok(staff) => ok(&req.id, json!({ "staff": staff })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_get(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let staff_id = match need_str(req, "staffId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::get_staff(conn, &staff_id) {
        Ok(Some(member)) => ok(&req.id, json!({ "staffMember": member })),
        Ok(None) => err(&req.id, "not_found", "staff member not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let partial = opt_object(req, "staffMember").unwrap_or(json!({}));
    match store::add_staff(conn, partial) {
        Ok(member) => ok(&req.id, json!({ "staffMember": member })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_update(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let staff_id = match need_str(req, "staffId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match need_object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::update_staff(conn, &staff_id, &patch) {
        Ok(Some(member)) => ok(&req.id, json!({ "staffMember": member })),
        Ok(None) => err(&req.id, "not_found", "staff member not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let staff_id = match need_str(req, "staffId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_staff(conn, &staff_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "staff.list" => Some(handle_list(state, req)),
        "staff.get" => Some(handle_get(state, req)),
        "staff.create" => Some(handle_create(state, req)),
        "staff.update" => Some(handle_update(state, req)),
        "staff.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
