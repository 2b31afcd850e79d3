use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{need_db, need_object};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_get(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match store::get_settings(conn) {
        Ok(settings) => ok(&req.id, json!({ "settings": settings })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_update(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let patch = match need_object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch_map = patch.as_object().cloned().unwrap_or_default();
    match store::update_settings(conn, patch_map) {
        Ok(settings) => ok(&req.id, json!({ "settings": settings })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_get(state, req)),
        "settings.update" => Some(handle_update(state, req)),
        _ => None,
    }
}
