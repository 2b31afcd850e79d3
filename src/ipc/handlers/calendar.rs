use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{need_db, need_object, need_str, opt_object};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, CalendarKind};
use serde_json::json;

fn need_kind(req: &Request) -> Result<CalendarKind, serde_json::Value> {
    let raw = need_str(req, "kind")?;
    CalendarKind::parse(&raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            "kind must be behaviorCommitments, dailyHighlights or independentChoices",
            None,
        )
    })
}

fn handle_list(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match need_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match store::get_calendar_entries(conn, kind) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_create(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match need_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let partial = opt_object(req, "entry").unwrap_or(json!({}));
    match store::add_calendar_entry(conn, kind, partial) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => err(&req.id, "invalid_reference", e.to_string(), None),
    }
}

fn handle_update(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match need_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let entry_id = match need_str(req, "entryId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match need_object(req, "patch") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::update_calendar_entry(conn, kind, &entry_id, &patch) {
        Ok(Some(entry)) => ok(&req.id, json!({ "entry": entry })),
        Ok(None) => err(&req.id, "not_found", "calendar entry not found", None),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let kind = match need_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let entry_id = match need_str(req, "entryId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match store::delete_calendar_entry(conn, kind, &entry_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => err(&req.id, "store_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calendar.list" => Some(handle_list(state, req)),
        "calendar.create" => Some(handle_create(state, req)),
        "calendar.update" => Some(handle_update(state, req)),
        "calendar.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
