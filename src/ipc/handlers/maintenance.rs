use crate::diagnostics;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::need_db;
use crate::ipc::types::{AppState, Request};
use crate::merge;
use crate::migrate;
use crate::recover;
use serde_json::json;

// Maintenance operations always answer with a structured summary, even on
// partial failure, so the caller can render an outcome instead of a stack
// trace.

fn handle_migrate(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match migrate::migrate_all_legacy_data(conn) {
        Ok(summary) => ok(&req.id, json!({ "migration": summary })),
        Err(e) => err(&req.id, "migration_failed", format!("{e:#}"), None),
    }
}

fn handle_resolve_conflicts(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match merge::resolve_conflicts(conn) {
        Ok(summary) => ok(&req.id, json!({ "merge": summary })),
        Err(e) => err(&req.id, "merge_failed", format!("{e:#}"), None),
    }
}

fn handle_recover(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match recover::recover_missing_data_points(conn) {
        Ok(summary) => ok(&req.id, json!({ "recovery": summary })),
        Err(e) => err(&req.id, "recovery_failed", format!("{e:#}"), None),
    }
}

fn handle_diagnostics(state: &AppState, req: &Request) -> serde_json::Value {
    let conn = match need_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match diagnostics::run_diagnostics(conn) {
        Ok(report) => ok(&req.id, json!({ "report": report })),
        Err(e) => err(&req.id, "diagnostics_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "maintenance.migrate" => Some(handle_migrate(state, req)),
        "maintenance.resolveConflicts" => Some(handle_resolve_conflicts(state, req)),
        "maintenance.recoverDataPoints" => Some(handle_recover(state, req)),
        "maintenance.diagnostics" => Some(handle_diagnostics(state, req)),
        _ => None,
    }
}
