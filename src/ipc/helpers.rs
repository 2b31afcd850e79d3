use super::error::err;
use super::types::{AppState, Request};
use rusqlite::Connection;

/// Every data method needs an open workspace; failure is the ready-made
/// error response.
pub fn need_db<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state.db.as_ref().ok_or_else(|| {
        err(
            &req.id,
            "no_workspace",
            "select a workspace first",
            None,
        )
    })
}

pub fn need_str(req: &Request, name: &str) -> Result<String, serde_json::Value> {
    match req.params.get(name).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(
            &req.id,
            "bad_params",
            format!("missing {name}"),
            None,
        )),
    }
}

pub fn opt_object(req: &Request, name: &str) -> Option<serde_json::Value> {
    req.params.get(name).filter(|v| v.is_object()).cloned()
}

pub fn need_object(req: &Request, name: &str) -> Result<serde_json::Value, serde_json::Value> {
    opt_object(req, name).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("missing/invalid {name}"),
            None,
        )
    })
}
