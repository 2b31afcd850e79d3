use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::need_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export(state: &AppState, req: &Request) -> serde_json::Value {
    let Some(workspace) = state.workspace.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let out_path = match need_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    match backup::export_workspace_bundle(workspace, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "dbSha256": summary.db_sha256,
                "outPath": out_path.to_string_lossy(),
            }),
        ),
        Err(e) => err(&req.id, "export_failed", format!("{e:#}"), None),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match need_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    let workspace = match need_str(req, "workspacePath") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };

    // The imported database replaces the open one; drop the connection first
    // so the rename cannot race an open handle on platforms that care.
    state.db = None;

    match backup::import_workspace_bundle(&in_path, &workspace) {
        Ok(summary) => match crate::db::open_db(&workspace) {
            Ok(conn) => {
                state.workspace = Some(workspace.clone());
                state.db = Some(conn);
                ok(
                    &req.id,
                    json!({
                        "bundleFormat": summary.bundle_format_detected,
                        "checksumVerified": summary.checksum_verified,
                        "workspacePath": workspace.to_string_lossy(),
                    }),
                )
            }
            Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
        },
        Err(e) => err(&req.id, "import_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.export" => Some(handle_export(state, req)),
        "backup.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
