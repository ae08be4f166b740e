use crate::backup;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::storage::apply_entries;
use crate::ipc::types::{AppState, Request};
use crate::store::KNOWN_KEYS;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_backup_export_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let entries = match db::kv_entries(conn) {
        Ok(rows) => rows
            .into_iter()
            .filter(|(key, _)| KNOWN_KEYS.contains(&key.as_str()))
            .collect::<Vec<_>>(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let out = PathBuf::from(&out_path);
    let export = match backup::write_bundle(&out, &entries) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };
    info!(path = %out_path, bundle_id = %export.bundle_id, keys = export.keys.len(), "storage bundle exported");

    ok(
        &req.id,
        json!({
            "ok": true,
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "bundleId": export.bundle_id,
            "sha256": export.sha256,
            "keys": export.keys
        }),
    )
}

/// Full restore: every known key takes the bundle's value, and known keys the bundle
/// lacks are cleared. Unknown keys in the bundle are reported and skipped.
fn handle_backup_import_workspace_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "not_found",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    let bundle = match backup::read_bundle(&src) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{e:#}"),
                Some(json!({ "path": in_path })),
            )
        }
    };

    let ignored: Vec<&str> = bundle
        .entries
        .iter()
        .map(|(key, _)| key.as_str())
        .filter(|key| !KNOWN_KEYS.contains(key))
        .collect();
    let writes: Vec<(&str, Option<&str>)> = KNOWN_KEYS
        .iter()
        .map(|key| {
            let value = bundle
                .entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str());
            (*key, value)
        })
        .collect();
    let restored: Vec<&str> = writes
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(key, _)| *key)
        .collect();

    if let Err(e) = apply_entries(conn, &writes) {
        return e.response(&req.id);
    }
    info!(
        format = %bundle.format_detected,
        restored = restored.len(),
        ignored = ignored.len(),
        "storage bundle restored"
    );

    ok(
        &req.id,
        json!({
            "ok": true,
            "bundleFormatDetected": bundle.format_detected,
            "bundleId": bundle.bundle_id,
            "restoredKeys": restored,
            "ignoredKeys": ignored
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_backup_export_workspace_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_backup_import_workspace_bundle(state, req)),
        _ => None,
    }
}
