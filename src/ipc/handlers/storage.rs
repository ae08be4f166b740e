use crate::db;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::KNOWN_KEYS;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::info;

/// Writes every entry in one transaction; `None` removes the key. Any failure leaves
/// the store as it was.
pub fn apply_entries(
    conn: &Connection,
    entries: &[(&str, Option<&str>)],
) -> Result<(), HandlerErr> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::write_failed("snapshot", e.into()))?;
    for (key, raw) in entries {
        let written = match raw {
            Some(raw) => db::kv_set(&tx, key, raw),
            None => db::kv_remove(&tx, key).map(|_| ()),
        };
        written.map_err(|e| HandlerErr::write_failed(key, e))?;
    }
    tx.commit()
        .map_err(|e| HandlerErr::write_failed("snapshot", e.into()))
}

/// Writes a raw key/value dump as-is. Values are not validated as JSON: a garbled
/// blob is stored and later reads treat it as empty. A `null` value clears the key.
fn storage_import_snapshot(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(entries) = params.get("entries").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("entries must be an object"));
    };

    let mut accepted: Vec<(&str, Option<&str>)> = Vec::new();
    let mut ignored: Vec<String> = Vec::new();
    for (key, value) in entries {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            ignored.push(key.clone());
            continue;
        }
        let raw = match value {
            Value::Null => None,
            Value::String(s) => Some(s.as_str()),
            _ => {
                return Err(HandlerErr {
                    code: "bad_params",
                    message: "snapshot values must be strings or null".to_string(),
                    details: Some(json!({ "key": key })),
                })
            }
        };
        accepted.push((key.as_str(), raw));
    }

    apply_entries(conn, &accepted)?;
    info!(imported = accepted.len(), ignored = ignored.len(), "snapshot imported");

    let imported: Vec<&str> = accepted.iter().map(|(k, _)| *k).collect();
    Ok(json!({
        "imported": imported,
        "ignoredKeys": ignored,
    }))
}

fn storage_export_snapshot(conn: &Connection) -> Result<Value, HandlerErr> {
    let rows = db::kv_entries(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let mut entries = Map::new();
    for (key, value) in rows {
        entries.insert(key, Value::String(value));
    }
    Ok(json!({ "entries": entries }))
}

fn handle_storage_import_snapshot(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match storage_import_snapshot(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_storage_export_snapshot(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match storage_export_snapshot(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "storage.importSnapshot" => Some(handle_storage_import_snapshot(state, req)),
        "storage.exportSnapshot" => Some(handle_storage_export_snapshot(state, req)),
        _ => None,
    }
}
