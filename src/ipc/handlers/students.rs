use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::params::{get_optional_str, get_required_i64, get_required_name};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use crate::registry;
use crate::store::{AttendanceRepository, KvRepository, STUDENTS_KEY};
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::info;

/// Optional registration fields: the key the dashboard stores, and the English
/// parameter name also accepted on requests.
const METADATA_FIELDS: [(&str, &str); 6] = [
    ("icNo", "icNo"),
    ("sekolah", "school"),
    ("tahun", "year"),
    ("jantina", "gender"),
    ("namaWaris", "guardianName"),
    ("noTelWaris", "guardianPhone"),
];

fn students_list(conn: &Connection) -> Result<Value, HandlerErr> {
    let roster = KvRepository::new(conn).load_roster();
    Ok(json!({ "students": roster }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let name = get_required_name(params)?;
    let repo = KvRepository::new(conn);
    let mut roster = repo.load_roster();
    let now = chrono::Utc::now();

    let mut extra = Map::new();
    extra.insert("nama".to_string(), Value::String(name.clone()));
    for (stored, alias) in METADATA_FIELDS {
        if let Some(v) =
            get_optional_str(params, stored).or_else(|| get_optional_str(params, alias))
        {
            extra.insert(stored.to_string(), Value::String(v));
        }
    }
    extra.insert(
        "noMatrik".to_string(),
        Value::String(registry::matric_number(roster.len(), now)),
    );
    extra.insert(
        "kelas".to_string(),
        Value::String(registry::class_name(roster.len())),
    );
    extra.insert("createdAt".to_string(), Value::String(now.to_rfc3339()));

    let student = Student {
        id: registry::next_id(roster.iter().map(|s| s.id), now)
            .ok_or_else(|| HandlerErr::ids_exhausted(STUDENTS_KEY))?,
        name,
        extra,
    };
    roster.push(student.clone());
    repo.save_roster(&roster)
        .map_err(|e| HandlerErr::write_failed(STUDENTS_KEY, e))?;
    info!(student_id = student.id, "student registered");
    Ok(json!({ "student": student }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let repo = KvRepository::new(conn);
    let mut roster = repo.load_roster();
    let before = roster.len();
    roster.retain(|s| s.id != student_id);
    if roster.len() == before {
        return Err(HandlerErr::not_found("student not found"));
    }
    // History is left alone; orphaned records drop out of aggregation.
    repo.save_roster(&roster)
        .map_err(|e| HandlerErr::write_failed(STUDENTS_KEY, e))?;
    info!(student_id, "student removed");
    Ok(json!({ "ok": true }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_create(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students_delete(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
