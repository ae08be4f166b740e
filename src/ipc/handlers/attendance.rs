use crate::calc;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::params::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, DailyAttendanceEntry, RosterEntry, Student, Subject};
use crate::store::{AttendanceRepository, KvRepository, HISTORY_KEY};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

fn parse_date(raw: &str) -> Result<String, HandlerErr> {
    let t = raw.trim();
    let date = NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params("date must be YYYY-MM-DD"))?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn date_or_today(params: &Value) -> Result<String, HandlerErr> {
    match params.get("date").and_then(|v| v.as_str()) {
        Some(raw) => parse_date(raw),
        None => Ok(chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()),
    }
}

fn roster_entries(roster: &[Student]) -> Vec<RosterEntry> {
    roster.iter().map(RosterEntry::from).collect()
}

/// Every roster member present in every subject, then the supplied toggles applied on top.
/// Returns the sheet plus the ids that were supplied but are not on the roster.
pub fn build_sheet(
    roster: &[Student],
    overrides: &[Value],
) -> Result<(Vec<AttendanceRecord>, Vec<i64>), HandlerErr> {
    let mut records: Vec<AttendanceRecord> = roster
        .iter()
        .map(|s| AttendanceRecord::all_present(s.id))
        .collect();
    let index: HashMap<i64, usize> = roster
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id, i))
        .collect();

    let mut skipped = Vec::new();
    for (n, o) in overrides.iter().enumerate() {
        let Some(student_id) = o.get("studentId").and_then(|v| v.as_i64()) else {
            return Err(HandlerErr {
                code: "bad_params",
                message: "records[].studentId must be an integer".to_string(),
                details: Some(json!({ "index": n })),
            });
        };
        let Some(&i) = index.get(&student_id) else {
            skipped.push(student_id);
            continue;
        };
        for subject in Subject::ALL {
            match o.get(subject.code()) {
                None | Some(Value::Null) => {}
                Some(Value::Bool(present)) => records[i].set_flag(subject, *present),
                Some(_) => {
                    return Err(HandlerErr {
                        code: "bad_params",
                        message: format!("records[].{} must be boolean", subject.code()),
                        details: Some(json!({ "index": n, "studentId": student_id })),
                    })
                }
            }
        }
    }
    Ok((records, skipped))
}

fn attendance_open(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = date_or_today(params)?;
    let repo = KvRepository::new(conn);
    let roster = repo.load_roster();
    let history = repo.load_history();
    let (records, _) = build_sheet(&roster, &[])?;
    let existing_entries = history.iter().filter(|e| e.date == date).count();

    let students: Vec<Value> = roster
        .iter()
        .map(|s| {
            json!({
                "id": s.id,
                "name": s.name,
                "matricNo": s.extra.get("noMatrik"),
                "className": s.extra.get("kelas"),
            })
        })
        .collect();

    Ok(json!({
        "date": date,
        "students": students,
        "records": records,
        "existingEntries": existing_entries,
        "stats": calc::day_stats(&records, &roster_entries(&roster)),
    }))
}

fn attendance_save(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = parse_date(&get_required_str(params, "date")?)?;
    let overrides: Vec<Value> = match params.get("records") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => return Err(HandlerErr::bad_params("records must be an array")),
    };

    let repo = KvRepository::new(conn);
    let roster = repo.load_roster();
    let mut history = repo.load_history();
    let (records, skipped) = build_sheet(&roster, &overrides)?;
    let stats = calc::day_stats(&records, &roster_entries(&roster));

    history.push(DailyAttendanceEntry {
        date: date.clone(),
        records,
    });
    repo.save_history(&history)
        .map_err(|e| HandlerErr::write_failed(HISTORY_KEY, e))?;
    info!(%date, entries = history.len(), "attendance saved");

    Ok(json!({
        "date": date,
        "entryIndex": history.len() - 1,
        "recordCount": roster.len(),
        "skippedStudentIds": skipped,
        "stats": stats,
    }))
}

fn attendance_history(conn: &Connection) -> Result<Value, HandlerErr> {
    let history = KvRepository::new(conn).load_history();
    let entries: Vec<Value> = history
        .iter()
        .enumerate()
        .map(|(index, e)| {
            json!({
                "index": index,
                "date": e.date,
                "recordCount": e.records.len(),
            })
        })
        .collect();
    Ok(json!({ "entries": entries }))
}

fn attendance_day_stats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let date = parse_date(&get_required_str(params, "date")?)?;
    let repo = KvRepository::new(conn);
    let history = repo.load_history();
    let Some(entry) = history.iter().rev().find(|e| e.date == date) else {
        return Err(HandlerErr::not_found("no attendance saved for date"));
    };
    let roster = roster_entries(&repo.load_roster());
    Ok(json!({
        "date": date,
        "rosterSize": roster.len(),
        "stats": calc::day_stats(&entry.records, &roster),
    }))
}

fn attendance_delete_entry(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let index = params
        .get("index")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params("missing index"))? as usize;
    let repo = KvRepository::new(conn);
    let mut history = repo.load_history();
    if index >= history.len() {
        return Err(HandlerErr::not_found("entry index out of range"));
    }
    let removed = history.remove(index);
    repo.save_history(&history)
        .map_err(|e| HandlerErr::write_failed(HISTORY_KEY, e))?;
    info!(index, date = %removed.date, "attendance entry removed");
    Ok(json!({ "ok": true, "date": removed.date }))
}

fn handle_attendance_open(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_open(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_save(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_save(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_history(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_history(conn) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_day_stats(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_day_stats(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_attendance_delete_entry(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_delete_entry(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "attendance.open" => Some(handle_attendance_open(state, req)),
        "attendance.save" => Some(handle_attendance_save(state, req)),
        "attendance.history" => Some(handle_attendance_history(state, req)),
        "attendance.dayStats" => Some(handle_attendance_day_stats(state, req)),
        "attendance.deleteEntry" => Some(handle_attendance_delete_entry(state, req)),
        _ => None,
    }
}
