use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::analytics::processed_rows;
use crate::ipc::params::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::model::ProcessedAttendanceData;
use crate::store::KvRepository;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

const SUMMARY_CSV_HEADER: &str =
    "student_id,student_name,bm,bi,math,robotic,average,days_recorded";

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub fn summary_csv(rows: &[ProcessedAttendanceData]) -> String {
    let mut out = String::from(SUMMARY_CSV_HEADER);
    out.push('\n');
    for r in rows {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            r.student_id,
            csv_quote(&r.student_name),
            r.bm,
            r.bi,
            r.math,
            r.robotic,
            r.average_attendance,
            r.total_days_recorded
        ));
    }
    out
}

fn reports_attendance_summary_csv(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let rows = processed_rows(&KvRepository::new(conn));
    let text = summary_csv(&rows);

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| HandlerErr {
            code: "io_failed",
            message: e.to_string(),
            details: Some(json!({ "path": parent.to_string_lossy() })),
        })?;
    }
    std::fs::write(&out_path, text).map_err(|e| HandlerErr {
        code: "io_failed",
        message: e.to_string(),
        details: Some(json!({ "path": out_path.to_string_lossy() })),
    })?;
    info!(path = %out_path.display(), rows = rows.len(), "summary csv written");

    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rowCount": rows.len(),
    }))
}

fn handle_reports_attendance_summary_csv(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match reports_attendance_summary_csv(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.attendanceSummaryCsv" => Some(handle_reports_attendance_summary_csv(state, req)),
        _ => None,
    }
}
