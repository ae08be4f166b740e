use crate::calc::{self, AnalyticsThresholds, Comparison};
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::setup::{load_analytics_settings, AnalyticsSettings};
use crate::ipc::params::{get_optional_str, get_required_i64};
use crate::ipc::types::{AppState, Request};
use crate::model::{ProcessedAttendanceData, RosterEntry, Subject};
use crate::store::{AttendanceRepository, KvRepository};
use serde_json::{json, Map, Value};

/// Fresh aggregation over whatever the repository holds right now.
pub fn processed_rows<R: AttendanceRepository>(repo: &R) -> Vec<ProcessedAttendanceData> {
    let roster: Vec<RosterEntry> = repo.load_roster().iter().map(RosterEntry::from).collect();
    calc::process_attendance_history(&repo.load_history(), &roster)
}

pub fn dashboard_model<R: AttendanceRepository>(
    repo: &R,
    thresholds: &AnalyticsThresholds,
    comparison: Comparison,
) -> Value {
    let rows = processed_rows(repo);
    let (x_label, y_label) = comparison.labels();
    json!({
        "stats": calc::overall_stats(&rows, thresholds),
        "pie": calc::subject_averages(&rows),
        "scatter": {
            "comparison": comparison.key(),
            "xLabel": x_label,
            "yLabel": y_label,
            "points": calc::scatter_points(&rows, comparison),
        },
        "students": rows,
    })
}

pub fn student_model<R: AttendanceRepository>(
    repo: &R,
    student_id: i64,
) -> Result<Value, HandlerErr> {
    let rows = processed_rows(repo);
    let Some(selected) = rows.iter().find(|r| r.student_id == student_id) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let series: Vec<Value> = Subject::ALL
        .iter()
        .map(|s| {
            json!({
                "subject": s.code(),
                "shortName": s.short_name(),
                "fullName": s.name(),
                "attendance": selected.percent(*s),
            })
        })
        .collect();
    Ok(json!({
        "student": selected,
        "pie": calc::student_shares(selected),
        "subjectSeries": series,
        "classAverages": calc::subject_averages(&rows),
        "students": rows,
    }))
}

fn bands_for(row: &ProcessedAttendanceData, t: &AnalyticsThresholds) -> Map<String, Value> {
    let mut bands = Map::new();
    for s in Subject::ALL {
        bands.insert(s.code().to_string(), json!(calc::band(row.percent(s), t)));
    }
    bands.insert(
        "average".to_string(),
        json!(calc::band(row.average_attendance, t)),
    );
    bands
}

pub fn summary_model<R: AttendanceRepository>(repo: &R, thresholds: &AnalyticsThresholds) -> Value {
    let rows: Vec<Value> = processed_rows(repo)
        .iter()
        .map(|r| {
            let mut v = json!(r);
            v["bands"] = Value::Object(bands_for(r, thresholds));
            v
        })
        .collect();
    json!({ "rows": rows })
}

fn handle_analytics_dashboard(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let AnalyticsSettings {
        thresholds,
        default_comparison,
    } = load_analytics_settings(conn);
    let comparison = match get_optional_str(&req.params, "comparison") {
        Some(key) => Comparison::parse_or_default(Some(key.as_str())),
        None => default_comparison,
    };
    ok(
        &req.id,
        dashboard_model(&KvRepository::new(conn), &thresholds, comparison),
    )
}

fn handle_analytics_student(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let result = get_required_i64(&req.params, "studentId")
        .and_then(|id| student_model(&KvRepository::new(conn), id));
    match result {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_analytics_summary(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let settings = load_analytics_settings(conn);
    ok(
        &req.id,
        summary_model(&KvRepository::new(conn), &settings.thresholds),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "analytics.dashboard" => Some(handle_analytics_dashboard(state, req)),
        "analytics.student" => Some(handle_analytics_student(state, req)),
        "analytics.summary" => Some(handle_analytics_summary(state, req)),
        _ => None,
    }
}
