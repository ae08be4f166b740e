use crate::db::{self, StoreError};
use crate::model::{AttendanceRecord, DailyAttendanceEntry, Person, Student};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

pub const STUDENTS_KEY: &str = "students";
pub const HISTORY_KEY: &str = "dailyAttendanceHistory";
pub const FACILITATORS_KEY: &str = "facilitators";
pub const STAFF_KEY: &str = "staff";
pub const SECRETARIAT_KEY: &str = "secretariat";
pub const SETUP_ANALYTICS_KEY: &str = "setup.analytics";

/// Keys a browser storage dump may carry that this daemon understands.
pub const KNOWN_KEYS: [&str; 6] = [
    STUDENTS_KEY,
    HISTORY_KEY,
    FACILITATORS_KEY,
    STAFF_KEY,
    SECRETARIAT_KEY,
    SETUP_ANALYTICS_KEY,
];

/// Read side of the attendance data. Loads never fail: anything unreadable comes back
/// as an empty collection.
pub trait AttendanceRepository {
    fn load_roster(&self) -> Vec<Student>;
    fn load_history(&self) -> Vec<DailyAttendanceEntry>;
}

pub struct KvRepository<'a> {
    conn: &'a Connection,
}

impl<'a> KvRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn load_blob(&self, key: &str) -> Option<String> {
        match db::kv_get(self.conn, key) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "storage read failed, using empty collection");
                None
            }
        }
    }

    pub fn load_people(&self, key: &str) -> Vec<Person> {
        self.load_blob(key)
            .map(|raw| {
                decode_members(key, &raw)
                    .into_iter()
                    .map(|(id, name, extra)| Person { id, name, extra })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn save_roster(&self, roster: &[Student]) -> Result<(), StoreError> {
        self.save_list(STUDENTS_KEY, roster)
    }

    pub fn save_history(&self, history: &[DailyAttendanceEntry]) -> Result<(), StoreError> {
        self.save_list(HISTORY_KEY, history)
    }

    pub fn save_people(&self, key: &str, people: &[Person]) -> Result<(), StoreError> {
        self.save_list(key, people)
    }

    fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items).map_err(|source| StoreError::Json {
            key: key.to_string(),
            source,
        })?;
        db::kv_set(self.conn, key, &raw)
    }
}

impl AttendanceRepository for KvRepository<'_> {
    fn load_roster(&self) -> Vec<Student> {
        self.load_blob(STUDENTS_KEY)
            .map(|raw| decode_roster(&raw))
            .unwrap_or_default()
    }

    fn load_history(&self) -> Vec<DailyAttendanceEntry> {
        self.load_blob(HISTORY_KEY)
            .map(|raw| decode_history(&raw))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    pub roster: Vec<Student>,
    pub history: Vec<DailyAttendanceEntry>,
}

#[cfg(test)]
impl AttendanceRepository for MemoryRepository {
    fn load_roster(&self) -> Vec<Student> {
        self.roster.clone()
    }

    fn load_history(&self) -> Vec<DailyAttendanceEntry> {
        self.history.clone()
    }
}

fn parse_array(key: &str, raw: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            warn!(key, "stored value is not a list, using empty collection");
            Vec::new()
        }
        Err(e) => {
            warn!(key, error = %e, "stored value is not valid JSON, using empty collection");
            Vec::new()
        }
    }
}

pub fn decode_roster(raw: &str) -> Vec<Student> {
    decode_members(STUDENTS_KEY, raw)
        .into_iter()
        .map(|(id, name, extra)| Student { id, name, extra })
        .collect()
}

/// Students and staff share one stored shape. Only an element without an integer `id` is
/// dropped; a missing or non-string name reads as `nama`, then as empty. Every other field
/// is kept in the metadata map.
fn decode_members(key: &str, raw: &str) -> Vec<(i64, String, Map<String, Value>)> {
    parse_array(key, raw)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let Value::Object(mut fields) = item else {
                warn!(key, idx, "skipping non-object element");
                return None;
            };
            let Some(id) = fields.get("id").and_then(|v| v.as_i64()) else {
                warn!(key, idx, "skipping element without integer id");
                return None;
            };
            fields.remove("id");
            let name = match fields.remove("name") {
                Some(Value::String(name)) => name,
                _ => fields
                    .get("nama")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            };
            Some((id, name, fields))
        })
        .collect()
}

pub fn decode_history(raw: &str) -> Vec<DailyAttendanceEntry> {
    parse_array(HISTORY_KEY, raw)
        .iter()
        .filter_map(decode_entry)
        .collect()
}

fn decode_entry(v: &Value) -> Option<DailyAttendanceEntry> {
    let obj = v.as_object()?;
    let date = obj
        .get("date")
        .and_then(|d| d.as_str())
        .unwrap_or("")
        .to_string();
    let records = obj
        .get("records")
        .and_then(|r| r.as_array())
        .map(|rows| rows.iter().map(decode_record).collect())
        .unwrap_or_default();
    Some(DailyAttendanceEntry { date, records })
}

/// Missing or mistyped flags read as absent; a missing `studentId` leaves the record
/// unattributed so the aggregator skips it.
pub fn decode_record(v: &Value) -> AttendanceRecord {
    let flag = |k: &str| v.get(k).and_then(|f| f.as_bool()).unwrap_or(false);
    AttendanceRecord {
        student_id: v.get("studentId").and_then(|id| id.as_i64()),
        bm: flag("bm"),
        bi: flag("bi"),
        math: flag("math"),
        robotic: flag("robotic"),
    }
}
