use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Bm,
    Bi,
    Math,
    Robotic,
}

impl Subject {
    pub const ALL: [Subject; 4] = [Subject::Bm, Subject::Bi, Subject::Math, Subject::Robotic];

    pub fn code(self) -> &'static str {
        match self {
            Subject::Bm => "bm",
            Subject::Bi => "bi",
            Subject::Math => "math",
            Subject::Robotic => "robotic",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "bm" => Some(Subject::Bm),
            "bi" => Some(Subject::Bi),
            "math" => Some(Subject::Math),
            "robotic" => Some(Subject::Robotic),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Subject::Bm => "Bahasa Malaysia",
            Subject::Bi => "Bahasa Inggeris",
            Subject::Math => "Matematik",
            Subject::Robotic => "Robotik",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Subject::Bm => "BM",
            Subject::Bi => "BI",
            Subject::Math => "Math",
            Subject::Robotic => "Robotik",
        }
    }

    fn index(self) -> usize {
        match self {
            Subject::Bm => 0,
            Subject::Bi => 1,
            Subject::Math => 2,
            Subject::Robotic => 3,
        }
    }
}

/// A registered student. Registration fields other than `id` and `name` are kept
/// verbatim in `extra` (including the dashboard's own `nama`) so they survive a
/// load/save cycle untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Student {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The identity pair the aggregator reports on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub id: i64,
    pub name: String,
}

impl From<&Student> for RosterEntry {
    fn from(s: &Student) -> Self {
        RosterEntry {
            id: s.id,
            name: s.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<i64>,
    pub bm: bool,
    pub bi: bool,
    pub math: bool,
    pub robotic: bool,
}

impl AttendanceRecord {
    pub fn all_present(student_id: i64) -> Self {
        AttendanceRecord {
            student_id: Some(student_id),
            bm: true,
            bi: true,
            math: true,
            robotic: true,
        }
    }

    pub fn flag(&self, subject: Subject) -> bool {
        match subject {
            Subject::Bm => self.bm,
            Subject::Bi => self.bi,
            Subject::Math => self.math,
            Subject::Robotic => self.robotic,
        }
    }

    pub fn set_flag(&mut self, subject: Subject, present: bool) {
        match subject {
            Subject::Bm => self.bm = present,
            Subject::Bi => self.bi = present,
            Subject::Math => self.math = present,
            Subject::Robotic => self.robotic = present,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyAttendanceEntry {
    pub date: String,
    pub records: Vec<AttendanceRecord>,
}

/// Per-student attendance summary, one per roster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAttendanceData {
    pub student_id: i64,
    pub student_name: String,
    pub bm: u32,
    pub bi: u32,
    pub math: u32,
    pub robotic: u32,
    pub average_attendance: u32,
    pub total_days_recorded: u32,
}

impl ProcessedAttendanceData {
    pub fn percent(&self, subject: Subject) -> u32 {
        self.subject_percents()[subject.index()]
    }

    pub fn subject_percents(&self) -> [u32; 4] {
        [self.bm, self.bi, self.math, self.robotic]
    }
}

/// Facilitator, teaching staff or secretariat member. Same storage shape as a student.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
