use crate::model::{
    AttendanceRecord, DailyAttendanceEntry, ProcessedAttendanceData, RosterEntry, Subject,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// `Math.round(numer / denom)` for non-negative operands, in exact integer arithmetic:
/// `floor(numer / denom + 1/2) == floor((2 * numer + denom) / (2 * denom))`.
/// Returns 0 when `denom` is 0.
pub fn round_div(numer: u64, denom: u64) -> u64 {
    if denom == 0 {
        return 0;
    }
    (2 * numer + denom) / (2 * denom)
}

pub fn percent_of(attended: u32, days: u32) -> u32 {
    round_div(100 * u64::from(attended), u64::from(days)) as u32
}

#[derive(Debug, Clone, Copy, Default)]
struct RawCounts {
    attended: [u32; 4],
    days: u32,
}

/// Folds the daily history into one summary per roster member, in roster order.
///
/// A student only accumulates a "day" for entries that carry a record for them; entries
/// without such a record leave the denominator alone. Records for ids not on the roster
/// are dropped. The average is taken over the already rounded subject percentages.
pub fn process_attendance_history(
    history: &[DailyAttendanceEntry],
    roster: &[RosterEntry],
) -> Vec<ProcessedAttendanceData> {
    let mut counts: HashMap<i64, RawCounts> = roster
        .iter()
        .map(|s| (s.id, RawCounts::default()))
        .collect();

    for entry in history {
        for record in &entry.records {
            let Some(student_id) = record.student_id else {
                continue;
            };
            let Some(c) = counts.get_mut(&student_id) else {
                continue;
            };
            for (i, subject) in Subject::ALL.iter().enumerate() {
                if record.flag(*subject) {
                    c.attended[i] += 1;
                }
            }
            c.days += 1;
        }
    }

    roster
        .iter()
        .map(|s| {
            let c = counts.get(&s.id).copied().unwrap_or_default();
            if c.days == 0 {
                return ProcessedAttendanceData {
                    student_id: s.id,
                    student_name: s.name.clone(),
                    bm: 0,
                    bi: 0,
                    math: 0,
                    robotic: 0,
                    average_attendance: 0,
                    total_days_recorded: 0,
                };
            }
            let pct = c.attended.map(|a| percent_of(a, c.days));
            let sum: u64 = pct.iter().map(|p| u64::from(*p)).sum();
            ProcessedAttendanceData {
                student_id: s.id,
                student_name: s.name.clone(),
                bm: pct[0],
                bi: pct[1],
                math: pct[2],
                robotic: pct[3],
                average_attendance: round_div(sum, 4) as u32,
                total_days_recorded: c.days,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySubjectStats {
    pub subject: &'static str,
    pub name: &'static str,
    pub present: usize,
    pub absent: usize,
    pub percentage: u32,
}

/// Head count per subject for one day's sheet. Only records for roster members count, and
/// everyone on the roster without a present flag counts as absent.
pub fn day_stats(records: &[AttendanceRecord], roster: &[RosterEntry]) -> Vec<DaySubjectStats> {
    let on_roster: HashSet<i64> = roster.iter().map(|s| s.id).collect();
    let total = on_roster.len();
    let mut seen: HashSet<i64> = HashSet::new();
    let counted: Vec<&AttendanceRecord> = records
        .iter()
        .filter(|r| match r.student_id {
            Some(id) => on_roster.contains(&id) && seen.insert(id),
            None => false,
        })
        .collect();

    Subject::ALL
        .iter()
        .map(|subject| {
            let present = counted.iter().filter(|r| r.flag(*subject)).count();
            DaySubjectStats {
                subject: subject.code(),
                name: subject.name(),
                present,
                absent: total - present,
                percentage: round_div(100 * present as u64, total as u64) as u32,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsThresholds {
    pub high_performer: u32,
    pub needs_attention: u32,
    pub green: u32,
    pub yellow: u32,
}

impl Default for AnalyticsThresholds {
    fn default() -> Self {
        AnalyticsThresholds {
            high_performer: 90,
            needs_attention: 75,
            green: 90,
            yellow: 80,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub avg_overall: u32,
    pub high_performers: usize,
    pub needs_attention: usize,
}

pub fn overall_stats(rows: &[ProcessedAttendanceData], t: &AnalyticsThresholds) -> OverallStats {
    if rows.is_empty() {
        return OverallStats::default();
    }
    let sum: u64 = rows.iter().map(|r| u64::from(r.average_attendance)).sum();
    OverallStats {
        avg_overall: round_div(sum, rows.len() as u64) as u32,
        high_performers: rows
            .iter()
            .filter(|r| r.average_attendance >= t.high_performer)
            .count(),
        needs_attention: rows
            .iter()
            .filter(|r| r.average_attendance < t.needs_attention)
            .count(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectShare {
    pub subject: &'static str,
    pub name: &'static str,
    pub value: u32,
}

/// Mean of each subject percentage across all rows. Empty when there are no rows.
pub fn subject_averages(rows: &[ProcessedAttendanceData]) -> Vec<SubjectShare> {
    if rows.is_empty() {
        return Vec::new();
    }
    Subject::ALL
        .iter()
        .map(|subject| {
            let sum: u64 = rows.iter().map(|r| u64::from(r.percent(*subject))).sum();
            SubjectShare {
                subject: subject.code(),
                name: subject.name(),
                value: round_div(sum, rows.len() as u64) as u32,
            }
        })
        .collect()
}

pub fn student_shares(row: &ProcessedAttendanceData) -> Vec<SubjectShare> {
    Subject::ALL
        .iter()
        .map(|subject| SubjectShare {
            subject: subject.code(),
            name: subject.name(),
            value: row.percent(*subject),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub x: Subject,
    pub y: Subject,
}

impl Default for Comparison {
    fn default() -> Self {
        Comparison {
            x: Subject::Bm,
            y: Subject::Bi,
        }
    }
}

impl Comparison {
    pub fn parse(key: &str) -> Option<Self> {
        let (x, y) = key.split_once('-')?;
        let x = Subject::parse(x)?;
        let y = Subject::parse(y)?;
        if x == y {
            return None;
        }
        Some(Comparison { x, y })
    }

    /// Unknown or malformed selectors fall back to `bm-bi`.
    pub fn parse_or_default(key: Option<&str>) -> Self {
        key.and_then(Self::parse).unwrap_or_default()
    }

    pub fn key(&self) -> String {
        format!("{}-{}", self.x.code(), self.y.code())
    }

    pub fn labels(&self) -> (String, String) {
        (
            format!("{} (%)", self.x.name()),
            format!("{} (%)", self.y.name()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScatterPoint {
    pub id: i64,
    pub name: String,
    pub x: u32,
    pub y: u32,
    pub average: u32,
}

pub fn scatter_points(rows: &[ProcessedAttendanceData], cmp: Comparison) -> Vec<ScatterPoint> {
    rows.iter()
        .map(|r| ScatterPoint {
            id: r.student_id,
            name: r.student_name.clone(),
            x: r.percent(cmp.x),
            y: r.percent(cmp.y),
            average: r.average_attendance,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Green,
    Yellow,
    Red,
}

pub fn band(value: u32, t: &AnalyticsThresholds) -> Band {
    if value >= t.green {
        Band::Green
    } else if value >= t.yellow {
        Band::Yellow
    } else {
        Band::Red
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(ids: &[i64]) -> Vec<RosterEntry> {
        ids.iter()
            .map(|id| RosterEntry {
                id: *id,
                name: format!("Pelajar {}", id),
            })
            .collect()
    }

    fn rec(id: i64, bm: bool, bi: bool, math: bool, robotic: bool) -> AttendanceRecord {
        AttendanceRecord {
            student_id: Some(id),
            bm,
            bi,
            math,
            robotic,
        }
    }

    fn day(date: &str, records: Vec<AttendanceRecord>) -> DailyAttendanceEntry {
        DailyAttendanceEntry {
            date: date.to_string(),
            records,
        }
    }

    #[test]
    fn round_div_is_half_up() {
        assert_eq!(round_div(1, 2), 1);
        assert_eq!(round_div(5, 2), 3);
        assert_eq!(round_div(100, 3), 33);
        assert_eq!(round_div(200, 3), 67);
        assert_eq!(round_div(7, 0), 0);
    }

    #[test]
    fn empty_roster_yields_nothing() {
        let history = vec![day("2024-03-01", vec![rec(1, true, true, true, true)])];
        assert!(process_attendance_history(&history, &[]).is_empty());
    }

    #[test]
    fn empty_history_yields_zero_rows() {
        let out = process_attendance_history(&[], &roster(&[1, 2]));
        assert_eq!(out.len(), 2);
        for row in out {
            assert_eq!(row.subject_percents(), [0, 0, 0, 0]);
            assert_eq!(row.average_attendance, 0);
            assert_eq!(row.total_days_recorded, 0);
        }
    }

    #[test]
    fn single_full_day_is_hundred_percent() {
        let history = vec![day("2024-03-01", vec![rec(7, true, true, true, true)])];
        let out = process_attendance_history(&history, &roster(&[7]));
        assert_eq!(
            out[0],
            ProcessedAttendanceData {
                student_id: 7,
                student_name: "Pelajar 7".to_string(),
                bm: 100,
                bi: 100,
                math: 100,
                robotic: 100,
                average_attendance: 100,
                total_days_recorded: 1,
            }
        );
    }

    #[test]
    fn missing_from_a_day_does_not_count_against_student() {
        let history = vec![
            day("2024-03-01", vec![rec(1, true, false, false, false)]),
            day("2024-03-02", vec![rec(2, true, true, true, true)]),
        ];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out[0].total_days_recorded, 1);
        assert_eq!(out[0].subject_percents(), [100, 0, 0, 0]);
        assert_eq!(out[0].average_attendance, 25);
    }

    #[test]
    fn one_of_three_rounds_down_to_33() {
        let history = vec![
            day("2024-03-01", vec![rec(1, true, true, true, true)]),
            day("2024-03-02", vec![rec(1, false, true, true, true)]),
            day("2024-03-03", vec![rec(1, false, true, true, false)]),
        ];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out[0].bm, 33);
        assert_eq!(out[0].robotic, 67);
        assert_eq!(out[0].bi, 100);
        // (33 + 100 + 100 + 67) / 4 = 75
        assert_eq!(out[0].average_attendance, 75);
    }

    #[test]
    fn exact_half_boundaries_round_up() {
        let mut days = vec![day("2024-03-01", vec![rec(1, true, false, false, false)])];
        for d in 2..=8 {
            days.push(day(&format!("2024-03-0{}", d), vec![rec(1, false, false, false, false)]));
        }
        let out = process_attendance_history(&days, &roster(&[1]));
        // 1/8 = 12.5%
        assert_eq!(out[0].bm, 13);

        let history = vec![
            day("2024-03-01", vec![rec(2, true, false, false, false)]),
            day("2024-03-02", vec![rec(2, false, false, false, false)]),
        ];
        let out = process_attendance_history(&history, &roster(&[2]));
        assert_eq!(out[0].subject_percents(), [50, 0, 0, 0]);
        // 50 / 4 = 12.5
        assert_eq!(out[0].average_attendance, 13);
    }

    #[test]
    fn average_uses_rounded_subject_values() {
        // 2/3 in every subject except one at 1/3: 67 * 3 + 33 = 234 -> 58.5 -> 59.
        // Averaging raw values instead would give 58.33 -> 58.
        let history = vec![
            day("d1", vec![rec(1, true, true, true, true)]),
            day("d2", vec![rec(1, true, true, true, false)]),
            day("d3", vec![rec(1, false, false, false, false)]),
        ];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out[0].subject_percents(), [67, 67, 67, 33]);
        assert_eq!(out[0].average_attendance, 59);
    }

    #[test]
    fn dangling_records_are_ignored() {
        let history = vec![day(
            "2024-03-01",
            vec![rec(99, true, true, true, true), rec(1, false, true, false, true)],
        )];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].student_id, 1);
        assert_eq!(out[0].subject_percents(), [0, 100, 0, 100]);
        assert_eq!(out[0].total_days_recorded, 1);
    }

    #[test]
    fn records_without_student_id_are_ignored() {
        let mut anonymous = rec(1, true, true, true, true);
        anonymous.student_id = None;
        let history = vec![day("2024-03-01", vec![anonymous])];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out[0].total_days_recorded, 0);
    }

    #[test]
    fn duplicate_dates_double_the_weight() {
        let history = vec![
            day("2024-03-01", vec![rec(1, true, true, true, true)]),
            day("2024-03-01", vec![rec(1, true, true, true, true)]),
            day("2024-03-02", vec![rec(1, false, false, false, false)]),
        ];
        let out = process_attendance_history(&history, &roster(&[1]));
        assert_eq!(out[0].total_days_recorded, 3);
        assert_eq!(out[0].bm, 67);
    }

    #[test]
    fn output_follows_roster_order_and_is_repeatable() {
        let history = vec![
            day("2024-03-02", vec![rec(3, true, true, true, true), rec(1, false, false, false, false)]),
            day("2024-03-01", vec![rec(2, true, false, true, false)]),
        ];
        let r = roster(&[3, 1, 2]);
        let first = process_attendance_history(&history, &r);
        let ids: Vec<i64> = first.iter().map(|p| p.student_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let mut reversed = history.clone();
        reversed.reverse();
        assert_eq!(process_attendance_history(&reversed, &r), first);
        assert_eq!(
            serde_json::to_string(&process_attendance_history(&history, &r)).expect("json"),
            serde_json::to_string(&first).expect("json")
        );
    }

    #[test]
    fn overall_stats_use_thresholds() {
        let history = vec![day(
            "d1",
            vec![
                rec(1, true, true, true, true),
                rec(2, true, true, true, false),
                rec(3, true, false, false, false),
            ],
        )];
        let rows = process_attendance_history(&history, &roster(&[1, 2, 3]));
        let stats = overall_stats(&rows, &AnalyticsThresholds::default());
        // averages: 100, 75, 25 -> 200 / 3 = 66.67
        assert_eq!(stats.avg_overall, 67);
        assert_eq!(stats.high_performers, 1);
        assert_eq!(stats.needs_attention, 1);
        assert_eq!(overall_stats(&[], &AnalyticsThresholds::default()), OverallStats::default());
    }

    #[test]
    fn subject_averages_follow_subject_order() {
        let history = vec![day(
            "d1",
            vec![rec(1, true, true, false, false), rec(2, true, false, false, true)],
        )];
        let rows = process_attendance_history(&history, &roster(&[1, 2]));
        let shares = subject_averages(&rows);
        let values: Vec<(&str, u32)> = shares.iter().map(|s| (s.subject, s.value)).collect();
        assert_eq!(values, vec![("bm", 100), ("bi", 50), ("math", 0), ("robotic", 50)]);
        assert!(subject_averages(&[]).is_empty());
    }

    #[test]
    fn comparison_selector_falls_back_to_bm_bi() {
        assert_eq!(Comparison::parse_or_default(Some("math-robotic")).key(), "math-robotic");
        assert_eq!(Comparison::parse_or_default(Some("bi-math")).key(), "bi-math");
        assert_eq!(Comparison::parse_or_default(Some("bm-bm")).key(), "bm-bi");
        assert_eq!(Comparison::parse_or_default(Some("science")).key(), "bm-bi");
        assert_eq!(Comparison::parse_or_default(None).key(), "bm-bi");
        let (x, y) = Comparison::parse_or_default(Some("bm-math")).labels();
        assert_eq!(x, "Bahasa Malaysia (%)");
        assert_eq!(y, "Matematik (%)");
    }

    #[test]
    fn scatter_points_pick_the_compared_subjects() {
        let history = vec![day("d1", vec![rec(5, false, true, true, false)])];
        let rows = process_attendance_history(&history, &roster(&[5]));
        let points = scatter_points(&rows, Comparison::parse_or_default(Some("math-robotic")));
        assert_eq!(points[0].x, 100);
        assert_eq!(points[0].y, 0);
        assert_eq!(points[0].average, 50);
    }

    #[test]
    fn day_stats_count_roster_members_once() {
        let records = vec![
            rec(1, true, false, true, true),
            rec(1, true, true, true, true),
            rec(2, false, false, true, false),
            rec(99, true, true, true, true),
        ];
        let stats = day_stats(&records, &roster(&[1, 2, 3]));
        let bm = &stats[0];
        assert_eq!((bm.present, bm.absent, bm.percentage), (1, 2, 33));
        let math = &stats[2];
        assert_eq!((math.present, math.absent, math.percentage), (2, 1, 67));
        assert!(day_stats(&records, &[]).iter().all(|s| s.percentage == 0));
    }

    #[test]
    fn bands_split_at_thresholds() {
        let t = AnalyticsThresholds::default();
        assert_eq!(band(90, &t), Band::Green);
        assert_eq!(band(89, &t), Band::Yellow);
        assert_eq!(band(80, &t), Band::Yellow);
        assert_eq!(band(79, &t), Band::Red);
    }
}
