use crate::calc::{AnalyticsThresholds, Comparison};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::SETUP_ANALYTICS_KEY;
use rusqlite::Connection;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Clone, Copy)]
enum SetupSection {
    Analytics,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "analytics" => Some(Self::Analytics),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Analytics => SETUP_ANALYTICS_KEY,
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Analytics => {
            let t = AnalyticsThresholds::default();
            json!({
                "highPerformerThreshold": t.high_performer,
                "needsAttentionThreshold": t.needs_attention,
                "greenThreshold": t.green,
                "yellowThreshold": t.yellow,
                "defaultComparison": Comparison::default().key()
            })
        }
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Analytics => match k.as_str() {
                "highPerformerThreshold"
                | "needsAttentionThreshold"
                | "greenThreshold"
                | "yellowThreshold" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                "defaultComparison" => {
                    let raw = v
                        .as_str()
                        .ok_or_else(|| format!("{} must be string", k))?;
                    let Some(cmp) = Comparison::parse(raw) else {
                        return Err(
                            "defaultComparison must name two different subjects, e.g. bm-bi"
                                .into(),
                        );
                    };
                    obj.insert(k.clone(), Value::String(cmp.key()));
                }
                _ => return Err(format!("unknown analytics field: {}", k)),
            },
        }
    }
    let green = obj.get("greenThreshold").and_then(|v| v.as_i64()).unwrap_or(0);
    let yellow = obj.get("yellowThreshold").and_then(|v| v.as_i64()).unwrap_or(0);
    if yellow > green {
        return Err("yellowThreshold must be <= greenThreshold".into());
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> Value {
    let mut current = default_section(section);
    match db::kv_get_json(conn, section.key()) {
        Ok(Some(saved)) => {
            if let Some(saved_obj) = saved.as_object() {
                let mut merged = current.clone();
                // Stale or hand-edited values fall back to defaults as a whole.
                if merge_section_patch(section, &mut merged, saved_obj).is_ok() {
                    current = merged;
                } else {
                    warn!(key = section.key(), "ignoring invalid saved setup");
                }
            }
        }
        Ok(None) => {}
        Err(e) => warn!(key = section.key(), error = %e, "setup read failed, using defaults"),
    }
    current
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsSettings {
    pub thresholds: AnalyticsThresholds,
    pub default_comparison: Comparison,
}

pub fn load_analytics_settings(conn: &Connection) -> AnalyticsSettings {
    let v = load_section(conn, SetupSection::Analytics);
    let defaults = AnalyticsThresholds::default();
    let get = |k: &str, d: u32| {
        v.get(k)
            .and_then(|n| n.as_u64())
            .map(|n| n as u32)
            .unwrap_or(d)
    };
    AnalyticsSettings {
        thresholds: AnalyticsThresholds {
            high_performer: get("highPerformerThreshold", defaults.high_performer),
            needs_attention: get("needsAttentionThreshold", defaults.needs_attention),
            green: get("greenThreshold", defaults.green),
            yellow: get("yellowThreshold", defaults.yellow),
        },
        default_comparison: Comparison::parse_or_default(
            v.get("defaultComparison").and_then(|c| c.as_str()),
        ),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    ok(
        &req.id,
        json!({ "analytics": load_section(conn, SetupSection::Analytics) }),
    )
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = load_section(conn, section);
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::kv_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true, "analytics": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
