use crate::ipc::error::HandlerErr;
use serde_json::Value;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    // Dashboards often hand ids back as strings (select values).
    if let Some(s) = v.as_str() {
        return s
            .trim()
            .parse::<i64>()
            .map_err(|_| HandlerErr::bad_params(format!("{} must be an integer", key)));
    }
    v.as_i64()
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_name(params: &Value) -> Result<String, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let name = name.trim();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    if name.chars().count() > 200 {
        return Err(HandlerErr::bad_params("name length must be <= 200"));
    }
    Ok(name.to_string())
}
