//! Output formatting for CLI commands

use serde::Serialize;

/// Format output as JSON or `key: value` lines based on --json flag
pub fn format_output<T: Serialize>(data: &T, json: bool) -> String {
    let value = match serde_json::to_value(data) {
        Ok(v) => v,
        Err(_) => return "{}".to_string(),
    };

    if json {
        return serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());
    }

    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{}: {}", k, s),
                other => format!("{}: {}", k, other),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}
