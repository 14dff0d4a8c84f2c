//! Response → terminal text.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::client::Response;
use crate::error::RenderError;
use crate::operation::HttpMethod;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// Single-line JSON.
    Compact,
    /// Aligned text columns.
    Table,
}

impl OutputFormat {
    pub const NAMES: [&'static str; 3] = ["json", "compact", "table"];
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            "table" => Ok(Self::Table),
            other => Err(format!(
                "unknown output format `{other}` (expected one of {})",
                Self::NAMES.join(", ")
            )),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Compact => "compact",
            Self::Table => "table",
        })
    }
}

/// Render a successful response. Paginated envelopes are unwrapped to their
/// `_embedded.items` array; action commands without a response body get a
/// status line instead.
pub fn render(
    response: &Response,
    method: HttpMethod,
    format: OutputFormat,
) -> Result<String, RenderError> {
    if !method.is_read() && response.body.trim().is_empty() {
        return Ok(status_line(response.status));
    }

    let payload = unwrap_envelope(parse_body_value(&response.body));
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(&payload)?,
        OutputFormat::Compact => serde_json::to_string(&payload)?,
        OutputFormat::Table => render_table(&payload),
    })
}

fn status_line(status: u16) -> String {
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Done");
    format!("{reason}. (HTTP {status})")
}

fn parse_body_value(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// `{"_embedded": {"items": [...]}}` → `[...]`; anything else unchanged.
pub fn unwrap_envelope(mut payload: Value) -> Value {
    const ITEMS: &str = "/_embedded/items";
    if matches!(payload.pointer(ITEMS), Some(Value::Array(_))) {
        if let Some(items) = payload.pointer_mut(ITEMS) {
            return items.take();
        }
    }
    payload
}

fn render_table(value: &Value) -> String {
    match value {
        Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
            let mut columns: Vec<&str> = Vec::new();
            for item in items {
                for (key, field) in item.as_object().into_iter().flatten() {
                    if !field.is_object() && !field.is_array() && !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }
            let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
            let rows = items
                .iter()
                .map(|item| columns.iter().map(|c| cell(item.get(*c))).collect::<Vec<String>>());
            align(std::iter::once(header).chain(rows).collect())
        }
        Value::Array(items) => items
            .iter()
            .map(|item| cell(Some(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => align(
            map.iter()
                .map(|(key, field)| vec![key.clone(), cell(Some(field))])
                .collect(),
        ),
        other => cell(Some(other)),
    }
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn align(rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for row in &rows {
        for (i, text) in row.iter().enumerate() {
            let len = text.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    rows.iter()
        .map(|row| {
            let line = row
                .iter()
                .enumerate()
                .map(|(i, text)| format!("{text:<width$}", width = widths[i]))
                .collect::<Vec<_>>()
                .join("  ");
            line.trim_end().to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
