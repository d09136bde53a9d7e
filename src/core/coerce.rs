//! Purpose: Coerce raw positional values into typed JSON values by declared datatype.
//! Exports: `coerce`, `DATE`, `DATE_TIME`.
//! Role: Leaf step of the structural decoder.
//! Invariants: Empty or absent input yields `None`, never an empty string or null.
//! Invariants: Never fails; malformed dates degrade to best-effort substring slices.
use serde_json::Value;

pub const DATE: &str = "DT";
pub const DATE_TIME: &str = "DTM";

pub fn coerce(raw: Option<&str>, datatype: &str) -> Option<Value> {
    let raw = raw.filter(|raw| !raw.is_empty())?;
    let coerced = match datatype {
        DATE => date_to_iso(raw),
        DATE_TIME => date_time_to_iso(raw),
        _ => raw.to_string(),
    };
    Some(Value::String(coerced))
}

fn date_to_iso(raw: &str) -> String {
    [slice(raw, 0, 4), slice(raw, 4, 2), slice(raw, 6, 2)].join("-")
}

fn date_time_to_iso(raw: &str) -> String {
    let date = date_to_iso(raw);
    let time = [slice(raw, 8, 2), slice(raw, 10, 2), slice(raw, 12, 2)]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(":");
    if time.is_empty() {
        date
    } else {
        format!("{date}T{time}")
    }
}

/// Character-based substring that clamps to the input instead of failing.
fn slice(raw: &str, start: usize, len: usize) -> &str {
    let mut indices = raw.char_indices().map(|(idx, _)| idx).chain(Some(raw.len()));
    let Some(begin) = indices.by_ref().nth(start) else {
        return "";
    };
    let end = if len == 0 {
        begin
    } else {
        indices.nth(len - 1).unwrap_or(raw.len())
    };
    &raw[begin..end]
}
