//! Purpose: Convert CSV text into a JSON array of row objects.
//! Exports: `csv_to_json`.
//! Role: CSV branch of the converter dispatch.
//! Invariants: The first row names the columns; every value stays a string.
//! Invariants: Parse failures yield an empty array rather than an error.
use csv::ReaderBuilder;
use serde_json::{Map, Value};

pub fn csv_to_json(input: &str) -> Value {
    match read_rows(input) {
        Ok(rows) => Value::Array(rows),
        Err(err) => {
            tracing::warn!(error = %err, "csv parse failed; returning empty array");
            Value::Array(Vec::new())
        }
    }
}

fn read_rows(input: &str) -> Result<Vec<Value>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let mut row = Map::new();
        for (index, value) in record.iter().enumerate() {
            let key = headers
                .get(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("field{}", index + 1));
            row.insert(key, Value::String(value.to_string()));
        }
        rows.push(Value::Object(row));
    }
    Ok(rows)
}
