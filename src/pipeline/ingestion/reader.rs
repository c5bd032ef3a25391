//! Raw table readers. CSV cells arrive as text; JSON keeps numbers as numbers.

use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{Result, WsaError};
use crate::types::{Record, RecordSet, Value};

const BOM: char = '\u{feff}';

/// Read by extension: `.csv` or `.json`
pub fn read_path(path: &Path) -> Result<RecordSet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let set = match ext.as_str() {
        "csv" => read_csv(File::open(path)?)?,
        "json" => read_json(File::open(path)?)?,
        other => {
            return Err(WsaError::Input(format!(
                "unsupported input format '{}' for {}; expected .csv or .json",
                other,
                path.display()
            )))
        }
    };
    info!(
        "Read {} rows with {} columns from {}",
        set.len(),
        set.columns.len(),
        path.display()
    );
    Ok(set)
}

/// Header row first; short rows read the missing cells as null
pub fn read_csv<R: Read>(reader: R) -> Result<RecordSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(BOM) } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut set = RecordSet::new(columns);
    for (i, row) in rdr.records().enumerate() {
        let row = row?;
        let mut record = Record::new(i);
        for (column, cell) in set.columns.iter().zip(row.iter()) {
            let value = if cell.is_empty() {
                Value::Null
            } else {
                Value::text(cell)
            };
            record.set(column.clone(), value);
        }
        set.records.push(record);
    }
    Ok(set)
}

/// A JSON array of flat objects. Columns follow first appearance.
pub fn read_json<R: Read>(reader: R) -> Result<RecordSet> {
    let parsed: JsonValue = serde_json::from_reader(reader)?;
    let rows = match parsed {
        JsonValue::Array(rows) => rows,
        _ => {
            return Err(WsaError::Input(
                "JSON input must be an array of objects".to_string(),
            ))
        }
    };

    let mut set = RecordSet::new(Vec::new());
    for (i, row) in rows.into_iter().enumerate() {
        let JsonValue::Object(fields) = row else {
            return Err(WsaError::Input(format!(
                "JSON row {} is not an object",
                i
            )));
        };
        let mut record = Record::new(i);
        for (key, field) in fields {
            set.ensure_column(&key);
            record.set(key, json_cell(field));
        }
        set.records.push(record);
    }
    Ok(set)
}

fn json_cell(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::String(s) if s.is_empty() => Value::Null,
        JsonValue::String(s) => Value::Text(s),
        JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
        JsonValue::Bool(b) => Value::text(b.to_string()),
        other => Value::text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_text_and_nulls() {
        let data = "\u{feff}Name, Phone\nBudi,0812\nSari\n";
        let set = read_csv(data.as_bytes()).unwrap();
        assert_eq!(set.columns, vec!["Name", "Phone"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].get("Phone"), &Value::text("0812"));
        assert!(set.records[1].get("Phone").is_null());
        assert_eq!(set.records[1].source_index, 1);
    }

    #[test]
    fn test_read_json_keeps_numbers_and_key_order() {
        let data = r#"[{"B": 1.5, "A": "x"}, {"A": "", "C": true}]"#;
        let set = read_json(data.as_bytes()).unwrap();
        assert_eq!(set.columns, vec!["B", "A", "C"]);
        assert_eq!(set.records[0].get("B"), &Value::Number(1.5));
        assert!(set.records[1].get("A").is_null());
        assert_eq!(set.records[1].get("C"), &Value::text("true"));
    }

    #[test]
    fn test_read_json_rejects_non_array() {
        assert!(matches!(
            read_json(r#"{"A": 1}"#.as_bytes()),
            Err(WsaError::Input(_))
        ));
    }

    #[test]
    fn test_read_path_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xls");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(read_path(&path), Err(WsaError::Input(_))));
    }
}
