use sha2::{Digest, Sha256};

use crate::types::{Record, Value};

/// Stable digest of a row's cells over `columns`. Two rows share a
/// fingerprint exactly when every cell is equal, value kind included.
pub fn row_fingerprint(record: &Record, columns: &[String]) -> String {
    // kind tag + display; `\u{1f}` cannot appear in a cleaned cell
    let mut s = String::new();
    for value in record.cells(columns) {
        let tag = match value {
            Value::Null => 'N',
            Value::Text(_) => 'T',
            Value::Number(_) => 'F',
            Value::Date(_) => 'D',
        };
        s.push(tag);
        if let Value::Number(n) = value {
            s.push_str(&n.to_bits().to_string());
        } else {
            s.push_str(&value.to_display());
        }
        s.push('\u{1f}');
    }

    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordSet;

    #[test]
    fn test_fingerprint_distinguishes_kinds() {
        let set = RecordSet::from_rows(
            &["A", "B"],
            vec![
                vec![Value::text("1"), Value::Null],
                vec![Value::Number(1.0), Value::Null],
                vec![Value::text("1"), Value::Null],
                vec![Value::text("1"), Value::text("")],
            ],
        );
        let fp: Vec<String> = set
            .records
            .iter()
            .map(|r| row_fingerprint(r, &set.columns))
            .collect();
        assert_ne!(fp[0], fp[1]);
        assert_eq!(fp[0], fp[2]);
        assert_ne!(fp[0], fp[3]);
        assert_eq!(fp[0].len(), 64);
    }
}
