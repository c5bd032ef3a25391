use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::constants::CANONICAL_DATE_FORMAT;
use crate::error::WsaError;

/// A single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

static NULL: Value = Value::Null;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Null, or text that is blank once trimmed
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Plain rendering used by every export format. Whole numbers lose their `.0`.
    pub fn to_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    n.to_string()
                }
            }
            Value::Date(dt) => dt.format(CANONICAL_DATE_FORMAT).to_string(),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Date(_) => 1,
            Value::Text(_) => 2,
            Value::Null => 3,
        }
    }

    /// Ascending order with nulls last. Mixed kinds order Number < Date < Text.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        if self.is_null() || other.is_null() {
            return self.is_null().cmp(&other.is_null());
        }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Date(_) => serializer.serialize_str(&self.to_display()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

/// One row. Columns it does not carry read as null.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// 0-based position in the raw input, kept through every stage
    pub source_index: usize,
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new(source_index: usize) -> Self {
        Self {
            source_index,
            values: HashMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> &Value {
        self.values.get(column).unwrap_or(&NULL)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.values.get_mut(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.values.insert(column.into(), value);
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.values_mut()
    }

    /// Cells in the given column order
    pub fn cells<'a>(&'a self, columns: &'a [String]) -> impl Iterator<Item = &'a Value> + 'a {
        columns.iter().map(move |c| self.get(c))
    }

    pub fn is_empty_in(&self, columns: &[String]) -> bool {
        self.cells(columns).all(Value::is_null)
    }

    /// Cell-wise equality over the given columns, ignoring `source_index`
    pub fn same_cells(&self, other: &Record, columns: &[String]) -> bool {
        columns.iter().all(|c| self.get(c) == other.get(c))
    }
}

/// An ordered collection of records sharing a column list
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build from positional rows; row `i` gets `source_index` `i`.
    pub fn from_rows<C, R>(columns: &[C], rows: R) -> Self
    where
        C: AsRef<str>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let columns: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let records = rows
            .into_iter()
            .enumerate()
            .map(|(i, cells)| {
                let mut record = Record::new(i);
                for (column, value) in columns.iter().zip(cells) {
                    record.set(column.clone(), value);
                }
                record
            })
            .collect();
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Appends the column name if it is not there yet
    pub fn ensure_column(&mut self, column: &str) {
        if !self.has_column(column) {
            self.columns.push(column.to_string());
        }
    }

    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.records.iter().map(move |r| r.get(column))
    }

    /// Copy of rows `start..end`, keeping columns and source indices
    pub fn slice(&self, start: usize, end: usize) -> RecordSet {
        let end = end.min(self.records.len());
        let start = start.min(end);
        RecordSet {
            columns: self.columns.clone(),
            records: self.records[start..end].to_vec(),
        }
    }

    /// Appends another set, merging column lists in first-seen order
    pub fn extend(&mut self, other: RecordSet) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        self.records.extend(other.records);
    }

    /// Number of cells that hold a value
    pub fn non_null_cells(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.cells(&self.columns).filter(|v| !v.is_null()).count())
            .sum()
    }

    /// Row-major rendering, used by exports and tests
    pub fn to_display_rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|r| r.cells(&self.columns).map(Value::to_display).collect())
            .collect()
    }
}

/// Processing mode: selects the filter rule record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mode {
    Wsa,
    Modoroso,
    Wappr,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Wsa, Mode::Modoroso, Mode::Wappr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Wsa => "WSA",
            Mode::Modoroso => "MODOROSO",
            Mode::Wappr => "WAPPR",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = WsaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WSA" => Ok(Mode::Wsa),
            "MODOROSO" => Ok(Mode::Modoroso),
            "WAPPR" => Ok(Mode::Wappr),
            other => Err(WsaError::Input(format!(
                "unknown mode '{}', expected WSA, MODOROSO or WAPPR",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_mode_parses_case_insensitively() {
        assert_eq!("wsa".parse::<Mode>().unwrap(), Mode::Wsa);
        assert_eq!(" Modoroso ".parse::<Mode>().unwrap(), Mode::Modoroso);
        assert_eq!("WAPPR".parse::<Mode>().unwrap(), Mode::Wappr);
        assert!("other".parse::<Mode>().is_err());
    }

    #[test]
    fn test_display_drops_trailing_zero_fraction() {
        assert_eq!(Value::Number(123.0).to_display(), "123");
        assert_eq!(Value::Number(1.5).to_display(), "1.5");
        assert_eq!(Value::Null.to_display(), "");
        let dt = NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(Value::Date(dt).to_display(), "2024-01-10 08:30:00");
    }

    #[test]
    fn test_sort_cmp_puts_nulls_last() {
        let mut values = vec![
            Value::text("b"),
            Value::Null,
            Value::text("a"),
            Value::text("  "),
        ];
        values.sort_by(|a, b| a.sort_cmp(b));
        assert_eq!(values[0], Value::text("a"));
        assert_eq!(values[1], Value::text("b"));
        assert!(values[2].is_null() && values[3].is_null());
    }

    #[test]
    fn test_missing_column_reads_as_null() {
        let set = RecordSet::from_rows(&["A"], vec![vec![Value::text("x")]]);
        assert_eq!(set.records[0].get("B"), &Value::Null);
        assert_eq!(set.records[0].get("A"), &Value::text("x"));
    }

    #[test]
    fn test_slice_keeps_source_index() {
        let set = RecordSet::from_rows(
            &["A"],
            (0..5).map(|i| vec![Value::Number(i as f64)]),
        );
        let part = set.slice(3, 10);
        assert_eq!(part.len(), 2);
        assert_eq!(part.records[0].source_index, 3);
    }
}
