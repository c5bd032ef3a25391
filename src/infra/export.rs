use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::config::ExportConfig;
use crate::error::{Result, WsaError};
use crate::observability::metrics;
use crate::types::{RecordSet, Value};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Xlsx, ExportFormat::Csv, ExportFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = WsaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(WsaError::Input(format!(
                "unknown export format '{}', expected xlsx, csv or json",
                other
            ))),
        }
    }
}

/// Writes a finished record set. All formats carry the same rows and
/// columns; cells are rendered with `Value::to_display`, numbers stay numeric
/// in the workbook and the JSON document.
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// `{prefix}_{date}.{ext}`, e.g. `WSA_Cleaned_16102026.xlsx`
    pub fn default_file_name(&self, format: ExportFormat, date: NaiveDate) -> String {
        format!(
            "{}_{}.{}",
            self.config.filename_prefix,
            date.format(&self.config.filename_date_format),
            format.extension()
        )
    }

    pub fn write(&self, set: &RecordSet, format: ExportFormat, path: &Path) -> Result<()> {
        match format {
            ExportFormat::Xlsx => self.write_xlsx(set, path)?,
            ExportFormat::Csv => self.write_csv(set, path)?,
            ExportFormat::Json => write_json(set, path)?,
        }
        metrics::export::file_written(format.extension(), set.len());
        info!("Exported {} rows to {}", set.len(), path.display());
        Ok(())
    }

    /// Write each format under `dir` with the default file name; returns the paths
    pub fn write_all(
        &self,
        set: &RecordSet,
        formats: &[ExportFormat],
        dir: &Path,
        date: NaiveDate,
    ) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(formats.len());
        for format in formats {
            let path = dir.join(self.default_file_name(*format, date));
            self.write(set, *format, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    fn write_xlsx(&self, set: &RecordSet, path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.config.sheet_name)?;
        let header = Format::new().set_bold();

        for (col, name) in set.columns.iter().enumerate() {
            let col = col as u16;
            worksheet.write_string_with_format(0, col, name, &header)?;

            let longest = set
                .column_values(name)
                .map(|v| v.to_display().chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0);
            let width = (longest + 2).min(self.config.max_column_width);
            worksheet.set_column_width(col, width as f64)?;
        }

        for (row, record) in set.records.iter().enumerate() {
            let row = row as u32 + 1;
            for (col, value) in record.cells(&set.columns).enumerate() {
                let col = col as u16;
                match value {
                    Value::Null => {}
                    Value::Number(n) => {
                        worksheet.write_number(row, col, *n)?;
                    }
                    other => {
                        worksheet.write_string(row, col, other.to_display())?;
                    }
                }
            }
        }

        workbook.save(path)?;
        Ok(())
    }

    fn write_csv(&self, set: &RecordSet, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        if self.config.csv_bom {
            file.write_all(UTF8_BOM)?;
        }
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(&set.columns)?;
        for row in set.to_display_rows() {
            wtr.write_record(&row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn write_json(set: &RecordSet, path: &Path) -> Result<()> {
    let rows: Vec<JsonValue> = set
        .records
        .iter()
        .map(|record| {
            let mut object = Map::new();
            for column in &set.columns {
                object.insert(column.clone(), json_cell(record.get(column)));
            }
            JsonValue::Object(object)
        })
        .collect();
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &rows)?;
    Ok(())
}

fn json_cell(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        other => JsonValue::String(other.to_display()),
    }
}
