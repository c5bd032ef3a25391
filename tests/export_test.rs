use std::fs;

use anyhow::Result;
use chrono::NaiveDate;
use tempfile::tempdir;
use wsa_fulfillment::config::ExportConfig;
use wsa_fulfillment::infra::{ExportFormat, Exporter};
use wsa_fulfillment::pipeline::ingestion::read_path;
use wsa_fulfillment::{RecordSet, Value};

fn finished_set() -> RecordSet {
    RecordSet::from_rows(
        &["Date Created", "SC Order No/Track ID/CSRM No", "Workzone", "Count"],
        vec![
            vec![
                Value::text("10/01/2024 08:00"),
                Value::text("AO-PDA-1"),
                Value::text("JKT"),
                Value::Number(3.0),
            ],
            vec![
                Value::text("11/01/2024 09:30"),
                Value::text("AO-PDA-2"),
                Value::Null,
                Value::Number(1.5),
            ],
        ],
    )
}

#[test]
fn test_all_formats_written_with_default_names() -> Result<()> {
    let dir = tempdir()?;
    let exporter = Exporter::new(ExportConfig::default());
    let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

    let written = exporter.write_all(&finished_set(), &ExportFormat::ALL, dir.path(), date)?;

    let names: Vec<String> = written
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "WSA_Cleaned_31012024.xlsx",
            "WSA_Cleaned_31012024.csv",
            "WSA_Cleaned_31012024.json"
        ]
    );
    for path in &written {
        assert!(fs::metadata(path)?.len() > 0);
    }
    Ok(())
}

#[test]
fn test_csv_and_json_carry_identical_content() -> Result<()> {
    let dir = tempdir()?;
    let exporter = Exporter::new(ExportConfig::default());
    let set = finished_set();

    let csv_path = dir.path().join("out.csv");
    let json_path = dir.path().join("out.json");
    exporter.write(&set, ExportFormat::Csv, &csv_path)?;
    exporter.write(&set, ExportFormat::Json, &json_path)?;

    let from_csv = read_path(&csv_path)?;
    let from_json = read_path(&json_path)?;

    assert_eq!(from_csv.columns, set.columns);
    assert_eq!(from_json.columns, set.columns);
    assert_eq!(from_csv.to_display_rows(), set.to_display_rows());
    assert_eq!(from_json.to_display_rows(), set.to_display_rows());
    Ok(())
}
