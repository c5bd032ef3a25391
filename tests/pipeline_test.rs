use std::collections::HashSet;
use std::io::Write;

use anyhow::Result;
use tempfile::NamedTempFile;
use wsa_fulfillment::constants::*;
use wsa_fulfillment::pipeline::ingestion::read_path;
use wsa_fulfillment::{AppConfig, DataProcessor, Mode, RecordSet, RowErrorKind, Value, WsaError};

const WSA_CSV: &str = "\
SC Order No/Track ID/CSRM No,CRM Order Type,Date Created,Workzone,Contact Number,Customer Name
AO-PDA-123,CREATE,2024-01-10 08:00:00,JKT,081234567890,Budi
AO-PDA-124,CLOSE,2024-01-11 09:00:00,JKT,081234567891,Sari
AO-PDA-125,CREATE,not a date,BDG,081234567892,Dewi
AO-PDA-126,MIGRATE,2024-02-01 10:00:00,BKS,081234567893,Andi
";

fn csv_file(content: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
    file.write_all(content.as_bytes())?;
    Ok(file)
}

fn order_ids(set: &RecordSet) -> Vec<String> {
    set.column_values(COL_ORDER_ID).map(|v| v.to_display()).collect()
}

#[test]
fn test_wsa_january_run_keeps_only_matching_rows() -> Result<()> {
    let file = csv_file(WSA_CSV)?;
    let raw = read_path(file.path())?;

    let output = DataProcessor::for_mode(Mode::Wsa)?.process_all(raw, &[1], &HashSet::new(), None)?;

    assert_eq!(order_ids(&output.records), vec!["AO-PDA-123"]);
    assert_eq!(output.stats.dropped_by_mode, 1);
    assert_eq!(output.stats.dropped_by_month, 1);
    assert_eq!(output.stats.dropped_malformed, 1);
    assert_eq!(output.stats.row_errors.len(), 1);
    assert_eq!(output.stats.row_errors[0].kind, RowErrorKind::InvalidDate);
    assert_eq!(output.stats.row_errors[0].row, 2);

    let kept = &output.records.records[0];
    assert_eq!(kept.get(COL_DATE_CREATED), &Value::text("10/01/2024 08:00"));
    assert_eq!(kept.get(COL_CONTACT_NUMBER), &Value::text("6281234567890"));
    Ok(())
}

#[test]
fn test_stats_account_for_every_row() -> Result<()> {
    let file = csv_file(WSA_CSV)?;
    let raw = read_path(file.path())?;
    let existing: HashSet<String> = ["AO-PDA-126".to_string()].into_iter().collect();

    let output = DataProcessor::for_mode(Mode::Wsa)?.process_all(raw, &[1, 2], &existing, None)?;
    let stats = &output.stats;

    assert!(stats.final_rows <= stats.raw_rows);
    assert_eq!(
        stats.final_rows,
        stats.raw_rows
            - stats.dropped_malformed
            - stats.dropped_by_mode
            - stats.dropped_by_month
            - stats.dropped_duplicates
    );
    assert_eq!(stats.dropped_duplicates, 1);
    assert_eq!(stats.final_rows, output.records.len());
    Ok(())
}

#[test]
fn test_existing_ids_are_removed() -> Result<()> {
    let raw = RecordSet::from_rows(
        &[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_DATE_CREATED],
        vec![
            vec![Value::text("WSA-X1"), Value::text("CREATE"), Value::text("2024-01-05")],
            vec![Value::text("WSA-X2"), Value::text("CREATE"), Value::text("2024-01-06")],
        ],
    );
    let existing: HashSet<String> = [" WSA-X1 ".to_string()].into_iter().collect();

    let output = DataProcessor::for_mode(Mode::Wsa)?.process_all(raw, &[], &existing, None)?;

    assert_eq!(order_ids(&output.records), vec!["WSA-X2"]);
    assert_eq!(output.stats.dropped_duplicates, 1);
    Ok(())
}

#[test]
fn test_caller_id_set_is_not_modified() -> Result<()> {
    let raw = RecordSet::from_rows(
        &[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_DATE_CREATED],
        vec![vec![Value::text("AO-1"), Value::text("CREATE"), Value::text("2024-01-05")]],
    );
    let existing: HashSet<String> = ["AO-1".to_string(), "AO-9".to_string()].into_iter().collect();
    let before = existing.clone();

    DataProcessor::for_mode(Mode::Wsa)?.process_all(raw, &[], &existing, None)?;

    assert_eq!(existing, before);
    Ok(())
}

#[test]
fn test_missing_required_column_aborts() -> Result<()> {
    let file = csv_file("SC Order No/Track ID/CSRM No,Workzone\nAO-1,JKT\n")?;
    let raw = read_path(file.path())?;

    let result = DataProcessor::for_mode(Mode::Wsa)?.process_all(raw, &[], &HashSet::new(), None);

    assert!(matches!(result, Err(WsaError::Input(_))));
    Ok(())
}

#[test]
fn test_renamed_order_column_runs_end_to_end() -> Result<()> {
    let config = AppConfig::from_toml_str("[columns]\norder_id = \"Order\"")?;
    let file = csv_file(
        "Order,CRM Order Type,Date Created,Workzone\n\
         AO-PDA-1,CREATE,2024-01-10 08:00:00,JKT\n\
         AO-PDA-2,CREATE,2024-01-11 08:00:00,BDG\n\
         REG-3,CREATE,2024-01-12 08:00:00,JKT\n",
    )?;
    let raw = read_path(file.path())?;
    let existing: HashSet<String> = ["AO-PDA-2".to_string()].into_iter().collect();

    let output = DataProcessor::new(config.processor_config(Mode::Wsa)?)
        .process_all(raw, &[1], &existing, None)?;

    let ids: Vec<String> = output.records.column_values("Order").map(|v| v.to_display()).collect();
    assert_eq!(ids, vec!["AO-PDA-1"]);
    assert!(!output.records.has_column(COL_ORDER_ID));
    assert_eq!(output.stats.dropped_by_mode, 1);
    assert_eq!(output.stats.dropped_duplicates, 1);
    Ok(())
}

#[test]
fn test_modoroso_tags_orders_and_fills_partner() -> Result<()> {
    let raw = RecordSet::from_rows(
        &[COL_ORDER_ID, COL_WORKORDER, COL_DATE_CREATED, COL_CRM_ORDER_TYPE],
        vec![
            vec![Value::text("SC-1-MO"), Value::text("WO-1"), Value::text("2024-03-01"), Value::Null],
            vec![Value::text("SC-2-DO"), Value::text("WO-2"), Value::text("2024-03-02"), Value::Null],
            vec![Value::text("SC-3"), Value::text("WO-3"), Value::text("2024-03-03"), Value::Null],
        ],
    );

    let output = DataProcessor::for_mode(Mode::Modoroso)?.process_all(raw, &[3], &HashSet::new(), None)?;

    assert_eq!(output.records.len(), 2);
    assert!(output.records.has_column(COL_MITRA));
    let mut tags: Vec<String> = output
        .records
        .column_values(COL_CRM_ORDER_TYPE)
        .map(|v| v.to_display())
        .collect();
    tags.sort();
    assert_eq!(tags, vec!["DO", "MO"]);
    for mitra in output.records.column_values(COL_MITRA) {
        assert_eq!(mitra, &Value::text(DEFAULT_PARTNER));
    }
    Ok(())
}
