//! The mode-aware cleaning pipeline.
//!
//! `DataProcessor` is a fluent chain: every stage consumes the processor and
//! hands it back, so a run reads as
//! `load_data → clean_common → filter_by_mode → filter_by_month →
//! remove_duplicates → finalize`. The rule set is an immutable
//! `ProcessorConfig` shared by every run of the same processor.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::app::ports::{fetch_ids, ExistingIdSource};
use crate::config::ProcessorConfig;
use crate::error::{Result, RowError, RowErrorKind, WsaError};
use crate::observability::metrics;
use crate::pipeline::processing::mode_filter;
use crate::pipeline::processing::normalize::{
    clean_id, clean_string, collapse_whitespace, extract_order_id, is_null_token,
    normalize_phone, value_as_date,
};
use crate::types::{Mode, Record, RecordSet, Value};

/// Row accounting for one run (or, summed, for a batch).
/// `final_rows = raw_rows - dropped_malformed - dropped_by_mode - dropped_by_month - dropped_duplicates`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    /// Unset on summed batch stats
    pub run_id: Option<Uuid>,
    pub raw_rows: usize,
    pub raw_columns: usize,
    pub dropped_malformed: usize,
    pub dropped_by_mode: usize,
    pub dropped_by_month: usize,
    pub dropped_duplicates: usize,
    pub final_rows: usize,
    pub row_errors: Vec<RowError>,
}

impl ProcessingStats {
    pub fn total_dropped(&self) -> usize {
        self.dropped_malformed + self.dropped_by_mode + self.dropped_by_month + self.dropped_duplicates
    }

    /// Add another run's counts; column count keeps the widest input seen
    pub fn absorb(&mut self, other: &ProcessingStats) {
        self.raw_rows += other.raw_rows;
        self.raw_columns = self.raw_columns.max(other.raw_columns);
        self.dropped_malformed += other.dropped_malformed;
        self.dropped_by_mode += other.dropped_by_mode;
        self.dropped_by_month += other.dropped_by_month;
        self.dropped_duplicates += other.dropped_duplicates;
        self.final_rows += other.final_rows;
        self.row_errors.extend(other.row_errors.iter().cloned());
    }

    fn record_error(&mut self, error: RowError) {
        debug!("Skipping {}", error);
        metrics::processor::row_error(&format!("{:?}", error.kind));
        self.dropped_malformed += 1;
        self.row_errors.push(error);
    }
}

/// Result of `finalize`: the output records and the run's accounting
#[derive(Debug, Clone)]
pub struct ProcessedOutput {
    pub records: RecordSet,
    pub stats: ProcessingStats,
}

#[derive(Debug, Clone)]
pub struct DataProcessor {
    config: Arc<ProcessorConfig>,
    run_id: Uuid,
    working: Option<RecordSet>,
    stats: ProcessingStats,
    started: Instant,
}

impl DataProcessor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self::with_shared_config(Arc::new(config))
    }

    pub fn with_shared_config(config: Arc<ProcessorConfig>) -> Self {
        let run_id = Uuid::new_v4();
        info!("DataProcessor initialized with mode: {}", config.mode);
        Self {
            config,
            run_id,
            working: None,
            stats: ProcessingStats {
                run_id: Some(run_id),
                ..Default::default()
            },
            started: Instant::now(),
        }
    }

    /// Stock rules for `mode`
    pub fn for_mode(mode: Mode) -> Result<Self> {
        Ok(Self::new(ProcessorConfig::for_mode(mode)?))
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// A new, empty run sharing this processor's rule set
    pub fn fresh(&self) -> Self {
        Self::with_shared_config(Arc::clone(&self.config))
    }

    fn working_mut(&mut self, stage: &str) -> Result<&mut RecordSet> {
        self.working.as_mut().ok_or_else(|| {
            WsaError::Input(format!(
                "no data loaded; call load_data() before {}()",
                stage
            ))
        })
    }

    fn take_working(&mut self, stage: &str) -> Result<RecordSet> {
        self.working.take().ok_or_else(|| {
            WsaError::Input(format!(
                "no data loaded; call load_data() before {}()",
                stage
            ))
        })
    }

    /// Accept the raw set. Fails when it has no rows, only empty rows, or
    /// lacks a column the mode requires.
    pub fn load_data(mut self, raw: RecordSet) -> Result<Self> {
        let _span = info_span!("load_data", run_id = %self.run_id, mode = %self.config.mode).entered();

        if raw.is_empty() {
            return Err(WsaError::Input("input has no rows".to_string()));
        }
        if raw.records.iter().all(|r| row_is_blank(r, &raw.columns)) {
            return Err(WsaError::Input("every input row is empty".to_string()));
        }
        let missing: Vec<&str> = self
            .config
            .required_columns
            .iter()
            .filter(|c| !raw.has_column(c))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(WsaError::Input(format!(
                "missing required columns for {}: {}",
                self.config.mode,
                missing.join(", ")
            )));
        }

        self.stats.raw_rows = raw.len();
        self.stats.raw_columns = raw.columns.len();
        metrics::processor::rows_loaded(self.config.mode.as_str(), raw.len());
        info!("Loaded {} rows with {} columns", raw.len(), raw.columns.len());

        self.working = Some(raw);
        Ok(self)
    }

    /// In-place cleaning of the common fields. Empty rows and rows whose phone
    /// has no digits at all are skipped and recorded.
    pub fn clean_common(mut self) -> Result<Self> {
        let _span = info_span!("clean_common", run_id = %self.run_id).entered();
        let config = Arc::clone(&self.config);
        let cols = &config.columns;
        let set = self.take_working("clean_common")?;
        let RecordSet { columns, records } = set;

        let mut kept = Vec::with_capacity(records.len());
        for mut record in records {
            for value in record.values_mut() {
                clean_cell(value);
            }

            if record.is_empty_in(&columns) {
                self.stats.record_error(RowError::new(
                    record.source_index,
                    RowErrorKind::EmptyRow,
                    "row has no values",
                ));
                continue;
            }

            if let Some(value) = record.get_mut(&cols.workorder) {
                if !value.is_null() {
                    *value = Value::text(clean_string(value));
                }
            }

            if let Some(value) = record.get_mut(&cols.booking_date) {
                if !value.is_null() {
                    let display = value.to_display();
                    let head = display.split('.').next().unwrap_or_default().trim().to_string();
                    *value = Value::text(head);
                }
            }

            if let Some(value) = record.get_mut(&cols.date_created) {
                if let Some(dt) = value_as_date(value) {
                    *value = Value::Date(dt);
                }
            }

            if let Some(value) = record.get_mut(&cols.order_id) {
                if !value.is_null() {
                    *value = Value::text(extract_order_id(&clean_string(value)));
                }
            }

            let phone = record.get(&cols.contact_number);
            if !phone.is_null() {
                let raw_phone = phone.to_display();
                let normalized = normalize_phone(&raw_phone);
                if normalized.is_empty() {
                    self.stats.record_error(RowError::new(
                        record.source_index,
                        RowErrorKind::InvalidPhone,
                        format!("contact number '{}' has no digits", raw_phone),
                    ));
                    continue;
                }
                record.set(cols.contact_number.clone(), Value::text(normalized));
            }

            kept.push(record);
        }

        metrics::processor::rows_dropped(
            config.mode.as_str(),
            "malformed",
            self.stats.dropped_malformed,
        );
        info!(
            "Common cleaning completed. Rows: {} (malformed: {})",
            kept.len(),
            self.stats.dropped_malformed
        );
        self.working = Some(RecordSet {
            columns,
            records: kept,
        });
        Ok(self)
    }

    /// Keep the rows the mode's rules select
    pub fn filter_by_mode(mut self) -> Result<Self> {
        let _span = info_span!("filter_by_mode", run_id = %self.run_id, mode = %self.config.mode).entered();
        let set = self.take_working("filter_by_mode")?;
        let before = set.len();

        let filtered = mode_filter::apply(set, &self.config);
        let dropped = before - filtered.len();
        self.stats.dropped_by_mode += dropped;
        metrics::processor::rows_dropped(self.config.mode.as_str(), "mode", dropped);
        info!("Mode filtering completed. Rows: {} (filtered out: {})", filtered.len(), dropped);

        self.working = Some(filtered);
        Ok(self)
    }

    /// Keep rows created in one of `months` (1 = January). Rows without a
    /// usable date are recorded as row errors, not month drops.
    pub fn filter_by_month(mut self, months: &[u32]) -> Result<Self> {
        let _span = info_span!("filter_by_month", run_id = %self.run_id).entered();
        if let Some(bad) = months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(WsaError::Input(format!("month {} is outside 1..=12", bad)));
        }
        let date_col = self.config.columns.date_created.clone();
        let set = self.working_mut("filter_by_month")?;

        if months.is_empty() {
            warn!("No months selected, skipping month filter");
            return Ok(self);
        }
        if !set.has_column(&date_col) {
            warn!("{} column not found, skipping month filter", date_col);
            return Ok(self);
        }

        let records = std::mem::take(&mut set.records);
        let mut kept = Vec::with_capacity(records.len());
        let mut errors = Vec::new();
        let mut dropped = 0usize;

        for record in records {
            let value = record.get(&date_col);
            let date = match value {
                Value::Date(dt) => Some(*dt),
                v if v.is_null() => {
                    errors.push(RowError::new(
                        record.source_index,
                        RowErrorKind::MissingDate,
                        format!("{} is empty", date_col),
                    ));
                    continue;
                }
                v => value_as_date(v),
            };
            match date {
                Some(dt) => {
                    if months.contains(&dt.month()) {
                        kept.push(record);
                    } else {
                        dropped += 1;
                    }
                }
                None => errors.push(RowError::new(
                    record.source_index,
                    RowErrorKind::InvalidDate,
                    format!("unparseable {} '{}'", date_col, value.to_display()),
                )),
            }
        }

        set.records = kept;
        let remaining = set.len();
        let malformed = errors.len();
        for error in errors {
            self.stats.record_error(error);
        }
        self.stats.dropped_by_month += dropped;
        metrics::processor::rows_dropped(self.config.mode.as_str(), "month", dropped);
        info!(
            "Month filter completed. Rows: {} (filtered out: {}, bad dates: {})",
            remaining, dropped, malformed
        );
        Ok(self)
    }

    /// Drop rows whose dedupe-column value is already in `existing_ids`.
    /// The caller's set is only read.
    pub fn remove_duplicates(mut self, existing_ids: &HashSet<String>) -> Result<Self> {
        let _span = info_span!("remove_duplicates", run_id = %self.run_id).entered();
        let check_col = self.config.dedupe_column.clone();
        let set = self.working_mut("remove_duplicates")?;

        if !set.has_column(&check_col) {
            warn!("Check column {} not found, skipping duplicate removal", check_col);
            return Ok(self);
        }

        let known: HashSet<String> = existing_ids
            .iter()
            .map(|id| clean_id(id))
            .filter(|id| !id.is_empty())
            .collect();

        let before = set.len();
        set.records.retain(|r| {
            let id = clean_string(r.get(&check_col));
            id.is_empty() || !known.contains(&id)
        });
        let removed = before - set.len();
        let remaining = set.len();

        self.stats.dropped_duplicates += removed;
        metrics::processor::rows_dropped(self.config.mode.as_str(), "duplicate", removed);
        info!(
            "Duplicate removal completed. Unique rows: {} (removed: {})",
            remaining, removed
        );
        Ok(self)
    }

    /// Fetch the id set from `source` and deduplicate against it. A source
    /// failure aborts the step.
    pub fn remove_duplicates_from(self, source: &dyn ExistingIdSource) -> Result<Self> {
        let ids = fetch_ids(source)?;
        self.remove_duplicates(&ids)
    }

    /// Order columns, sort rows and render dates for output. `sort_by`
    /// defaults to the configured sort column.
    pub fn finalize(mut self, sort_by: Option<&str>) -> Result<ProcessedOutput> {
        let _span = info_span!("finalize", run_id = %self.run_id).entered();
        let set = self.take_working("finalize")?;
        let sort_col = sort_by.unwrap_or(&self.config.default_sort_column).to_string();

        let mut set = reorder_columns(set, &self.config.output_columns);

        if set.has_column(&sort_col) {
            // stable: ties keep input order
            set.records
                .sort_by(|a, b| a.get(&sort_col).sort_cmp(b.get(&sort_col)));
        } else {
            warn!("Sort column {} not found, keeping input order", sort_col);
        }

        let display_format = self.config.display_date_format.clone();
        for record in set.records.iter_mut() {
            for value in record.values_mut() {
                if let Value::Date(dt) = value {
                    *value = Value::text(dt.format(&display_format).to_string());
                }
            }
        }

        self.stats.final_rows = set.len();
        metrics::processor::rows_finalized(self.config.mode.as_str(), set.len());
        metrics::processor::run_duration(self.started.elapsed().as_secs_f64());
        info!("Finalization completed. Final rows: {}", set.len());

        Ok(ProcessedOutput {
            records: set,
            stats: self.stats,
        })
    }

    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Whole chain on a fresh run with this processor's rules
    pub fn process_all(
        &self,
        raw: RecordSet,
        months: &[u32],
        existing_ids: &HashSet<String>,
        sort_by: Option<&str>,
    ) -> Result<ProcessedOutput> {
        self.fresh()
            .load_data(raw)?
            .clean_common()?
            .filter_by_mode()?
            .filter_by_month(months)?
            .remove_duplicates(existing_ids)?
            .finalize(sort_by)
    }
}

/// Blank before cleaning: null cells and placeholder tokens only
fn row_is_blank(record: &Record, columns: &[String]) -> bool {
    record.cells(columns).all(|v| match v {
        Value::Text(s) => is_null_token(s),
        other => other.is_null(),
    })
}

fn clean_cell(value: &mut Value) {
    if let Value::Text(s) = value {
        if is_null_token(s) {
            *value = Value::Null;
        } else {
            *value = Value::Text(collapse_whitespace(s));
        }
    }
}

/// Target columns first (those present), then the rest in their current order
fn reorder_columns(set: RecordSet, target: &[String]) -> RecordSet {
    let RecordSet { columns, records } = set;
    let mut ordered: Vec<String> = target
        .iter()
        .filter(|c| columns.contains(c))
        .cloned()
        .collect();
    for column in columns {
        if !ordered.contains(&column) {
            ordered.push(column);
        }
    }
    RecordSet {
        columns: ordered,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;

    fn wsa_rows(rows: Vec<[&str; 5]>) -> RecordSet {
        RecordSet::from_rows(
            &[
                COL_ORDER_ID,
                COL_CRM_ORDER_TYPE,
                COL_DATE_CREATED,
                COL_WORKZONE,
                COL_CONTACT_NUMBER,
            ],
            rows.into_iter().map(|r| {
                r.iter()
                    .map(|c| if c.is_empty() { Value::Null } else { Value::text(*c) })
                    .collect()
            }),
        )
    }

    #[test]
    fn test_load_rejects_empty_input() {
        let processor = DataProcessor::for_mode(Mode::Wsa).unwrap();
        let err = processor.load_data(RecordSet::new(vec![COL_ORDER_ID.to_string()]));
        assert!(matches!(err, Err(WsaError::Input(_))));
    }

    #[test]
    fn test_load_rejects_all_blank_rows() {
        let processor = DataProcessor::for_mode(Mode::Wsa).unwrap();
        let raw = wsa_rows(vec![["", "nan", "", "-", ""], ["", "", "", "", ""]]);
        assert!(matches!(processor.load_data(raw), Err(WsaError::Input(_))));
    }

    #[test]
    fn test_load_reports_missing_required_column() {
        let processor = DataProcessor::for_mode(Mode::Wappr).unwrap();
        let raw = wsa_rows(vec![["AO1", "CREATE", "2024-01-10", "Z", "0812345678"]]);
        match processor.load_data(raw) {
            Err(WsaError::Input(msg)) => assert!(msg.contains(COL_STATUS)),
            other => panic!("expected input error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_stage_before_load_is_input_error() {
        let processor = DataProcessor::for_mode(Mode::Wsa).unwrap();
        assert!(matches!(processor.clean_common(), Err(WsaError::Input(_))));
    }

    #[test]
    fn test_clean_common_normalizes_fields() {
        let raw = RecordSet::from_rows(
            &[COL_ORDER_ID, COL_CRM_ORDER_TYPE, COL_DATE_CREATED, COL_WORKORDER, COL_BOOKING_DATE, COL_CONTACT_NUMBER],
            vec![vec![
                Value::text(" AO-1_2 "),
                Value::text("CREATE"),
                Value::text("2024-01-10 08:00:00"),
                Value::Number(12345.0),
                Value::text("2024-01-12 10:00:00.000"),
                Value::text("0812 3456 7890"),
            ]],
        );
        let processor = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .load_data(raw)
            .unwrap()
            .clean_common()
            .unwrap();
        let record = &processor.working.as_ref().unwrap().records[0];
        assert_eq!(record.get(COL_ORDER_ID), &Value::text("AO-1"));
        assert_eq!(record.get(COL_WORKORDER), &Value::text("12345"));
        assert_eq!(record.get(COL_BOOKING_DATE), &Value::text("2024-01-12 10:00:00"));
        assert_eq!(record.get(COL_CONTACT_NUMBER), &Value::text("6281234567890"));
        assert!(matches!(record.get(COL_DATE_CREATED), Value::Date(_)));
    }

    #[test]
    fn test_clean_common_records_malformed_rows() {
        let raw = wsa_rows(vec![
            ["AO1", "CREATE", "2024-01-10", "Z", "call me"],
            ["", "", "", "", ""],
            ["AO2", "CREATE", "2024-01-10", "Z", "0812345678"],
        ]);
        let processor = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .load_data(raw)
            .unwrap()
            .clean_common()
            .unwrap();
        let stats = processor.get_stats();
        assert_eq!(stats.dropped_malformed, 2);
        assert_eq!(stats.row_errors[0].kind, RowErrorKind::InvalidPhone);
        assert_eq!(stats.row_errors[1].kind, RowErrorKind::EmptyRow);
        assert_eq!(stats.row_errors[1].row, 1);
    }

    #[test]
    fn test_month_filter_rejects_out_of_range() {
        let raw = wsa_rows(vec![["AO1", "CREATE", "2024-01-10", "Z", ""]]);
        let processor = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .load_data(raw)
            .unwrap();
        assert!(matches!(processor.filter_by_month(&[13]), Err(WsaError::Input(_))));
    }

    #[test]
    fn test_month_filter_empty_is_noop() {
        let raw = wsa_rows(vec![
            ["AO1", "CREATE", "2024-01-10", "Z", ""],
            ["AO2", "CREATE", "2024-05-10", "Z", ""],
        ]);
        let output = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .load_data(raw)
            .unwrap()
            .clean_common()
            .unwrap()
            .filter_by_month(&[])
            .unwrap()
            .finalize(None)
            .unwrap();
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.stats.dropped_by_month, 0);
    }

    #[test]
    fn test_month_filter_records_missing_date() {
        let raw = wsa_rows(vec![
            ["AO1", "CREATE", "2024-01-10", "Z", ""],
            ["AO2", "CREATE", "", "Z", ""],
            ["AO3", "CREATE", "2024-02-10", "Z", ""],
        ]);
        let output = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .process_all(raw, &[1], &HashSet::new(), None)
            .unwrap();
        let stats = &output.stats;
        assert_eq!(output.records.len(), 1);
        assert_eq!(stats.row_errors.len(), 1);
        assert_eq!(stats.row_errors[0].kind, RowErrorKind::MissingDate);
        assert_eq!(stats.row_errors[0].row, 1);
        assert_eq!(stats.dropped_malformed, 1);
        assert_eq!(stats.dropped_by_month, 1);
    }

    #[test]
    fn test_finalize_sorts_and_renders_dates() {
        let raw = wsa_rows(vec![
            ["AO1", "CREATE", "2024-01-10 09:15:00", "ZB", ""],
            ["AO2", "CREATE", "2024-01-11", "", ""],
            ["AO3", "CREATE", "2024-01-12", "ZA", ""],
            ["AO4", "CREATE", "2024-01-13", "ZB", ""],
        ]);
        let processor = DataProcessor::for_mode(Mode::Wsa).unwrap();
        let output = processor
            .process_all(raw, &[], &HashSet::new(), None)
            .unwrap();
        let ids: Vec<String> = output
            .records
            .column_values(COL_ORDER_ID)
            .map(|v| v.to_display())
            .collect();
        assert_eq!(ids, vec!["AO3", "AO1", "AO4", "AO2"]);
        assert_eq!(output.records.records[1].get(COL_DATE_CREATED), &Value::text("10/01/2024 09:15"));
        assert_eq!(output.records.columns[0], COL_DATE_CREATED);
    }

    #[test]
    fn test_finalize_missing_sort_column_keeps_order() {
        let raw = wsa_rows(vec![
            ["AO2", "CREATE", "2024-01-10", "ZB", ""],
            ["AO1", "CREATE", "2024-01-10", "ZA", ""],
        ]);
        let output = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .process_all(raw, &[], &HashSet::new(), Some("Nope"))
            .unwrap();
        assert_eq!(output.records.records[0].get(COL_ORDER_ID), &Value::text("AO2"));
    }

    #[test]
    fn test_existing_id_source_failure_propagates() {
        struct Down;
        impl ExistingIdSource for Down {
            fn name(&self) -> &str {
                "down"
            }
            fn existing_ids(&self) -> Result<HashSet<String>> {
                Err(WsaError::Connection("unreachable".to_string()))
            }
        }

        let raw = wsa_rows(vec![["AO1", "CREATE", "2024-01-10", "Z", ""]]);
        let result = DataProcessor::for_mode(Mode::Wsa)
            .unwrap()
            .load_data(raw)
            .unwrap()
            .clean_common()
            .unwrap()
            .remove_duplicates_from(&Down);
        assert!(matches!(result, Err(WsaError::Connection(_))));
    }

    #[test]
    fn test_stats_absorb_sums_counts() {
        let mut total = ProcessingStats::default();
        let part = ProcessingStats {
            raw_rows: 5,
            raw_columns: 3,
            dropped_by_mode: 2,
            final_rows: 3,
            ..Default::default()
        };
        total.absorb(&part);
        total.absorb(&part);
        assert_eq!(total.raw_rows, 10);
        assert_eq!(total.raw_columns, 3);
        assert_eq!(total.final_rows, 6);
        assert_eq!(total.total_dropped(), 4);
    }
}
