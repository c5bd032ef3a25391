//! Aggregations over a finished record set.
//!
//! Everything here is a read-only view: the analyzer borrows the records and
//! computes each breakdown on request.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::config::ColumnNames;
use crate::constants::month_name;
use crate::pipeline::processing::normalize::{value_as_date, value_as_number};
use crate::pipeline::processor::ProcessingStats;
use crate::types::{RecordSet, Value};

pub mod report;

pub use report::ReportGenerator;

/// Moving-average window for `trends`, in days with data
pub const TREND_WINDOW: usize = 7;

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub key: String,
    pub count: usize,
    /// Share of all records, two decimals
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthCount {
    pub month: u32,
    pub month_name: &'static str,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: usize,
    /// Mean of this and up to six earlier points
    pub moving_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    pub nulls: usize,
    pub null_percentage: f64,
    /// `number`, `date`, `text`, `mixed` or `empty`
    pub kind: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSummary {
    pub total_records: usize,
    pub total_columns: usize,
    pub total_nulls: usize,
    pub columns_with_nulls: usize,
    pub columns: Vec<ColumnProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub summary: DataSummary,
    pub by_status: Vec<GroupCount>,
    pub by_workzone: Vec<GroupCount>,
    pub by_month: Vec<MonthCount>,
    pub by_crm_type: Vec<GroupCount>,
    pub trends: Vec<TrendPoint>,
    pub top_customers: Vec<GroupCount>,
}

pub struct DataAnalyzer<'a> {
    records: &'a RecordSet,
    columns: ColumnNames,
}

impl<'a> DataAnalyzer<'a> {
    pub fn new(records: &'a RecordSet) -> Self {
        Self::with_columns(records, ColumnNames::default())
    }

    pub fn with_columns(records: &'a RecordSet, columns: ColumnNames) -> Self {
        Self { records, columns }
    }

    pub fn summary(&self) -> DataSummary {
        let total = self.records.len();
        let columns: Vec<ColumnProfile> = self
            .records
            .columns
            .iter()
            .map(|column| {
                let nulls = self.records.column_values(column).filter(|v| v.is_null()).count();
                ColumnProfile {
                    column: column.clone(),
                    nulls,
                    null_percentage: share(nulls, total),
                    kind: column_kind(self.records.column_values(column)),
                }
            })
            .collect();

        DataSummary {
            total_records: total,
            total_columns: self.records.columns.len(),
            total_nulls: columns.iter().map(|c| c.nulls).sum(),
            columns_with_nulls: columns.iter().filter(|c| c.nulls > 0).count(),
            columns,
        }
    }

    /// Counts per distinct non-null value, most frequent first; ties keep the
    /// order in which values first appear. A missing column yields nothing.
    pub fn group_by(&self, column: &str) -> Vec<GroupCount> {
        if !self.records.has_column(column) {
            warn!("Column '{}' not found, no breakdown produced", column);
            return Vec::new();
        }

        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for value in self.records.column_values(column).filter(|v| !v.is_null()) {
            let key = value.to_display();
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }

        let total = self.records.len();
        let mut groups: Vec<GroupCount> = order
            .into_iter()
            .map(|key| {
                let count = counts[&key];
                GroupCount {
                    key,
                    count,
                    percentage: share(count, total),
                }
            })
            .collect();
        // stable sort keeps first-seen order among equal counts
        groups.sort_by(|a, b| b.count.cmp(&a.count));
        groups
    }

    pub fn by_status(&self) -> Vec<GroupCount> {
        self.group_by(&self.columns.status)
    }

    pub fn by_workzone(&self) -> Vec<GroupCount> {
        self.group_by(&self.columns.workzone)
    }

    pub fn by_crm_type(&self) -> Vec<GroupCount> {
        self.group_by(&self.columns.crm_order_type)
    }

    /// Records per calendar month of the creation date, January first
    pub fn by_month(&self) -> Vec<MonthCount> {
        let column = &self.columns.date_created;
        if !self.records.has_column(column) {
            warn!("Date column '{}' not found", column);
            return Vec::new();
        }

        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for dt in self.records.column_values(column).filter_map(value_as_date) {
            *counts.entry(dt.month()).or_default() += 1;
        }

        let total = self.records.len();
        counts
            .into_iter()
            .map(|(month, count)| MonthCount {
                month,
                month_name: month_name(month, false),
                count,
                percentage: share(count, total),
            })
            .collect()
    }

    /// Daily record counts with a trailing moving average
    pub fn trends(&self) -> Vec<TrendPoint> {
        let column = &self.columns.date_created;
        if !self.records.has_column(column) {
            warn!("Date column '{}' not found", column);
            return Vec::new();
        }

        let mut daily: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for dt in self.records.column_values(column).filter_map(value_as_date) {
            *daily.entry(dt.date()).or_default() += 1;
        }

        let counts: Vec<(NaiveDate, usize)> = daily.into_iter().collect();
        counts
            .iter()
            .enumerate()
            .map(|(i, (date, count))| {
                let start = (i + 1).saturating_sub(TREND_WINDOW);
                let window = &counts[start..=i];
                let sum: usize = window.iter().map(|(_, c)| c).sum();
                TrendPoint {
                    date: *date,
                    count: *count,
                    moving_average: round2(sum as f64 / window.len() as f64),
                }
            })
            .collect()
    }

    pub fn top_n(&self, column: &str, n: usize) -> Vec<GroupCount> {
        let mut groups = self.group_by(column);
        groups.truncate(n);
        groups
    }

    pub fn top_customers(&self, n: usize) -> Vec<GroupCount> {
        self.top_n(&self.columns.customer_name, n)
    }

    pub fn full_report(&self, top: usize) -> AnalyticsReport {
        AnalyticsReport {
            generated_at: Utc::now(),
            summary: self.summary(),
            by_status: self.by_status(),
            by_workzone: self.by_workzone(),
            by_month: self.by_month(),
            by_crm_type: self.by_crm_type(),
            trends: self.trends(),
            top_customers: self.top_customers(top),
        }
    }
}

fn column_kind<'v>(values: impl Iterator<Item = &'v Value>) -> &'static str {
    let mut kind: Option<&'static str> = None;
    for value in values.filter(|v| !v.is_null()) {
        let this = if value_as_number(value).is_some() {
            "number"
        } else if value_as_date(value).is_some() {
            "date"
        } else {
            "text"
        };
        match kind {
            None => kind = Some(this),
            Some(k) if k != this => return "mixed",
            _ => {}
        }
    }
    kind.unwrap_or("empty")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingMetrics {
    pub input_records: usize,
    pub output_records: usize,
    pub records_filtered: usize,
    pub filter_rate: f64,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyMetrics {
    pub processing_time_seconds: f64,
    pub processing_time_formatted: String,
    pub records_per_second: f64,
    pub records_processed: usize,
}

/// Before/after counts of a run
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn processing_metrics(input_records: usize, output_records: usize) -> ProcessingMetrics {
        let filtered = input_records.saturating_sub(output_records);
        ProcessingMetrics {
            input_records,
            output_records,
            records_filtered: filtered,
            filter_rate: share(filtered, input_records),
            retention_rate: share(output_records, input_records),
        }
    }

    pub fn from_stats(stats: &ProcessingStats) -> ProcessingMetrics {
        Self::processing_metrics(stats.raw_rows, stats.final_rows)
    }

    /// `None` when no time elapsed
    pub fn efficiency_metrics(seconds: f64, records: usize) -> Option<EfficiencyMetrics> {
        if seconds <= 0.0 {
            return None;
        }
        Some(EfficiencyMetrics {
            processing_time_seconds: round2(seconds),
            processing_time_formatted: format_duration(seconds),
            records_per_second: round2(records as f64 / seconds),
            records_processed: records,
        })
    }
}

/// Human duration in Indonesian, matching the month names used in reports
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.2} detik", seconds)
    } else if seconds < 3600.0 {
        let whole = seconds as u64;
        format!("{} menit {} detik", whole / 60, whole % 60)
    } else {
        let whole = seconds as u64;
        format!("{} jam {} menit", whole / 3600, (whole % 3600) / 60)
    }
}
