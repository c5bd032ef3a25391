use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::info;

use crate::config::QualityConfig;
use crate::constants::CANONICAL_DATE_FORMAT;
use crate::fingerprint::row_fingerprint;
use crate::observability::metrics;
use crate::pipeline::processing::normalize::{
    clean_string, is_null_token, normalize_phone, parse_date, validate_phone, value_as_date,
    value_as_number,
};
use crate::types::{RecordSet, Value};

pub mod report;

pub use report::{QualityReport, SummaryCard};

/// Metric weights; they sum to 1
pub const COMPLETENESS_WEIGHT: f64 = 0.25;
pub const UNIQUENESS_WEIGHT: f64 = 0.25;
pub const CONSISTENCY_WEIGHT: f64 = 0.20;
pub const VALIDITY_WEIGHT: f64 = 0.20;
pub const ACCURACY_WEIGHT: f64 = 0.10;

/// Result of a full quality run
#[derive(Debug, Clone, Serialize)]
pub struct QualityResult {
    /// Rounded weighted sum of the sub-scores (0 to 100)
    pub overall_score: u32,
    pub quality_level: QualityLevel,
    pub scores: QualityScores,
    pub issues: Vec<QualityIssue>,
    pub recommendations: Vec<String>,
    pub checked_at: DateTime<Utc>,
}

impl QualityResult {
    pub fn total_issues(&self) -> usize {
        self.issues.len()
    }

    pub fn count_by_severity(&self, severity: QualitySeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// The five sub-scores, each in [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityScores {
    pub completeness: f64,
    pub uniqueness: f64,
    pub consistency: f64,
    pub validity: f64,
    pub accuracy: f64,
}

impl QualityScores {
    pub fn weighted_sum(&self) -> f64 {
        self.completeness * COMPLETENESS_WEIGHT
            + self.uniqueness * UNIQUENESS_WEIGHT
            + self.consistency * CONSISTENCY_WEIGHT
            + self.validity * VALIDITY_WEIGHT
            + self.accuracy * ACCURACY_WEIGHT
    }

    /// (name, score) pairs in report order
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("completeness", self.completeness),
            ("uniqueness", self.uniqueness),
            ("consistency", self.consistency),
            ("validity", self.validity),
            ("accuracy", self.accuracy),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl QualityLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            90.. => QualityLevel::Excellent,
            75..=89 => QualityLevel::Good,
            60..=74 => QualityLevel::Fair,
            40..=59 => QualityLevel::Poor,
            _ => QualityLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Excellent => "excellent",
            QualityLevel::Good => "good",
            QualityLevel::Fair => "fair",
            QualityLevel::Poor => "poor",
            QualityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual quality issue found during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityIssue {
    /// Column the issue is about; `all` for whole-row issues
    pub column: String,
    pub issue_type: QualityIssueType,
    pub severity: QualitySeverity,
    pub message: String,
    pub affected_rows: usize,
    pub suggestion: String,
}

/// Which metric an issue belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityIssueType {
    Completeness,
    Uniqueness,
    Consistency,
    Validity,
    Accuracy,
}

impl QualityIssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityIssueType::Completeness => "completeness",
            QualityIssueType::Uniqueness => "uniqueness",
            QualityIssueType::Consistency => "consistency",
            QualityIssueType::Validity => "validity",
            QualityIssueType::Accuracy => "accuracy",
        }
    }
}

/// Severity levels, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualitySeverity {
    Info,
    Warning,
    Critical,
}

impl QualitySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualitySeverity::Info => "info",
            QualitySeverity::Warning => "warning",
            QualitySeverity::Critical => "critical",
        }
    }
}

/// Kind a non-null value is classed as for consistency scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ValueClass {
    Numeric,
    Date,
    Text,
}

fn classify(value: &Value) -> ValueClass {
    match value {
        Value::Number(_) => ValueClass::Numeric,
        Value::Date(_) => ValueClass::Date,
        Value::Text(s) => {
            if value_as_number(value).is_some() {
                ValueClass::Numeric
            } else if parse_date(s).is_some() {
                ValueClass::Date
            } else {
                ValueClass::Text
            }
        }
        Value::Null => ValueClass::Text,
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        100.0
    } else {
        (part as f64 / whole as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Quantile with linear interpolation between closest ranks; `None` for an
/// empty slice
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

/// Scores a record set and can produce a cleaned copy of it
pub struct DataQualityChecker {
    records: RecordSet,
    config: QualityConfig,
    last_result: Option<QualityResult>,
}

impl DataQualityChecker {
    pub fn new(records: RecordSet) -> Self {
        Self::with_config(records, QualityConfig::default())
    }

    pub fn with_config(records: RecordSet, config: QualityConfig) -> Self {
        Self {
            records,
            config,
            last_result: None,
        }
    }

    pub fn records(&self) -> &RecordSet {
        &self.records
    }

    pub fn last_result(&self) -> Option<&QualityResult> {
        self.last_result.as_ref()
    }

    /// Compute every metric without touching the cached result
    pub fn evaluate(&self) -> QualityResult {
        let mut issues = Vec::new();
        let scores = QualityScores {
            completeness: self.check_completeness(&mut issues),
            uniqueness: self.check_uniqueness(&mut issues),
            consistency: self.check_consistency(&mut issues),
            validity: self.check_validity(&mut issues),
            accuracy: self.check_accuracy(&mut issues),
        };
        let overall_score = scores.weighted_sum().round().clamp(0.0, 100.0) as u32;
        let recommendations = recommendations_for(&issues, &scores);

        QualityResult {
            overall_score,
            quality_level: QualityLevel::from_score(overall_score),
            scores,
            issues,
            recommendations,
            checked_at: Utc::now(),
        }
    }

    /// Run all checks, keep the result for the issue queries and return it
    pub fn run_all_checks(&mut self) -> &QualityResult {
        info!("Running all quality checks...");
        let result = self.evaluate();

        metrics::quality::score_recorded(result.overall_score as f64);
        for issue in &result.issues {
            metrics::quality::issue_detected(issue.issue_type.as_str(), issue.severity.as_str());
        }
        info!(
            "Quality check completed. Score: {}, Issues: {}",
            result.overall_score,
            result.issues.len()
        );

        self.last_result.insert(result)
    }

    /// Issues of the last run with the given severity
    pub fn get_issues_by_severity(&self, severity: QualitySeverity) -> Vec<&QualityIssue> {
        self.last_issues().filter(|i| i.severity == severity).collect()
    }

    /// Issues of the last run about the given column
    pub fn get_issues_by_column(&self, column: &str) -> Vec<&QualityIssue> {
        self.last_issues().filter(|i| i.column == column).collect()
    }

    fn last_issues(&self) -> impl Iterator<Item = &QualityIssue> {
        self.last_result.iter().flat_map(|r| r.issues.iter())
    }

    fn column_present(&self, column: &Option<String>) -> Option<String> {
        column
            .as_ref()
            .filter(|c| self.records.has_column(c))
            .cloned()
    }

    fn check_completeness(&self, issues: &mut Vec<QualityIssue>) -> f64 {
        let rows = self.records.len();
        let cells = rows * self.records.columns.len();
        if cells == 0 {
            return 0.0;
        }

        for column in &self.records.columns {
            let nulls = self.records.column_values(column).filter(|v| v.is_null()).count();
            let share = nulls as f64 / rows as f64;
            if share > self.config.null_threshold {
                let severity = if share > 0.5 {
                    QualitySeverity::Critical
                } else {
                    QualitySeverity::Warning
                };
                issues.push(QualityIssue {
                    column: column.clone(),
                    issue_type: QualityIssueType::Completeness,
                    severity,
                    message: format!("{} null values ({:.2}%)", nulls, share * 100.0),
                    affected_rows: nulls,
                    suggestion: format!(
                        "Consider filling null values in '{}' or removing rows with missing data",
                        column
                    ),
                });
            }
        }

        percent(self.records.non_null_cells(), cells)
    }

    fn check_uniqueness(&self, issues: &mut Vec<QualityIssue>) -> f64 {
        let rows = self.records.len();
        if rows == 0 {
            return 100.0;
        }
        let columns = &self.records.columns;
        let key_column = self.column_present(&self.config.key_column);

        let mut seen = HashSet::new();
        let mut repeats = 0usize;
        for record in &self.records.records {
            let key = match &key_column {
                Some(column) => {
                    let value = record.get(column);
                    if value.is_null() {
                        continue;
                    }
                    clean_string(value)
                }
                None => {
                    if record.is_empty_in(columns) {
                        continue;
                    }
                    row_fingerprint(record, columns)
                }
            };
            if !seen.insert(key) {
                repeats += 1;
            }
        }

        let share = repeats as f64 / rows as f64;
        if share > self.config.duplicate_threshold {
            let severity = if share > 0.2 {
                QualitySeverity::Critical
            } else {
                QualitySeverity::Warning
            };
            issues.push(QualityIssue {
                column: key_column.unwrap_or_else(|| "all".to_string()),
                issue_type: QualityIssueType::Uniqueness,
                severity,
                message: format!("{} duplicate rows ({:.2}%)", repeats, share * 100.0),
                affected_rows: repeats,
                suggestion: "Remove duplicate rows to improve data quality".to_string(),
            });
        }

        percent(rows - repeats, rows)
    }

    fn check_consistency(&self, issues: &mut Vec<QualityIssue>) -> f64 {
        let mut dominant_total = 0usize;
        let mut value_total = 0usize;

        for column in &self.records.columns {
            let values: Vec<&Value> = self
                .records
                .column_values(column)
                .filter(|v| !v.is_null())
                .collect();
            if values.is_empty() {
                continue;
            }

            let mut counts: HashMap<ValueClass, usize> = HashMap::new();
            for value in &values {
                *counts.entry(classify(value)).or_default() += 1;
            }
            let dominant = counts.values().copied().max().unwrap_or(0);
            dominant_total += dominant;
            value_total += values.len();

            let off_type = values.len() - dominant;
            if off_type > 0 {
                issues.push(QualityIssue {
                    column: column.clone(),
                    issue_type: QualityIssueType::Consistency,
                    severity: QualitySeverity::Warning,
                    message: format!("{} values do not match the column's dominant type", off_type),
                    affected_rows: off_type,
                    suggestion: format!("Use a single value type in '{}'", column),
                });
            }

            let texts: Vec<&str> = values.iter().filter_map(|v| v.as_text()).collect();
            self.text_format_issues(column, &texts, issues);
        }

        if value_total == 0 {
            return 100.0;
        }
        percent(dominant_total, value_total)
    }

    fn text_format_issues(&self, column: &str, texts: &[&str], issues: &mut Vec<QualityIssue>) {
        let cased: Vec<&&str> = texts
            .iter()
            .filter(|s| s.chars().any(char::is_alphabetic))
            .collect();
        let upper = cased.iter().filter(|s| s.to_uppercase() == ***s).count();
        let lower = cased.iter().filter(|s| s.to_lowercase() == ***s).count();
        let mixed = cased.len() - upper - lower;
        if mixed > 0 && upper > 0 && lower > 0 {
            issues.push(QualityIssue {
                column: column.to_string(),
                issue_type: QualityIssueType::Consistency,
                severity: QualitySeverity::Warning,
                message: "Mixed case formatting detected".to_string(),
                affected_rows: mixed,
                suggestion: format!("Standardize case formatting in '{}'", column),
            });
        }

        let padded = texts.iter().filter(|s| s.trim() != **s).count();
        if padded > 0 {
            issues.push(QualityIssue {
                column: column.to_string(),
                issue_type: QualityIssueType::Consistency,
                severity: QualitySeverity::Info,
                message: format!("{} values with leading/trailing whitespace", padded),
                affected_rows: padded,
                suggestion: format!("Trim whitespace in '{}'", column),
            });
        }
    }

    fn check_validity(&self, issues: &mut Vec<QualityIssue>) -> f64 {
        let mut checked = 0usize;
        let mut valid = 0usize;

        if let Some(column) = self.column_present(&self.config.phone_column) {
            let mut invalid = 0usize;
            for value in self.records.column_values(&column).filter(|v| !v.is_null()) {
                checked += 1;
                if validate_phone(&value.to_display()) {
                    valid += 1;
                } else {
                    invalid += 1;
                }
            }
            if invalid > 0 {
                issues.push(QualityIssue {
                    column,
                    issue_type: QualityIssueType::Validity,
                    severity: QualitySeverity::Warning,
                    message: format!("{} invalid phone numbers", invalid),
                    affected_rows: invalid,
                    suggestion: "Validate and correct phone number format".to_string(),
                });
            }
        }

        if let Some(column) = self.column_present(&self.config.date_column) {
            let mut invalid = 0usize;
            for value in self.records.column_values(&column).filter(|v| !v.is_null()) {
                checked += 1;
                if value_as_date(value).is_some() {
                    valid += 1;
                } else {
                    invalid += 1;
                }
            }
            if invalid > 0 {
                issues.push(QualityIssue {
                    column,
                    issue_type: QualityIssueType::Validity,
                    severity: QualitySeverity::Warning,
                    message: format!("{} invalid dates", invalid),
                    affected_rows: invalid,
                    suggestion: "Validate and correct date format".to_string(),
                });
            }
        }

        // informational only, not part of the score
        if let Some(column) = self.column_present(&self.config.order_column) {
            let patterns: Vec<String> = self
                .config
                .order_patterns
                .iter()
                .map(|p| p.to_uppercase())
                .collect();
            let unmatched = self
                .records
                .column_values(&column)
                .filter(|v| !v.is_null())
                .filter(|v| {
                    let id = clean_string(v).to_uppercase();
                    !patterns.iter().any(|p| id.contains(p.as_str()))
                })
                .count();
            if unmatched > 0 {
                issues.push(QualityIssue {
                    column,
                    issue_type: QualityIssueType::Validity,
                    severity: QualitySeverity::Info,
                    message: format!("{} orders without standard pattern", unmatched),
                    affected_rows: unmatched,
                    suggestion: "Verify order number format".to_string(),
                });
            }
        }

        percent(valid, checked)
    }

    fn check_accuracy(&self, issues: &mut Vec<QualityIssue>) -> f64 {
        let phone_column = self.column_present(&self.config.phone_column);
        let mut inside_total = 0usize;
        let mut value_total = 0usize;

        for column in &self.records.columns {
            if phone_column.as_deref() == Some(column.as_str()) {
                continue;
            }
            let non_null: Vec<&Value> = self
                .records
                .column_values(column)
                .filter(|v| !v.is_null())
                .collect();
            let mut numbers: Vec<f64> = non_null.iter().filter_map(|v| value_as_number(v)).collect();
            if numbers.is_empty()
                || numbers.len() != non_null.len()
                || numbers.len() < self.config.outlier_min_values
            {
                continue;
            }

            numbers.sort_by(|a, b| a.total_cmp(b));
            let (Some(q1), Some(q3)) = (quantile(&numbers, 0.25), quantile(&numbers, 0.75)) else {
                continue;
            };
            let iqr = q3 - q1;
            let (lower, upper) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);

            let outliers = numbers.iter().filter(|n| **n < lower || **n > upper).count();
            inside_total += numbers.len() - outliers;
            value_total += numbers.len();

            let share = outliers as f64 / numbers.len() as f64 * 100.0;
            if share > 10.0 {
                issues.push(QualityIssue {
                    column: column.clone(),
                    issue_type: QualityIssueType::Accuracy,
                    severity: QualitySeverity::Warning,
                    message: format!("{} potential outliers ({:.2}%)", outliers, share),
                    affected_rows: outliers,
                    suggestion: format!("Review outliers in '{}' for data accuracy", column),
                });
            }
        }

        percent(inside_total, value_total)
    }

    /// Cleaned copy of the records: trimmed text, null tokens as nulls,
    /// normalized phones, dates in the canonical layout, exact duplicate rows
    /// removed (first kept). Running it on its own output changes nothing.
    pub fn fix_common_issues(&self) -> RecordSet {
        let phone_column = self.column_present(&self.config.phone_column);
        let date_column = self.column_present(&self.config.date_column);
        let columns = self.records.columns.clone();

        let mut seen = HashSet::new();
        let mut fixed = RecordSet::new(columns.clone());
        for record in &self.records.records {
            let mut record = record.clone();
            for value in record.values_mut() {
                if let Value::Text(s) = value {
                    if is_null_token(s) {
                        *value = Value::Null;
                    } else {
                        *value = Value::Text(s.trim().to_string());
                    }
                }
            }

            if let Some(column) = &phone_column {
                if let Some(value) = record.get_mut(column) {
                    if !value.is_null() {
                        let phone = normalize_phone(&value.to_display());
                        *value = if phone.is_empty() {
                            Value::Null
                        } else {
                            Value::Text(phone)
                        };
                    }
                }
            }

            if let Some(column) = &date_column {
                if let Some(value) = record.get_mut(column) {
                    if let Some(dt) = value_as_date(value) {
                        *value = Value::Text(dt.format(CANONICAL_DATE_FORMAT).to_string());
                    }
                }
            }

            if seen.insert(row_fingerprint(&record, &columns)) {
                fixed.records.push(record);
            }
        }

        let removed = self.records.len() - fixed.len();
        metrics::quality::rows_fixed(removed);
        info!(
            "Fixed common issues. Rows before: {}, after: {}",
            self.records.len(),
            fixed.len()
        );
        fixed
    }
}

fn recommendations_for(issues: &[QualityIssue], scores: &QualityScores) -> Vec<String> {
    let present: HashSet<QualityIssueType> = issues.iter().map(|i| i.issue_type).collect();
    let mut out = Vec::new();
    let table = [
        (
            QualityIssueType::Completeness,
            "Fill missing values or consider removing rows with critical missing data",
        ),
        (
            QualityIssueType::Uniqueness,
            "Remove duplicate rows to ensure data uniqueness",
        ),
        (
            QualityIssueType::Consistency,
            "Standardize formatting (case, whitespace) across all text columns",
        ),
        (
            QualityIssueType::Validity,
            "Validate and correct data formats (phone numbers, dates, etc.)",
        ),
        (
            QualityIssueType::Accuracy,
            "Review and verify outlier values for data accuracy",
        ),
    ];
    for (issue_type, text) in table {
        if present.contains(&issue_type) {
            out.push(text.to_string());
        }
    }
    if scores.completeness < 80.0 {
        out.push("Focus on improving data completeness as it affects analysis quality".to_string());
    }
    out
}
