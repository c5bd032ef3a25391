//! Read-only presentations of a quality run.

use serde::Serialize;
use std::fmt;

use super::{DataQualityChecker, QualityIssue, QualityLevel, QualityResult, QualitySeverity};

const RULE: &str = "============================================================";

/// Compact view of a quality run for the terminal
#[derive(Debug, Clone, Serialize)]
pub struct SummaryCard {
    pub score: u32,
    pub quality_level: QualityLevel,
    /// Excellent, Good or Needs Improvement
    pub status: &'static str,
    /// Hex colour hint matching the status
    pub color: &'static str,
    pub total_issues: usize,
    pub critical_issues: usize,
    pub warning_issues: usize,
    pub info_issues: usize,
    pub top_issues: Vec<QualityIssue>,
}

pub struct QualityReport {
    result: QualityResult,
}

impl QualityReport {
    /// Evaluate the checker's records now
    pub fn new(checker: &DataQualityChecker) -> Self {
        Self {
            result: checker.evaluate(),
        }
    }

    pub fn from_result(result: QualityResult) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &QualityResult {
        &self.result
    }

    pub fn summary_card(&self) -> SummaryCard {
        let score = self.result.overall_score;
        let (status, color) = match score {
            80.. => ("Excellent", "#00ff88"),
            60..=79 => ("Good", "#ffaa00"),
            _ => ("Needs Improvement", "#ff4b4b"),
        };

        let mut ranked: Vec<&QualityIssue> = self.result.issues.iter().collect();
        // stable: equal issues keep detection order
        ranked.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.affected_rows.cmp(&a.affected_rows))
        });

        SummaryCard {
            score,
            quality_level: self.result.quality_level,
            status,
            color,
            total_issues: self.result.total_issues(),
            critical_issues: self.result.count_by_severity(QualitySeverity::Critical),
            warning_issues: self.result.count_by_severity(QualitySeverity::Warning),
            info_issues: self.result.count_by_severity(QualitySeverity::Info),
            top_issues: ranked.into_iter().take(3).cloned().collect(),
        }
    }

    /// Plain-text report, the same text `Display` writes
    pub fn detailed_report(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.result;

        writeln!(f, "{}", RULE)?;
        writeln!(f, "DATA QUALITY REPORT")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f)?;
        writeln!(f, "Overall Score: {}/100", r.overall_score)?;
        writeln!(f, "Quality Level: {}", r.quality_level.as_str().to_uppercase())?;
        writeln!(f, "Total Issues: {}", r.total_issues())?;
        writeln!(f, "  - Critical: {}", r.count_by_severity(QualitySeverity::Critical))?;
        writeln!(f, "  - Warning: {}", r.count_by_severity(QualitySeverity::Warning))?;
        writeln!(f, "  - Info: {}", r.count_by_severity(QualitySeverity::Info))?;
        writeln!(f, "Checked At: {}", r.checked_at.format("%Y-%m-%d %H:%M:%S UTC"))?;

        section(f, "DETAILED SCORES")?;
        for (name, score) in r.scores.entries() {
            writeln!(f, "  {:15}: {:.2}/100", capitalize(name), score)?;
        }

        section(f, "ISSUES FOUND")?;
        if r.issues.is_empty() {
            writeln!(f, "\nNo issues found! Data quality is excellent.")?;
        }
        for issue in &r.issues {
            writeln!(f)?;
            writeln!(
                f,
                "[{}] {}",
                issue.severity.as_str().to_uppercase(),
                issue.issue_type.as_str().to_uppercase()
            )?;
            writeln!(f, "  Column: {}", issue.column)?;
            writeln!(f, "  Message: {}", issue.message)?;
            writeln!(f, "  Affected Rows: {}", issue.affected_rows)?;
            writeln!(f, "  Suggestion: {}", issue.suggestion)?;
        }

        section(f, "RECOMMENDATIONS")?;
        if r.recommendations.is_empty() {
            writeln!(f, "\nNo recommendations needed.")?;
        }
        for (i, rec) in r.recommendations.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, rec)?;
        }

        writeln!(f)?;
        writeln!(f, "{}", RULE)
    }
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", RULE)?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", RULE)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordSet, Value};

    fn checker_with_issues() -> DataQualityChecker {
        let set = RecordSet::from_rows(
            &["A", "B"],
            vec![
                vec![Value::text("x"), Value::Null],
                vec![Value::text("x"), Value::Null],
                vec![Value::text("x"), Value::Null],
                vec![Value::text("y"), Value::text("1")],
            ],
        );
        DataQualityChecker::new(set)
    }

    #[test]
    fn test_summary_card_ranks_issues() {
        let card = QualityReport::new(&checker_with_issues()).summary_card();
        assert!(card.total_issues >= 2);
        assert!(card.top_issues.len() <= 3);
        assert_eq!(card.top_issues[0].severity, QualitySeverity::Critical);
        for pair in card.top_issues.windows(2) {
            assert!(pair[0].severity >= pair[1].severity);
        }
    }

    #[test]
    fn test_summary_card_status_bands() {
        let checker = DataQualityChecker::new(RecordSet::from_rows(
            &["A"],
            vec![vec![Value::text("a")], vec![Value::text("b")]],
        ));
        let card = QualityReport::new(&checker).summary_card();
        assert_eq!(card.score, 100);
        assert_eq!(card.status, "Excellent");
        assert_eq!(card.color, "#00ff88");
    }

    #[test]
    fn test_detailed_report_layout() {
        let text = QualityReport::new(&checker_with_issues()).detailed_report();
        assert!(text.contains("DATA QUALITY REPORT"));
        assert!(text.contains("  Completeness   : "));
        assert!(text.contains("[CRITICAL] "));
        assert!(text.contains("RECOMMENDATIONS"));
        assert!(text.ends_with(&format!("{}\n", RULE)));
    }

    #[test]
    fn test_display_matches_detailed_report() {
        let report = QualityReport::new(&checker_with_issues());
        assert_eq!(format!("{}", report), report.detailed_report());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("validity"), "Validity");
        assert_eq!(capitalize(""), "");
    }
}
