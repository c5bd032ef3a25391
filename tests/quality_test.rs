use anyhow::Result;
use wsa_fulfillment::pipeline::processing::quality_gate::{
    QualityIssueType, QualityLevel, QualitySeverity,
};
use wsa_fulfillment::{DataQualityChecker, QualityReport, RecordSet, Value};

fn text_rows(columns: &[&str], rows: Vec<Vec<&str>>) -> RecordSet {
    RecordSet::from_rows(
        columns,
        rows.into_iter().map(|r| {
            r.into_iter()
                .map(|c| if c.is_empty() { Value::Null } else { Value::text(c) })
                .collect()
        }),
    )
}

/// 10 rows: 2 fully null, one exact duplicate pair
fn sample() -> RecordSet {
    text_rows(
        &["Name", "Zone"],
        vec![
            vec!["Budi", "JKT"],
            vec!["Sari", "BDG"],
            vec!["Dewi", "SBY"],
            vec!["Andi", "MDN"],
            vec!["Rina", "JKT"],
            vec!["Tono", "BDG"],
            vec!["Joko", "SBY"],
            vec!["Budi", "JKT"],
            vec!["", ""],
            vec!["", ""],
        ],
    )
}

#[test]
fn test_completeness_and_uniqueness_scores() -> Result<()> {
    let mut checker = DataQualityChecker::new(sample());
    let result = checker.run_all_checks().clone();

    assert!((result.scores.completeness - 80.0).abs() < 1e-9);
    assert!((result.scores.uniqueness - 90.0).abs() < 1e-9);
    for (_, score) in result.scores.entries() {
        assert!((0.0..=100.0).contains(&score));
    }
    assert_eq!(
        result.overall_score,
        result.scores.weighted_sum().round() as u32
    );
    assert_eq!(result.quality_level, QualityLevel::from_score(result.overall_score));

    let completeness: Vec<_> = checker
        .get_issues_by_column("Name")
        .into_iter()
        .filter(|i| i.issue_type == QualityIssueType::Completeness)
        .collect();
    assert_eq!(completeness.len(), 1);
    assert_eq!(completeness[0].affected_rows, 2);
    assert_eq!(completeness[0].severity, QualitySeverity::Warning);
    Ok(())
}

#[test]
fn test_fix_common_issues_is_idempotent() -> Result<()> {
    let raw = text_rows(
        &["Name", "Contact Number", "Date Created"],
        vec![
            vec!["  Budi ", "0812-3456-7890", "10/01/2024"],
            vec!["Budi", "6281234567890", "2024-01-10 00:00:00"],
            vec!["null", "n/a", "2024-01-11"],
            vec!["Sari", "call", "someday"],
        ],
    );

    let once = DataQualityChecker::new(raw).fix_common_issues();
    let twice = DataQualityChecker::new(once.clone()).fix_common_issues();

    assert_eq!(once.len(), 3);
    assert_eq!(once.to_display_rows(), twice.to_display_rows());
    assert!(once.records[1].get("Name").is_null());
    assert!(once.records[2].get("Contact Number").is_null());
    Ok(())
}

#[test]
fn test_report_views_agree_with_result() -> Result<()> {
    let mut checker = DataQualityChecker::new(sample());
    let result = checker.run_all_checks().clone();
    let report = QualityReport::from_result(result.clone());

    let card = report.summary_card();
    assert_eq!(card.score, result.overall_score);
    assert_eq!(card.total_issues, result.issues.len());
    assert_eq!(
        card.critical_issues + card.warning_issues + card.info_issues,
        card.total_issues
    );

    let text = report.detailed_report();
    assert!(text.contains(&format!("Overall Score: {}/100", result.overall_score)));
    Ok(())
}
