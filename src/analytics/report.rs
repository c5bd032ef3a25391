use askama::Template;
use std::fmt;

use super::{AnalyticsReport, DataAnalyzer, GroupCount, MonthCount};
use crate::error::Result;

pub const DEFAULT_TITLE: &str = "WSA Analytics Report";

/// Markdown and HTML renderings of an analyzer's full report
pub struct ReportGenerator {
    report: AnalyticsReport,
}

impl ReportGenerator {
    pub fn new(analyzer: &DataAnalyzer<'_>, top: usize) -> Self {
        Self {
            report: analyzer.full_report(top),
        }
    }

    pub fn report(&self) -> &AnalyticsReport {
        &self.report
    }

    pub fn markdown(&self, title: &str) -> String {
        MarkdownReport {
            title,
            report: &self.report,
        }
        .to_string()
    }

    pub fn html(&self, title: &str) -> Result<String> {
        let r = &self.report;
        let page = HtmlReport {
            title,
            generated_at: r.generated_at.to_rfc3339(),
            metrics: vec![
                Metric { value: r.summary.total_records, label: "Total Records" },
                Metric { value: r.summary.total_columns, label: "Total Columns" },
                Metric { value: r.summary.total_nulls, label: "Null Cells" },
            ],
            sections: vec![
                GroupSection { heading: "By Status", key_label: "Status", groups: &r.by_status },
                GroupSection { heading: "By Workzone", key_label: "Workzone", groups: &r.by_workzone },
                GroupSection {
                    heading: "By CRM Order Type",
                    key_label: "CRM Order Type",
                    groups: &r.by_crm_type,
                },
            ],
            by_month: &r.by_month,
            top_customers: &r.top_customers,
        };
        Ok(page.render()?)
    }
}

struct Metric {
    value: usize,
    label: &'static str,
}

struct GroupSection<'a> {
    heading: &'static str,
    key_label: &'static str,
    groups: &'a [GroupCount],
}

#[derive(Template)]
#[template(path = "analytics_report.html")]
struct HtmlReport<'a> {
    title: &'a str,
    generated_at: String,
    metrics: Vec<Metric>,
    sections: Vec<GroupSection<'a>>,
    by_month: &'a [MonthCount],
    top_customers: &'a [GroupCount],
}

struct MarkdownReport<'a> {
    title: &'a str,
    report: &'a AnalyticsReport,
}

impl fmt::Display for MarkdownReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        writeln!(f, "# {}\n", self.title)?;
        writeln!(f, "**Generated at:** {}\n", r.generated_at.to_rfc3339())?;
        writeln!(f, "## Summary\n")?;
        writeln!(f, "- **Total Records:** {}", r.summary.total_records)?;
        writeln!(f, "- **Total Columns:** {}", r.summary.total_columns)?;
        writeln!(f, "- **Null Cells:** {}", r.summary.total_nulls)?;

        md_groups(f, "By Status", "Status", &r.by_status)?;
        md_groups(f, "By Workzone", "Workzone", &r.by_workzone)?;
        md_groups(f, "By CRM Order Type", "CRM Order Type", &r.by_crm_type)?;

        writeln!(f, "\n## By Month\n")?;
        writeln!(f, "| Month | Count | Percentage |")?;
        writeln!(f, "|-------|-------|------------|")?;
        for m in &r.by_month {
            writeln!(f, "| {} | {} | {:.2}% |", m.month_name, m.count, m.percentage)?;
        }

        writeln!(f, "\n## Top Customers\n")?;
        writeln!(f, "| Customer Name | Order Count |")?;
        writeln!(f, "|---------------|-------------|")?;
        for g in &r.top_customers {
            writeln!(f, "| {} | {} |", md_cell(&g.key), g.count)?;
        }
        Ok(())
    }
}

fn md_groups(f: &mut fmt::Formatter<'_>, heading: &str, key_label: &str, groups: &[GroupCount]) -> fmt::Result {
    writeln!(f, "\n## {}\n", heading)?;
    writeln!(f, "| {} | Count | Percentage |", key_label)?;
    writeln!(f, "|---|-------|------------|")?;
    for g in groups {
        writeln!(f, "| {} | {} | {:.2}% |", md_cell(&g.key), g.count, g.percentage)?;
    }
    Ok(())
}

/// Table cell text: pipes escaped, line breaks folded into spaces
fn md_cell(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(|c: char| c == '\n' || c == '\r', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::types::{RecordSet, Value};

    fn set() -> RecordSet {
        RecordSet::from_rows(
            &[COL_STATUS, COL_CUSTOMER_NAME],
            vec![
                vec![Value::text("OPEN"), Value::text("<Budi & Co>")],
                vec![Value::text("OPEN"), Value::text("Sari")],
                vec![Value::text("CLOSED"), Value::text("Sari")],
            ],
        )
    }

    #[test]
    fn test_markdown_has_tables() {
        let records = set();
        let generator = ReportGenerator::new(&DataAnalyzer::new(&records), 10);
        let md = generator.markdown(DEFAULT_TITLE);
        assert!(md.starts_with("# WSA Analytics Report"));
        assert!(md.contains("| OPEN | 2 | 66.67% |"));
        assert!(md.contains("| Sari | 2 |"));
    }

    #[test]
    fn test_html_escapes_values() {
        let records = set();
        let generator = ReportGenerator::new(&DataAnalyzer::new(&records), 10);
        let html = generator.html("Report <1>").unwrap();
        assert!(html.contains("<title>Report &lt;1&gt;</title>"));
        assert!(html.contains("&lt;Budi &amp; Co&gt;"));
        assert!(!html.contains("<Budi"));
    }

    #[test]
    fn test_html_has_every_section() {
        let records = set();
        let html = ReportGenerator::new(&DataAnalyzer::new(&records), 10)
            .html(DEFAULT_TITLE)
            .unwrap();
        for heading in ["Summary", "By Status", "By Workzone", "By Month", "Top Customers"] {
            assert!(html.contains(&format!("<h2>{}</h2>", heading)), "missing {}", heading);
        }
        assert!(html.contains("<td>OPEN</td><td>2</td><td>66.67%</td>"));
        assert!(html.contains("<div class=\"metric-value\">3</div>"));
    }

    #[test]
    fn test_markdown_cells_escape_pipes_and_newlines() {
        let records = RecordSet::from_rows(
            &[COL_STATUS, COL_CUSTOMER_NAME],
            vec![vec![Value::text("A|B"), Value::text("PT Maju\nJaya")]],
        );
        let md = ReportGenerator::new(&DataAnalyzer::new(&records), 10).markdown(DEFAULT_TITLE);
        assert!(md.contains("| A\\|B | 1 | 100.00% |"));
        assert!(md.contains("| PT Maju Jaya | 1 |"));
    }

    #[test]
    fn test_md_cell() {
        assert_eq!(md_cell("plain"), "plain");
        assert_eq!(md_cell("a|b\r\nc"), "a\\|b c");
    }
}
