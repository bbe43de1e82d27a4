use crate::error::{Error, Result};
use crate::results::PageReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Information about the run that produced a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub generated_at: String,
    pub base_url: String,
    /// Pages in the catalogue, whether or not they were processed
    pub total_pages: usize,
    pub total_links_processed: usize,
    pub max_workers: usize,
    pub processing_time_seconds: f64,
    pub tool_version: String,
}

/// The persisted result of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub metadata: Metadata,
    pub results: Vec<PageReport>,
}

/// Collects page reports in completion order and assembles the [`Report`]
#[derive(Debug)]
pub struct ReportBuilder {
    base_url: String,
    total_pages: usize,
    max_workers: usize,
    results: Vec<PageReport>,
}

impl ReportBuilder {
    pub fn new(base_url: &str, total_pages: usize, max_workers: usize) -> Self {
        Self {
            base_url: base_url.to_string(),
            total_pages,
            max_workers,
            results: Vec::with_capacity(total_pages),
        }
    }

    pub fn push(&mut self, page: PageReport) {
        self.results.push(page);
    }

    pub fn extend(&mut self, pages: impl IntoIterator<Item = PageReport>) {
        self.results.extend(pages);
    }

    pub fn build(self, elapsed: Duration) -> Report {
        let total_links_processed = self.results.iter().map(|r| r.outcomes.len()).sum();
        Report {
            metadata: Metadata {
                generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                base_url: self.base_url,
                total_pages: self.total_pages,
                total_links_processed,
                max_workers: self.max_workers,
                processing_time_seconds: elapsed.as_secs_f64(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
            },
            results: self.results,
        }
    }
}

impl Report {
    /// Counts over every processed page
    pub fn summary(&self) -> Summary {
        let outcomes = || self.results.iter().flat_map(|r| r.outcomes.iter());
        Summary {
            pages_processed: self.results.len(),
            total_links: outcomes().count(),
            fixed: outcomes().filter(|o| o.is_fixed()).count(),
            errored: outcomes().filter(|o| o.error.is_some()).count(),
            failed_pages: self.results.iter().filter(|r| r.error.is_some()).count(),
            processing_time_seconds: self.metadata.processing_time_seconds,
        }
    }

    /// Write the report as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| Error::Output {
            path: path.to_path_buf(),
            source,
        })?;
        ::log::info!("Report saved to {}", path.display());
        Ok(())
    }
}

/// Totals shown to the user at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub pages_processed: usize,
    pub total_links: usize,
    pub fixed: usize,
    pub errored: usize,
    pub failed_pages: usize,
    pub processing_time_seconds: f64,
}

impl Summary {
    /// Percentage of links fixed, `None` when there were no links
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_links > 0).then(|| self.fixed as f64 / self.total_links as f64 * 100.0)
    }

    pub fn average_seconds_per_link(&self) -> Option<f64> {
        (self.total_links > 0).then(|| self.processing_time_seconds / self.total_links as f64)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detailed Summary:")?;
        writeln!(f, "  Total pages processed: {}", self.pages_processed)?;
        writeln!(f, "  Total broken links: {}", self.total_links)?;
        writeln!(f, "  Links successfully fixed: {}", self.fixed)?;
        writeln!(f, "  Links with errors: {}", self.errored)?;
        if self.failed_pages > 0 {
            writeln!(f, "  Pages that failed: {}", self.failed_pages)?;
        }
        writeln!(
            f,
            "  Total processing time: {:.1} seconds",
            self.processing_time_seconds
        )?;
        if let Some(average) = self.average_seconds_per_link() {
            writeln!(f, "  Average time per link: {average:.2} seconds")?;
        }
        match self.success_rate() {
            Some(rate) => write!(f, "  Success rate: {rate:.1}%"),
            None => write!(f, "  Success rate: N/A"),
        }
    }
}

/// `page: fixed/total fixed` lines, one per processed page
pub fn page_breakdown(report: &Report) -> Vec<String> {
    report
        .results
        .iter()
        .map(|r| format!("{}: {}/{} fixed", r.page, r.fixed_count(), r.outcomes.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkTarget;
    use crate::results::{FixMethod, ResolutionOutcome};

    fn page(name: &str, outcomes: Vec<ResolutionOutcome>) -> PageReport {
        PageReport {
            page: name.to_string(),
            outcomes,
            processing_time_seconds: 0.5,
            worker_id: 1,
            error: None,
        }
    }

    fn sample_report() -> Report {
        let mut builder = ReportBuilder::new("https://x.io", 3, 2);
        builder.push(page(
            "docs/a.mdx",
            vec![
                ResolutionOutcome::fixed(
                    LinkTarget::parse("/a"),
                    LinkTarget::parse("/b"),
                    FixMethod::HttpRedirect,
                ),
                ResolutionOutcome::failed(LinkTarget::parse("/c"), "page failed to load"),
            ],
        ));
        builder.push(page(
            "docs/b.mdx",
            vec![ResolutionOutcome::unresolved(LinkTarget::parse("/d"))],
        ));
        builder.push(PageReport::failed("docs/c.mdx", 2, vec![], "no session"));
        builder.build(Duration::from_secs(6))
    }

    #[test]
    fn test_metadata_counts() {
        let report = sample_report();
        assert_eq!(report.metadata.total_pages, 3);
        assert_eq!(report.metadata.total_links_processed, 3);
        assert_eq!(report.metadata.max_workers, 2);
        assert_eq!(report.metadata.processing_time_seconds, 6.0);
        assert_eq!(report.results.len(), 3);
    }

    #[test]
    fn test_summary() {
        let summary = sample_report().summary();
        assert_eq!(summary.pages_processed, 3);
        assert_eq!(summary.total_links, 3);
        assert_eq!(summary.fixed, 1);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.failed_pages, 1);
        assert!((summary.success_rate().unwrap() - 33.333).abs() < 0.01);
        assert_eq!(summary.average_seconds_per_link(), Some(2.0));

        let text = summary.to_string();
        assert!(text.contains("Links successfully fixed: 1"));
        assert!(text.contains("Success rate: 33.3%"));
    }

    #[test]
    fn test_empty_summary_has_no_rate() {
        let report = ReportBuilder::new("https://x.io", 0, 1).build(Duration::ZERO);
        let summary = report.summary();
        assert_eq!(summary.success_rate(), None);
        assert!(summary.to_string().contains("Success rate: N/A"));
    }

    #[test]
    fn test_page_breakdown() {
        assert_eq!(
            page_breakdown(&sample_report()),
            vec![
                "docs/a.mdx: 1/2 fixed".to_string(),
                "docs/b.mdx: 0/1 fixed".to_string(),
                "docs/c.mdx: 0/0 fixed".to_string(),
            ]
        );
    }

    #[test]
    fn test_save_round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = sample_report();
        report.save(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["metadata"]["base_url"], "https://x.io");
        assert_eq!(json["results"][0]["links"][0]["fix"], "/b");
        assert_eq!(json["results"][2]["error"], "no session");
    }

    #[test]
    fn test_save_to_missing_directory_is_output_error() {
        let err = sample_report()
            .save("/no/such/dir/report.json")
            .unwrap_err();
        assert!(matches!(err, Error::Output { .. }));
    }
}
