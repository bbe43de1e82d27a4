#![allow(clippy::too_many_arguments)]

pub mod browser;
pub mod config;
pub mod error;
pub mod filter;
pub mod link;
pub mod matcher;
pub mod parsers;
pub mod pool;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod results;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::FixerConfig;
pub use error::{Error, Result};
pub use link::LinkTarget;
pub use parsers::Entry;
pub use pool::CancelFlag;
pub use report::Report;
pub use results::{FixMethod, PageReport, ResolutionOutcome};

use browser::SessionFactory;
use browser::webdriver::WebDriverFactory;
use parsers::CatalogueOptions;
use pool::WorkerPool;
use report::ReportBuilder;
use resolver::LinkResolver;
use std::time::Instant;

/// Main builder for a link-fixing run
pub struct LinkFixer {
    config: FixerConfig,
    cancel: CancelFlag,
}

impl LinkFixer {
    /// Create a new LinkFixer with the given configuration
    pub fn new(config: FixerConfig) -> Self {
        Self {
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Set the maximum number of concurrent browser sessions
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    pub fn with_webdriver_url(mut self, webdriver_url: &str) -> Self {
        self.config.webdriver_url = webdriver_url.to_string();
        self
    }

    /// Replace the configuration with one loaded from a file
    pub fn with_config_file(self, path: impl AsRef<std::path::Path>) -> Result<Self> {
        let config = FixerConfig::from_file(path)?;
        Ok(Self { config, ..self })
    }

    /// Stop starting new pages once this flag is cancelled
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &FixerConfig {
        &self.config
    }

    /// Read the configured catalogue
    pub fn load_entries(&self) -> Result<Vec<Entry>> {
        let options = CatalogueOptions {
            repair_wrapped_lines: self.config.repair_wrapped_lines,
            page_prefixes: self.config.page_prefixes.clone(),
        };
        let entries = parsers::read_catalogue(&self.config.catalogue_path, &options)?;
        ::log::info!(
            "Loaded {} pages with {} broken links from {}",
            entries.len(),
            entries.iter().map(|e| e.broken_links.len()).sum::<usize>(),
            self.config.catalogue_path.display()
        );
        Ok(entries)
    }

    /// Resolve every entry with WebDriver sessions and build the report
    pub async fn run(&self, entries: Vec<Entry>) -> Result<Report> {
        let factory = WebDriverFactory::new(&self.config);
        self.run_with_factory(factory, entries).await
    }

    /// Resolve every entry with sessions from `factory` and build the report
    pub async fn run_with_factory<F: SessionFactory>(
        &self,
        factory: F,
        entries: Vec<Entry>,
    ) -> Result<Report> {
        let started = Instant::now();
        let resolver = LinkResolver::from_config(&self.config)?;
        let mut builder = ReportBuilder::new(
            &self.config.base_url,
            entries.len(),
            self.config.max_workers,
        );

        let pool = WorkerPool::new(factory, resolver, self.config.max_workers)
            .with_cancel_flag(self.cancel.clone());
        builder.extend(pool.run(entries).await);

        let report = builder.build(started.elapsed());
        ::log::info!(
            "Processed {} pages in {:.2} seconds",
            report.results.len(),
            report.metadata.processing_time_seconds
        );
        Ok(report)
    }
}
