use clap::Parser;
use link_fixer::FixerConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "link-fixer")]
#[command(about = "Finds replacements for broken documentation links by visiting the pages they appear on")]
#[command(
    after_help = "Example: link-fixer https://docs.wandb.ai broken.mdx --workers 8\n\nRequires a WebDriver server such as ChromeDriver. Set WEBDRIVER_URL to override the configured endpoint."
)]
#[command(version)]
pub struct Args {
    /// Site the broken links belong to
    #[arg(default_value = "https://docs.wandb.ai")]
    pub base_url: String,

    /// Catalogue of pages and their broken links
    #[arg(default_value = "broken.mdx")]
    pub broken_links_file: PathBuf,

    /// Maximum number of concurrent browser sessions
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// URL of the WebDriver server
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Directory the catalogue's page paths are relative to
    #[arg(long)]
    pub docs_root: Option<PathBuf>,

    /// Where to write the JSON report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON configuration file; command-line values take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Join catalogue lines that were wrapped before parsing
    #[arg(long)]
    pub repair_wrapped_lines: bool,
}

impl Args {
    /// Merge the arguments over `base`
    pub fn apply(&self, mut config: FixerConfig) -> FixerConfig {
        config.base_url = self.base_url.clone();
        config.catalogue_path = self.broken_links_file.clone();
        if let Some(workers) = self.workers {
            config.max_workers = workers;
        }
        if let Some(webdriver_url) = &self.webdriver_url {
            config.webdriver_url = webdriver_url.clone();
        }
        if let Some(docs_root) = &self.docs_root {
            config.docs_root = docs_root.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if self.repair_wrapped_lines {
            config.repair_wrapped_lines = true;
        }
        config
    }
}
