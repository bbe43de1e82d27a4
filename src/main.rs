use clap::Parser;
use link_fixer::report::page_breakdown;
use link_fixer::{CancelFlag, FixerConfig, LinkFixer};
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let base = match &args.config {
        Some(path) => match FixerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                ::log::error!("{}", e);
                return ExitCode::from(1);
            }
        },
        None => FixerConfig::default(),
    };
    let mut config = args.apply(base);
    config.apply_env();
    let output_path = config.output_path.clone();

    println!("Broken link fixer");
    println!("Base URL: {}", config.base_url);
    println!("Broken links file: {}", config.catalogue_path.display());
    println!("Max workers: {}", config.max_workers);

    let cancel = CancelFlag::new();
    let fixer = LinkFixer::new(config).with_cancel_flag(cancel.clone());

    let entries = match fixer.load_entries() {
        Ok(entries) => entries,
        Err(e) => {
            ::log::error!("{}", e);
            return ExitCode::from(1);
        }
    };
    if entries.is_empty() {
        println!("No broken links found in the catalogue");
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, finishing pages already in progress");
            cancel.cancel();
        }
    });

    let report = match fixer.run(entries).await {
        Ok(report) => report,
        Err(e) => {
            ::log::error!("{}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = report.save(&output_path) {
        ::log::error!("{}", e);
        return ExitCode::from(2);
    }

    println!();
    println!("{}", report.summary());
    println!();
    println!("Per-page results:");
    for line in page_breakdown(&report) {
        println!("  {line}");
    }
    println!();
    println!("Results saved to {}", output_path.display());

    ExitCode::SUCCESS
}
