use anyhow::Context;
use clap::ArgMatches;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use lugnut_walker::{SettlePolicy, SiteSelectors};

const BANNER: &str = r#"
 _                         _
| |_   _  __ _ _ __  _   _| |_
| | | | |/ _` | '_ \| | | | __|
| | |_| | (_| | | | | |_| | |_
|_|\__,_|\__, |_| |_|\__,_|\__|
         |___/"#;

// Helper functions for the crawl and report handlers

/// Expand a user-supplied output directory, `~` included.
pub fn expand_out_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Selector overrides from disk, or the built-in table when no file is given.
pub fn load_selectors(path: Option<&PathBuf>) -> anyhow::Result<SiteSelectors> {
    match path {
        Some(path) => SiteSelectors::from_file(path)
            .with_context(|| format!("Failed to load selectors from {}", path.display())),
        None => Ok(SiteSelectors::default()),
    }
}

/// Render report data in the requested format.
pub fn render_report(format: &ReportFormat, data: &ReportData) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(data)),
        ReportFormat::Json => {
            generate_json_report(data).map_err(|e| format!("Failed to build JSON report: {}", e))
        }
        ReportFormat::Csv => Ok(generate_csv_report(data)),
        ReportFormat::Markdown => Ok(generate_markdown_report(data)),
    }
}

/// Write the report to a file, or print it when no sink was given.
pub fn emit_report(report: &str, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            save_report(report, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", report),
    }
    Ok(())
}

// Re-export crawl and report plumbing from lugnut-core
pub use lugnut_core::crawl::{CrawlOptions, CrawlProgressCallback, CrawlSummary, execute_crawl};
pub use lugnut_core::report::{
    ReportData, ReportFormat, gather_from_dir, gather_from_summary, generate_csv_report,
    generate_json_report, generate_markdown_report, generate_text_report, save_report,
};

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub fn print_banner() {
    println!("{}", BANNER.bright_blue().bold());
    println!(
        "  {}",
        format!(
            "v{} - a parts catalog crawler for rendered storefronts",
            env!("CARGO_PKG_VERSION")
        )
        .bright_white()
    );
    print_divider();
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) {
    let devtools = sub_matches.get_one::<String>("devtools").unwrap();
    let catalog = sub_matches.get_one::<Url>("catalog").unwrap();
    let from = *sub_matches.get_one::<usize>("from").unwrap_or(&1);
    let to = *sub_matches.get_one::<usize>("to").unwrap_or(&0);
    let out_dir = expand_out_dir(sub_matches.get_one::<String>("out").unwrap());
    let workers = *sub_matches.get_one::<usize>("workers").unwrap_or(&8);
    let timeout = *sub_matches.get_one::<u64>("timeout").unwrap_or(&20);
    let settle_ms = *sub_matches.get_one::<u64>("settle-ms").unwrap_or(&5000);
    let format = ReportFormat::from_str(sub_matches.get_one::<String>("format").unwrap())
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches.get_one::<PathBuf>("output");

    let selectors = match load_selectors(sub_matches.get_one::<PathBuf>("selectors")) {
        Ok(selectors) => selectors,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };

    // Print crawl configuration
    if !quiet {
        println!("\n🔩 Crawling {}", catalog);
        println!("Workers: {}", workers);
        println!("Detail timeout: {}s", timeout);
        let range = match to {
            0 => format!("{} through the last", from),
            to => format!("{} through {}", from, to),
        };
        println!("Brands: {}", range);
        println!("Output: {}\n", out_dir.display());
    }

    let options = CrawlOptions {
        devtools_url: devtools.clone(),
        catalog_url: catalog.as_str().to_string(),
        out_dir: out_dir.clone(),
        first_brand: from,
        last_brand: to,
        detail_workers: workers,
        detail_timeout: Duration::from_secs(timeout),
        settle: SettlePolicy {
            timeout: Duration::from_millis(settle_ms),
            ..SettlePolicy::default()
        },
        selectors,
        show_progress_bars: !quiet,
    };

    // Execute crawl with progress callback
    let progress_callback: Option<CrawlProgressCallback> = if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{}", msg);
        }))
    };

    let summary = match execute_crawl(options, progress_callback).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("✗ Crawl failed: {}", e);
            std::process::exit(1);
        }
    };

    if !quiet {
        println!("\n✓ Crawl complete!\n");
    }

    // Generate and emit the run report
    let data = gather_from_summary(&summary);
    let report = match render_report(&format, &data) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = emit_report(&report, output) {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

pub fn handle_report(sub_matches: &ArgMatches) {
    let out_dir = expand_out_dir(sub_matches.get_one::<String>("out").unwrap());
    let format = ReportFormat::from_str(sub_matches.get_one::<String>("format").unwrap())
        .unwrap_or(ReportFormat::Text);
    let output = sub_matches.get_one::<PathBuf>("output");

    let data = match gather_from_dir(&out_dir) {
        Ok(data) => data,
        Err(e) => {
            eprintln!("✗ Could not read {}: {}", out_dir.display(), e);
            std::process::exit(1);
        }
    };
    if data.brands.is_empty() {
        eprintln!("✗ No brand files found in {}", out_dir.display());
        std::process::exit(1);
    }

    let report = match render_report(&format, &data) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = emit_report(&report, output) {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
