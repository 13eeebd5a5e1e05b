use indicatif::{ProgressBar, ProgressStyle};
use lugnut_walker::{CatalogCrawler, ChromeBrowser, NamedLink, SettlePolicy, SiteSelectors};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::report::BrandStats;
use crate::store::{ResultStore, brand_file};

/// Options for configuring a crawl run
pub struct CrawlOptions {
    pub devtools_url: String,
    pub catalog_url: String,
    pub out_dir: PathBuf,
    /// First brand to crawl, 1-based inclusive.
    pub first_brand: usize,
    /// Last brand to crawl, 1-based inclusive. Zero means through the end.
    pub last_brand: usize,
    pub detail_workers: usize,
    pub detail_timeout: Duration,
    pub settle: SettlePolicy,
    pub selectors: SiteSelectors,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// What happened to one brand during a run.
#[derive(Debug, Clone)]
pub struct BrandOutcome {
    pub brand: String,
    pub link: String,
    pub stats: BrandStats,
    /// File the brand was written to, if the write happened.
    pub file: Option<PathBuf>,
    pub error: Option<String>,
}

/// Everything a finished run knows about itself.
pub struct CrawlSummary {
    pub catalog_url: String,
    pub out_dir: PathBuf,
    /// Brands on the site, before range selection.
    pub total_brands: usize,
    pub outcomes: Vec<BrandOutcome>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

/// Clamp a 1-based inclusive brand range onto a list of `total` brands.
/// A `last` of zero means through the end.
pub fn brand_range(total: usize, first: usize, last: usize) -> Range<usize> {
    let start = first.max(1).saturating_sub(1).min(total);
    let end = if last == 0 { total } else { last.min(total) }.max(start);
    start..end
}

/// Per-brand confirmation once its file is on disk.
pub fn written_line(brand: &str, path: &Path) -> String {
    format!("Brand '{brand}' written to {}", path.display())
}

/// Execute a crawl with the given options
/// Returns a summary of what was crawled and written where
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlSummary, String> {
    let CrawlOptions {
        devtools_url,
        catalog_url,
        out_dir,
        first_brand,
        last_brand,
        detail_workers,
        detail_timeout,
        settle,
        selectors,
        show_progress_bars,
    } = options;

    Url::parse(&catalog_url).map_err(|e| format!("Invalid catalog URL {}: {}", catalog_url, e))?;
    let started_at = chrono::Utc::now();

    // Single spinner for overall progress (only if enabled)
    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap(),
        );
        pb.set_message("Connecting to browser...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let browser = ChromeBrowser::connect(&devtools_url)
        .await
        .map_err(|e| format!("Failed to connect to browser at {}: {}", devtools_url, e))?;
    let page = browser
        .page()
        .await
        .map_err(|e| format!("Failed to open a page: {}", e))?;
    let browser = Arc::new(browser);

    // Walker-level progress feeds the spinner (only if enabled)
    let internal_progress_callback: lugnut_walker::ProgressCallback = if show_progress_bars {
        let pb_clone = progress_bar.clone().unwrap();
        Arc::new(move |message: String| {
            pb_clone.set_message(message);
            pb_clone.tick();
        })
    } else {
        Arc::new(|_message: String| {})
    };

    let crawler = CatalogCrawler::new(browser, Box::new(page))
        .with_selectors(selectors)
        .with_settle(settle)
        .with_detail_workers(detail_workers)
        .with_detail_timeout(detail_timeout)
        .with_progress_callback(internal_progress_callback);

    let brands = crawler
        .brands(&catalog_url)
        .await
        .map_err(|e| format!("Failed to list brands at {}: {}", catalog_url, e))?;
    let total_brands = brands.len();

    let range = brand_range(total_brands, first_brand, last_brand);
    let selected: Vec<NamedLink> = brands[range].to_vec();

    let mut outcomes = Vec::with_capacity(selected.len());
    for (idx, brand) in selected.iter().enumerate() {
        if let Some(ref callback) = progress_callback {
            callback(format!(
                "Brand {}/{}: {}",
                idx + 1,
                selected.len(),
                brand.name
            ));
        }
        if let Some(ref pb) = progress_bar {
            pb.set_message(format!(
                "Crawling {} ({}/{})",
                brand.name,
                idx + 1,
                selected.len()
            ));
            pb.tick();
        }

        let outcome = crawl_one_brand(&crawler, brand, &out_dir).await;
        if let Some(ref callback) = progress_callback
            && let Some(ref file) = outcome.file
        {
            callback(written_line(&outcome.brand, file));
        }
        outcomes.push(outcome);
    }

    if let Some(ref pb) = progress_bar {
        let written = outcomes.iter().filter(|o| o.file.is_some()).count();
        pb.finish_with_message(format!(
            "Crawl complete! {} of {} brands written",
            written,
            outcomes.len()
        ));
    }

    Ok(CrawlSummary {
        catalog_url,
        out_dir,
        total_brands,
        outcomes,
        started_at,
        finished_at: chrono::Utc::now(),
    })
}

/// Crawl one brand and merge it into its file. Any failure along the way
/// becomes part of the outcome instead of ending the run.
async fn crawl_one_brand(
    crawler: &CatalogCrawler,
    brand: &NamedLink,
    out_dir: &Path,
) -> BrandOutcome {
    let mut outcome = BrandOutcome {
        brand: brand.name.clone(),
        link: brand.link.clone(),
        stats: BrandStats::default(),
        file: None,
        error: None,
    };

    let record = match crawler.crawl_brand(brand).await {
        Ok(record) => record,
        Err(e) => {
            warn!("brand '{}' failed: {}", brand.name, e);
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    outcome.stats = BrandStats::gather(&record);

    let path = brand_file(out_dir, &brand.name);
    let mut store = ResultStore::load(&path);
    store.merge(brand.name.clone(), record);
    match store.persist(&path) {
        Ok(()) => {
            info!("{}", written_line(&brand.name, &path));
            outcome.file = Some(path);
        }
        Err(e) => {
            warn!("could not write {}: {}", path.display(), e);
            outcome.error = Some(format!("write failed: {e}"));
        }
    }
    outcome
}
