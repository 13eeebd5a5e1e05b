// Report generation from crawl runs and result directories.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use lugnut_walker::{BrandRecord, CategoryNode};
use serde::{Deserialize, Serialize};

use crate::crawl::CrawlSummary;
use crate::store::ResultStore;

const DIVIDER: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
    Csv,
    Markdown,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            _ => None,
        }
    }
}

/// Counts rolled up from one brand's record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandStats {
    pub models: usize,
    pub submodels: usize,
    pub categories: usize,
    pub part_links: usize,
    pub details_fetched: usize,
}

impl BrandStats {
    pub fn gather(record: &BrandRecord) -> Self {
        let mut stats = Self {
            models: record.models.len(),
            ..Self::default()
        };
        for model in record.models.values() {
            stats.submodels += model.submodels.len();
            for submodel in &model.submodels {
                for node in &submodel.parts {
                    stats.count_node(node);
                }
            }
        }
        stats
    }

    fn count_node(&mut self, node: &CategoryNode) {
        self.categories += 1;
        self.part_links += node.links.len();
        self.details_fetched += node.links.iter().filter(|l| l.parts.is_some()).count();
        for child in &node.subcategories {
            self.count_node(child);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportData {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub brands: Vec<BrandReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub stats: BrandStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report data straight out of a finished run.
pub fn gather_from_summary(summary: &CrawlSummary) -> ReportData {
    ReportData {
        source: summary.catalog_url.clone(),
        started_at: Some(summary.started_at.to_rfc3339()),
        finished_at: Some(summary.finished_at.to_rfc3339()),
        brands: summary
            .outcomes
            .iter()
            .map(|outcome| BrandReport {
                name: outcome.brand.clone(),
                link: Some(outcome.link.clone()),
                stats: outcome.stats,
                file: outcome.file.as_ref().map(|p| p.display().to_string()),
                error: outcome.error.clone(),
            })
            .collect(),
    }
}

/// Report data by re-reading every brand file in a results directory.
/// Files are visited in name order so the report is stable across runs.
pub fn gather_from_dir(dir: &Path) -> std::io::Result<ReportData> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut brands = Vec::new();
    for path in paths {
        let store = ResultStore::load(&path);
        for (name, record) in store.iter() {
            brands.push(BrandReport {
                name: name.to_string(),
                link: Some(record.link.clone()),
                stats: BrandStats::gather(record),
                file: Some(path.display().to_string()),
                error: None,
            });
        }
    }

    Ok(ReportData {
        source: dir.display().to_string(),
        started_at: None,
        finished_at: None,
        brands,
    })
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    // Header
    report.push_str(DIVIDER);
    report.push_str("                          LUGNUT CATALOG CRAWL REPORT\n");
    report.push_str(DIVIDER);
    report.push('\n');

    report.push_str(&format!("Source:       {}\n", data.source));
    if let Some(ref started) = data.started_at {
        report.push_str(&format!("Started:      {}\n", started));
    }
    if let Some(ref finished) = data.finished_at {
        report.push_str(&format!("Finished:     {}\n", finished));
    }
    report.push_str(&format!("Brands:       {}\n", data.brands.len()));
    report.push('\n');

    // Totals
    let totals = data.totals();
    report.push_str(DIVIDER);
    report.push_str("SUMMARY\n");
    report.push_str(DIVIDER);
    report.push('\n');
    report.push_str(&format!("Models:           {}\n", totals.models));
    report.push_str(&format!("Submodels:        {}\n", totals.submodels));
    report.push_str(&format!("Categories:       {}\n", totals.categories));
    report.push_str(&format!("Part links:       {}\n", totals.part_links));
    report.push_str(&format!("Details fetched:  {}\n", totals.details_fetched));
    report.push('\n');

    // Per-brand breakdown
    if !data.brands.is_empty() {
        report.push_str(DIVIDER);
        report.push_str("BRANDS\n");
        report.push_str(DIVIDER);
        report.push('\n');

        for brand in &data.brands {
            report.push_str(&format!("[{}]\n", brand.name));
            report.push_str(&format!(
                "  models: {}  submodels: {}  categories: {}  links: {}  details: {}\n",
                brand.stats.models,
                brand.stats.submodels,
                brand.stats.categories,
                brand.stats.part_links,
                brand.stats.details_fetched,
            ));
            if let Some(ref file) = brand.file {
                report.push_str(&format!("  file:   {}\n", file));
            }
            if let Some(ref error) = brand.error {
                report.push_str(&format!("  error:  {}\n", error));
            }
            report.push('\n');
        }
    }

    // Footer
    report.push_str(DIVIDER);
    report.push_str("                                End of Report\n");
    report.push_str(DIVIDER);
    report.push_str("\nGenerated by Lugnut - a parts catalog crawler for rendered storefronts\n\n");

    report
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let totals = data.totals();
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Lugnut",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "source": data.source,
                "started_at": data.started_at,
                "finished_at": data.finished_at
            },
            "summary": {
                "total_brands": data.brands.len(),
                "totals": totals
            },
            "brands": data.brands
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn generate_csv_report(data: &ReportData) -> String {
    let mut report =
        String::from("brand,models,submodels,categories,part_links,details_fetched,file,error\n");
    for brand in &data.brands {
        report.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            csv_field(&brand.name),
            brand.stats.models,
            brand.stats.submodels,
            brand.stats.categories,
            brand.stats.part_links,
            brand.stats.details_fetched,
            csv_field(brand.file.as_deref().unwrap_or("")),
            csv_field(brand.error.as_deref().unwrap_or("")),
        ));
    }
    report
}

pub fn generate_markdown_report(data: &ReportData) -> String {
    let mut report = String::from("# Catalog Crawl Report\n\n");
    report.push_str(&format!("- Source: {}\n", data.source));
    if let Some(ref started) = data.started_at {
        report.push_str(&format!("- Started: {}\n", started));
    }
    if let Some(ref finished) = data.finished_at {
        report.push_str(&format!("- Finished: {}\n", finished));
    }
    report.push_str(&format!("- Brands: {}\n", data.brands.len()));

    report.push_str("\n| Brand | Models | Submodels | Categories | Part links | Details |\n");
    report.push_str("|---|---:|---:|---:|---:|---:|\n");
    for brand in &data.brands {
        report.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            brand.name,
            brand.stats.models,
            brand.stats.submodels,
            brand.stats.categories,
            brand.stats.part_links,
            brand.stats.details_fetched,
        ));
    }

    let errors: Vec<&BrandReport> = data.brands.iter().filter(|b| b.error.is_some()).collect();
    if !errors.is_empty() {
        report.push_str("\n## Errors\n\n");
        for brand in errors {
            report.push_str(&format!(
                "- `{}`: {}\n",
                brand.name,
                brand.error.as_deref().unwrap_or("")
            ));
        }
    }

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

// Helper functions
impl ReportData {
    fn totals(&self) -> BrandStats {
        let mut totals = BrandStats::default();
        for brand in &self.brands {
            totals.models += brand.stats.models;
            totals.submodels += brand.stats.submodels;
            totals.categories += brand.stats.categories;
            totals.part_links += brand.stats.part_links;
            totals.details_fetched += brand.stats.details_fetched;
        }
        totals
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
