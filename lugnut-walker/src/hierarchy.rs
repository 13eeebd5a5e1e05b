use std::sync::Arc;
use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::browser::{Browser, Document};
use crate::detail::DetailFetcher;
use crate::error::{CrawlError, Result};
use crate::record::{BrandRecord, ModelRecord, NamedLink, SubmodelRecord};
use crate::selectors::{self, SiteSelectors};
use crate::walker::{SettlePolicy, TreeWalker};

/// Callback for progress updates during a crawl.
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Walks the catalog hierarchy: brands, then models, then submodels, then
/// the category tree behind each submodel.
///
/// One shared page does all the navigation; only detail fetches get their
/// own isolated sessions. The deeper a level sits, the softer its failures:
/// a brand that will not enumerate is an error, a submodel page that will
/// not open is a warning and a partial record.
pub struct CatalogCrawler {
    browser: Arc<dyn Browser>,
    doc: Box<dyn Document>,
    selectors: SiteSelectors,
    settle: SettlePolicy,
    detail_workers: usize,
    detail_timeout: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl CatalogCrawler {
    pub fn new(browser: Arc<dyn Browser>, doc: Box<dyn Document>) -> Self {
        Self {
            browser,
            doc,
            selectors: SiteSelectors::default(),
            settle: SettlePolicy::default(),
            detail_workers: 8,
            detail_timeout: Duration::from_secs(20),
            progress_callback: None,
        }
    }

    pub fn with_selectors(mut self, selectors: SiteSelectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_detail_workers(mut self, workers: usize) -> Self {
        self.detail_workers = workers.max(1);
        self
    }

    pub fn with_detail_timeout(mut self, timeout: Duration) -> Self {
        self.detail_timeout = timeout;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Every brand on the catalog landing page, in page order.
    pub async fn brands(&self, catalog_url: &str) -> Result<Vec<NamedLink>> {
        self.doc.navigate(catalog_url).await?;
        let html = self.doc.html().await?;
        let base = parse_url(catalog_url)?;
        let brands = extract_links(&html, &self.selectors.brand_link, &base)?;
        info!("found {} brands", brands.len());
        Ok(brands)
    }

    /// Crawl one brand top to bottom.
    pub async fn crawl_brand(&self, brand: &NamedLink) -> Result<BrandRecord> {
        let mut record = BrandRecord::new(&brand.link);
        let models = self.models(&brand.link).await?;
        info!("brand '{}' has {} models", brand.name, models.len());

        for model in models {
            self.progress(format!("{} / {}", brand.name, model.name));
            let mut model_record = ModelRecord::new(&model.link);
            match self.submodels(&model.link).await {
                Ok(submodels) => {
                    for submodel in submodels {
                        let crawled = self.crawl_submodel(submodel).await;
                        model_record.submodels.push(crawled);
                    }
                }
                Err(e) => warn!("could not list submodels of '{}': {}", model.name, e),
            }
            record.models.insert(model.name, model_record);
        }
        Ok(record)
    }

    async fn models(&self, brand_url: &str) -> Result<Vec<NamedLink>> {
        self.doc.navigate(brand_url).await?;
        let html = self.doc.html().await?;
        let base = parse_url(brand_url)?;
        extract_links(&html, &self.selectors.model_link, &base)
    }

    async fn submodels(&self, model_url: &str) -> Result<Vec<SubmodelRecord>> {
        self.doc.navigate(model_url).await?;
        let html = self.doc.html().await?;
        let base = parse_url(model_url)?;
        extract_submodels(&html, &self.selectors, &base)
    }

    /// Walk the category tree behind one submodel row. Rows that cannot be
    /// opened keep whatever fields they came with and an empty tree.
    async fn crawl_submodel(&self, mut submodel: SubmodelRecord) -> SubmodelRecord {
        if submodel.link.is_empty() {
            warn!("submodel row has no link, keeping its fields only");
            return submodel;
        }
        let page_url = match Url::parse(&submodel.link) {
            Ok(url) => url,
            Err(e) => {
                warn!("submodel link '{}' is not a URL: {}", submodel.link, e);
                return submodel;
            }
        };
        self.progress(format!("catalog {}", submodel.link));
        if let Err(e) = self.doc.navigate(&submodel.link).await {
            warn!("could not open submodel page {}: {}", submodel.link, e);
            return submodel;
        }

        let fetcher = DetailFetcher::new(Arc::clone(&self.browser), self.selectors.clone())
            .with_timeout(self.detail_timeout);
        let walker = TreeWalker::new(&*self.doc, &fetcher, &self.selectors, page_url)
            .with_settle(self.settle)
            .with_detail_workers(self.detail_workers);
        match walker.walk_page().await {
            Ok(parts) => submodel.parts = parts,
            Err(e) => warn!("could not walk category tree at {}: {}", submodel.link, e),
        }
        submodel
    }

    fn progress(&self, message: String) {
        if let Some(callback) = &self.progress_callback {
            callback(message);
        }
    }
}

/// Resolve an href against the page it came from. Fragment-only and
/// non-navigational links resolve to nothing.
pub fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| CrawlError::InvalidUrl(format!("{url}: {e}")))
}

/// Named anchors matching `selector`, hrefs resolved against `base`.
fn extract_links(html: &str, selector: &str, base: &Url) -> Result<Vec<NamedLink>> {
    let document = Html::parse_document(html);
    let anchor = selectors::parse(selector)?;

    let mut links = Vec::new();
    for element in document.select(&anchor) {
        let name = selectors::element_text(&element);
        if let Some(href) = element.value().attr("href")
            && let Some(link) = resolve_link(base, href)
        {
            links.push(NamedLink::new(name, link));
        }
    }
    Ok(links)
}

/// One record per submodel row. Label/value cells become fields; the row's
/// link comes from the anchor wrapped around its arrow icon. A row without
/// the icon keeps an empty link rather than being dropped.
fn extract_submodels(
    html: &str,
    selectors: &SiteSelectors,
    base: &Url,
) -> Result<Vec<SubmodelRecord>> {
    let document = Html::parse_document(html);
    let row = selectors::parse(&selectors.submodel_row)?;
    let item = selectors::parse(&selectors.submodel_item)?;
    let title = selectors::parse(&selectors.submodel_item_title)?;
    let value = selectors::parse(&selectors.submodel_item_value)?;
    let marker = selectors::parse(&selectors.submodel_link_marker)?;

    let mut submodels = Vec::new();
    for element in document.select(&row) {
        let link = submodel_link(&element, &marker, base).unwrap_or_default();
        let mut record = SubmodelRecord::new(link);
        for cell in element.select(&item) {
            let Some(label) = cell.select(&title).next() else {
                continue;
            };
            let label = selectors::element_text(&label);
            let text = cell
                .select(&value)
                .next()
                .map(|v| selectors::element_text(&v))
                .unwrap_or_default();
            record.fields.insert(label, text);
        }
        submodels.push(record);
    }
    Ok(submodels)
}

/// The arrow icon itself is not the anchor; climb until an ancestor carries
/// an href.
fn submodel_link(row: &ElementRef, marker: &Selector, base: &Url) -> Option<String> {
    let icon = row.select(marker).next()?;
    let mut current = icon.parent();
    while let Some(node) = current {
        if let Some(element) = ElementRef::wrap(node)
            && let Some(href) = element.value().attr("href")
        {
            return resolve_link(base, href);
        }
        current = node.parent();
    }
    None
}
