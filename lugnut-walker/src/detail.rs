use std::sync::Arc;
use std::time::Duration;

use scraper::Html;
use tracing::warn;

use crate::browser::{Browser, Document};
use crate::error::{CrawlError, Result};
use crate::record::{PartDetail, PartParameter};
use crate::selectors::{self, SiteSelectors};

/// Fetches part detail pages, one fresh isolated session per page.
///
/// Every fetch gets its own cookies and storage and both are discarded when
/// the session closes, whether the fetch worked or not. There is no retry;
/// the caller decides what a missing result means.
pub struct DetailFetcher {
    browser: Arc<dyn Browser>,
    selectors: SiteSelectors,
    timeout: Duration,
}

impl DetailFetcher {
    pub fn new(browser: Arc<dyn Browser>, selectors: SiteSelectors) -> Self {
        Self {
            browser,
            selectors,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fetch one part page and return its offer blocks.
    pub async fn fetch(&self, url: &str) -> Result<Vec<PartDetail>> {
        let session = self.browser.isolated_session().await?;
        let outcome = tokio::time::timeout(self.timeout, self.extract(&*session, url)).await;

        // The session comes down on every path, slow fetches included.
        if let Err(e) = session.close().await {
            warn!("could not close detail session for {}: {}", url, e);
        }

        match outcome {
            Ok(details) => details,
            Err(_) => Err(CrawlError::Timeout(format!(
                "detail fetch for {url} exceeded {:?}",
                self.timeout
            ))),
        }
    }

    async fn extract<D: Document + ?Sized>(&self, doc: &D, url: &str) -> Result<Vec<PartDetail>> {
        doc.navigate(url).await?;
        let html = doc.html().await?;
        parse_details(&html, &self.selectors)
    }
}

/// Pull every offer block out of a part page's markup. Missing name or
/// parameter cells come back as explicit `None`s.
pub fn parse_details(html: &str, selectors: &SiteSelectors) -> Result<Vec<PartDetail>> {
    let document = Html::parse_document(html);
    let block = selectors::parse(&selectors.detail_block)?;
    let name = selectors::parse(&selectors.detail_name)?;
    let parameter = selectors::parse(&selectors.parameter_item)?;
    let key = selectors::parse(&selectors.parameter_key)?;
    let value = selectors::parse(&selectors.parameter_value)?;

    let mut details = Vec::new();
    for element in document.select(&block) {
        let detail_name = element
            .select(&name)
            .next()
            .map(|n| selectors::element_text(&n));

        let mut parameters = Vec::new();
        for item in element.select(&parameter) {
            parameters.push(PartParameter {
                key: item
                    .select(&key)
                    .next()
                    .map(|k| selectors::element_text(&k)),
                value: item
                    .select(&value)
                    .next()
                    .map(|v| selectors::element_text(&v)),
            });
        }

        details.push(PartDetail {
            name: detail_name,
            parameters,
        });
    }
    Ok(details)
}
