pub mod browser;
pub mod cdp;
pub mod chrome;
pub mod detail;
pub mod error;
pub mod hierarchy;
pub mod record;
pub mod selectors;
pub mod walker;

#[cfg(test)]
pub(crate) mod testdom;

pub use browser::{Browser, Document, IsolatedSession, NodeRef, QueryScope};
pub use chrome::{ChromeBrowser, ChromePage, PageProfile};
pub use detail::DetailFetcher;
pub use error::CrawlError;
pub use hierarchy::{CatalogCrawler, ProgressCallback};
pub use record::{
    BrandRecord, CategoryNode, ModelRecord, NamedLink, PartDetail, PartLink, PartParameter,
    SubmodelRecord,
};
pub use selectors::SiteSelectors;
pub use walker::{SettlePolicy, TreeWalker};
