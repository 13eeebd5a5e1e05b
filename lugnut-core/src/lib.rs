pub mod crawl;
pub mod report;
pub mod store;

pub use crawl::{BrandOutcome, CrawlOptions, CrawlSummary, execute_crawl};
pub use report::{BrandStats, ReportData, ReportFormat};
pub use store::{ResultStore, StoreError};
