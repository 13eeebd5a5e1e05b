// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    emit_report,
    expand_out_dir,
    load_selectors,
    render_report,
};

// Re-export crawl functionality from lugnut-core
pub use lugnut_core::crawl::{
    CrawlOptions, CrawlProgressCallback, execute_crawl,
};
pub use lugnut_core::report::ReportFormat;
