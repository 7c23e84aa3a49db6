pub mod config;
pub mod crawl;
pub mod list;
pub mod summarize;
pub mod version;
