pub mod api;
pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod html;
pub mod output;
pub mod progress;
pub mod store;
pub mod summary;
pub mod text;
