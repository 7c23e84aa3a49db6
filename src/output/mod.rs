pub mod formatter;

pub use formatter::Formatter;

use crate::api::types::ScrapedRecord;
use crate::cli::OutputFormat;
use crate::error::Result;

/// Format stored records based on the specified format
pub fn format_records(records: &[ScrapedRecord], format: OutputFormat) -> Result<String> {
    Formatter::new(format).format_records(records)
}
