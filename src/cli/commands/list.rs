use crate::cli::args::ListArgs;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::Result;
use crate::output::format_records;
use crate::store::{open_store, RecordStore};

/// Execute list command
pub async fn execute(args: ListArgs, format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(backend) = args.backend {
        config.storage.backend = backend;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = dir;
    }

    let path = config.storage.store_path();
    if !path.exists() {
        println!("No records stored yet at {}", path.display());
        return Ok(());
    }

    let store = open_store(config.storage.backend, &path, config.storage.flush_every).await?;
    let mut records = store.records().await?;
    // newest bills first
    records.sort_by(|a, b| b.external_id.cmp(&a.external_id));
    if let Some(limit) = args.limit {
        records.truncate(limit);
    }

    println!("{}", format_records(&records, format)?);
    Ok(())
}
