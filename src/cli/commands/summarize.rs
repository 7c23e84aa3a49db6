use log::{error, info};
use std::path::{Path, PathBuf};

use crate::api::GeminiClient;
use crate::cli::args::SummarizeArgs;
use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::{HarvestError, Result};
use crate::output::Formatter;
use crate::progress::{messages, ProgressManager};
use crate::summary::{BillSummary, Summarizer};

/// Execute summarize command
pub async fn execute(args: SummarizeArgs, format: OutputFormat, quiet: bool, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let api_key = config.summary_api_key().ok_or(HarvestError::NoApiKey)?;
    let model = args.model.unwrap_or_else(|| config.summary.model.clone());
    let client = GeminiClient::new(
        api_key,
        model,
        config.summary.base_url.clone(),
        config.summary.timeout_secs.max(1),
    )?;

    let progress = ProgressManager::new(quiet, verbose);
    let formatter = Formatter::new(format);
    let mut written = 0;
    let mut failed = 0;

    for input in &args.inputs {
        let spinner = progress.spinner(messages::SUMMARIZING);
        let outcome = summarize_file(&client, input, args.out.as_deref()).await;
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match outcome {
            Ok((path, summary)) => {
                info!("Summary for {} written to {}", input.display(), path.display());
                println!("{}", formatter.format_bill_summary(&summary)?);
                written += 1;
            }
            Err(e) => {
                error!("Failed to summarize {}: {}", input.display(), e);
                failed += 1;
            }
        }
    }

    progress.show_message(&messages::summarized(written));
    if failed > 0 {
        return Err(HarvestError::Other(format!(
            "{} of {} summaries failed",
            failed,
            args.inputs.len()
        )));
    }
    Ok(())
}

/// Where the summary of `input` is written.
pub fn summary_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bill".to_string());
    let dir = match out_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    dir.join(format!("{}.summary.json", stem))
}

/// Summarize one text file and write the JSON result next to it (or into `out_dir`).
pub async fn summarize_file(
    summarizer: &dyn Summarizer,
    input: &Path,
    out_dir: Option<&Path>,
) -> Result<(PathBuf, BillSummary)> {
    let text = tokio::fs::read_to_string(input).await?;
    let summary = summarizer.summarize(&text).await?;

    let path = summary_path(input, out_dir);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(&path, serde_json::to_vec_pretty(&summary)?).await?;

    Ok((path, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Canned;

    #[async_trait]
    impl Summarizer for Canned {
        async fn summarize(&self, text: &str) -> Result<BillSummary> {
            Ok(BillSummary {
                titulo: "Projeto".to_string(),
                resumo: format!("{} caracteres", text.chars().count()),
                mudancas: vec![],
                justificativas: vec![],
                categorias: vec![],
            })
        }
    }

    #[test]
    fn test_summary_path() {
        assert_eq!(
            summary_path(Path::new("texts/pll-12.txt"), None),
            PathBuf::from("texts/pll-12.summary.json")
        );
        assert_eq!(
            summary_path(Path::new("texts/pll-12.txt"), Some(Path::new("out"))),
            PathBuf::from("out/pll-12.summary.json")
        );
    }

    #[tokio::test]
    async fn test_summarize_file_writes_json() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bill.txt");
        std::fs::write(&input, "Dispõe sobre").unwrap();
        let out = dir.path().join("summaries");

        let (path, summary) = summarize_file(&Canned, &input, Some(&out)).await.unwrap();

        assert_eq!(path, out.join("bill.summary.json"));
        assert_eq!(summary.resumo, "12 caracteres");
        let stored: BillSummary = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, summary);
    }

    #[tokio::test]
    async fn test_missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = summarize_file(&Canned, &dir.path().join("absent.txt"), None).await;
        assert!(matches!(result, Err(HarvestError::Io(_))));
    }
}
