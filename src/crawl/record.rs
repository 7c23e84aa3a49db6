//! Record detail pages: metadata, section flags and attached documents.

use chrono::Utc;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

use crate::api::client::CouncilSource;
use crate::api::types::{AttachedFile, RecordMetadata, RecordUrl, ScrapedRecord};
use crate::error::Result;
use crate::html::{Document, TreeNode};
use crate::text::{sanitize_filename, slugify};

static PDF_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.pdf").expect("invalid regex: pdf href"));

const DADOS_TAB: &str = r#"div[data-tab="dados"]"#;
const VOTES_TAB: &str = r#"div[data-tab="votacoes"]"#;
const HISTORY_TAB: &str = r#"div[data-tab="tramitacoes"]"#;
const DOCUMENTS_TAB: &str = r#"div[data-tab="documentos"]"#;

/// A document link found on a record page, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub name: String,
    pub url: String,
}

/// Everything read from one record page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub metadata: RecordMetadata,
    pub has_votes: bool,
    pub has_history: bool,
    pub documents: Vec<DocumentLink>,
}

/// Label/value pairs of the `dados` tab.
///
/// Each `dt` is paired with the next `dd` sibling. Missing tab or missing
/// `dd` simply yields fewer keys.
pub fn extract_metadata<N: TreeNode>(root: &N) -> Result<RecordMetadata> {
    let mut metadata = RecordMetadata::new();
    let Some(container) = root.select_first(DADOS_TAB)? else {
        return Ok(metadata);
    };

    for dt in container.select("dl.dados dt")? {
        let key = slugify(&dt.text());
        if key.is_empty() {
            continue;
        }
        if let Some(dd) = dt.next_element_siblings().into_iter().find(|s| s.tag() == "dd") {
            metadata.insert(key, dd.text());
        }
    }

    Ok(metadata)
}

/// PDF links of the `documentos` tab, resolved against `base`.
pub fn document_links<N: TreeNode>(root: &N, base: &Url) -> Result<Vec<DocumentLink>> {
    let Some(container) = root.select_first(DOCUMENTS_TAB)? else {
        return Ok(Vec::new());
    };

    let mut links = Vec::new();
    for anchor in container.select("a[href]")? {
        let Some(href) = anchor.attr("href") else { continue };
        if !PDF_HREF.is_match(&href) {
            continue;
        }
        let url = match base.join(href.trim()) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping document link {}: {}", href, e);
                continue;
            }
        };
        let name = anchor.text();
        links.push(DocumentLink {
            name: if name.is_empty() { "document".to_string() } else { name },
            url: url.to_string(),
        });
    }
    Ok(links)
}

pub fn parse_record<N: TreeNode>(root: &N, base: &Url) -> Result<ParsedRecord> {
    Ok(ParsedRecord {
        metadata: extract_metadata(root)?,
        has_votes: root.select_first(VOTES_TAB)?.is_some(),
        has_history: root.select_first(HISTORY_TAB)?.is_some(),
        documents: document_links(root, base)?,
    })
}

pub fn parse_record_page(body: &str, base: &Url) -> Result<ParsedRecord> {
    let document = Document::parse(body);
    parse_record(&document.root(), base)
}

/// Where a record's documents live on disk.
pub fn record_dir(documents_dir: &Path, external_id: u64) -> PathBuf {
    documents_dir.join(external_id.to_string())
}

/// Bring each document to `{documents_dir}/{id}/`, skipping files already there.
///
/// A failed transfer is logged and leaves `local_path` empty; it never fails
/// the record.
pub async fn fetch_documents<S>(
    source: &S,
    links: &[DocumentLink],
    documents_dir: &Path,
    external_id: u64,
) -> Result<Vec<AttachedFile>>
where
    S: CouncilSource + ?Sized,
{
    if links.is_empty() {
        return Ok(Vec::new());
    }

    let dir = record_dir(documents_dir, external_id);
    tokio::fs::create_dir_all(&dir).await?;

    let mut files = Vec::with_capacity(links.len());
    for link in links {
        let dest = dir.join(sanitize_filename(&link.name));

        let local_path = if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("Already on disk: {}", dest.display());
            Some(dest)
        } else {
            match source.download(&link.url, &dest).await {
                Ok(bytes) => {
                    info!("Downloaded {} ({} bytes)", dest.display(), bytes);
                    Some(dest)
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", link.url, e);
                    None
                }
            }
        };

        files.push(AttachedFile {
            name: link.name.clone(),
            remote_url: link.url.clone(),
            local_path,
        });
    }

    Ok(files)
}

/// Options for building a record from its page.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub download_documents: bool,
    pub documents_dir: PathBuf,
}

/// Fetch, parse and (optionally) download the documents of one record.
pub async fn extract_record<S>(source: &S, url: &RecordUrl, options: &ExtractOptions) -> Result<ScrapedRecord>
where
    S: CouncilSource + ?Sized,
{
    let body = source.fetch_record_page(url).await?;
    let parsed = parse_record_page(&body, source.base_url())?;

    let files = if options.download_documents {
        fetch_documents(source, &parsed.documents, &options.documents_dir, url.id()).await?
    } else {
        Vec::new()
    };

    Ok(ScrapedRecord {
        url: url.clone(),
        external_id: url.id(),
        metadata: parsed.metadata,
        has_votes: parsed.has_votes,
        has_history: parsed.has_history,
        files,
        scraped_at: Some(Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::keys;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("https://www.camarapoa.rs.gov.br").unwrap()
    }

    const RECORD: &str = r#"
        <div class="ui tab" data-tab="dados">
          <dl class="dados">
            <dt>Processo</dt><dd>00005/25</dd>
            <dt>Data Abertura</dt><dd> 11/11/2025 </dd>
            <dt>Situação Plenária</dt><dd>EM
                TRAMITAÇÃO</dd>
            <dt>Sem valor</dt>
          </dl>
        </div>
        <div class="ui tab" data-tab="tramitacoes"></div>
        <div class="ui tab" data-tab="documentos">
          <a href="/processos/140595/documentos/1.pdf">Projeto: Texto Original</a>
          <a href="https://outro.host/anexo.PDF?download=1"></a>
          <a href="/processos/140595/documentos/2.docx">Parecer</a>
        </div>
    "#;

    #[test]
    fn test_dados_metadata() {
        let parsed = parse_record_page(RECORD, &base()).unwrap();
        assert_eq!(parsed.metadata.get(keys::PROCESSO), Some("00005/25"));
        assert_eq!(parsed.metadata.get(keys::DATA_ABERTURA), Some("11/11/2025"));
        assert_eq!(parsed.metadata.get(keys::SITUACAO_PLENARIA), Some("EM TRAMITAÇÃO"));
        assert_eq!(parsed.metadata.len(), 3);
    }

    #[test]
    fn test_metadata_has_exactly_the_listed_pairs() {
        let document = Document::parse(
            r#"<div data-tab="dados"><dl class="dados">
                <dt>Processo</dt><dd>00005/25</dd>
                <dt>Situação</dt><dd>PARA PARECER</dd>
            </dl></div>"#,
        );
        let metadata = extract_metadata(&document.root()).unwrap();

        let mut expected = RecordMetadata::new();
        expected.insert("processo", "00005/25");
        expected.insert("situacao", "PARA PARECER");
        assert_eq!(metadata, expected);
    }

    #[test]
    fn test_section_flags() {
        let parsed = parse_record_page(RECORD, &base()).unwrap();
        assert!(!parsed.has_votes);
        assert!(parsed.has_history);
    }

    #[test]
    fn test_document_links() {
        let parsed = parse_record_page(RECORD, &base()).unwrap();
        assert_eq!(
            parsed.documents,
            vec![
                DocumentLink {
                    name: "Projeto: Texto Original".to_string(),
                    url: "https://www.camarapoa.rs.gov.br/processos/140595/documentos/1.pdf".to_string(),
                },
                DocumentLink {
                    name: "document".to_string(),
                    url: "https://outro.host/anexo.PDF?download=1".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_page_without_tabs() {
        let parsed = parse_record_page("<html><body><h1>Erro</h1></body></html>", &base()).unwrap();
        assert_eq!(parsed, ParsedRecord::default());
    }

    #[test]
    fn test_record_dir() {
        assert_eq!(
            record_dir(Path::new("data/pdfs"), 140595),
            PathBuf::from("data/pdfs/140595")
        );
    }
}
