use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use url::Url;

use super::deserializers::u64_from_string_or_number;
use crate::error::{HarvestError, Result};
use crate::text::{collapse_whitespace, slugify_with};

static AUTHOR_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:,|;|\s+e\s+)\s*").expect("invalid regex: author separators"));

static AUTHOR_PARTY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*\(([^)]+)\)\s*$").expect("invalid regex: author party"));

/// Canonical URL of one bill, `.../processos/{id}`.
///
/// The trailing path segment is the external identifier and is validated on
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordUrl {
    url: Url,
    id: u64,
}

impl RecordUrl {
    pub fn parse(s: &str) -> Result<Self> {
        let url = Url::parse(s).map_err(|e| HarvestError::InvalidRecordUrl(format!("{}: {}", s, e)))?;
        Self::from_url(url)
    }

    /// Resolve a (possibly relative) link against the site base.
    pub fn join(base: &Url, href: &str) -> Result<Self> {
        let url = base
            .join(href)
            .map_err(|e| HarvestError::InvalidRecordUrl(format!("{}: {}", href, e)))?;
        Self::from_url(url)
    }

    pub fn from_url(url: Url) -> Result<Self> {
        let id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .and_then(|last| last.parse::<u64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                HarvestError::InvalidRecordUrl(format!("{} has no numeric trailing segment", url))
            })?;
        Ok(Self { url, id })
    }

    /// External identifier taken from the trailing path segment.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for RecordUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl TryFrom<String> for RecordUrl {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RecordUrl> for String {
    fn from(value: RecordUrl) -> Self {
        value.url.into()
    }
}

/// A record link seen on a result page, before category filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub url: RecordUrl,
    /// Heading text as displayed, whitespace collapsed.
    pub title: String,
}

/// Fixed search filters sent with every result-page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilters {
    /// Bill type, e.g. `PLL`. Also the marker a result heading must contain.
    pub category: String,
    /// Progress filter; `todos` means every status.
    pub status: String,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            category: "PLL".to_string(),
            status: "todos".to_string(),
        }
    }
}

impl SearchFilters {
    /// Query parameters for one page, including the cache-busting `_` stamp.
    pub fn query_params(&self, page: u32, timestamp_ms: i64) -> Vec<(&'static str, String)> {
        vec![
            ("utf8", "✓".to_string()),
            ("busca", String::new()),
            ("tipo", self.category.clone()),
            ("autor", String::new()),
            ("andamento", self.status.clone()),
            ("aprovados_em", String::new()),
            ("button", String::new()),
            ("page", page.to_string()),
            ("_", timestamp_ms.to_string()),
        ]
    }
}

/// Well-known metadata keys, as produced by slugging the site's labels.
pub mod keys {
    pub const PROCESSO: &str = "processo";
    pub const PROJETO: &str = "projeto";
    pub const EMENTA: &str = "ementa";
    pub const DATA_ABERTURA: &str = "data_abertura";
    pub const SITUACAO: &str = "situacao";
    pub const SITUACAO_PLENARIA: &str = "situacao_plenaria";
    pub const ULTIMA_TRAMITACAO: &str = "ultima_tramitacao";
    pub const LOCALIZACAO_ATUAL: &str = "localizacao_atual";
    pub const AUTOR: &str = "autor";
    pub const AUTORES: &str = "autores";
}

/// Schema-on-read metadata of one record: slugged label -> raw value.
///
/// No key is guaranteed to be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordMetadata(BTreeMap<String, String>);

impl RecordMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later values for the same key replace earlier ones.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn processing_number(&self) -> Option<&str> {
        self.get(keys::PROCESSO)
    }

    pub fn status(&self) -> Option<&str> {
        self.get(keys::SITUACAO)
    }

    pub fn plenary_status(&self) -> Option<&str> {
        self.get(keys::SITUACAO_PLENARIA)
    }

    pub fn opening_date(&self) -> Option<NaiveDate> {
        self.get(keys::DATA_ABERTURA).and_then(parse_br_date)
    }

    pub fn last_movement_date(&self) -> Option<NaiveDate> {
        self.get(keys::ULTIMA_TRAMITACAO).and_then(parse_br_date)
    }

    /// Authors listed under `autor` or `autores`, in display order.
    pub fn authors(&self) -> Vec<Author> {
        self.get(keys::AUTORES)
            .or_else(|| self.get(keys::AUTOR))
            .map(parse_authors)
            .unwrap_or_default()
    }
}

impl FromIterator<(String, String)> for RecordMetadata {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse `dd/mm/yyyy` (optionally followed by a time) or ISO `yyyy-mm-dd`.
pub fn parse_br_date(value: &str) -> Option<NaiveDate> {
    let first = value.split_whitespace().next()?;
    NaiveDate::parse_from_str(first, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(first, "%Y-%m-%d"))
        .ok()
}

/// A council member credited on a bill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub party: Option<String>,
    /// `grazi-oliveira`
    pub slug: String,
}

/// Split an author field such as `"Grazi Oliveira (PSOL), Roberto Robaina (PSOL)"`.
pub fn parse_authors(value: &str) -> Vec<Author> {
    AUTHOR_SEPARATORS
        .split(value)
        .map(collapse_whitespace)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, party) = match AUTHOR_PARTY.captures(&entry) {
                Some(caps) => (caps[1].to_string(), Some(caps[2].trim().to_string())),
                None => (entry.clone(), None),
            };
            Author {
                slug: slugify_with(&name, '-'),
                name,
                party,
            }
        })
        .filter(|a| !a.slug.is_empty())
        .collect()
}

/// A document attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedFile {
    /// Link text as displayed on the record page.
    pub name: String,
    pub remote_url: String,
    /// Set once the file is on disk.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
}

/// One harvested bill.
///
/// Field names match the snapshot files written by earlier harvesters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub url: RecordUrl,
    #[serde(rename = "id", deserialize_with = "u64_from_string_or_number")]
    pub external_id: u64,
    #[serde(default)]
    pub metadata: RecordMetadata,
    #[serde(rename = "has_votacoes", default)]
    pub has_votes: bool,
    #[serde(rename = "has_tramitacoes", default)]
    pub has_history: bool,
    #[serde(default)]
    pub files: Vec<AttachedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraped_at: Option<DateTime<Utc>>,
}
