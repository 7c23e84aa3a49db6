//! Result-page scanning: which entries on a search page point at new bills.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::api::types::{CandidateLink, RecordUrl};
use crate::error::Result;
use crate::html::{Document, TreeNode};

static RECORD_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/processos/\d+$").expect("invalid regex: record href"));

const ENTRY_SELECTOR: &str = "article.item";
const HEADING_SELECTOR: &str = "h2.header";

/// What one result page contained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    /// Raw `article.item` count, sidebar entries included. Zero means the
    /// result set is exhausted.
    pub entry_count: usize,
    pub sidebar_skipped: usize,
    /// Entries whose heading did not carry the category marker.
    pub off_category: usize,
    /// Links that passed every filter, in page order.
    pub links: Vec<CandidateLink>,
}

impl PageScan {
    pub fn is_exhausted(&self) -> bool {
        self.entry_count == 0
    }
}

/// True when the entry sits inside the `four wide` sidebar column.
pub fn in_sidebar<N: TreeNode>(entry: &N) -> bool {
    entry
        .ancestors()
        .iter()
        .any(|a| a.tag() == "div" && a.has_class("four") && a.has_class("wide"))
}

/// Heading text and record link of one entry, before the category filter.
pub fn candidate_from_entry<N: TreeNode>(entry: &N, base: &Url) -> Result<Option<CandidateLink>> {
    let Some(heading) = entry.select_first(HEADING_SELECTOR)? else {
        return Ok(None);
    };

    let href = heading
        .select("a[href]")?
        .into_iter()
        .filter_map(|a| a.attr("href"))
        .find(|href| RECORD_HREF.is_match(href.trim()));

    let Some(href) = href else {
        return Ok(None);
    };

    match RecordUrl::join(base, href.trim()) {
        Ok(url) => Ok(Some(CandidateLink {
            url,
            title: heading.text(),
        })),
        Err(e) => {
            debug!("Skipping unresolvable link {}: {}", href, e);
            Ok(None)
        }
    }
}

/// Case-insensitive check that a heading names the wanted category.
pub fn matches_category(title: &str, marker: &str) -> bool {
    title.to_uppercase().contains(&marker.to_uppercase())
}

/// Scan a parsed tree for result entries.
pub fn scan<N: TreeNode>(root: &N, base: &Url, marker: &str) -> Result<PageScan> {
    let entries = root.select(ENTRY_SELECTOR)?;
    let mut scan = PageScan {
        entry_count: entries.len(),
        ..Default::default()
    };

    for entry in &entries {
        if in_sidebar(entry) {
            scan.sidebar_skipped += 1;
            continue;
        }

        let Some(candidate) = candidate_from_entry(entry, base)? else {
            continue;
        };

        if !matches_category(&candidate.title, marker) {
            scan.off_category += 1;
            continue;
        }

        if !scan.links.iter().any(|l| l.url == candidate.url) {
            scan.links.push(candidate);
        }
    }

    Ok(scan)
}

/// Parse a result page body and scan it.
pub fn scan_page(body: &str, base: &Url, marker: &str) -> Result<PageScan> {
    let document = Document::parse(body);
    scan(&document.root(), base, marker)
}
