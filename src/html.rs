//! Minimal tree-query capability used by the extractors.
//!
//! The link and record extractors are written against [`TreeNode`] so they do
//! not depend on a particular HTML parser. [`Document`] is the `scraper`-backed
//! implementation used in production.

use scraper::{ElementRef, Html, Selector};

use crate::error::{HarvestError, Result};
use crate::text::collapse_whitespace;

/// Query primitives an element of a parsed document must support.
pub trait TreeNode: Sized + Clone {
    /// Lowercase tag name (`"div"`, `"a"`, ...).
    fn tag(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    fn has_class(&self, class: &str) -> bool;

    /// Element ancestors, nearest first.
    fn ancestors(&self) -> Vec<Self>;

    /// Following sibling elements, nearest first.
    fn next_element_siblings(&self) -> Vec<Self>;

    /// Descendants matching a CSS selector, in document order.
    fn select(&self, css: &str) -> Result<Vec<Self>>;

    /// Concatenated descendant text, whitespace collapsed.
    fn text(&self) -> String;

    fn select_first(&self, css: &str) -> Result<Option<Self>> {
        Ok(self.select(css)?.into_iter().next())
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(format!("invalid selector '{}': {}", css, e)))
}

// `ElementRef` has inherent `select` and `text` with other signatures, so calls
// on a concrete `ElementRef` must go through `TreeNode::` explicitly.
impl<'a> TreeNode for ElementRef<'a> {
    fn tag(&self) -> String {
        self.value().name().to_ascii_lowercase()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.value().attr(name).map(str::to_string)
    }

    fn has_class(&self, class: &str) -> bool {
        self.value().classes().any(|c| c == class)
    }

    fn ancestors(&self) -> Vec<Self> {
        (**self).ancestors().filter_map(ElementRef::wrap).collect()
    }

    fn next_element_siblings(&self) -> Vec<Self> {
        (**self).next_siblings().filter_map(ElementRef::wrap).collect()
    }

    fn select(&self, css: &str) -> Result<Vec<Self>> {
        let selector = parse_selector(css)?;
        Ok(ElementRef::select(self, &selector).collect())
    }

    fn text(&self) -> String {
        collapse_whitespace(&ElementRef::text(self).collect::<String>())
    }
}

/// A parsed HTML document.
///
/// `scraper::Html` is not `Send`, so a `Document` must be built, queried and
/// dropped without crossing an `.await`.
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// The `<html>` element; the entry point for queries.
    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="ui grid">
            <div class="four wide column"><p id="side">lateral</p></div>
          </div>
          <dl class="dados"><dt>Processo</dt><dd> 00005/25 </dd><dt>Situação</dt><dd>PARA
             PARECER</dd></dl>
        </body></html>
    "#;

    #[test]
    fn test_ancestors_nearest_first() {
        let doc = Document::parse(PAGE);
        let side = doc.root().select_first("#side").unwrap().unwrap();
        let ancestors = TreeNode::ancestors(&side);
        assert_eq!(ancestors[0].tag(), "div");
        assert!(ancestors[0].has_class("four"));
        assert!(ancestors[0].has_class("wide"));
        assert!(ancestors[1].has_class("grid"));
        assert_eq!(ancestors.last().unwrap().tag(), "html");
    }

    #[test]
    fn test_siblings_and_text() {
        let doc = Document::parse(PAGE);
        let dts = TreeNode::select(&doc.root(), "dl.dados dt").unwrap();
        assert_eq!(dts.len(), 2);
        let dd = dts[1]
            .next_element_siblings()
            .into_iter()
            .find(|n| n.tag() == "dd")
            .unwrap();
        assert_eq!(TreeNode::text(&dd), "PARA PARECER");
    }

    #[test]
    fn test_invalid_selector_is_parse_error() {
        let doc = Document::parse(PAGE);
        let err = TreeNode::select(&doc.root(), "dl[[").unwrap_err();
        assert!(matches!(err, HarvestError::Parse(_)));
    }
}
