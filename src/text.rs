//! Text normalization helpers shared by the crawler.
//!
//! Everything here is a pure function over `&str`.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Literal replacements that undo the escaping the council site applies when it
/// answers an XHR search with a `$("...").html("...")` script instead of markup.
///
/// Order matters: quotes and control escapes first, numeric brackets last.
const SCRIPT_ESCAPES: &[(&str, &str)] = &[
    ("\\'", "'"),
    ("\\\"", "\""),
    ("\\n", "\n"),
    ("\\r", ""),
    ("\\/", "/"),
    ("\\u003c", "<"),
    ("\\u003e", ">"),
];

static FILENAME_FORBIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("invalid regex: filename characters"));

/// Tolerant cleanup of a JS-templated HTML fragment.
///
/// This is lossy and not a general unescaper: a literal `\n` in real markup
/// becomes a newline. Only call it when [`looks_scripted`] says so.
pub fn clean(text: &str) -> String {
    SCRIPT_ESCAPES
        .iter()
        .fold(text.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Whether a response body is script output that needs [`clean`].
pub fn looks_scripted(content_type: &str, body: &str) -> bool {
    content_type.contains("javascript") || body.contains("$(")
}

/// Turn a human label into a snake_case key.
///
/// `"Situação Plenária"` -> `"situacao_plenaria"`. Already-slugged input is a
/// fixed point.
pub fn slugify(label: &str) -> String {
    slugify_with(label, '_')
}

/// [`slugify`] with a custom separator.
pub fn slugify_with(label: &str, separator: char) -> String {
    let ascii: String = label
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_ascii_lowercase();

    let mut slug = String::with_capacity(ascii.len());
    let mut pending_separator = false;
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(separator);
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Make a document link's display text safe to use as a file name.
///
/// Always ends in `.pdf`.
pub fn sanitize_filename(display: &str) -> String {
    let stripped = FILENAME_FORBIDDEN.replace_all(display, "");
    let mut name = stripped.trim().to_string();
    if name.is_empty() {
        name = "documento".to_string();
    }
    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}
