//! HTML parser for extracting the title and outbound links
//!
//! Malformed HTML never fails: scraper recovers what it can, and anything it
//! cannot make sense of simply yields an empty title or fewer links.

use crate::url::{is_valid, normalize};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Trimmed text of the first `<title>`, empty if there is none
    pub title: String,

    /// Normalized, crawlable links in document order, without duplicates
    pub links: Vec<String>,
}

/// Parses HTML content and extracts the title and links
///
/// # Link Extraction Rules
///
/// - `href` of every `<a>` and `<link>` element
/// - Resolved against `base_url` (the final URL after redirects)
/// - Kept only if [`is_valid`] accepts it (no domain scope applied here)
/// - Normalized and deduplicated, first occurrence wins
///
/// # Example
///
/// ```
/// use seine::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page#top">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, "Test");
/// assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        title: extract_title(&document),
        links: extract_links(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> String {
    let Ok(title_selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Extracts all crawlable links from the HTML document
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href], link[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Resolves an href to a normalized absolute URL
///
/// Returns None for empty hrefs, unresolvable references, and anything
/// [`is_valid`] rejects (non-HTTP schemes, skipped file types).
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    let normalized = normalize(absolute.as_str());
    is_valid(&normalized, None).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://example.com/dir/page").unwrap()
    }

    #[test]
    fn test_extract_title() {
        let html = r#"<html><head><title>  Test Page  </title></head><body></body></html>"#;
        assert_eq!(parse_html(html, &base_url()).title, "Test Page");
    }

    #[test]
    fn test_no_title() {
        let html = r#"<html><head></head><body></body></html>"#;
        assert_eq!(parse_html(html, &base_url()).title, "");
    }

    #[test]
    fn test_first_title_wins() {
        let html = r#"<html><head><title>One</title><title>Two</title></head></html>"#;
        assert_eq!(parse_html(html, &base_url()).title, "One");
    }

    #[test]
    fn test_extract_absolute_link() {
        let html = r#"<a href="https://OTHER.com/page">Link</a>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(parsed.links, vec!["https://other.com/page"]);
    }

    #[test]
    fn test_extract_relative_links() {
        let html = r#"<a href="/root">Root</a><a href="sibling">Sibling</a><a href="../up">Up</a>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(
            parsed.links,
            vec![
                "https://example.com/root",
                "https://example.com/dir/sibling",
                "https://example.com/up"
            ]
        );
    }

    #[test]
    fn test_link_elements_are_included() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://example.com/canonical" />
            <link rel="stylesheet" href="/style.css" />
        </head></html>"#;
        let parsed = parse_html(html, &base_url());
        assert_eq!(
            parsed.links,
            vec!["https://example.com/canonical", "https://example.com/style.css"]
        );
    }

    #[test]
    fn test_skip_non_http_links() {
        let html = r#"
            <a href="javascript:void(0)">JS</a>
            <a href="mailto:test@example.com">Email</a>
            <a href="tel:+1234567890">Call</a>
            <a href="ftp://example.com/file">FTP</a>
        "#;
        assert!(parse_html(html, &base_url()).links.is_empty());
    }

    #[test]
    fn test_skip_file_extensions() {
        let html = r#"<a href="/photo.JPG">Photo</a><a href="/doc.pdf">Doc</a><a href="/ok">Ok</a>"#;
        assert_eq!(
            parse_html(html, &base_url()).links,
            vec!["https://example.com/ok"]
        );
    }

    #[test]
    fn test_fragments_collapse_and_dedupe() {
        let html = r##"
            <a href="/a#one">A1</a>
            <a href="/b">B</a>
            <a href="/a#two">A2</a>
            <a href="https://EXAMPLE.com/a">A3</a>
            <a href="#section">Self</a>
        "##;
        let parsed = parse_html(html, &base_url());
        assert_eq!(
            parsed.links,
            vec![
                "https://example.com/a",
                "https://example.com/b",
                "https://example.com/dir/page"
            ]
        );
    }

    #[test]
    fn test_empty_href_skipped() {
        let html = r#"<a href="">Empty</a><a href="   ">Blank</a><a>No href</a>"#;
        assert!(parse_html(html, &base_url()).links.is_empty());
    }

    #[test]
    fn test_malformed_html_degrades() {
        let html = r#"<html><title>Broken<a href="/x">unclosed <div><<<"#;
        let parsed = parse_html(html, &base_url());
        assert!(parsed.links.len() <= 1);
    }
}
