use crate::url::domain::authority;
use url::Url;

/// Path suffixes that never lead to an HTML page worth crawling
const SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".ico", ".pdf", ".doc", ".docx", ".xls", ".xlsx",
    ".zip", ".tar", ".gz", ".mp3", ".mp4", ".avi", ".mov",
];

/// Returns true if `raw` is a crawlable URL
///
/// A URL is crawlable when it parses, uses `http` or `https`, has a host, and
/// its path does not end in one of the skipped file extensions. When `scope`
/// is given, the URL's authority must also equal it (case-insensitively).
///
/// Total over arbitrary strings: anything unparsable is simply invalid.
///
/// # Examples
///
/// ```
/// use seine::url::is_valid;
///
/// assert!(is_valid("https://a.test/x", Some("a.test")));
/// assert!(!is_valid("https://b.test/y", Some("a.test")));
/// assert!(!is_valid("https://a.test/logo.PNG", None));
/// assert!(!is_valid("ftp://a.test/", None));
/// ```
pub fn is_valid(raw: &str, scope: Option<&str>) -> bool {
    let Ok(url) = Url::parse(raw) else {
        return false;
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    let Some(url_authority) = authority(&url) else {
        return false;
    };

    if let Some(scope) = scope {
        if !url_authority.eq_ignore_ascii_case(scope) {
            return false;
        }
    }

    let path = url.path().to_ascii_lowercase();
    !SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_and_https_accepted() {
        assert!(is_valid("http://example.com/", None));
        assert!(is_valid("https://example.com/page?x=1", None));
    }

    #[test]
    fn test_other_schemes_rejected() {
        assert!(!is_valid("ftp://example.com/file", None));
        assert!(!is_valid("mailto:me@example.com", None));
        assert!(!is_valid("javascript:void(0)", None));
        assert!(!is_valid("file:///etc/passwd", None));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(!is_valid("", None));
        assert!(!is_valid("not a url", None));
        assert!(!is_valid("/relative/path", None));
        assert!(!is_valid("http://", None));
    }

    #[test]
    fn test_skip_extensions() {
        for ext in SKIP_EXTENSIONS {
            let url = format!("https://example.com/file{}", ext);
            assert!(!is_valid(&url, None), "{} should be skipped", ext);
        }
        assert!(!is_valid("https://example.com/Photo.JPG", None));
        assert!(is_valid("https://example.com/page.html", None));
        assert!(is_valid("https://example.com/image?format=png", None));
    }

    #[test]
    fn test_scope_case_insensitive() {
        assert!(is_valid("https://A.TEST/x", Some("a.test")));
        assert!(is_valid("https://a.test/x", Some("A.Test")));
    }

    #[test]
    fn test_scope_rejects_other_hosts() {
        assert!(!is_valid("https://b.test/y", Some("a.test")));
        assert!(!is_valid("https://sub.a.test/y", Some("a.test")));
    }

    #[test]
    fn test_scope_includes_port() {
        assert!(is_valid("http://127.0.0.1:4000/x", Some("127.0.0.1:4000")));
        assert!(!is_valid("http://127.0.0.1:4001/x", Some("127.0.0.1:4000")));
    }
}
