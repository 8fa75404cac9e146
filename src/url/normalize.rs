use url::Url;

/// Normalizes a URL into its frontier key
///
/// # Normalization Steps
///
/// 1. Lowercase the scheme and host
/// 2. Remove the fragment (everything after #)
/// 3. Keep the path, query, and parameters as they are
///
/// Parsing also applies the structural fixes `url` performs for HTTP(S)
/// (default ports dropped, empty path becomes `/`). Input that cannot be
/// parsed is still normalized textually, so this never fails; whether the
/// result is crawlable is decided by [`is_valid`](super::is_valid).
///
/// # Examples
///
/// ```
/// use seine::url::normalize;
///
/// assert_eq!(
///     normalize("HTTPS://Example.COM/Page?q=1#top"),
///     "https://example.com/Page?q=1"
/// );
/// ```
pub fn normalize(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.into()
        }
        Err(_) => normalize_text(raw),
    }
}

/// Textual fallback for strings the URL parser rejects
fn normalize_text(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or_default();

    let Some((scheme, rest)) = without_fragment.split_once("://") else {
        return without_fragment.to_string();
    };

    let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);

    format!(
        "{}://{}{}",
        scheme.to_ascii_lowercase(),
        authority.to_ascii_lowercase(),
        tail
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_scheme_and_host() {
        assert_eq!(
            normalize("HTTP://EXAMPLE.COM/Path"),
            "http://example.com/Path"
        );
    }

    #[test]
    fn test_remove_fragment() {
        assert_eq!(
            normalize("https://example.com/page#section"),
            "https://example.com/page"
        );
    }

    #[test]
    fn test_fragment_and_case_variants_collapse() {
        let variants = [
            "https://example.com/a?x=1",
            "https://EXAMPLE.com/a?x=1#one",
            "HTTPS://Example.Com/a?x=1#two",
        ];
        for variant in variants {
            assert_eq!(normalize(variant), "https://example.com/a?x=1");
        }
    }

    #[test]
    fn test_path_and_query_preserved() {
        assert_eq!(
            normalize("https://example.com/A/b/?Z=2&a=1"),
            "https://example.com/A/b/?Z=2&a=1"
        );
    }

    #[test]
    fn test_empty_path_becomes_root() {
        assert_eq!(normalize("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_default_port_dropped() {
        assert_eq!(
            normalize("http://example.com:80/x"),
            "http://example.com/x"
        );
        assert_eq!(
            normalize("http://example.com:8080/x"),
            "http://example.com:8080/x"
        );
    }

    #[test]
    fn test_unparsable_input_still_normalized() {
        assert_eq!(normalize("not a url#frag"), "not a url");
        assert_eq!(normalize(""), "");
        assert_eq!(
            normalize("HTTP://Bad Host/Path#x"),
            "http://bad host/Path"
        );
    }

    #[test]
    fn test_idempotent() {
        let once = normalize("HTTPS://Example.com/x#y");
        assert_eq!(normalize(&once), once);
    }
}
