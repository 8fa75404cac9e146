use url::Url;

/// Returns the authority of a URL used for domain scoping
///
/// The authority is the lowercase host plus the port when one is given
/// explicitly, so `https://a.test:8443/` and `https://a.test/` are different
/// scopes while `https://a.test:443/` and `https://a.test/` are the same.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seine::url::authority;
///
/// let url = Url::parse("https://EXAMPLE.com:8080/path").unwrap();
/// assert_eq!(authority(&url), Some("example.com:8080".to_string()));
/// ```
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Returns the authority of a raw URL string, if it parses
pub fn scope_of(raw: &str) -> Option<String> {
    Url::parse(raw).ok().as_ref().and_then(authority)
}

/// Returns `scheme://authority` for a URL; the robots.txt cache key
pub fn origin(url: &Url) -> Option<String> {
    authority(url).map(|auth| format!("{}://{}", url.scheme(), auth))
}
