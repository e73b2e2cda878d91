// src/utils/mod.rs

//! Utility functions and helpers.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Lowercased path of a URL, with the query stripped.
pub fn url_path(url_str: &str) -> String {
    Url::parse(url_str)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url_str.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/path/").unwrap();
        assert_eq!(
            resolve_url(&base, "page.html"),
            "https://example.com/path/page.html"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Example.COM/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_url_path_strips_query() {
        assert_eq!(
            url_path("https://example.com/Docs/Math.PDF?v=2"),
            "/docs/math.pdf"
        );
    }
}
