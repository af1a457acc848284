//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use http::{HttpFetcher, PageFetcher, create_async_client};
pub use self::url::resolve_link;

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\t b  c "), "a b c");
        assert_eq!(normalize_whitespace("\u{a0}x\u{a0}"), "x");
    }
}
