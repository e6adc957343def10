//! YouTube URL shape recognition
//!
//! Matching is a pattern search, not full URI parsing: anything containing one
//! of the accepted shapes passes, even with garbage after it. The extraction
//! engine re-parses the URL on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Standard watch link, short link, embed link, shorts link
static URL_SHAPES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(https?://)?(www\.)?youtube\.com/watch\?v=",
        r"(https?://)?youtu\.be/",
        r"(https?://)?(www\.)?youtube\.com/embed/",
        r"(https?://)?(www\.)?youtube\.com/shorts/",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("URL shape pattern is valid"))
    .collect()
});

/// Returns true iff `url` contains one of the accepted shapes
pub fn is_valid(url: &str) -> bool {
    URL_SHAPES.iter().any(|shape| shape.is_match(url))
}

/// Extract the video identifier
///
/// - short link: path segment after the host, trimmed at the first `/` or `?`
/// - standard link: the `v` query parameter
/// - anything else: `None`
pub fn extract_id(url: &str) -> Option<String> {
    if url.contains("youtu.be") {
        let (_, after_host) = url.split_once("youtu.be/")?;
        let id = after_host.split(|c: char| c == '/' || c == '?').next()?;
        return (!id.is_empty()).then(|| id.to_string());
    }

    if url.contains("youtube.com") {
        let parsed = Url::parse(url)
            .or_else(|_| Url::parse(&format!("https://{}", url)))
            .ok()?;
        return parsed
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.into_owned())
            .filter(|id| !id.is_empty());
    }

    None
}
