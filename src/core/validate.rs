use std::sync::LazyLock;

use regex::Regex;

use crate::platforms::Platform;

static INSTAGRAM_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(p|reel|tv)/[A-Za-z0-9_-]+/?").unwrap());

/// Decides whether a pasted string is a well-formed video link for the given
/// platform. Cheap and synchronous so callers can run it on every keystroke.
///
/// The input is trimmed and percent-decoded before parsing; share sheets and
/// messengers hand over links in encoded form. A decode that produces invalid
/// UTF-8 rejects the input outright.
pub fn validate(platform: Platform, raw_input: &str) -> bool {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return false;
    }

    let decoded = match urlencoding::decode(trimmed) {
        Ok(d) => d,
        Err(_) => return false,
    };

    let parsed = match url::Url::parse(&decoded) {
        Ok(u) => u,
        Err(_) => return false,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let host = match parsed.host_str() {
        Some(h) => h.to_lowercase(),
        None => return false,
    };

    if !platform.matches_host(&host) {
        return false;
    }

    match platform {
        // Only post/reel/IGTV permalinks carry downloadable video.
        Platform::Instagram => INSTAGRAM_PATH_RE.is_match(parsed.path()),
        Platform::Facebook | Platform::TikTok => true,
    }
}
