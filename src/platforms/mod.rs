use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    TikTok,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::TikTok => "tiktok",
        }
    }

    /// Human-readable name used in messages shown next to the input field.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
        }
    }

    pub fn from_url(url_str: &str) -> Option<Platform> {
        let parsed = url::Url::parse(url_str).ok()?;
        let host = parsed.host_str()?.to_lowercase();

        for platform in [Platform::Facebook, Platform::Instagram, Platform::TikTok] {
            if platform.matches_host(&host) {
                return Some(platform);
            }
        }
        None
    }

    /// Host must equal a known domain or be one of its subdomains. Substring
    /// matching is deliberately avoided so `notfacebook.com` never passes.
    pub fn matches_host(&self, host: &str) -> bool {
        let domains: &[&str] = match self {
            Platform::Facebook => &["facebook.com", "fb.watch"],
            Platform::Instagram => &["instagram.com"],
            Platform::TikTok => &["tiktok.com"],
        };
        domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend endpoints for one platform panel. The base path varies per
/// deployment (`http://localhost:8081/api`, a production domain, ...); the
/// three routes under it are fixed.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    pub platform: Platform,
    api_base: String,
}

impl PlatformConfig {
    pub fn new(platform: Platform, api_base: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        Self { platform, api_base }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn preview_endpoint(&self) -> String {
        format!("{}/preview", self.api_base)
    }

    pub fn stream_endpoint(&self, video_url: &str) -> String {
        format!(
            "{}/download/stream?url={}",
            self.api_base,
            urlencoding::encode(video_url)
        )
    }

    pub fn download_endpoint(&self, filename: &str) -> String {
        format!(
            "{}/download?filename={}",
            self.api_base,
            urlencoding::encode(filename)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_url_facebook() {
        let p = Platform::from_url("https://www.facebook.com/watch?v=123");
        assert_eq!(p, Some(Platform::Facebook));
    }

    #[test]
    fn from_url_fb_watch() {
        let p = Platform::from_url("https://fb.watch/abc123/");
        assert_eq!(p, Some(Platform::Facebook));
    }

    #[test]
    fn from_url_tiktok_short_domain() {
        let p = Platform::from_url("https://vm.tiktok.com/ZM123/");
        assert_eq!(p, Some(Platform::TikTok));
    }

    #[test]
    fn from_url_unknown_host() {
        assert_eq!(Platform::from_url("https://example.com/video"), None);
    }

    #[test]
    fn from_url_not_a_url() {
        assert_eq!(Platform::from_url("facebook video please"), None);
    }

    #[test]
    fn matches_host_rejects_lookalike() {
        assert!(!Platform::Facebook.matches_host("notfacebook.com"));
        assert!(!Platform::TikTok.matches_host("tiktok.com.evil.com"));
    }

    #[test]
    fn matches_host_accepts_subdomain() {
        assert!(Platform::Instagram.matches_host("www.instagram.com"));
        assert!(Platform::TikTok.matches_host("vm.tiktok.com"));
    }

    #[test]
    fn endpoints_under_base() {
        let config = PlatformConfig::new(Platform::TikTok, "http://localhost:8081/api/");
        assert_eq!(config.preview_endpoint(), "http://localhost:8081/api/preview");
        assert_eq!(
            config.download_endpoint("video 123.mp4"),
            "http://localhost:8081/api/download?filename=video%20123.mp4"
        );
    }

    #[test]
    fn stream_endpoint_encodes_url() {
        let config = PlatformConfig::new(Platform::Facebook, "http://localhost:8081/api");
        let endpoint = config.stream_endpoint("https://www.facebook.com/watch?v=1&x=2");
        assert_eq!(
            endpoint,
            "http://localhost:8081/api/download/stream?url=https%3A%2F%2Fwww.facebook.com%2Fwatch%3Fv%3D1%26x%3D2"
        );
    }

    #[test]
    fn platform_serializes_lowercase() {
        let s = serde_json::to_string(&Platform::TikTok).unwrap();
        assert_eq!(s, "\"tiktok\"");
    }
}
