use serde::{Deserialize, Serialize};

/// Playable media resolved from a pasted link, as shown in the preview pane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewMedia {
    pub media_url: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
}

/// Wire shape of the backend `/preview` response. Every field is optional:
/// error responses carry only `error`, and some platforms omit `title` and
/// `thumbnail` entirely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewResponse {
    pub video_url: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_response_full_payload() {
        let json = r#"{"videoUrl":"https://cdn.example.com/v.mp4","title":"My clip","thumbnail":"https://cdn.example.com/t.jpg"}"#;
        let resp: PreviewResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.video_url.as_deref(), Some("https://cdn.example.com/v.mp4"));
        assert_eq!(resp.title.as_deref(), Some("My clip"));
        assert_eq!(resp.thumbnail.as_deref(), Some("https://cdn.example.com/t.jpg"));
        assert!(resp.error.is_none());
    }

    #[test]
    fn preview_response_error_only() {
        let resp: PreviewResponse =
            serde_json::from_str(r#"{"error":"Video not found"}"#).unwrap();
        assert!(resp.video_url.is_none());
        assert_eq!(resp.error.as_deref(), Some("Video not found"));
    }

    #[test]
    fn preview_response_empty_object() {
        let resp: PreviewResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.video_url.is_none());
        assert!(resp.title.is_none());
    }

    #[test]
    fn preview_response_ignores_unknown_fields() {
        let resp: PreviewResponse =
            serde_json::from_str(r#"{"videoUrl":"u","durationMs":1234}"#).unwrap();
        assert_eq!(resp.video_url.as_deref(), Some("u"));
    }
}
