use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::models::user::UserSummary;

/// Public path serving a stored video file.
pub fn stream_path(filename: &str) -> String {
    format!("/api/videos/stream/{filename}")
}

/// Public path serving a video's thumbnail.
pub fn thumbnail_path(video_id: i32) -> String {
    format!("/api/videos/thumbnail/{video_id}")
}

/// Video as returned to clients, with playable and thumbnail URLs resolved.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = "Intro to Rust")]
    pub title: String,
    #[schema(example = "A short walkthrough of ownership.")]
    pub description: String,
    /// External URL, or the stream path of the stored file. `None` if the stored file is gone.
    #[schema(example = "/api/videos/stream/4f7c0e3a9d2b61c8a0e5f1b2c3d4e5f6.mp4")]
    pub video_url: Option<String>,
    #[schema(example = "/api/videos/thumbnail/7")]
    pub thumbnail_url: Option<String>,
    /// Duration in seconds.
    #[schema(example = 92.48)]
    pub duration: Option<f64>,
    #[schema(example = 12)]
    pub views: i64,
    pub uploaded_by: Option<UserSummary>,
    pub edited_by: Option<UserSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for editing a video. Absent or blank fields keep their current value.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateVideoRequest {
    #[schema(example = "Intro to Rust (2nd take)")]
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Result of recording a view.
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ViewCount {
    #[schema(example = 7)]
    pub id: i32,
    #[schema(example = 13)]
    pub views: i64,
}

/// Fields of a video record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub video_url: Option<String>,
    pub video_file_id: Option<Uuid>,
    pub thumbnail_file_id: Option<Uuid>,
    pub duration: Option<f64>,
    pub uploaded_by: i32,
}

impl NewVideo {
    /// Every rule the record breaks. Empty when the record is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.title.trim().is_empty() {
            errors.push("Title is required".to_string());
        } else if self.title.trim().chars().count() > 256 {
            errors.push("Title must be at most 256 characters".to_string());
        }
        if self.description.trim().is_empty() {
            errors.push("Description is required".to_string());
        }
        match (&self.video_url, &self.video_file_id) {
            (Some(_), Some(_)) => {
                errors.push("A video cannot have both a file and a URL".to_string())
            }
            (None, None) => errors.push("A video file or a video URL is required".to_string()),
            (Some(url), None) if !is_http_url(url) => {
                errors.push("Video URL must start with http:// or https://".to_string())
            }
            _ => {}
        }
        if self.thumbnail_file_id.is_none() {
            errors.push("A thumbnail is required".to_string());
        }
        errors
    }
}

fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}
