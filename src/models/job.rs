use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LaunchError;

/// A backend processing job. Never mutated; a new upload produces a new job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Stored original as returned by the backend; may be relative.
    pub original_asset_ref: String,
}

/// A video picked by the user, ready for upload.
#[derive(Debug, Clone)]
pub struct VideoAsset {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl VideoAsset {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, LaunchError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_mime_from_extension() {
        assert_eq!(VideoAsset::new("race.MP4", vec![1]).mime_type, "video/mp4");
        assert_eq!(VideoAsset::new("race.mov", vec![1]).mime_type, "video/quicktime");
        assert_eq!(
            VideoAsset::new("race", vec![1]).mime_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn reads_asset_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("k1-200m.webm");
        std::fs::write(&path, b"not really a video").unwrap();

        let asset = VideoAsset::from_path(&path).await.unwrap();
        assert_eq!(asset.file_name, "k1-200m.webm");
        assert_eq!(asset.mime_type, "video/webm");
        assert!(!asset.is_empty());
    }
}
