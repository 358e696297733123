use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;

use crate::{
    error::{LaunchError, TransportError},
    models::{Job, VideoAsset},
    urls::UrlResolver,
};

const UPLOAD_FIELD: &str = "video";

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    job_id: String,
    original_url: String,
    #[serde(default)]
    status: Option<String>,
}

/// Uploads a video and registers a processing job with the backend.
#[derive(Clone)]
pub struct JobLauncher {
    client: Client,
    resolver: UrlResolver,
}

impl JobLauncher {
    pub fn new(resolver: UrlResolver) -> Self {
        Self {
            client: Client::new(),
            resolver,
        }
    }

    /// Starts a job for `asset`. Does not open the result stream.
    pub async fn start(&self, asset: VideoAsset) -> Result<Job, LaunchError> {
        if asset.is_empty() {
            return Err(LaunchError::EmptyAsset);
        }

        let VideoAsset {
            file_name,
            mime_type,
            bytes,
        } = asset;
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(&mime_type)
            .map_err(TransportError::from)?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let url = self.resolver.endpoint("start-job");
        log::info!("uploading {} ({} bytes) to {}", file_name, size, url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from)?;
        if !status.is_success() {
            log::error!("start-job rejected with HTTP {}: {}", status.as_u16(), body);
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let parsed: StartJobResponse = serde_json::from_str(&body)
            .map_err(|err| TransportError::InvalidResponse(err.to_string()))?;
        log::info!(
            "job {} started (status {})",
            parsed.job_id,
            parsed.status.as_deref().unwrap_or("unknown")
        );

        Ok(Job {
            id: parsed.job_id,
            created_at: Utc::now(),
            original_asset_ref: parsed.original_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{BackendScript, Step, TestBackend};

    fn asset() -> VideoAsset {
        VideoAsset::new("k1-500m.mp4", b"fake mp4 payload".to_vec())
    }

    #[tokio::test]
    async fn uploads_video_field_and_returns_job() {
        let backend = TestBackend::start(BackendScript::new(vec![Step::Hold])).await;
        let launcher = JobLauncher::new(backend.resolver());

        let job = launcher.start(asset()).await.unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(job.original_asset_ref, "/media/videos/job-1.mp4");

        let uploads = backend.uploads();
        assert_eq!(uploads.len(), 1);
        let body = String::from_utf8_lossy(&uploads[0]).to_ascii_lowercase();
        assert!(body.contains("name=\"video\""));
        assert!(body.contains("filename=\"k1-500m.mp4\""));
        assert!(body.contains("content-type: video/mp4"));
        assert!(body.contains("fake mp4 payload"));
    }

    #[tokio::test]
    async fn rejected_upload_carries_status_and_body() {
        let backend =
            TestBackend::start(BackendScript::new(vec![]).failing_start(413, "too large")).await;
        let launcher = JobLauncher::new(backend.resolver());

        let err = launcher.start(asset()).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Transport(TransportError::Status { status: 413, ref body }) if body == "too large"
        ));
    }

    #[tokio::test]
    async fn empty_asset_never_reaches_the_network() {
        let backend = TestBackend::start(BackendScript::new(vec![])).await;
        let launcher = JobLauncher::new(backend.resolver());

        let err = launcher
            .start(VideoAsset::new("empty.mp4", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LaunchError::EmptyAsset));
        assert!(backend.uploads().is_empty());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let launcher = JobLauncher::new(UrlResolver::new(format!("http://{addr}")));
        let err = launcher.start(asset()).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Transport(TransportError::Network(_))
        ));
    }
}
