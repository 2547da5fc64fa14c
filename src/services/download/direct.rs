use bytes::Bytes;
use log::{debug, error, info};
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use serde_json::Value;
use crate::config::{TransferConfig, DEFAULT_NETWORK_CHUNK_SIZE};
use crate::errors::{DriveError, DriveResult};
use crate::services::download::progress::{DownloadProgress, ProgressReporter, ProgressTracker, TransferBuffer};
use crate::types::google_drive::{id_summary, DownloadOperation};

const OPERATION: &str = "files.download";

/// Streams the object behind a completed `files.download` operation.
#[derive(Debug, Clone)]
pub struct DirectStreamDownloader {
    client: Client,
    network_chunk_size: usize,
}

impl Default for DirectStreamDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectStreamDownloader {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            network_chunk_size: DEFAULT_NETWORK_CHUNK_SIZE,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new().network_chunk_size(config.network_chunk_size)
    }

    pub fn client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn network_chunk_size(mut self, network_chunk_size: usize) -> Self {
        self.network_chunk_size = network_chunk_size.max(1);
        self
    }

    /// Downloads `response.downloadUri` of `payload` with a bearer token.
    ///
    /// The payload is checked before any request is made. A non-2xx status
    /// fails the whole download.
    pub async fn download(&self, access_token: &str, payload: &Value, reporter: &mut dyn ProgressReporter) -> DriveResult<Bytes> {
        let operation = DownloadOperation::try_from(payload)?;
        let uri = &operation.response.download_uri;
        debug!("Downloading {} from operation {}", id_summary(uri), operation.name);

        let mut response = self.client
            .get(uri)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to request download uri: {:?}", e);
                DriveError::transport(OPERATION, None, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!("Download failed with status {}: {}", status, message);
            return Err(DriveError::transport(OPERATION, Some(status.as_u16()), message));
        }

        // Zero when the server does not announce a length.
        let total_size = response.content_length()
            .or_else(|| response.headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok()))
            .unwrap_or(0);

        let mut buffer = TransferBuffer::with_capacity(total_size.min(64 * 1024 * 1024) as usize);
        let mut tracker = ProgressTracker::new();

        while let Some(chunk) = response.chunk()
            .await
            .map_err(|e| DriveError::transport(OPERATION, Some(status.as_u16()), format!("Failed to read body: {}", e)))? {
            for piece in chunk.chunks(self.network_chunk_size) {
                buffer.write(piece);
                let progress = DownloadProgress::new(buffer.len() as u64, Some(total_size), false);
                reporter.update(&tracker.advance(&progress));
            }
        }

        let progress = DownloadProgress::new(buffer.len() as u64, Some(total_size), true);
        reporter.finish(&tracker.advance(&progress));
        info!("Downloaded {} bytes from operation {}", buffer.len(), operation.name);

        Ok(buffer.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use crate::errors::DriveError::ValidationError;
    use crate::services::test_support::init_logger;
    use super::*;

    #[derive(Clone, Default)]
    struct Recorder {
        updates: Arc<Mutex<Vec<DownloadProgress>>>,
        finished: Arc<Mutex<Option<DownloadProgress>>>,
    }

    impl ProgressReporter for Recorder {
        fn update(&mut self, progress: &DownloadProgress) {
            self.updates.lock().unwrap().push(*progress);
        }

        fn finish(&mut self, progress: &DownloadProgress) {
            *self.finished.lock().unwrap() = Some(*progress);
        }
    }

    fn payload(uri: &str) -> Value {
        json!({
            "name": "generatedOperation",
            "metadata": {"@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileMetadata"},
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileResponse",
                "downloadUri": uri,
                "partialDownloadAllowed": false
            }
        })
    }

    #[tokio::test]
    async fn test_download_streams_body() {
        init_logger();
        let server = MockServer::start().await;
        let content = (0..20_000u32).map(|i| (i % 7) as u8).collect::<Vec<u8>>();
        Mock::given(method("GET"))
            .and(path("/download/abc"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let recorder = Recorder::default();
        let downloader = DirectStreamDownloader::new().network_chunk_size(4096);
        let body = downloader
            .download("test-token", &payload(&format!("{}/download/abc", server.uri())), &mut recorder.clone())
            .await
            .unwrap();

        assert_eq!(body.as_ref(), content.as_slice());
        let updates = recorder.updates.lock().unwrap();
        assert!(updates.len() >= 5);
        assert!(updates.windows(2).all(|w| w[0].resumable_progress <= w[1].resumable_progress));
        assert_eq!(updates.last().unwrap().total_size, Some(20_000));
        let finished = recorder.finished.lock().unwrap().unwrap();
        assert!(finished.done);
        assert_eq!(finished.resumable_progress, 20_000);
    }

    #[tokio::test]
    async fn test_download_rejects_payload_before_request() {
        init_logger();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut invalid = payload(&format!("{}/download/abc", server.uri()));
        invalid["response"].as_object_mut().unwrap().remove("downloadUri");

        let result = DirectStreamDownloader::new()
            .download("test-token", &invalid, &mut Recorder::default())
            .await;
        assert!(matches!(result, Err(ValidationError(_))));
    }

    #[tokio::test]
    async fn test_download_fails_on_error_status() {
        init_logger();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/abc"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;

        let recorder = Recorder::default();
        let error = DirectStreamDownloader::new()
            .download("test-token", &payload(&format!("{}/download/abc", server.uri())), &mut recorder.clone())
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(403));
        assert!(recorder.updates.lock().unwrap().is_empty());
        assert!(recorder.finished.lock().unwrap().is_none());
    }
}
