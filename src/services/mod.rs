use std::sync::Arc;
use bytes::Bytes;
use log::{error, info};
use reqwest::header::HeaderValue;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;
use crate::config::TransferConfig;
use crate::errors::DriveError::{ConfigurationError, NotInitializedError};
use crate::errors::DriveResult;
use crate::services::dispatcher::{IntoKwArgs, OperationId, RequestDispatcher};
use crate::services::download::{DirectStreamDownloader, ProgressReporter};
use crate::services::google_drive::{Drives, Files};
use crate::services::request::HttpRequest;
use crate::utils::credential::{Authenticator, GoogleDriveToken};
use crate::utils::reqwest::{auth_header_value, get_client_with_token, AuthType};

pub mod dispatcher;
pub mod download;
pub mod google_drive;
pub mod request;

pub(crate) struct API {
    api_base_uri: String,
}

impl API {
    pub(crate) fn new(api_base_uri: &str) -> Self {
        Self {
            api_base_uri: api_base_uri.trim_end_matches('/').to_string(),
        }
    }

    pub(crate) fn generate_endpoint(&self, endpoint: &str) -> String {
        let endpoint = if endpoint.starts_with("/") {
            endpoint.to_string()
        } else {
            format!("/{}", endpoint)
        };

        format!("{}{}", self.api_base_uri, endpoint)
    }

    pub(crate) fn get_request_url(&self, endpoint: &str) -> DriveResult<Url> {
        let api_endpoint = self.generate_endpoint(endpoint);
        Url::parse(&api_endpoint).map_err(|e| {
            error!("Failed to parse endpoint: {:?}", e);
            ConfigurationError(format!("Failed to parse endpoint: {}", api_endpoint))
        })
    }
}

/// Authenticated handle to the Drive API.
///
/// Immutable after construction and shared through `Arc`; every request
/// created from it holds a reference to it.
pub struct DriveSession {
    api: API,
    client: Client,
    token: GoogleDriveToken,
    dispatcher: RequestDispatcher,
    config: TransferConfig,
}

impl DriveSession {
    /// Obtains a credential for the configured scopes and builds the session.
    pub async fn connect(config: TransferConfig, authenticator: &dyn Authenticator) -> DriveResult<Arc<Self>> {
        config.validate()?;
        let token = authenticator.authorize(&config.scopes).await?;
        let session = Self::with_token(config, token)?;
        info!("Authenticated to Google Drive.");

        Ok(session)
    }

    pub fn with_token(config: TransferConfig, token: GoogleDriveToken) -> DriveResult<Arc<Self>> {
        let client = get_client_with_token(token.get_access_token(), AuthType::Bearer)?;
        let api = API::new(&config.api_base_url);
        // Fail on a malformed base url now rather than on the first request.
        api.get_request_url("/")?;

        Ok(Arc::new(Self {
            api,
            client,
            token,
            dispatcher: RequestDispatcher::drive_v3(),
            config,
        }))
    }

    pub fn files(self: &Arc<Self>) -> Files {
        Files::new(Arc::clone(self))
    }

    pub fn drives(self: &Arc<Self>) -> Drives {
        Drives::new(Arc::clone(self))
    }

    /// Binds `operation` with `args` into a request on this session.
    pub fn dispatch<T, A: IntoKwArgs>(self: &Arc<Self>, operation: OperationId, args: A) -> DriveResult<HttpRequest<T>> {
        let bound = self.dispatcher.bind(operation, args)?;
        Ok(HttpRequest::new(Arc::clone(self), bound))
    }

    /// Downloads the object behind a `files.download` operation payload.
    pub async fn download_from_response(&self, payload: &Value, reporter: &mut dyn ProgressReporter) -> DriveResult<Bytes> {
        DirectStreamDownloader::from_config(&self.config)
            .download(self.access_token(), payload, reporter)
            .await
    }

    pub fn access_token(&self) -> &str {
        self.token.get_access_token()
    }

    pub fn scopes(&self) -> &[String] {
        self.token.scopes()
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }

    pub(crate) fn auth_header(&self) -> DriveResult<HeaderValue> {
        auth_header_value(self.access_token(), AuthType::Bearer)
    }

    pub(crate) fn endpoint(&self, path: &str) -> DriveResult<Url> {
        self.api.get_request_url(path)
    }
}

/// Owner of at most one session.
///
/// The first `get_or_connect` authenticates; concurrent callers wait for
/// that attempt and every later call returns the same session.
#[derive(Default)]
pub struct SessionCell {
    cell: OnceCell<Arc<DriveSession>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_connect(&self, config: &TransferConfig, authenticator: &dyn Authenticator) -> DriveResult<Arc<DriveSession>> {
        let session = self.cell
            .get_or_try_init(|| DriveSession::connect(config.clone(), authenticator))
            .await?;

        Ok(Arc::clone(session))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub fn session(&self) -> DriveResult<Arc<DriveSession>> {
        self.cell.get()
            .cloned()
            .ok_or_else(|| NotInitializedError(
                "Connect the session before declaring resource group operations".to_string()))
    }

    pub fn files(&self) -> DriveResult<Files> {
        Ok(self.session()?.files())
    }

    pub fn drives(&self) -> DriveResult<Drives> {
        Ok(self.session()?.drives())
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use async_trait::async_trait;
    use wiremock::MockServer;
    use crate::errors::DriveError;
    use crate::services::test_support::{init_logger, test_config, test_token};
    use super::*;

    struct CountingAuthenticator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn authorize(&self, _scopes: &[String]) -> DriveResult<GoogleDriveToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(test_token())
        }
    }

    #[test]
    fn test_generate_endpoint() {
        let api = API::new("https://www.googleapis.com/drive/v3/");
        assert_eq!(api.generate_endpoint("files"), "https://www.googleapis.com/drive/v3/files");
        assert_eq!(api.generate_endpoint("/files/abc"), "https://www.googleapis.com/drive/v3/files/abc");
    }

    #[test]
    fn test_cell_not_initialized() {
        let cell = SessionCell::new();
        assert!(!cell.is_initialized());
        assert!(matches!(cell.files(), Err(DriveError::NotInitializedError(_))));
        assert!(matches!(cell.drives(), Err(DriveError::NotInitializedError(_))));
    }

    #[tokio::test]
    async fn test_cell_authenticates_once() {
        init_logger();
        let server = MockServer::start().await;
        let config = test_config(&server);
        let authenticator = CountingAuthenticator { calls: AtomicUsize::new(0) };
        let cell = SessionCell::new();

        let (first, second) = tokio::join!(
            cell.get_or_connect(&config, &authenticator),
            cell.get_or_connect(&config, &authenticator));
        let third = cell.get_or_connect(&config, &authenticator).await.unwrap();

        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first.unwrap(), &third));
        assert!(Arc::ptr_eq(&second.unwrap(), &third));
        assert!(cell.files().is_ok());
    }

    #[tokio::test]
    async fn test_download_from_response_uses_session_token() {
        use serde_json::json;
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, ResponseTemplate};
        use crate::services::download::NoProgress;
        use crate::services::test_support::session_for;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/xyz"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"exported".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let payload = json!({
            "name": "operations/xyz",
            "metadata": {"@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileMetadata"},
            "done": true,
            "response": {
                "@type": "type.googleapis.com/google.apps.drive.v3.DownloadFileResponse",
                "downloadUri": format!("{}/download/xyz", server.uri()),
                "partialDownloadAllowed": true
            }
        });

        let session = session_for(&server);
        let content = session.download_from_response(&payload, &mut NoProgress).await.unwrap();
        assert_eq!(content, Bytes::from_static(b"exported"));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_base_url() {
        let mut config = TransferConfig::new("auth");
        config.api_base_url = "not a url".to_string();
        let authenticator = CountingAuthenticator { calls: AtomicUsize::new(0) };

        let result = DriveSession::connect(config, &authenticator).await;
        assert!(matches!(result, Err(ConfigurationError(_))));
    }
}
