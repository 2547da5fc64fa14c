mod web_server;
mod url_parser;
mod stores;
mod token_refresh;
pub mod services;

use std::path::PathBuf;
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use oauth2::basic::BasicClient;
use oauth2::{AuthType, AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};
use tokio::sync::mpsc;
use crate::config::TransferConfig;
use crate::errors::DriveError::{AuthorizationError, ConfigurationError, FileOperationError};
use crate::errors::DriveResult;
use crate::utils::credential::{Authenticator, GoogleDriveToken};
use crate::utils::oauth2::services::load_google_oauth2_secret;
use crate::utils::oauth2::stores::{load_token, save_token};
use crate::utils::oauth2::token_refresh::token_refresh;
use crate::utils::oauth2::url_parser::extract_protocol_hostname;
use crate::utils::oauth2::web_server::{bind_listener, spawn_webserver, CALLBACK_PATH, INIT_PATH};

/// Application Client Secret data.
///
/// Work as container of the secret issued for an installed application.
#[derive(Clone)]
pub struct SecretData {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    protocol: String,
    redirect_hostname: String,
}

impl SecretData {
    pub fn new(client_id: &str,
               client_secret: &str,
               auth_uri: &str,
               token_uri: &str,
               redirect_uri: Option<&str>) -> Self {
        let (protocol, hostname) = extract_protocol_hostname(redirect_uri.unwrap_or("http://localhost"))
            .unwrap_or_else(|e| {
                error!("Failed to extract redirect uri: {}", e);
                warn!("Using default redirect uri: http://localhost");
                ("http".to_string(), "localhost".to_string())
            });

        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            auth_uri: auth_uri.to_string(),
            token_uri: token_uri.to_string(),
            protocol,
            redirect_hostname: hostname,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    pub(crate) fn redirect_uri(&self, port: u16, path: &str) -> String {
        format!("{}://{}:{}{}", self.protocol, self.redirect_hostname, port, path)
    }

    pub(crate) fn oauth_client(&self, redirect_uri: Option<&str>) -> DriveResult<BasicClient> {
        let auth_url = AuthUrl::new(self.auth_uri.clone())
            .map_err(|e| ConfigurationError(format!("Invalid auth_uri '{}': {}", self.auth_uri, e)))?;
        let token_url = TokenUrl::new(self.token_uri.clone())
            .map_err(|e| ConfigurationError(format!("Invalid token_uri '{}': {}", self.token_uri, e)))?;

        let client = BasicClient::new(
            ClientId::new(self.client_id.clone()),
            Some(ClientSecret::new(self.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
            .set_auth_type(AuthType::BasicAuth);

        match redirect_uri {
            Some(redirect_uri) => {
                let redirect_url = RedirectUrl::new(redirect_uri.to_string())
                    .map_err(|e| ConfigurationError(format!("Invalid redirect uri '{}': {}", redirect_uri, e)))?;
                Ok(client.set_redirect_uri(redirect_url))
            },
            None => Ok(client),
        }
    }
}

/// Installed-application OAuth2 flow with a JSON credential cache.
///
/// A cached credential that is still valid for the requested scopes is used
/// as is. Otherwise the cached refresh token is tried, and if that fails the
/// user is asked for consent through a local callback server. The resulting
/// credential is written back to the cache.
pub struct InstalledAppFlow {
    client_secrets_path: PathBuf,
    credentials_path: PathBuf,
    port: u16,
    auth_timeout: Duration,
}

impl InstalledAppFlow {
    pub fn new(config: &TransferConfig) -> Self {
        Self {
            client_secrets_path: config.client_secrets_path(),
            credentials_path: config.credentials_path(),
            port: config.port,
            auth_timeout: config.auth_timeout(),
        }
    }

    async fn refresh(&self, secret: &SecretData, cached: Option<&GoogleDriveToken>, scopes: &[String]) -> Option<GoogleDriveToken> {
        let cached = cached?;
        if !cached.covers(scopes) {
            warn!("Token scopes mismatch. Re-authentication required.");
            return None
        }
        let refresh_token = cached.get_refresh_token()?;
        debug!("Refresh token is found");

        let client = match secret.oauth_client(None) {
            Ok(client) => client,
            Err(e) => {
                error!("Cannot build refresh client: {}", e);
                return None
            },
        };

        match token_refresh(&client, refresh_token, scopes).await {
            Ok(token) => {
                info!("Refresh the access token completed normally:\n{}", token);
                Some(token)
            },
            Err(e) => {
                warn!("Token refresh failed, falling back to consent: {}", e);
                None
            },
        }
    }

    async fn consent(&self, secret: &SecretData, scopes: &[String]) -> DriveResult<GoogleDriveToken> {
        let listener = bind_listener(self.port).await?;
        let port = listener.local_addr()
            .map_err(|e| FileOperationError(format!("Cannot read callback listener address: {}", e)))?
            .port();

        let client = secret.oauth_client(Some(&secret.redirect_uri(port, CALLBACK_PATH)))?;
        let (sender, mut receiver) = mpsc::channel::<Result<GoogleDriveToken, String>>(1);
        let server = spawn_webserver(listener, client, scopes, sender);
        println!("Please access and auth this app: {}", secret.redirect_uri(port, INIT_PATH));

        let result = match tokio::time::timeout(self.auth_timeout, receiver.recv()).await {
            Ok(Some(Ok(token))) => Ok(token),
            Ok(Some(Err(message))) => Err(AuthorizationError(message)),
            Ok(None) => Err(AuthorizationError("Authorization server stopped before issuing a token".to_string())),
            Err(_) => Err(AuthorizationError(
                format!("No authorization received within {} seconds", self.auth_timeout.as_secs()))),
        };

        if result.is_err() {
            server.abort();
        }
        result
    }
}

#[async_trait]
impl Authenticator for InstalledAppFlow {
    async fn authorize(&self, scopes: &[String]) -> DriveResult<GoogleDriveToken> {
        let cached = load_token(&self.credentials_path);
        if let Some(token) = cached.as_ref().filter(|token| token.is_valid_for(scopes)) {
            debug!("Token found: {}", token);
            return Ok(token.clone())
        }

        let secret = load_google_oauth2_secret(&self.client_secrets_path)?;
        let token = match self.refresh(&secret, cached.as_ref(), scopes).await {
            Some(token) => token,
            None => self.consent(&secret, scopes).await?,
        };

        if let Err(e) = save_token(&token, &self.credentials_path) {
            error!("Failed to save token. This token isn't stored. (error: {})", e);
        }
        Ok(token)
    }
}
