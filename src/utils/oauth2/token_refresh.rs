use std::time::Duration;
use log::error;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{RefreshToken, TokenResponse};
use time::OffsetDateTime;
use crate::errors::DriveError::AuthorizationError;
use crate::errors::DriveResult;
use crate::utils::credential::GoogleDriveToken;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub(crate) const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(3600);

/// Exchanges `refresh_token` for a new access token.
///
/// The refresh token is kept when the provider does not rotate it.
pub(crate) async fn token_refresh(client: &BasicClient,
                                  refresh_token: &str,
                                  scopes: &[String]) -> DriveResult<GoogleDriveToken> {
    let oauth2_refresh_token = RefreshToken::new(refresh_token.to_string());
    let token = client
        .exchange_refresh_token(&oauth2_refresh_token)
        .request_async(async_http_client)
        .await
        .map_err(|e| {
            error!("Token refresh failed: {:?}", e);
            AuthorizationError(format!("Token refresh failed: {}", e))
        })?;

    let expires_in = token.expires_in().unwrap_or(DEFAULT_EXPIRES_IN);
    let refresh_token = token.refresh_token()
        .map(|refresh| refresh.secret().as_str())
        .unwrap_or(refresh_token);

    Ok(GoogleDriveToken::new(
        token.access_token().secret(),
        Some(refresh_token),
        OffsetDateTime::now_utc() + expires_in,
        scopes,
    ))
}
