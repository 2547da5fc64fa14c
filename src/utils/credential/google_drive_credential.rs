use std::fmt::{Display, Formatter};
use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use crate::errors::DriveError::AuthorizationError;
use crate::errors::DriveResult;
use crate::utils::credential::Authenticator;

/// Access token with its refresh token, expiry and granted scopes.
///
/// This is the shape persisted to the credentials file.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GoogleDriveToken {
    pub(crate) scopes: Vec<String>,
    pub(crate) access_token: String,
    pub(crate) refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) expires_at: OffsetDateTime,
}

impl GoogleDriveToken {
    pub fn new(access_token: &str, refresh_token: Option<&str>, expires_at: OffsetDateTime, scopes: &[String]) -> Self {
        Self {
            scopes: scopes.to_vec(),
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(String::from),
            expires_at,
        }
    }

    pub fn get_access_token(&self) -> &str {
        &self.access_token
    }

    pub fn get_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= OffsetDateTime::now_utc()
    }

    /// Whether the token was granted every requested scope.
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|scope| self.scopes.contains(scope))
    }

    pub fn is_valid_for(&self, scopes: &[String]) -> bool {
        !self.is_expired() && self.covers(scopes)
    }
}

impl Display for GoogleDriveToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token\nscope: [{}]\naccess_token: *****\nrefresh_token: *****\nexpires_at: '{}'",
               self.scopes.join(", "), self.expires_at.unix_timestamp())
    }
}

impl std::fmt::Debug for GoogleDriveToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Authenticator wrapping a token issued elsewhere.
pub struct StaticCredential {
    token: GoogleDriveToken,
}

impl StaticCredential {
    pub fn new(token: GoogleDriveToken) -> Self {
        Self { token }
    }

    /// Token valid for one hour with the given scopes, e.g. from `GOOGLE_DRIVE_TOKEN`.
    pub fn from_access_token(access_token: &str, scopes: &[String]) -> Self {
        let expires_at = OffsetDateTime::now_utc() + time::Duration::hours(1);
        Self::new(GoogleDriveToken::new(access_token, None, expires_at, scopes))
    }
}

#[async_trait]
impl Authenticator for StaticCredential {
    async fn authorize(&self, scopes: &[String]) -> DriveResult<GoogleDriveToken> {
        if self.token.is_expired() {
            warn!("Static token was expired.");
            return Err(AuthorizationError("Static token was expired and cannot be refreshed".to_string()));
        }
        if !self.token.covers(scopes) {
            return Err(AuthorizationError(
                format!("Static token lacks requested scopes: [{}]", scopes.join(", "))));
        }
        Ok(self.token.clone())
    }
}
