use async_trait::async_trait;
use crate::errors::DriveResult;

pub mod google_drive_credential;

pub use google_drive_credential::{GoogleDriveToken, StaticCredential};

/// Source of valid credentials for a set of scopes.
///
/// Implementations decide how the credential is obtained (cached file,
/// refresh, interactive consent) and may persist it for the next process.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authorize(&self, scopes: &[String]) -> DriveResult<GoogleDriveToken>;
}
