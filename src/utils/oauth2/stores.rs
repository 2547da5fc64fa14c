use std::fs;
use std::path::Path;
use log::{debug, warn};
use crate::errors::DriveError::FileOperationError;
use crate::errors::DriveResult;
use crate::utils::credential::GoogleDriveToken;

/// Writes `token` as JSON to `token_path`, creating the parent directory.
pub(crate) fn save_token(token: &GoogleDriveToken, token_path: &Path) -> DriveResult<()> {
    if let Some(dir) = token_path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            debug!("Creating directory {}", dir.display());
            fs::create_dir_all(dir)
                .map_err(|e| FileOperationError(format!("Cannot create {}: {}", dir.display(), e)))?;
        }
    }

    let token_json = serde_json::to_string_pretty(token)
        .map_err(|e| FileOperationError(format!("Cannot serialize token: {}", e)))?;
    fs::write(token_path, token_json)
        .map_err(|e| FileOperationError(format!("Cannot write {}: {}", token_path.display(), e)))?;
    debug!("Token saved to {}", token_path.display());

    Ok(())
}

/// Reads the cached token. A missing or unreadable cache is treated as empty.
pub(crate) fn load_token(token_path: &Path) -> Option<GoogleDriveToken> {
    if !token_path.exists() {
        debug!("No token cache at {}", token_path.display());
        return None
    }

    let content = match fs::read_to_string(token_path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Cannot read token cache {}: {}", token_path.display(), e);
            return None
        },
    };

    match serde_json::from_str(&content) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!("Ignoring malformed token cache {}: {}", token_path.display(), e);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};
    use crate::config::default_scopes;
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client_creds.json");
        let expires_at = OffsetDateTime::now_utc().replace_nanosecond(0).unwrap() + Duration::hours(1);
        let token = GoogleDriveToken::new("access", Some("refresh"), expires_at, &default_scopes());

        save_token(&token, &path).unwrap();
        assert_eq!(load_token(&path), Some(token));
    }

    #[test]
    fn test_load_ignores_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client_creds.json");
        assert_eq!(load_token(&path), None);

        fs::write(&path, "{\"access_token\": 1}").unwrap();
        assert_eq!(load_token(&path), None);
    }
}
