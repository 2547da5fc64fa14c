use std::fs::File;
use std::path::Path;
use log::error;
use serde::Deserialize;
use crate::errors::DriveError::ConfigurationError;
use crate::errors::DriveResult;
use crate::utils::oauth2::SecretData;

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Deserialize)]
pub(crate) struct GoogleOauth2 {
    installed: Option<GoogleOauth2Secret>,
    web: Option<GoogleOauth2Secret>,
}

#[derive(Deserialize)]
pub(crate) struct GoogleOauth2Secret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Loads the Google OAuth2 client secrets downloaded from the Cloud console.
///
/// Either the `installed` or the `web` section is accepted. The first
/// `http(s)` redirect uri gives the callback scheme and host; the callback
/// port comes from the configuration.
pub fn load_google_oauth2_secret<SP: AsRef<Path>>(secret_json_path: SP) -> DriveResult<SecretData> {
    let secret_json_path = secret_json_path.as_ref();
    let secret_data = match File::open(secret_json_path) {
        Ok(file) => match serde_json::from_reader::<_, GoogleOauth2>(&file) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to parse secret file: {:?}", e);
                return Err(ConfigurationError(
                    format!("Invalid secret format in: {}", secret_json_path.to_string_lossy())));
            }
        },
        Err(e) => {
            error!("Failed to open secret file: {:?}", e);
            return Err(ConfigurationError(
                format!("Cannot open secret file: {}", secret_json_path.to_string_lossy())));
        }
    };

    let secret = match (secret_data.installed, secret_data.web) {
        (Some(secret), _) | (None, Some(secret)) => secret,
        (None, None) => return Err(ConfigurationError(
            format!("Neither 'installed' nor 'web' client found in: {}", secret_json_path.to_string_lossy()))),
    };

    let redirect_uri = secret.redirect_uris
        .iter()
        .find(|uri| uri.starts_with("http://") || uri.starts_with("https://"));

    Ok(SecretData::new(
        &secret.client_id,
        &secret.client_secret,
        &secret.auth_uri,
        &secret.token_uri,
        redirect_uri.map(String::as_str),
    ))
}

/// Creates a `SecretData` for Google from a client id and secret.
pub fn get_google_oauth2_secret(client_id: &str, client_secret: &str) -> SecretData {
    SecretData::new(client_id, client_secret, GOOGLE_AUTH_URI, GOOGLE_TOKEN_URI, None)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use crate::errors::DriveError;
    use super::*;

    fn secret_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_installed_secret() {
        let file = secret_file(r#"{"installed": {
            "client_id": "abc.apps.googleusercontent.com",
            "client_secret": "shh",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["urn:ietf:wg:oauth:2.0:oob", "http://127.0.0.1"]
        }}"#);

        let secret = load_google_oauth2_secret(file.path()).unwrap();
        assert_eq!(secret.client_id(), "abc.apps.googleusercontent.com");
        assert_eq!(secret.redirect_uri(8080, "/auth/callback"), "http://127.0.0.1:8080/auth/callback");
    }

    #[test]
    fn test_web_secret_uses_default_endpoints() {
        let file = secret_file(r#"{"web": {"client_id": "abc", "client_secret": "shh"}}"#);

        let secret = load_google_oauth2_secret(file.path()).unwrap();
        assert_eq!(secret.token_uri(), GOOGLE_TOKEN_URI);
        assert_eq!(secret.redirect_uri(1, "/x"), "http://localhost:1/x");
    }

    #[test]
    fn test_invalid_secrets() {
        let malformed = secret_file("{not json");
        assert!(matches!(load_google_oauth2_secret(malformed.path()), Err(DriveError::ConfigurationError(_))));

        let empty = secret_file("{}");
        assert!(matches!(load_google_oauth2_secret(empty.path()), Err(DriveError::ConfigurationError(_))));

        let missing = load_google_oauth2_secret("/nonexistent/client_secrets.json");
        assert!(matches!(missing, Err(DriveError::ConfigurationError(_))));
    }

    #[test]
    fn test_get_google_oauth2_secret() {
        let secret = get_google_oauth2_secret("id", "secret");
        assert_eq!(secret.client_id(), "id");
        assert!(secret.oauth_client(None).is_ok());
    }
}
