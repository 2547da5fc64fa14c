//! Transfer configuration.
//!
//! Configuration is a JSON document. Every field except `auth_folder` has a
//! default, so the smallest valid file is `{"auth_folder": "..."}`.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, error};
use serde::{Deserialize, Serialize};
use crate::errors::{DriveError, DriveResult};

pub const DEFAULT_CLIENT_SECRETS_FILE: &str = "client_secrets.json";
pub const DEFAULT_CREDENTIALS_FILE: &str = "client_creds.json";
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_NETWORK_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

const BASE_SCOPE_URL: &str = "https://www.googleapis.com/";
const DEFAULT_SCOPE_PATHS: [&str; 2] = ["auth/drive", "auth/drive.file"];

const ENV_CONFIG_FILE: &str = "DRIVE_BINDING_CONFIG";

/// Default scopes: full drive access plus access to files the application created.
pub fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPE_PATHS
        .iter()
        .map(|path| format!("{}{}", BASE_SCOPE_URL, path))
        .collect()
}

/// What the chunked downloader does when a chunk cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkErrorPolicy {
    /// Propagate the error to the caller.
    #[default]
    FailFast,
    /// Log the error and return no content.
    FailSoft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory holding the client secrets and the cached credentials.
    pub auth_folder: PathBuf,
    #[serde(default = "default_client_secrets_file")]
    pub client_secrets_file: String,
    #[serde(default = "default_credentials_file")]
    pub credentials_file: String,
    #[serde(default = "default_chunk_size")]
    pub chunksize: usize,
    /// OAuth2 callback port. `0` lets the OS pick a free port.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub num_retries: u32,
    #[serde(default = "default_network_chunk_size")]
    pub network_chunk_size: usize,
    #[serde(default)]
    pub chunk_error_policy: ChunkErrorPolicy,
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

fn default_client_secrets_file() -> String {
    DEFAULT_CLIENT_SECRETS_FILE.to_string()
}

fn default_credentials_file() -> String {
    DEFAULT_CREDENTIALS_FILE.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_network_chunk_size() -> usize {
    DEFAULT_NETWORK_CHUNK_SIZE
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_auth_timeout_secs() -> u64 {
    DEFAULT_AUTH_TIMEOUT_SECS
}

impl TransferConfig {
    pub fn new<P: AsRef<Path>>(auth_folder: P) -> Self {
        Self {
            auth_folder: auth_folder.as_ref().to_path_buf(),
            client_secrets_file: default_client_secrets_file(),
            credentials_file: default_credentials_file(),
            chunksize: DEFAULT_CHUNK_SIZE,
            port: 0,
            scopes: default_scopes(),
            api_base_url: default_api_base_url(),
            num_retries: 0,
            network_chunk_size: DEFAULT_NETWORK_CHUNK_SIZE,
            chunk_error_policy: ChunkErrorPolicy::default(),
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
        }
    }

    /// Loads the configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> DriveResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            error!("Failed to open config file: {:?}", e);
            DriveError::ConfigurationError(format!("Cannot open config file: {}", path.display()))
        })?;
        let config = serde_json::from_reader::<_, TransferConfig>(file).map_err(|e| {
            DriveError::ConfigurationError(format!("Invalid config format in {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());

        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration from the file named by `DRIVE_BINDING_CONFIG`.
    pub fn from_env() -> DriveResult<Self> {
        match env::var(ENV_CONFIG_FILE) {
            Ok(path) => Self::from_json_file(path),
            Err(_) => Err(DriveError::ConfigurationError(
                format!("Environment variable {} is not set", ENV_CONFIG_FILE))),
        }
    }

    pub fn validate(&self) -> DriveResult<()> {
        if self.chunksize == 0 {
            return Err(DriveError::ConfigurationError("'chunksize' must be greater than 0".to_string()));
        }
        if self.network_chunk_size == 0 {
            return Err(DriveError::ConfigurationError("'network_chunk_size' must be greater than 0".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(DriveError::ConfigurationError("At least one scope is required".to_string()));
        }
        Ok(())
    }

    pub fn client_secrets_path(&self) -> PathBuf {
        self.auth_folder.join(&self.client_secrets_file)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.auth_folder.join(&self.credentials_file)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: TransferConfig = serde_json::from_str(r#"{"auth_folder": "/tmp/auth"}"#).unwrap();

        assert_eq!(config, TransferConfig::new("/tmp/auth"));
        assert_eq!(config.chunksize, 1024 * 1024);
        assert_eq!(config.port, 0);
        assert_eq!(config.chunk_error_policy, ChunkErrorPolicy::FailFast);
        assert_eq!(config.client_secrets_path(), PathBuf::from("/tmp/auth/client_secrets.json"));
        assert_eq!(config.credentials_path(), PathBuf::from("/tmp/auth/client_creds.json"));
    }

    #[test]
    fn test_default_scopes() {
        assert_eq!(
            default_scopes(),
            vec![
                "https://www.googleapis.com/auth/drive".to_string(),
                "https://www.googleapis.com/auth/drive.file".to_string(),
            ]);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"auth_folder": "auth", "chunksize": 4096, "chunk_error_policy": "fail_soft"}}"#).unwrap();

        let config = TransferConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.chunksize, 4096);
        assert_eq!(config.chunk_error_policy, ChunkErrorPolicy::FailSoft);
    }

    #[test]
    fn test_invalid_config() {
        let result = TransferConfig::from_json_file("/not/exist/config.json");
        assert!(matches!(result, Err(DriveError::ConfigurationError(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"auth_folder": "auth", "chunksize": 0}}"#).unwrap();
        let result = TransferConfig::from_json_file(file.path());
        assert!(matches!(result, Err(DriveError::ConfigurationError(_))));
    }
}
