use url::Url;
use crate::errors::DriveError::ConfigurationError;
use crate::errors::DriveResult;

pub(crate) fn extract_protocol_hostname(url: &str) -> DriveResult<(String, String)> {
    let parsed_url = Url::parse(url)
        .map_err(|e| ConfigurationError(format!("URL parse failed: {:?}", e)))?;
    let hostname = parsed_url.host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| ConfigurationError(format!("No host in redirect uri: {}", url)))?;

    Ok((parsed_url.scheme().to_string(), hostname.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_protocol_hostname() {
        assert_eq!(
            extract_protocol_hostname("http://localhost:8080/callback").unwrap(),
            ("http".to_string(), "localhost".to_string()));
        assert!(extract_protocol_hostname("localhost").is_err());
        assert!(extract_protocol_hostname("urn:ietf:wg:oauth:2.0:oob").is_err());
    }
}
