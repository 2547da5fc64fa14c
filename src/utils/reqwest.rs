use std::fmt::{Display, Formatter};
use reqwest::{header, Client};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use crate::errors::DriveError::{ConfigurationError, ParseError};
use crate::errors::DriveResult;

#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthType {
    Bearer,
}

impl Display for AuthType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
        }
    }
}

pub(crate) fn auth_header_value(token: &str, auth_type: AuthType) -> DriveResult<HeaderValue> {
    let mut header_value = HeaderValue::from_str(&format!("{} {}", auth_type, token))
        .map_err(|e| ParseError(format!("Failed to parse header value: {:#?}", e)))?;
    header_value.set_sensitive(true);

    Ok(header_value)
}

/// Builds a client which sends the token on every request.
pub(crate) fn get_client_with_token(token: &str, auth_type: AuthType) -> DriveResult<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(AUTHORIZATION, auth_header_value(token, auth_type)?);

    let client = Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| ConfigurationError(format!("Failed to build client: {:#?}", e)))?;

    Ok(client)
}
