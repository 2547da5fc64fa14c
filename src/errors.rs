pub type DriveResult<T> = Result<T, DriveError>;

#[derive(thiserror::Error, Debug)]
pub enum DriveError {
    #[error("Configuration is invalid: {0}")]
    ConfigurationError(String),
    #[error("Authorization failed: {0}")]
    AuthorizationError(String),
    #[error("Request '{operation}' failed{}: {message}", status_suffix(.status))]
    TransportError {
        operation: String,
        status: Option<u16>,
        message: String,
    },
    #[error("Response validation failed: {0}")]
    ValidationError(String),
    #[error("Get invalid argument error: {0}")]
    InvalidArgumentError(String),
    #[error("Drive session is not initialized: {0}")]
    NotInitializedError(String),
    #[error("Failed to parse: {0}")]
    ParseError(String),
    #[error("File operation failed: {0}")]
    FileOperationError(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (status {})", status),
        None => String::new(),
    }
}

impl DriveError {
    pub(crate) fn transport(operation: impl ToString, status: Option<u16>, message: impl ToString) -> Self {
        Self::TransportError {
            operation: operation.to_string(),
            status,
            message: message.to_string(),
        }
    }

    /// HTTP status of a failed request, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TransportError { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let error = DriveError::transport("files.get", Some(404), "File not found");
        assert_eq!(error.to_string(), "Request 'files.get' failed (status 404): File not found");
        assert_eq!(error.status(), Some(404));

        let error = DriveError::transport("files.list", None, "connection refused");
        assert_eq!(error.to_string(), "Request 'files.list' failed: connection refused");
        assert_eq!(error.status(), None);
    }
}
