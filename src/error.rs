use thiserror::Error;

/// Failure of a TMDB request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never got a response (DNS, connect, timeout, TLS...).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// TMDB answered with a non-success status.
    #[error("HTTP error! status: {status}{}", .message.as_deref().map(|m| format!(", message: {m}")).unwrap_or_default())]
    RemoteService { status: u16, message: Option<String> },

    /// The body of a successful response could not be decoded.
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RemoteService { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

/// Failure of a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("rating {0} is outside 0..=10")]
    OutOfRange(f32),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_message_mentions_status() {
        let err = ApiError::RemoteService {
            status: 401,
            message: None,
        };
        assert_eq!(err.to_string(), "HTTP error! status: 401");
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_network());
    }

    #[test]
    fn remote_error_message_includes_tmdb_message() {
        let err = ApiError::RemoteService {
            status: 404,
            message: Some("The resource you requested could not be found.".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "HTTP error! status: 404, message: The resource you requested could not be found."
        );
    }
}
