//! Error types for talking to a Harbor instance

use thiserror::Error;

/// Failures raised by the transport layer
///
/// The traversal and webhook entry points never surface these to their
/// callers. They are logged at the branch or event boundary and turned into
/// an empty contribution.
#[derive(Error, Debug)]
pub enum HarborError {
    /// The request could not be sent or the response body could not be read
    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Harbor answered with a non-success status
    #[error("Harbor returned HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// The response body was not the JSON shape we expected
    #[error("Failed to decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL cannot be joined with an API path
    #[error("Invalid Harbor base URL: {0}")]
    InvalidBaseUrl(String),

    /// Failure injected by non-HTTP collaborators (fakes, adapters)
    #[error("{0}")]
    Other(String),
}

impl HarborError {
    /// Whether the failure came from Harbor rejecting our credentials
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, HarborError::Status { status, .. } if *status == 401 || *status == 403)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let err = HarborError::Status {
            status: 404,
            url: "https://harbor.example.com/api/v2.0/projects".to_string(),
            body: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Harbor returned HTTP 404 for https://harbor.example.com/api/v2.0/projects: not found"
        );
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn test_auth_failure_detection() {
        let err = HarborError::Status {
            status: 401,
            url: "u".to_string(),
            body: String::new(),
        };
        assert!(err.is_auth_failure());
    }
}
