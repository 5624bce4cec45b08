//! Tracker error types

use thiserror::Error;

/// Errors returned by a task tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Access token not found. Set the {0} environment variable.")]
    MissingToken(String),
}

impl TrackerError {
    /// True when the token was rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TrackerError::Api { status: 401 | 403, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_message() {
        let err = TrackerError::Api {
            status: 400,
            message: "projects: Not a valid project".to_string(),
        };
        assert_eq!(err.to_string(), "API error 400: projects: Not a valid project");
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(
            TrackerError::Api {
                status: 401,
                message: "Not Authorized".to_string()
            }
            .is_unauthorized()
        );
        assert!(
            !TrackerError::Api {
                status: 404,
                message: "Not found".to_string()
            }
            .is_unauthorized()
        );
        assert!(!TrackerError::MissingToken("ASANA_ACCESS_TOKEN".to_string()).is_unauthorized());
    }
}
