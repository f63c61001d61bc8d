use thiserror::Error;

/// Failures of the OIDC authentication flows.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider discovery failed: {0}")]
    Discovery(String),
    #[error("Not authenticated: {0}")]
    NotAuthenticated(&'static str),
    #[error("Access denied")]
    AccessDenied,
    #[error("Device code expired before authorization completed")]
    DeviceCodeExpired,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("Token response is missing the {0}")]
    MissingTokens(&'static str),
    #[error("Userinfo subject {actual:?} does not match authenticated subject {expected:?}")]
    SubjectMismatch { expected: String, actual: String },
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
