use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

/// Failures fetching server snapshots from the SCP API.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus { endpoint: String, status: StatusCode },
    #[error("Maintenance ongoing from {start_at} to {finish_at}")]
    MaintenanceOngoing {
        start_at: DateTime<Utc>,
        finish_at: DateTime<Utc>,
    },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for CollectorError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
