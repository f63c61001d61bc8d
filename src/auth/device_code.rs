use std::time::Duration;

use chrono::{DateTime, Utc};

use super::AuthData;

/// Added to the polling interval when the provider answers `slow_down`.
pub const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

/// Device-authorization session returned by the provider.
///
/// # Example
/// ```no_run
/// use scp_exporter::auth::DeviceCodeSession;
/// use chrono::Utc;
///
/// let session = DeviceCodeSession {
///     verification_uri: "https://example.com/device".to_string(),
///     verification_uri_complete: None,
///     user_code: "ABCD-EFGH".to_string(),
///     device_code: "device-code".to_string(),
///     interval_secs: 5,
///     expires_at: Utc::now(),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DeviceCodeSession {
    pub verification_uri: String,
    pub verification_uri_complete: Option<String>,
    pub user_code: String,
    pub device_code: String,
    pub interval_secs: u64,
    pub expires_at: DateTime<Utc>,
}

impl DeviceCodeSession {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of a single poll against the token endpoint.
#[derive(Debug, Clone)]
pub enum DeviceCodePoll {
    Pending { interval_secs: u64 },
    SlowDown { interval_secs: u64 },
    Authorized { data: AuthData },
    AccessDenied,
    Expired,
}
