use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Credential material held by an authenticator.
///
/// The access token and its expiry always travel together: a new value is
/// built in full and installed through [`SharedAuthData`] in one step.
///
/// # Example
/// ```
/// use scp_exporter::auth::AuthData;
///
/// let seeded = AuthData::with_refresh_token("refresh");
/// assert!(seeded.has_refresh_token());
/// assert!(!seeded.has_access_token());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthData {
    pub access_token: String,
    /// Empty means no identity has been established yet.
    pub refresh_token: String,
    pub token_type: String,
    /// Exclusive: the access token is invalid at and after this instant.
    /// `None` means no access token has been issued.
    pub expiry: Option<DateTime<Utc>>,
    pub subject: String,
}

impl AuthData {
    pub fn with_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            ..Self::default()
        }
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.is_empty()
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// `true` when `reference` is at or past the stored expiry.
    pub fn is_expired_at(&self, reference: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => reference >= expiry,
            None => true,
        }
    }

    /// Value for an `Authorization` header.
    pub fn authorization_header(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{token_type} {}", self.access_token)
    }
}

impl fmt::Debug for AuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(secret: &str) -> &'static str {
            if secret.is_empty() {
                ""
            } else {
                "<redacted>"
            }
        }
        f.debug_struct("AuthData")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("subject", &self.subject)
            .finish()
    }
}

/// Live handle to the credential owned by an authenticator.
///
/// Clones share the same slot, so a refresh installed by the owner is seen by
/// every holder on its next [`SharedAuthData::snapshot`]. Only the owning
/// authenticator should call [`SharedAuthData::replace`].
#[derive(Clone, Default)]
pub struct SharedAuthData {
    inner: Arc<RwLock<Arc<AuthData>>>,
}

impl SharedAuthData {
    pub fn new(data: AuthData) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(data))),
        }
    }

    /// Current credential. Never observes a half-installed value.
    pub fn snapshot(&self) -> Arc<AuthData> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install a complete new credential in one step.
    pub fn replace(&self, data: AuthData) {
        let data = Arc::new(data);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
    }
}

impl fmt::Debug for SharedAuthData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedAuthData")
            .field(&*self.snapshot())
            .finish()
    }
}

/// Outcome of [`crate::auth::Authenticator::authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthResult {
    /// `true` when the device-authorization flow ran, `false` for a refresh.
    pub is_new_device: bool,
}

/// Claims returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
}
