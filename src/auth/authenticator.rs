use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::device_code::{DeviceCodePoll, DeviceCodeSession, SLOW_DOWN_INCREMENT_SECS};
use super::oidc::{self, DeviceAuthorizationResponse, ProviderMetadata, TokenResponse};
use super::{AuthData, AuthError, AuthResult, SharedAuthData, UserInfo};

pub const SCP_ISSUER: &str = "https://www.servercontrolpanel.de/realms/scp";
pub const SCP_CLIENT_ID: &str = "scp";
pub const SCP_SCOPES: &[&str] = &["offline_access", "openid"];

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Credential lifecycle operations the refresher and host process rely on.
///
/// Implementations own their credential and are its only writer; readers get
/// a live handle through [`Authenticator::auth_data`].
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Run the device flow when no refresh token is held, the refresh-token
    /// flow otherwise. A failed attempt leaves the stored credential untouched.
    async fn authenticate(&self) -> Result<AuthResult, AuthError>;

    /// Revoke the held refresh token. Fails without network I/O when there is
    /// nothing to revoke.
    async fn revoke(&self) -> Result<(), AuthError>;

    async fn user_info(&self) -> Result<UserInfo, AuthError>;

    /// `reference >= expiry`. Pass `now + buffer` to look ahead.
    fn is_authentication_expired(&self, reference: DateTime<Utc>) -> bool;

    fn auth_data(&self) -> SharedAuthData;
}

/// Authenticator for an OpenID Connect provider supporting the device
/// authorization grant.
///
/// # Example
/// ```no_run
/// use scp_exporter::auth::{Authenticator, OidcAuthenticator};
///
/// # async fn example() -> Result<(), scp_exporter::auth::AuthError> {
/// let auth = OidcAuthenticator::new("stored-refresh-token");
/// let result = auth.authenticate().await?;
/// assert!(!result.is_new_device);
/// # Ok(())
/// # }
/// ```
pub struct OidcAuthenticator {
    client: reqwest::Client,
    issuer: String,
    client_id: String,
    scopes: Vec<String>,
    credential: SharedAuthData,
    flow_lock: Mutex<()>,
}

impl OidcAuthenticator {
    /// Create an authenticator for the SCP realm. An empty refresh token
    /// selects the device flow on the first [`Authenticator::authenticate`].
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            issuer: SCP_ISSUER.to_string(),
            client_id: SCP_CLIENT_ID.to_string(),
            scopes: SCP_SCOPES.iter().map(|s| s.to_string()).collect(),
            credential: SharedAuthData::new(AuthData::with_refresh_token(refresh_token)),
            flow_lock: Mutex::new(()),
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub async fn discover(&self) -> Result<ProviderMetadata, AuthError> {
        oidc::discover(&self.client, &self.issuer).await.map_err(|e| {
            error!(issuer = %self.issuer, error = %e, "error discovering OIDC provider");
            e
        })
    }

    pub async fn start_device_code(
        &self,
        metadata: &ProviderMetadata,
    ) -> Result<DeviceCodeSession, AuthError> {
        let scope = self.scopes.join(" ");
        let resp = self
            .client
            .post(metadata.device_authorization_endpoint()?)
            .header("Accept", "application/json")
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Device authorization request failed with status {}",
                resp.status()
            )));
        }
        let payload: DeviceAuthorizationResponse = resp.json().await?;
        let expires_in = i64::try_from(payload.expires_in).map_err(|_| {
            AuthError::InvalidResponse(format!(
                "device code expires_in {} is out of range",
                payload.expires_in
            ))
        })?;
        let expires_at = oidc::expiry_after(Utc::now(), expires_in)?;
        Ok(DeviceCodeSession {
            verification_uri: payload.verification_uri,
            verification_uri_complete: payload.verification_uri_complete,
            user_code: payload.user_code,
            device_code: payload.device_code,
            interval_secs: payload.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            expires_at,
        })
    }

    /// One poll of the token endpoint for a pending device session.
    pub async fn poll_device_code(
        &self,
        metadata: &ProviderMetadata,
        session: &DeviceCodeSession,
    ) -> Result<DeviceCodePoll, AuthError> {
        if session.is_expired_at(Utc::now()) {
            return Ok(DeviceCodePoll::Expired);
        }
        let resp = self
            .client
            .post(&metadata.token_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", session.device_code.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let received_at = Utc::now();
        let body = resp.bytes().await?;
        let payload: TokenResponse = serde_json::from_slice(&body).map_err(|_| {
            AuthError::InvalidResponse(format!("Device token request failed with status {status}"))
        })?;
        if status.is_success() {
            let data = payload.into_auth_data(received_at, "")?;
            return Ok(DeviceCodePoll::Authorized { data });
        }
        match payload.error.as_deref() {
            Some("authorization_pending") => Ok(DeviceCodePoll::Pending {
                interval_secs: session.interval_secs,
            }),
            Some("slow_down") => Ok(DeviceCodePoll::SlowDown {
                interval_secs: session.interval_secs + SLOW_DOWN_INCREMENT_SECS,
            }),
            Some("expired_token") => Ok(DeviceCodePoll::Expired),
            Some("access_denied") => Ok(DeviceCodePoll::AccessDenied),
            _ => Err(AuthError::InvalidResponse(format!(
                "Device token error: {}",
                payload.error_summary()
            ))),
        }
    }

    async fn device_authorization(&self, metadata: &ProviderMetadata) -> Result<AuthData, AuthError> {
        let mut session = self.start_device_code(metadata).await?;
        info!(
            verification_uri = %session.verification_uri,
            verification_uri_complete = session.verification_uri_complete.as_deref().unwrap_or(""),
            user_code = %session.user_code,
            "complete device authorization using given uri and code"
        );
        loop {
            tokio::time::sleep(session.interval()).await;
            match self.poll_device_code(metadata, &session).await? {
                DeviceCodePoll::Authorized { data } => {
                    debug!("obtained access token and refresh token via device authorization");
                    return Ok(data);
                }
                DeviceCodePoll::Pending { .. } => continue,
                DeviceCodePoll::SlowDown { interval_secs } => {
                    debug!(interval_secs, "provider asked to slow down device polling");
                    session.interval_secs = interval_secs;
                }
                DeviceCodePoll::AccessDenied => return Err(AuthError::AccessDenied),
                DeviceCodePoll::Expired => return Err(AuthError::DeviceCodeExpired),
            }
        }
    }

    async fn refresh(
        &self,
        metadata: &ProviderMetadata,
        current: &AuthData,
    ) -> Result<AuthData, AuthError> {
        let resp = self
            .client
            .post(&metadata.token_endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", current.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        let received_at = Utc::now();
        if status.is_success() {
            let payload: TokenResponse = resp.json().await?;
            return payload.into_auth_data(received_at, &current.subject);
        }
        let body = resp.text().await.unwrap_or_default();
        let payload: TokenResponse = serde_json::from_str(&body).unwrap_or_default();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
            && payload.error.as_deref() == Some("invalid_grant")
        {
            return Err(AuthError::ExpiredOrInvalidGrant);
        }
        Err(AuthError::InvalidResponse(format!(
            "Refresh token request failed with status {status}: {}",
            payload.error_summary()
        )))
    }
}

#[async_trait]
impl Authenticator for OidcAuthenticator {
    async fn authenticate(&self) -> Result<AuthResult, AuthError> {
        let _flow = self.flow_lock.lock().await;
        let current = self.credential.snapshot();
        let metadata = self.discover().await?;

        if !current.has_refresh_token() {
            let data = self.device_authorization(&metadata).await.map_err(|e| {
                error!(error = %e, "error during device authorization");
                e
            })?;
            self.credential.replace(data);
            return Ok(AuthResult { is_new_device: true });
        }

        let data = self.refresh(&metadata, &current).await.map_err(|e| {
            error!(error = %e, "error refreshing token");
            e
        })?;
        debug!(expiry = ?data.expiry, "refreshed access token using refresh token");
        self.credential.replace(data);
        Ok(AuthResult {
            is_new_device: false,
        })
    }

    async fn revoke(&self) -> Result<(), AuthError> {
        let _flow = self.flow_lock.lock().await;
        let current = self.credential.snapshot();
        if !current.has_refresh_token() {
            return Err(AuthError::NotAuthenticated(
                "no refresh token provided for revocation",
            ));
        }
        let metadata = self.discover().await?;
        let resp = self
            .client
            .post(metadata.revocation_endpoint()?)
            .form(&[
                ("token", current.refresh_token.as_str()),
                ("token_type_hint", "refresh_token"),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            error!(%status, "error revoking refresh token");
            return Err(AuthError::InvalidResponse(format!(
                "Token revocation failed with status {status}"
            )));
        }
        self.credential.replace(AuthData::default());
        debug!("revoked refresh token");
        Ok(())
    }

    async fn user_info(&self) -> Result<UserInfo, AuthError> {
        let current = self.credential.snapshot();
        if !current.has_access_token() {
            return Err(AuthError::NotAuthenticated(
                "no access token available for userinfo",
            ));
        }
        let metadata = self.discover().await?;
        let resp = self
            .client
            .get(metadata.userinfo_endpoint()?)
            .header("Accept", "application/json")
            .header("Authorization", current.authorization_header())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "Userinfo request failed with status {}",
                resp.status()
            )));
        }
        let info: UserInfo = resp.json().await?;
        if !current.subject.is_empty() && info.sub != current.subject {
            warn!("userinfo subject does not match token subject");
            return Err(AuthError::SubjectMismatch {
                expected: current.subject.clone(),
                actual: info.sub,
            });
        }
        Ok(info)
    }

    fn is_authentication_expired(&self, reference: DateTime<Utc>) -> bool {
        self.credential.snapshot().is_expired_at(reference)
    }

    fn auth_data(&self) -> SharedAuthData {
        self.credential.clone()
    }
}
