//! OIDC discovery document and token-endpoint wire types.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{AuthData, AuthError};

const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Subset of the provider metadata the authenticator relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub device_authorization_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
}

impl ProviderMetadata {
    pub fn device_authorization_endpoint(&self) -> Result<&str, AuthError> {
        self.device_authorization_endpoint
            .as_deref()
            .ok_or_else(|| AuthError::Unsupported("provider has no device authorization endpoint".to_string()))
    }

    pub fn userinfo_endpoint(&self) -> Result<&str, AuthError> {
        self.userinfo_endpoint
            .as_deref()
            .ok_or_else(|| AuthError::Unsupported("provider has no userinfo endpoint".to_string()))
    }

    pub fn revocation_endpoint(&self) -> Result<&str, AuthError> {
        self.revocation_endpoint
            .as_deref()
            .ok_or_else(|| AuthError::Unsupported("provider has no revocation endpoint".to_string()))
    }
}

/// Fetch and validate `{issuer}/.well-known/openid-configuration`.
pub async fn discover(client: &reqwest::Client, issuer: &str) -> Result<ProviderMetadata, AuthError> {
    let issuer = issuer.trim_end_matches('/');
    let url = format!("{issuer}{DISCOVERY_PATH}");
    let resp = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("{url}: {e}")))?;
    if !resp.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "{url} returned status {}",
            resp.status()
        )));
    }
    let metadata: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("malformed provider metadata: {e}")))?;
    if metadata.issuer.trim_end_matches('/') != issuer {
        return Err(AuthError::Discovery(format!(
            "issuer mismatch: expected {issuer}, provider reported {}",
            metadata.issuer
        )));
    }
    Ok(metadata)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceAuthorizationResponse {
    pub device_code: String,
    pub user_code: String,
    #[serde(alias = "verification_url")]
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub interval: Option<u64>,
}

/// Token endpoint body. Success and error fields share one shape because
/// device polling reports pending states as error codes.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    /// Build a complete credential. Empty tokens are rejected even when the
    /// provider reported success.
    pub fn into_auth_data(
        self,
        received_at: DateTime<Utc>,
        previous_subject: &str,
    ) -> Result<AuthData, AuthError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTokens("access token"))?;
        let refresh_token = self
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingTokens("refresh token"))?;
        let expires_in = self.expires_in.ok_or_else(|| {
            AuthError::InvalidResponse("token response is missing expires_in".to_string())
        })?;
        let subject = match self.id_token.as_deref() {
            Some(id_token) => subject_from_id_token(id_token)?,
            None => previous_subject.to_string(),
        };
        Ok(AuthData {
            access_token,
            refresh_token,
            token_type: self
                .token_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Bearer".to_string()),
            expiry: Some(expiry_after(received_at, expires_in)?),
            subject,
        })
    }

    pub fn error_summary(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(code), Some(description)) => format!("{code}: {description}"),
            (Some(code), None) => code.clone(),
            _ => "unknown".to_string(),
        }
    }
}

/// `received_at` plus a provider-reported lifetime in seconds. Negative or
/// unrepresentable lifetimes are rejected.
pub(crate) fn expiry_after(
    received_at: DateTime<Utc>,
    expires_in: i64,
) -> Result<DateTime<Utc>, AuthError> {
    if expires_in < 0 {
        return Err(AuthError::InvalidResponse(format!(
            "negative expires_in {expires_in}"
        )));
    }
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| received_at.checked_add_signed(lifetime))
        .ok_or_else(|| AuthError::InvalidResponse(format!("expires_in {expires_in} is out of range")))
}

/// Read the `sub` claim from an id_token payload without verifying the
/// signature. The token came straight from the token endpoint over TLS.
pub(crate) fn subject_from_id_token(id_token: &str) -> Result<String, AuthError> {
    #[derive(Deserialize)]
    struct Claims {
        sub: String,
    }

    let payload = id_token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidResponse("id_token is not a JWT".to_string()))?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::InvalidResponse(format!("id_token payload: {e}")))?;
    let claims: Claims = serde_json::from_slice(&decoded)?;
    Ok(claims.sub)
}
