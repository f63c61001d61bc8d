#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use scp_exporter::auth::{AuthData, AuthError, AuthResult, Authenticator, SharedAuthData, UserInfo};
use scp_exporter::collector::CollectorError;
use scp_exporter::metrics::{MetricsError, MetricsUpdater};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/protocol/openid-connect/token";
pub const DEVICE_PATH: &str = "/protocol/openid-connect/auth/device";
pub const USERINFO_PATH: &str = "/protocol/openid-connect/userinfo";
pub const REVOKE_PATH: &str = "/protocol/openid-connect/revoke";

/// Serve a discovery document pointing every endpoint at `server`.
pub async fn mount_discovery(server: &MockServer) {
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": uri,
            "token_endpoint": format!("{uri}{TOKEN_PATH}"),
            "device_authorization_endpoint": format!("{uri}{DEVICE_PATH}"),
            "userinfo_endpoint": format!("{uri}{USERINFO_PATH}"),
            "revocation_endpoint": format!("{uri}{REVOKE_PATH}"),
        })))
        .mount(server)
        .await;
}

pub fn id_token(sub: &str) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({ "sub": sub, "iss": "test" }).to_string())
    )
}

pub fn token_body(access: &str, refresh: &str, expires_in: i64) -> serde_json::Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "Bearer",
        "expires_in": expires_in,
        "id_token": id_token("user-1"),
    })
}

pub fn credential(access: &str, refresh: &str, expiry: DateTime<Utc>) -> AuthData {
    AuthData {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expiry: Some(expiry),
        subject: "user-1".to_string(),
    }
}

/// Ordered record of calls made across fakes.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().expect("journal lock").push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("journal lock").clone()
    }
}

/// Scripted authenticator: each `authenticate` pops the next outcome.
pub struct FakeAuthenticator {
    credential: SharedAuthData,
    outcomes: Mutex<VecDeque<Result<AuthData, AuthError>>>,
    expired_script: Mutex<VecDeque<bool>>,
    journal: Journal,
}

impl FakeAuthenticator {
    pub fn new(initial: AuthData, journal: Journal) -> Self {
        Self {
            credential: SharedAuthData::new(initial),
            outcomes: Mutex::new(VecDeque::new()),
            expired_script: Mutex::new(VecDeque::new()),
            journal,
        }
    }

    pub fn then_refresh(self, outcome: Result<AuthData, AuthError>) -> Self {
        self.outcomes.lock().expect("outcomes lock").push_back(outcome);
        self
    }

    /// Override expiry checks in order; falls back to the stored expiry.
    pub fn with_expiry_script(self, script: &[bool]) -> Self {
        self.expired_script
            .lock()
            .expect("script lock")
            .extend(script.iter().copied());
        self
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn authenticate(&self) -> Result<AuthResult, AuthError> {
        self.journal.push("authenticate");
        let next = self
            .outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or(Err(AuthError::ExpiredOrInvalidGrant));
        let data = next?;
        self.credential.replace(data);
        Ok(AuthResult {
            is_new_device: false,
        })
    }

    async fn revoke(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn user_info(&self) -> Result<UserInfo, AuthError> {
        Ok(UserInfo::default())
    }

    fn is_authentication_expired(&self, reference: DateTime<Utc>) -> bool {
        if let Some(scripted) = self.expired_script.lock().expect("script lock").pop_front() {
            return scripted;
        }
        self.credential.snapshot().is_expired_at(reference)
    }

    fn auth_data(&self) -> SharedAuthData {
        self.credential.clone()
    }
}

/// Scripted metrics updater; records the access token it would collect with.
pub struct FakeMetricsUpdater {
    outcomes: Mutex<VecDeque<Result<(), MetricsError>>>,
    credential: Option<SharedAuthData>,
    hang: bool,
    journal: Journal,
}

impl FakeMetricsUpdater {
    pub fn new(journal: Journal) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            credential: None,
            hang: false,
            journal,
        }
    }

    pub fn reading(mut self, credential: SharedAuthData) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn then_fail(self) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .push_back(Err(network_failure()));
        self
    }
}

pub fn network_failure() -> MetricsError {
    MetricsError::Collect(CollectorError::Network("connection reset".to_string()))
}

#[async_trait]
impl MetricsUpdater for FakeMetricsUpdater {
    async fn update_metrics(&self) -> Result<(), MetricsError> {
        match &self.credential {
            Some(credential) => self
                .journal
                .push(format!("update_metrics:{}", credential.snapshot().access_token)),
            None => self.journal.push("update_metrics"),
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcomes
            .lock()
            .expect("outcomes lock")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

pub fn in_secs(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs)
}
