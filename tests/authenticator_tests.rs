mod support;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use scp_exporter::auth::{AuthError, Authenticator, DeviceCodePoll, DeviceCodeSession, OidcAuthenticator};
use serde_json::json;
use wiremock::matchers::{any, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{mount_discovery, token_body, DEVICE_PATH, REVOKE_PATH, TOKEN_PATH, USERINFO_PATH};

fn authenticator(server: &MockServer, refresh_token: &str) -> OidcAuthenticator {
    OidcAuthenticator::new(refresh_token).with_issuer(server.uri())
}

async fn mount_device_authorization(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .and(body_string_contains("client_id=scp"))
        .and(body_string_contains("scope=offline_access+openid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://example.com/device",
            "expires_in": 600,
            "interval": 0
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, refresh_token: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={refresh_token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn empty_refresh_token_runs_device_flow() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("device_code=dev-1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("device_code=dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("AT1", "RT1", 3600)))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let before = Utc::now();
    let result = auth.authenticate().await.expect("device flow");
    let after = Utc::now();

    assert!(result.is_new_device);
    let data = auth.auth_data().snapshot();
    assert_eq!(data.access_token, "AT1");
    assert_eq!(data.refresh_token, "RT1");
    assert_eq!(data.subject, "user-1");
    assert!(auth.is_authentication_expired(after + Duration::seconds(3600)));
    assert!(!auth.is_authentication_expired(before + Duration::seconds(3000)));
}

#[tokio::test]
async fn device_flow_rejects_response_without_refresh_token() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "AT1",
            "refresh_token": "",
            "token_type": "Bearer",
            "expires_in": 300
        })))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let err = auth.authenticate().await.expect_err("missing refresh token");

    assert!(matches!(err, AuthError::MissingTokens("refresh token")));
    let data = auth.auth_data().snapshot();
    assert!(!data.has_refresh_token());
    assert!(!data.has_access_token());
}

#[tokio::test]
async fn device_flow_denied_by_user() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_device_authorization(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "access_denied" })))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let err = auth.authenticate().await.expect_err("denied");
    assert!(matches!(err, AuthError::AccessDenied));
}

#[tokio::test]
async fn poll_slow_down_increases_interval() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "slow_down" })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let metadata = auth.discover().await.expect("metadata");
    let session = DeviceCodeSession {
        verification_uri: "https://example.com/device".to_string(),
        verification_uri_complete: None,
        user_code: "ABCD-EFGH".to_string(),
        device_code: "dev-1".to_string(),
        interval_secs: 5,
        expires_at: Utc::now() + Duration::minutes(10),
    };

    let poll = auth.poll_device_code(&metadata, &session).await.expect("poll");
    assert!(matches!(poll, DeviceCodePoll::SlowDown { interval_secs: 10 }));
}

#[tokio::test]
async fn poll_after_session_deadline_short_circuits() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let metadata = auth.discover().await.expect("metadata");
    let session = DeviceCodeSession {
        verification_uri: "https://example.com/device".to_string(),
        verification_uri_complete: None,
        user_code: "ABCD-EFGH".to_string(),
        device_code: "dev-1".to_string(),
        interval_secs: 5,
        expires_at: Utc::now() - Duration::seconds(1),
    };

    let poll = auth.poll_device_code(&metadata, &session).await.expect("poll");
    assert!(matches!(poll, DeviceCodePoll::Expired));
}

#[tokio::test]
async fn seeded_refresh_token_runs_refresh_flow() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    mount_refresh(&server, "RT1", token_body("AT2", "RT2", 600)).await;

    let auth = authenticator(&server, "RT0");
    let first = auth.authenticate().await.expect("first refresh");
    assert!(!first.is_new_device);
    let first_data = auth.auth_data().snapshot();
    assert_eq!(first_data.access_token, "AT1");

    let second = auth.authenticate().await.expect("second refresh");
    assert!(!second.is_new_device);
    let second_data = auth.auth_data().snapshot();
    assert_eq!(second_data.access_token, "AT2");
    assert_eq!(second_data.refresh_token, "RT2");
    assert!(second_data.expiry > first_data.expiry);
}

#[tokio::test]
async fn failed_refresh_keeps_last_known_good_credential() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("refresh_token=RT1"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token is not active"
        })))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    auth.authenticate().await.expect("first refresh");
    let before = auth.auth_data().snapshot();

    let err = auth.authenticate().await.expect_err("rejected refresh");
    assert!(matches!(err, AuthError::ExpiredOrInvalidGrant));
    assert_eq!(*auth.auth_data().snapshot(), *before);
}

#[tokio::test]
async fn unreachable_issuer_is_a_discovery_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    let err = auth.authenticate().await.expect_err("discovery fails");
    assert!(matches!(err, AuthError::Discovery(_)));
    assert_eq!(auth.auth_data().snapshot().refresh_token, "RT0");
}

#[tokio::test]
async fn issuer_mismatch_is_a_discovery_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://elsewhere.example.com",
            "token_endpoint": format!("{}{TOKEN_PATH}", server.uri()),
        })))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    assert!(matches!(
        auth.authenticate().await,
        Err(AuthError::Discovery(_))
    ));
}

#[tokio::test]
async fn revoke_without_refresh_token_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let err = auth.revoke().await.expect_err("nothing to revoke");
    assert!(matches!(err, AuthError::NotAuthenticated(_)));
}

#[tokio::test]
async fn revoke_posts_refresh_token_and_unbinds() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(REVOKE_PATH))
        .and(body_string_contains("token=RT0"))
        .and(body_string_contains("token_type_hint=refresh_token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    auth.revoke().await.expect("revoked");
    assert!(!auth.auth_data().snapshot().has_refresh_token());
}

#[tokio::test]
async fn revoke_failure_is_surfaced() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(REVOKE_PATH))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    assert!(matches!(auth.revoke().await, Err(AuthError::InvalidResponse(_))));
    assert_eq!(auth.auth_data().snapshot().refresh_token, "RT0");
}

#[tokio::test]
async fn user_info_uses_live_access_token() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .and(header("authorization", "Bearer AT1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "user-1",
            "name": "Jane Doe",
            "email": "jane@example.com",
            "preferred_username": "jdoe"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    auth.authenticate().await.expect("refresh");
    let before = auth.auth_data().snapshot();
    let info = auth.user_info().await.expect("userinfo");

    assert_eq!(info.preferred_username.as_deref(), Some("jdoe"));
    assert_eq!(info.email.as_deref(), Some("jane@example.com"));
    assert_eq!(*auth.auth_data().snapshot(), *before);
}

#[tokio::test]
async fn user_info_rejects_foreign_subject() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    Mock::given(method("GET"))
        .and(path(USERINFO_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "someone-else" })))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    auth.authenticate().await.expect("refresh");
    assert!(matches!(
        auth.user_info().await,
        Err(AuthError::SubjectMismatch { .. })
    ));
}

#[tokio::test]
async fn user_info_requires_access_token() {
    let server = MockServer::start().await;
    let auth = authenticator(&server, "RT0");
    assert!(matches!(
        auth.user_info().await,
        Err(AuthError::NotAuthenticated(_))
    ));
}

#[tokio::test]
async fn seeded_credential_is_expired_until_first_refresh() {
    let auth = OidcAuthenticator::new("RT0");
    assert!(auth.is_authentication_expired(Utc::now()));
    assert!(auth.auth_data().snapshot().has_refresh_token());
}

#[tokio::test]
async fn unrepresentable_token_lifetime_is_rejected() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", i64::MAX)).await;

    let auth = authenticator(&server, "RT0");
    let outcome = tokio::spawn(async move {
        let result = auth.authenticate().await;
        (result, auth.auth_data().snapshot())
    })
    .await
    .expect("authenticate must not panic");

    assert!(matches!(outcome.0, Err(AuthError::InvalidResponse(_))));
    assert_eq!(outcome.1.refresh_token, "RT0");
    assert!(!outcome.1.has_access_token());
}

#[tokio::test]
async fn negative_token_lifetime_is_rejected() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_refresh(&server, "RT0", token_body("AT1", "RT1", -30)).await;

    let auth = authenticator(&server, "RT0");
    assert!(matches!(
        auth.authenticate().await,
        Err(AuthError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn unrepresentable_device_code_lifetime_is_rejected() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(DEVICE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "dev-1",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://example.com/device",
            "expires_in": u64::MAX,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "");
    let outcome = tokio::spawn(async move { auth.authenticate().await })
        .await
        .expect("authenticate must not panic");
    assert!(matches!(outcome, Err(AuthError::InvalidResponse(_))));
}

#[tokio::test]
async fn undecodable_token_body_is_a_serialization_error() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    assert!(matches!(
        auth.authenticate().await,
        Err(AuthError::Serialization(_))
    ));
    assert_eq!(auth.auth_data().snapshot().refresh_token, "RT0");
}

async fn mount_slow_refresh(server: &MockServer, refresh_token: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains(format!("refresh_token={refresh_token}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(body)
                .set_delay(StdDuration::from_millis(200)),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn concurrent_refreshes_run_one_at_a_time() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_slow_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    mount_refresh(&server, "RT1", token_body("AT2", "RT2", 600)).await;

    let auth = authenticator(&server, "RT0");
    let (first, second) = tokio::join!(auth.authenticate(), auth.authenticate());

    assert!(first.is_ok());
    assert!(second.is_ok());
    let data = auth.auth_data().snapshot();
    assert_eq!(data.access_token, "AT2");
    assert_eq!(data.refresh_token, "RT2");
}

#[tokio::test]
async fn revoke_waits_for_in_flight_refresh() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;
    mount_slow_refresh(&server, "RT0", token_body("AT1", "RT1", 300)).await;
    Mock::given(method("POST"))
        .and(path(REVOKE_PATH))
        .and(body_string_contains("token=RT1&"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let auth = authenticator(&server, "RT0");
    let (refreshed, revoked) = tokio::join!(auth.authenticate(), auth.revoke());

    assert!(refreshed.is_ok());
    assert!(revoked.is_ok());
    let data = auth.auth_data().snapshot();
    assert!(!data.has_refresh_token());
    assert!(!data.has_access_token());
}
