//! Integration tests for the login / profile / 401 lifecycle.

mod common;

use common::{context_for, expired_token, live_token, login_response, profile_response};
use mbank_client::storage::TOKEN_KEY;
use mbank_client::{
    AccessToken, AppContext, ClientConfig, Error, NotificationKind, RouteName, TokenStorage,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_login_success_sets_session_and_navigates_to_dashboard() {
    let server = MockServer::start().await;
    let token = live_token("alice", "USER");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "username": "alice", "password": "s3cret" })))
        .respond_with(login_response(&token))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    let claims = ctx.auth.login("alice", "s3cret").await.unwrap();

    assert_eq!(claims.sub.as_deref(), Some("alice"));
    assert!(ctx.auth.is_authenticated());
    assert_eq!(
        ctx.session.snapshot().token().map(|t| t.as_str().to_owned()),
        Some(token.clone())
    );
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), Some(token));
    assert_eq!(ctx.router.current().route, RouteName::Dashboard);

    let note = ctx.notifications.current();
    assert!(note.visible);
    assert_eq!(note.kind, NotificationKind::Success);
}

#[tokio::test]
async fn test_login_returns_to_requested_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    let blocked = ctx.auth.navigate("/payment?to=42");
    assert_eq!(blocked.route, RouteName::Login);
    assert_eq!(blocked.query_value("redirect"), Some("/payment?to=42"));

    ctx.auth.login("alice", "s3cret").await.unwrap();

    let landed = ctx.router.current();
    assert_eq!(landed.route, RouteName::Pay);
    assert_eq!(landed.full_path(), "/payment?to=42");
}

#[tokio::test]
async fn test_login_bad_credentials_keeps_session_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "message": "Invalid username or password" })),
        )
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    let before = ctx.router.current();

    let err = ctx.auth.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 400, .. }));
    assert!(ctx.session.snapshot().is_empty());
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);
    assert_eq!(ctx.router.current(), before);

    let note = ctx.notifications.current();
    assert!(note.visible);
    assert_eq!(note.kind, NotificationKind::Error);
    assert_eq!(note.message, "Invalid username or password");
}

#[tokio::test]
async fn test_login_rejected_with_401_keeps_existing_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "alice", "password": "s3cret" })))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "alice", "password": "wrong" })))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "message": "Invalid username or password" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();
    let before = ctx.router.current();
    let persisted = storage.load(TOKEN_KEY).unwrap();

    let err = ctx.auth.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized { operation: "login", .. }));
    assert!(ctx.auth.is_authenticated());
    assert_eq!(
        ctx.auth.user().and_then(|c| c.sub),
        Some("alice".to_string())
    );
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), persisted);
    assert_eq!(ctx.router.current(), before);

    let note = ctx.notifications.current();
    assert_eq!(note.kind, NotificationKind::Error);
    assert_eq!(note.message, "Invalid username or password");
}

#[tokio::test]
async fn test_login_rejected_with_401_without_session_stays_put() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    let before = ctx.auth.navigate("/register");

    let err = ctx.auth.login("alice", "wrong").await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized { .. }));
    assert!(ctx.session.snapshot().is_empty());
    assert_eq!(ctx.router.current(), before);
    assert_eq!(before.route, RouteName::Register);
}

#[tokio::test]
async fn test_login_with_unexpected_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "flat" })))
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    let err = ctx.auth.login("alice", "s3cret").await.unwrap_err();

    assert!(matches!(err, Error::Decode { operation: "login", .. }));
    assert!(ctx.session.snapshot().is_empty());
}

#[tokio::test]
async fn test_login_with_malformed_token_keeps_previous_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "alice", "password": "s3cret" })))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "mallory", "password": "x" })))
        .respond_with(login_response("not-a-jwt"))
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();

    let err = ctx.auth.login("mallory", "x").await.unwrap_err();
    assert!(matches!(err, Error::Token(_)));
    assert_eq!(
        ctx.auth.user().and_then(|c| c.sub),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn test_fetch_profile_sends_bearer_and_stores_profile() {
    let server = MockServer::start().await;
    let token = live_token("alice", "USER");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response(&token))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(profile_response("alice"))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();
    let profile = ctx.auth.fetch_profile().await.unwrap();

    assert_eq!(profile.username, "alice");
    assert_eq!(profile.display_name(), "Test User");
    assert_eq!(
        ctx.session.snapshot().profile().map(|p| p.username.clone()),
        Some("alice".to_string())
    );
}

#[tokio::test]
async fn test_expired_token_is_not_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .and(header_exists("authorization"))
        .respond_with(profile_response("ghost"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    storage.save(TOKEN_KEY, &expired_token("alice")).unwrap();
    assert!(!ctx.session.restore().unwrap());

    let err = ctx.auth.fetch_profile().await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized { .. }));
}

#[tokio::test]
async fn test_unauthorized_clears_session_once_and_redirects_to_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();
    ctx.auth.navigate("/accounts");

    let mut changes = ctx.session.subscribe();
    let err = ctx.auth.fetch_profile().await.unwrap_err();

    assert!(matches!(err, Error::Unauthorized { operation: "profile", .. }));
    assert!(ctx.session.snapshot().is_empty());
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);

    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_empty());
    // Nothing left for a second invalidation to clear.
    assert!(!ctx.session.clear());

    let location = ctx.router.current();
    assert_eq!(location.route, RouteName::Login);
    assert_eq!(location.query_value("redirect"), Some("/accounts"));
}

#[tokio::test]
async fn test_profile_server_error_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/users/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();

    let err = ctx.auth.fetch_profile().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 500, .. }));
    assert!(!ctx.auth.is_authenticated());
    assert_eq!(ctx.router.current().route, RouteName::Login);
    assert_eq!(ctx.notifications.current().kind, NotificationKind::Error);
}

#[tokio::test]
async fn test_transport_failure_during_profile_fetch_ends_session() {
    // Nothing listens on the discard port.
    let config = ClientConfig::new("http://127.0.0.1:9".parse().unwrap());
    let ctx = AppContext::new(&config).unwrap();
    ctx.session
        .establish(AccessToken::new(live_token("alice", "USER")))
        .unwrap();

    let err = ctx.auth.fetch_profile().await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert!(!ctx.auth.is_authenticated());
    assert_eq!(ctx.router.current().route, RouteName::Login);
}

#[tokio::test]
async fn test_logout_clears_everything_and_shows_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(login_response(&live_token("alice", "USER")))
        .mount(&server)
        .await;

    let (ctx, storage) = context_for(&server);
    ctx.auth.login("alice", "s3cret").await.unwrap();
    ctx.auth.logout();

    assert!(ctx.session.snapshot().is_empty());
    assert_eq!(storage.load(TOKEN_KEY).unwrap(), None);
    assert_eq!(ctx.router.current().route, RouteName::Login);
    assert!(!ctx.auth.can_access("/dashboard"));
}

#[tokio::test]
async fn test_restore_live_session_skips_login() {
    let server = MockServer::start().await;
    let (ctx, storage) = context_for(&server);
    storage.save(TOKEN_KEY, &live_token("bob", "ADMIN")).unwrap();

    let location = ctx.auth.restore("/login").unwrap();
    assert_eq!(location.route, RouteName::Dashboard);
    assert!(ctx.auth.can_access("/admin"));
}
