//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mbank_client::{AppContext, ClientConfig, MemoryStorage};
use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};
use wiremock::{MockServer, ResponseTemplate};

/// Unsigned JWT around `payload`.
pub fn make_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2lnbmF0dXJl")
}

/// Token for `sub` with `role`, valid for another hour.
pub fn live_token(sub: &str, role: &str) -> String {
    let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
    make_token(&json!({ "sub": sub, "role": role, "exp": exp }))
}

pub fn expired_token(sub: &str) -> String {
    let exp = (OffsetDateTime::now_utc() - Duration::hours(1)).unix_timestamp();
    make_token(&json!({ "sub": sub, "exp": exp }))
}

/// `{ "data": { "token": ... } }` with status 200.
pub fn login_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "data": { "token": token } }))
}

pub fn profile_response(username: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "data": {
            "id": 1,
            "username": username,
            "email": format!("{username}@example.com"),
            "firstName": "Test",
            "lastName": "User",
        }
    }))
}

/// Context pointed at `server` with in-memory storage.
pub fn context_for(server: &MockServer) -> (AppContext, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let config = ClientConfig::new(server.uri().parse().unwrap());
    let ctx = AppContext::with_storage(&config, storage.clone()).unwrap();
    (ctx, storage)
}
