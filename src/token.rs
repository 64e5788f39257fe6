use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use time::OffsetDateTime;

use crate::error::Error;
use crate::types::Role;

/// Decoded JWT payload.
///
/// Decoding does not verify the signature; the backend does that on every
/// request. The client only reads the payload for display, role checks and
/// expiry. Registered claims are read leniently so any token the backend
/// accepts also decodes here; only a non-numeric `exp` is rejected, since
/// expiry must fail closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(
        default,
        deserialize_with = "lenient_subject",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,
    /// Expiry as seconds since the Unix epoch (NumericDate, may be fractional).
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_role",
        skip_serializing_if = "Option::is_none"
    )]
    pub role: Option<Role>,
    /// Accepts a single name, a list of names, or `{"authority": ..}` objects.
    #[serde(
        default,
        deserialize_with = "lenient_roles",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub roles: Vec<Role>,
    /// Every other payload field.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl Claims {
    /// Gets a non-registered claim by key.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.extra.get(key)
    }

    /// All roles carried by the token, `role` first.
    pub fn all_roles(&self) -> impl Iterator<Item = &Role> {
        self.role.iter().chain(self.roles.iter())
    }

    #[must_use]
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        self.all_roles()
            .any(|r| allowed.iter().any(|name| r.matches(name)))
    }

    /// Whether the token is expired at `now`.
    ///
    /// A payload without `exp` never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        let now_secs = now.unix_timestamp_nanos() as f64 / 1e9;
        self.exp.is_some_and(|exp| now_secs >= exp)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp_nanos((exp * 1e9) as i128).ok())
    }
}

fn numeric_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<JsonValue>::deserialize(deserializer)? {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("NumericDate out of range")),
        Some(other) => Err(de::Error::custom(format!(
            "NumericDate must be a number, got {other}"
        ))),
    }
}

fn lenient_numeric_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    Ok(Option::<JsonValue>::deserialize(deserializer)?.and_then(|v| v.as_f64()))
}

fn lenient_subject<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        Some(JsonValue::String(s)) => Some(s),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Role>, D::Error> {
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        Some(JsonValue::Array(items)) => items.iter().find_map(role_name),
        Some(value) => role_name(&value),
        None => None,
    })
}

fn lenient_roles<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Role>, D::Error> {
    Ok(match Option::<JsonValue>::deserialize(deserializer)? {
        Some(JsonValue::Array(items)) => items.iter().filter_map(role_name).collect(),
        Some(value) => role_name(&value).into_iter().collect(),
        None => Vec::new(),
    })
}

/// Role name from a string or a Spring-style `{"authority": ..}` object.
fn role_name(value: &JsonValue) -> Option<Role> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(Role::new(s.as_str())),
        JsonValue::Object(map) => ["authority", "role", "name"]
            .iter()
            .find_map(|key| map.get(*key).and_then(JsonValue::as_str))
            .filter(|s| !s.is_empty())
            .map(Role::new),
        _ => None,
    }
}

/// Decodes the payload of a compact JWS (`header.payload.signature`).
///
/// # Errors
///
/// Returns `Error::Token` if the token does not have three segments, the
/// payload is not base64url, or it is not a JSON object of the expected shape.
pub fn decode_claims(token_str: &str) -> Result<Claims, Error> {
    let payload_bytes = extract_payload_from_token(token_str)?;
    let payload: JsonValue = serde_json::from_slice(&payload_bytes)
        .map_err(|_| Error::Token("invalid payload".into()))?;
    if !payload.is_object() {
        return Err(Error::Token("payload is not a JSON object".into()));
    }
    serde_json::from_value(payload).map_err(|e| Error::Token(format!("invalid claims: {e}")))
}

/// Whether a raw token should be treated as expired at `now`.
///
/// Undecodable tokens count as expired.
#[must_use]
pub fn is_token_expired(token_str: &str, now: OffsetDateTime) -> bool {
    decode_claims(token_str).map_or(true, |claims| claims.is_expired_at(now))
}

/// Extracts the raw payload bytes from a compact JWS string.
pub(crate) fn extract_payload_from_token(token_str: &str) -> Result<Vec<u8>, Error> {
    let parts: Vec<&str> = token_str.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::Token("invalid token format".into()));
    }

    let payload_b64 = parts[1].trim_end_matches('=');
    if payload_b64.is_empty() {
        return Err(Error::Token("missing payload".into()));
    }

    URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| Error::Token("invalid payload encoding".into()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    /// Builds an unsigned token around `payload`.
    pub(crate) fn make_token(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }
}
