use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Bearer credential issued by the authentication endpoint.
///
/// Opaque to the client apart from its JWT payload. `Debug` is redacted so
/// tokens never reach logs through `{:?}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Role name as carried in token claims and route restrictions.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, FromStr, From, Into,
)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub const ADMIN: &'static str = "ADMIN";

    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this role grants `name`, ignoring a Spring `ROLE_` prefix.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.0 == name || self.0.strip_prefix("ROLE_") == Some(name)
    }
}

impl PartialEq<str> for Role {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
