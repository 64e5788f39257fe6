use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::error::Error;
use crate::profile::Profile;
use crate::storage::{MemoryStorage, TOKEN_KEY, TokenStorage};
use crate::token::{self, Claims};
use crate::types::{AccessToken, Role};

/// Client-side session: the bearer token and what was learned from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    token: Option<AccessToken>,
    claims: Option<Claims>,
    profile: Option<Profile>,
}

impl Session {
    /// Build a session from a raw token, decoding its claims.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if the token payload cannot be decoded.
    pub fn from_token(token: AccessToken) -> Result<Self, Error> {
        let claims = token::decode_claims(token.as_str())?;
        Ok(Self {
            token: Some(token),
            claims: Some(claims),
            profile: None,
        })
    }

    #[must_use]
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.claims.is_none() && self.profile.is_none()
    }

    /// True when there is no token, or its claims are missing or expired.
    #[must_use]
    pub fn is_token_expired_at(&self, now: OffsetDateTime) -> bool {
        match (&self.token, &self.claims) {
            (Some(_), Some(claims)) => claims.is_expired_at(now),
            _ => true,
        }
    }

    #[must_use]
    pub fn is_authenticated_at(&self, now: OffsetDateTime) -> bool {
        self.token.is_some() && !self.is_token_expired_at(now)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(OffsetDateTime::now_utc())
    }

    /// Roles of the current user: token claims first, then the profile role.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.claims
            .iter()
            .flat_map(|claims| claims.all_roles())
            .chain(self.profile.iter().filter_map(|p| p.role.as_ref()))
    }

    #[must_use]
    pub fn has_any_role(&self, allowed: &[&str]) -> bool {
        self.roles()
            .any(|r| allowed.iter().any(|name| r.matches(name)))
    }
}

/// Shared, observable session state backed by persistent storage.
///
/// Cloning yields another handle to the same session. Every mutation goes
/// through this handle so the persisted token never drifts from memory.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: watch::Sender<Session>,
    storage: Arc<dyn TokenStorage>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }
}

impl SessionHandle {
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(SessionInner { state, storage }),
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    /// Receive a notification on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Token to attach to outgoing requests, if the session is live at `now`.
    #[must_use]
    pub fn bearer_token_at(&self, now: OffsetDateTime) -> Option<AccessToken> {
        let session = self.inner.state.borrow();
        if session.is_authenticated_at(now) {
            session.token.clone()
        } else {
            None
        }
    }

    #[must_use]
    pub fn claims(&self) -> Option<Claims> {
        self.inner.state.borrow().claims.clone()
    }

    /// Replace the session with one built from `token` and persist it.
    ///
    /// On a decode error the current session is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::Token` if the token cannot be decoded.
    pub fn establish(&self, token: AccessToken) -> Result<Claims, Error> {
        let claims = token::decode_claims(token.as_str())?;

        if let Err(e) = self.inner.storage.save(TOKEN_KEY, token.as_str()) {
            tracing::warn!(error = %e, "Failed to persist session token");
        }
        tracing::debug!(sub = ?claims.sub, exp = ?claims.exp, "Session established");

        self.inner.state.send_replace(Session {
            token: Some(token),
            claims: Some(claims.clone()),
            profile: None,
        });
        Ok(claims)
    }

    /// Attach a fetched profile to the current session.
    ///
    /// Ignored when the session has been cleared in the meantime.
    pub fn set_profile(&self, profile: Profile) {
        self.inner.state.send_if_modified(|session| {
            if session.token.is_none() {
                return false;
            }
            session.profile = Some(profile);
            true
        });
    }

    /// Clear token, claims, profile and the persisted token.
    ///
    /// Returns `true` if there was anything to clear.
    pub fn clear(&self) -> bool {
        let cleared = self.inner.state.send_if_modified(|session| {
            if session.is_empty() {
                return false;
            }
            *session = Session::default();
            true
        });

        if let Err(e) = self.inner.storage.remove(TOKEN_KEY) {
            tracing::warn!(error = %e, "Failed to remove persisted session token");
        }
        cleared
    }

    /// Load a persisted token into the session.
    ///
    /// Malformed or expired tokens are dropped from storage. Returns whether
    /// an authenticated session was restored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the storage backend cannot be read.
    pub fn restore_at(&self, now: OffsetDateTime) -> Result<bool, Error> {
        let Some(raw) = self.inner.storage.load(TOKEN_KEY)? else {
            return Ok(false);
        };

        match Session::from_token(AccessToken::new(raw)) {
            Ok(session) if session.is_authenticated_at(now) => {
                tracing::info!(
                    sub = ?session.claims.as_ref().and_then(|c| c.sub.as_deref()),
                    "Session restored from storage"
                );
                self.inner.state.send_replace(session);
                Ok(true)
            }
            Ok(_) => {
                tracing::info!("Persisted session token expired, discarding");
                self.inner.storage.remove(TOKEN_KEY)?;
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Persisted session token is malformed, discarding");
                self.inner.storage.remove(TOKEN_KEY)?;
                Ok(false)
            }
        }
    }

    /// [`restore_at`](Self::restore_at) with the current time.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the storage backend cannot be read.
    pub fn restore(&self) -> Result<bool, Error> {
        self.restore_at(OffsetDateTime::now_utc())
    }
}
