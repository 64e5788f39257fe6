use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, Envelope};
use crate::error::Error;
use crate::notification::NotificationStore;
use crate::profile::Profile;
use crate::router::{self, Location, REDIRECT_PARAM, RouteName, Router};
use crate::session::SessionHandle;
use crate::token::Claims;
use crate::types::AccessToken;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const PROFILE_PATH: &str = "/api/users/profile";

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: AccessToken,
}

/// Session actions: login, logout, profile fetch and start-up restore.
#[derive(Clone)]
pub struct AuthStore {
    api: ApiClient,
    session: SessionHandle,
    router: Arc<Router>,
    notifications: NotificationStore,
}

impl AuthStore {
    #[must_use]
    pub fn new(
        api: ApiClient,
        session: SessionHandle,
        router: Arc<Router>,
        notifications: NotificationStore,
    ) -> Self {
        Self {
            api,
            session,
            router,
            notifications,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Decoded claims of the current user.
    #[must_use]
    pub fn user(&self) -> Option<Claims> {
        self.session.claims()
    }

    /// Authenticate and start a session.
    ///
    /// On success the user lands on the page they were sent to login from,
    /// or the dashboard. On failure the previous session is kept, an error
    /// notification is shown, and the router does not move.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthorized`] / [`Error::Api`] when the backend rejects the
    ///   credentials; neither touches the current session
    /// - [`Error::Http`] on transport failure
    /// - [`Error::Decode`] / [`Error::Token`] when the response is not a usable token
    pub async fn login(&self, username: &str, password: &str) -> Result<Claims, Error> {
        match self.try_login(username, password).await {
            Ok(claims) => {
                tracing::info!(username, sub = ?claims.sub, "Login successful");
                self.notifications.success("Logged in successfully");
                let target = self.post_login_target();
                self.router.navigate_to(
                    target,
                    &self.session.snapshot(),
                    time::OffsetDateTime::now_utc(),
                );
                Ok(claims)
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "Login failed");
                self.notifications.error(e.user_message());
                Err(e)
            }
        }
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<Claims, Error> {
        let body = Credentials { username, password };
        let envelope: Envelope<LoginData> = self
            .api
            .post_credentials(LOGIN_PATH, &body, "login")
            .await?;
        self.session.establish(envelope.data.token)
    }

    fn post_login_target(&self) -> Location {
        let current = self.router.current();
        current
            .query_value(REDIRECT_PARAM)
            .map(Location::parse)
            .filter(|loc| {
                !matches!(
                    loc.route,
                    RouteName::NotFound | RouteName::Login | RouteName::Register
                )
            })
            .unwrap_or_else(|| Location::named(RouteName::Dashboard))
    }

    /// End the session and return to the login view.
    pub fn logout(&self) {
        if self.session.clear() {
            tracing::info!("Logged out");
        }
        self.router.navigate_to(
            Location::named(RouteName::Login),
            &self.session.snapshot(),
            time::OffsetDateTime::now_utc(),
        );
    }

    /// Fetch the profile of the current user and attach it to the session.
    ///
    /// Any failure ends the session; a 401 has already been handled by the
    /// client by the time it gets here.
    ///
    /// # Errors
    ///
    /// Returns the underlying request or decode error.
    pub async fn fetch_profile(&self) -> Result<Profile, Error> {
        match self
            .api
            .get::<Envelope<Profile>>(PROFILE_PATH, "profile")
            .await
        {
            Ok(envelope) => {
                let profile = envelope.data;
                self.session.set_profile(profile.clone());
                Ok(profile)
            }
            Err(e @ Error::Unauthorized { .. }) => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch failed, ending session");
                self.session.clear();
                self.router.redirect_to_login();
                self.notifications.error(e.user_message());
                Err(e)
            }
        }
    }

    /// Restore a persisted session at start-up and navigate to `initial`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if persisted state cannot be read.
    pub fn restore(&self, initial: &str) -> Result<Location, Error> {
        self.session.restore()?;
        Ok(self.router.navigate(initial, &self.session.snapshot()))
    }

    /// Navigate with the current session as the guard's view of the world.
    pub fn navigate(&self, target: &str) -> Location {
        self.router.navigate(target, &self.session.snapshot())
    }

    /// Whether `target` is reachable for the current session without redirect.
    #[must_use]
    pub fn can_access(&self, target: &str) -> bool {
        matches!(
            router::guard(
                &Location::parse(target),
                &self.session.snapshot(),
                time::OffsetDateTime::now_utc(),
            ),
            router::GuardDecision::Proceed
        )
    }
}
