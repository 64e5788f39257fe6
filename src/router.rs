use std::fmt;

use time::OffsetDateTime;
use tokio::sync::watch;

use crate::session::Session;
use crate::types::Role;

/// Query parameter carrying the originally requested path to the login view.
pub const REDIRECT_PARAM: &str = "redirect";

/// Upper bound on chained guard redirects in one navigation.
const MAX_REDIRECTS: usize = 4;

/// Named views of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteName {
    Home,
    Login,
    Register,
    Dashboard,
    Accounts,
    Pay,
    Support,
    Profile,
    Admin,
    NotFound,
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Static route metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: &'static str,
    pub name: RouteName,
    pub requires_auth: bool,
    /// Allowed roles; `None` means any.
    pub roles: Option<&'static [&'static str]>,
}

impl RouteDescriptor {
    const fn public(path: &'static str, name: RouteName) -> Self {
        Self {
            path,
            name,
            requires_auth: false,
            roles: None,
        }
    }

    const fn protected(path: &'static str, name: RouteName) -> Self {
        Self {
            path,
            name,
            requires_auth: true,
            roles: None,
        }
    }

    const fn restricted(
        path: &'static str,
        name: RouteName,
        roles: &'static [&'static str],
    ) -> Self {
        Self {
            path,
            name,
            requires_auth: true,
            roles: Some(roles),
        }
    }
}

/// Catch-all for unknown paths. `/404` is its canonical path; a location
/// for an unknown path keeps the path that was asked for.
const NOT_FOUND: RouteDescriptor = RouteDescriptor::public("/404", RouteName::NotFound);

/// The application's route table. Unknown paths resolve to `NotFound`.
pub const ROUTES: &[RouteDescriptor] = &[
    RouteDescriptor::public("/", RouteName::Home),
    RouteDescriptor::public("/login", RouteName::Login),
    RouteDescriptor::public("/register", RouteName::Register),
    RouteDescriptor::protected("/dashboard", RouteName::Dashboard),
    RouteDescriptor::protected("/accounts", RouteName::Accounts),
    RouteDescriptor::protected("/payment", RouteName::Pay),
    RouteDescriptor::protected("/support", RouteName::Support),
    RouteDescriptor::protected("/profile", RouteName::Profile),
    RouteDescriptor::restricted("/admin", RouteName::Admin, &[Role::ADMIN]),
    NOT_FOUND,
];

/// Find the route for `path`, ignoring a trailing slash.
#[must_use]
pub fn resolve(path: &str) -> &'static RouteDescriptor {
    let normalized = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    ROUTES
        .iter()
        .find(|r| r.path == normalized)
        .unwrap_or(&NOT_FOUND)
}

/// Canonical path of a named route.
#[must_use]
pub fn path_of(name: RouteName) -> &'static str {
    ROUTES
        .iter()
        .find(|r| r.name == name)
        .map_or("/", |r| r.path)
}

/// Where the application currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub route: RouteName,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Default for Location {
    fn default() -> Self {
        Self::named(RouteName::Home)
    }
}

impl Location {
    /// Location of a named route with no query.
    #[must_use]
    pub fn named(route: RouteName) -> Self {
        Self {
            route,
            path: path_of(route).to_owned(),
            query: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Parse `"/path?key=value&..."`, resolving the route.
    #[must_use]
    pub fn parse(target: &str) -> Self {
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        let path = if path.is_empty() { "/" } else { path };
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_component(k), decode_component(v))
            })
            .collect();
        Self {
            route: resolve(path).name,
            path: path.to_owned(),
            query,
        }
    }

    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Path plus percent-encoded query string.
    #[must_use]
    pub fn full_path(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced).map_or_else(|_| spaced.clone(), |s| s.into_owned())
}

/// Outcome of the navigation guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Redirect(Location),
}

/// Decide whether navigation to `target` may proceed for `session` at `now`.
#[must_use]
pub fn guard(target: &Location, session: &Session, now: OffsetDateTime) -> GuardDecision {
    let route = resolve(&target.path);
    let authenticated = session.is_authenticated_at(now);

    if route.requires_auth && !authenticated {
        return GuardDecision::Redirect(
            Location::named(RouteName::Login).with_query(REDIRECT_PARAM, target.full_path()),
        );
    }

    if let Some(allowed) = route.roles {
        if !session.has_any_role(allowed) {
            return GuardDecision::Redirect(Location::named(RouteName::Home));
        }
    }

    if matches!(route.name, RouteName::Login | RouteName::Register) && authenticated {
        return GuardDecision::Redirect(Location::named(RouteName::Dashboard));
    }

    GuardDecision::Proceed
}

/// Holds the current location and runs the guard on every navigation.
#[derive(Debug)]
pub struct Router {
    current: watch::Sender<Location>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        let (current, _) = watch::channel(Location::default());
        Self { current }
    }

    #[must_use]
    pub fn current(&self) -> Location {
        self.current.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.current.subscribe()
    }

    /// Navigate to `target` as seen by `session` right now.
    pub fn navigate(&self, target: &str, session: &Session) -> Location {
        self.navigate_to(Location::parse(target), session, OffsetDateTime::now_utc())
    }

    /// Navigate to `target`, following guard redirects, and publish the
    /// final location.
    pub fn navigate_to(&self, target: Location, session: &Session, now: OffsetDateTime) -> Location {
        let requested = target.full_path();
        let mut location = target;

        for _ in 0..MAX_REDIRECTS {
            match guard(&location, session, now) {
                GuardDecision::Proceed => break,
                GuardDecision::Redirect(next) => {
                    tracing::debug!(
                        from = %location.full_path(),
                        to = %next.full_path(),
                        "Navigation redirected by guard"
                    );
                    location = next;
                }
            }
        }

        if location.full_path() != requested {
            tracing::info!(requested = %requested, resolved = %location.full_path(), "Navigation redirected");
        }
        self.current.send_replace(location.clone());
        location
    }

    /// Send the user to the login view, remembering where they were.
    ///
    /// Does not run the guard; used when the session was just invalidated.
    pub fn redirect_to_login(&self) -> Location {
        let current = self.current();
        let location = if current.route == RouteName::Login {
            current
        } else if current.route == RouteName::Home {
            Location::named(RouteName::Login)
        } else {
            Location::named(RouteName::Login).with_query(REDIRECT_PARAM, current.full_path())
        };
        self.current.send_replace(location.clone());
        location
    }
}
