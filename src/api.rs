use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::router::Router;
use crate::session::SessionHandle;

/// Standard `{ "data": ... }` response wrapper used by the backend.
#[derive(Debug, Clone, serde::Deserialize)]
#[non_exhaustive]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

/// What a 401 means for the request being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnUnauthorized {
    /// The session is no longer valid: clear it and go to login.
    Invalidate,
    /// Credentials were rejected; report only.
    Reject,
}

/// HTTP client bound to the backend base URL and the current session.
///
/// Attaches the bearer token while the session is live. A 401 response
/// clears the session and sends the router to the login view before the
/// error reaches the caller.
#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    session: SessionHandle,
    router: Arc<Router>,
}

impl ApiClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the dev certificate cannot be loaded, or
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        session: SessionHandle,
        router: Arc<Router>,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout());

        if let Some(tls) = config.dev_tls() {
            let pem = tls.read_cert()?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                Error::Config(format!("certificate {}: {e}", tls.cert_path.display()))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        Ok(Self {
            base_url: config.api_url().clone(),
            http: builder.build()?,
            session,
            router,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); additionally [`Error::Decode`] when the body
    /// does not match `T`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
    ) -> Result<T, Error> {
        let request = self.http.get(self.endpoint(path)?);
        let response = self.send(request, operation).await?;
        Self::decode(response, operation).await
    }

    /// `POST path` with a JSON body and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See [`send`](Self::send); additionally [`Error::Decode`] when the body
    /// does not match `T`.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<T, Error> {
        let request = self.http.post(self.endpoint(path)?).json(body);
        let response = self.send(request, operation).await?;
        Self::decode(response, operation).await
    }

    /// `POST` credentials to an authentication endpoint.
    ///
    /// A 401 here means the credentials were rejected, not that the current
    /// session ended, so the session and router are left alone.
    ///
    /// # Errors
    ///
    /// Same as [`post`](Self::post), except that [`Error::Unauthorized`]
    /// carries the response body and has no side effects.
    pub async fn post_credentials<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        operation: &'static str,
    ) -> Result<T, Error> {
        let request = self.http.post(self.endpoint(path)?).json(body);
        let response = self
            .dispatch(request, operation, OnUnauthorized::Reject)
            .await?;
        Self::decode(response, operation).await
    }

    /// Attach credentials, send, and map the status.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] on transport failure
    /// - [`Error::Unauthorized`] on 401, after the session was invalidated
    /// - [`Error::Api`] on any other non-success status
    pub async fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        self.dispatch(request, operation, OnUnauthorized::Invalidate)
            .await
    }

    async fn dispatch(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        on_unauthorized: OnUnauthorized,
    ) -> Result<reqwest::Response, Error> {
        let request = match self.session.bearer_token_at(OffsetDateTime::now_utc()) {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        };

        let response = request.send().await.map_err(|e| {
            tracing::warn!(operation, error = %e, "Request failed");
            Error::from(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if on_unauthorized == OnUnauthorized::Invalidate {
                self.invalidate_session(operation);
            }
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Unauthorized { operation, detail });
        }
        Self::ensure_success(response, operation).await
    }

    fn invalidate_session(&self, operation: &'static str) {
        if self.session.clear() {
            tracing::warn!(operation, "Received 401, session cleared");
        } else {
            tracing::debug!(operation, "Received 401 without a session");
        }
        self.router.redirect_to_login();
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("invalid endpoint {path}: {e}")))
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<T, Error> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode {
            operation,
            detail: e.to_string(),
        })
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Api {
            operation,
            status,
            detail: body,
        })
    }
}
