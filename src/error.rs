#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status other than 401.
    #[error("{operation} failed ({status}): {detail}")]
    Api {
        operation: &'static str,
        status: u16,
        detail: String,
    },

    /// Backend answered 401. For session-bound requests the session has
    /// already been invalidated.
    #[error("{operation}: not authenticated")]
    Unauthorized {
        operation: &'static str,
        detail: String,
    },

    /// Response body did not match the expected schema.
    #[error("Unexpected response from {operation}: {detail}")]
    Decode {
        operation: &'static str,
        detail: String,
    },

    #[error("Token error: {0}")]
    Token(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Text suitable for a user-facing notification.
    ///
    /// Prefers the backend's own `message` field when the error body is a
    /// JSON object carrying one.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { detail, .. } => backend_message(detail)
                .unwrap_or_else(|| "Request failed. Please try again.".to_string()),
            Self::Unauthorized { detail, .. } => backend_message(detail)
                .unwrap_or_else(|| "Authentication required. Please log in again.".to_string()),
            #[cfg(feature = "client")]
            Self::Http(_) => "Unable to reach the server.".into(),
            Self::Decode { .. } | Self::Token(_) => "Unexpected response from the server.".into(),
            Self::Storage(_) | Self::Config(_) => "Internal error.".into(),
        }
    }
}

fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .filter(|msg| !msg.is_empty())
        .map(str::to_owned)
}
