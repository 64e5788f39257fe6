use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::notification::DEFAULT_HIDE_AFTER;

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DEV_PORT: u16 = 3000;

/// Certificate and key used by the local development server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevTls {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl DevTls {
    #[must_use]
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Read the PEM certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read.
    pub fn read_cert(&self) -> Result<Vec<u8>, Error> {
        read_pem(&self.cert_path, "certificate")
    }

    /// Read the PEM private key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read.
    pub fn read_key(&self) -> Result<Vec<u8>, Error> {
        read_pem(&self.key_path, "private key")
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>, Error> {
    std::fs::read(path).map_err(|e| Error::Config(format!("{what} {}: {e}", path.display())))
}

/// Client configuration.
///
/// Every field has a default; use [`from_env()`](ClientConfig::from_env) for
/// convention-based setup or `with_*` methods for full control.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) api_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) notification_timeout: Duration,
    pub(crate) storage_path: Option<PathBuf>,
    pub(crate) dev_tls: Option<DevTls>,
    pub(crate) dev_port: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.parse().expect("valid default URL"),
            timeout: DEFAULT_TIMEOUT,
            notification_timeout: DEFAULT_HIDE_AFTER,
            storage_path: None,
            dev_tls: None,
            dev_port: DEFAULT_DEV_PORT,
        }
    }
}

impl ClientConfig {
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self::default().with_api_url(api_url)
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `MBANK_API_URL`: Backend base URL (default `http://localhost:8080`)
    /// - `MBANK_TIMEOUT_SECS`: Request timeout in seconds
    /// - `MBANK_NOTIFICATION_MS`: Notification auto-hide delay in milliseconds
    /// - `MBANK_STORAGE_PATH`: File to persist the session token in
    /// - `MBANK_SSL_CERT_PATH` / `MBANK_SSL_KEY_PATH`: Dev TLS material (both or neither)
    /// - `MBANK_DEV_PORT`: Dev server port (default 3000)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(url_str) = lookup("MBANK_API_URL").filter(|s| !s.is_empty()) {
            let url: Url = url_str
                .parse()
                .map_err(|e| Error::Config(format!("MBANK_API_URL: {e}")))?;
            config = config.with_api_url(url);
        }
        if let Some(secs) = lookup("MBANK_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("MBANK_TIMEOUT_SECS: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = lookup("MBANK_NOTIFICATION_MS") {
            let ms: u64 = ms
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("MBANK_NOTIFICATION_MS: {e}")))?;
            config = config.with_notification_timeout(Duration::from_millis(ms));
        }
        if let Some(path) = lookup("MBANK_STORAGE_PATH").filter(|s| !s.is_empty()) {
            config = config.with_storage_path(path);
        }

        match (lookup("MBANK_SSL_CERT_PATH"), lookup("MBANK_SSL_KEY_PATH")) {
            (Some(cert), Some(key)) => config = config.with_dev_tls(DevTls::new(cert, key)),
            (None, None) => {}
            _ => {
                return Err(Error::Config(
                    "MBANK_SSL_CERT_PATH and MBANK_SSL_KEY_PATH must be set together".into(),
                ));
            }
        }

        if let Some(port) = lookup("MBANK_DEV_PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("MBANK_DEV_PORT: {e}")))?;
            config = config.with_dev_port(port);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = url;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_notification_timeout(mut self, timeout: Duration) -> Self {
        self.notification_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_dev_tls(mut self, tls: DevTls) -> Self {
        self.dev_tls = Some(tls);
        self
    }

    #[must_use]
    pub fn with_dev_port(mut self, port: u16) -> Self {
        self.dev_port = port;
        self
    }

    /// Backend base URL.
    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn notification_timeout(&self) -> Duration {
        self.notification_timeout
    }

    /// Token persistence file; `None` keeps the session in memory only.
    #[must_use]
    pub fn storage_path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    #[must_use]
    pub fn dev_tls(&self) -> Option<&DevTls> {
        self.dev_tls.as_ref()
    }

    #[must_use]
    pub fn dev_port(&self) -> u16 {
        self.dev_port
    }
}
