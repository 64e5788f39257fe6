use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::notification::NotificationStore;
use crate::router::Router;
use crate::session::SessionHandle;
use crate::storage::{FileStorage, MemoryStorage, TokenStorage};

/// Application-wide state, created once at start-up.
///
/// Every piece is a cheap handle; clone the ones a view needs.
#[derive(Clone)]
pub struct AppContext {
    pub session: SessionHandle,
    pub notifications: NotificationStore,
    pub router: Arc<Router>,
    pub api: ApiClient,
    pub auth: AuthStore,
}

impl AppContext {
    /// Wire all stores from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] / [`Error::Http`] if the HTTP client cannot
    /// be built.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let storage: Arc<dyn TokenStorage> = match config.storage_path() {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    /// Like [`new`](Self::new) with an explicit token storage backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] / [`Error::Http`] if the HTTP client cannot
    /// be built.
    pub fn with_storage(
        config: &ClientConfig,
        storage: Arc<dyn TokenStorage>,
    ) -> Result<Self, Error> {
        let session = SessionHandle::new(storage);
        let notifications = NotificationStore::new(config.notification_timeout());
        let router = Arc::new(Router::new());
        let api = ApiClient::new(config, session.clone(), Arc::clone(&router))?;
        let auth = AuthStore::new(
            api.clone(),
            session.clone(),
            Arc::clone(&router),
            notifications.clone(),
        );

        tracing::debug!(api_url = %config.api_url(), "Application context initialized");

        Ok(Self {
            session,
            notifications,
            router,
            api,
            auth,
        })
    }
}
