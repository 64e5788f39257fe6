#![doc = include_str!("../README.md")]

#[cfg(feature = "client")]
pub mod api;
#[cfg(feature = "client")]
pub mod auth;
pub mod config;
#[cfg(feature = "client")]
pub mod context;
pub mod error;
pub mod notification;
pub mod profile;
pub mod router;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "client")]
pub use api::{ApiClient, Envelope};
#[cfg(feature = "client")]
pub use auth::AuthStore;
pub use config::{ClientConfig, DevTls};
#[cfg(feature = "client")]
pub use context::AppContext;
pub use error::Error;
pub use notification::{Notification, NotificationKind, NotificationStore};
pub use profile::Profile;
pub use router::{GuardDecision, Location, RouteDescriptor, RouteName, Router, guard};
pub use session::{Session, SessionHandle};
pub use storage::{FileStorage, MemoryStorage, TokenStorage};
pub use token::{Claims, decode_claims, is_token_expired};
pub use types::{AccessToken, Role};
