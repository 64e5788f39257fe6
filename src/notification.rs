use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Default time a notification stays visible.
pub const DEFAULT_HIDE_AFTER: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Success,
    Error,
}

/// The single notification slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub visible: bool,
    pub message: String,
    pub kind: NotificationKind,
}

/// Transient user-facing message with auto-hide.
///
/// `show` replaces whatever is displayed and restarts the timer; there is
/// no queue. The hide timer runs on the ambient tokio runtime.
#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<NotificationInner>,
}

struct NotificationInner {
    state: watch::Sender<Notification>,
    generation: AtomicU64,
    hide_after: Duration,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_AFTER)
    }
}

impl NotificationStore {
    #[must_use]
    pub fn new(hide_after: Duration) -> Self {
        let (state, _) = watch::channel(Notification::default());
        Self {
            inner: Arc::new(NotificationInner {
                state,
                generation: AtomicU64::new(0),
                hide_after,
            }),
        }
    }

    #[must_use]
    pub fn hide_after(&self) -> Duration {
        self.inner.hide_after
    }

    #[must_use]
    pub fn current(&self) -> Notification {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Notification> {
        self.inner.state.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(message, NotificationKind::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(message, NotificationKind::Error);
    }

    /// Display `message`, replacing any current notification.
    pub fn show(&self, message: impl Into<String>, kind: NotificationKind) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state.send_replace(Notification {
            visible: true,
            message: message.into(),
            kind,
        });

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime; notification will not auto-hide");
            return;
        };
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            tokio::time::sleep(inner.hide_after).await;
            // A newer `show` owns the slot now.
            if inner.generation.load(Ordering::SeqCst) == generation {
                inner.hide();
            }
        });
    }

    /// Dismiss the current notification immediately.
    pub fn hide(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.hide();
    }
}

impl NotificationInner {
    fn hide(&self) {
        self.state.send_if_modified(|n| std::mem::replace(&mut n.visible, false));
    }
}
