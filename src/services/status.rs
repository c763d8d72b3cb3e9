//! Transient status line shown next to a view ("Saved!", errors, ...).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a status message stays visible.
pub const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(2);

/// A message that clears itself after [`STATUS_CLEAR_AFTER`].
///
/// Every `set` bumps a generation counter; a pending clear only fires if no
/// newer message replaced the one it was scheduled for.
#[derive(Clone, Default)]
pub struct StatusLine {
    inner: Arc<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    message: Mutex<String>,
    generation: AtomicU64,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show a message and schedule its removal.
    pub fn set(&self, message: impl Into<String>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut current) = self.inner.message.lock() {
            *current = message.into();
        }

        let inner = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(STATUS_CLEAR_AFTER).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.generation.load(Ordering::SeqCst) == generation {
                if let Ok(mut current) = inner.message.lock() {
                    current.clear();
                }
            }
        });
    }

    /// Current message; empty when nothing is shown.
    pub fn get(&self) -> String {
        self.inner
            .message
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }
}
