//! Handle for a view's background listener task.

use tokio::task::JoinHandle;

/// A running listener bound to one key (a uid or a collection path).
///
/// The task owns the store subscription; dropping the handle aborts the
/// task, which drops the subscription and so fires its disposer.
pub(crate) struct ListenerHandle {
    key: String,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(key: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            key: key.into(),
            task,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
