//! Live subscriptions: a stream of snapshots plus a one-shot disposer.
//!
//! The store adapter keeps the [`SubscriptionFeed`] half inside its listener
//! task and pushes snapshots through it. The view owns the [`Subscription`]
//! half; dropping it (or calling [`Subscription::unsubscribe`]) tells the
//! adapter to stop listening.

use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;

pub type SnapshotResult<T> = Result<T, AppError>;

/// Consumer side of a live subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    events: mpsc::UnboundedReceiver<SnapshotResult<T>>,
    stop: Option<oneshot::Sender<()>>,
}

/// Producer side, held by the store adapter.
#[derive(Debug)]
pub struct SubscriptionFeed<T> {
    pub events: mpsc::UnboundedSender<SnapshotResult<T>>,
    /// Resolves once the subscriber unsubscribed or went away.
    pub stop: oneshot::Receiver<()>,
}

impl<T> Subscription<T> {
    pub fn channel() -> (SubscriptionFeed<T>, Subscription<T>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        (
            SubscriptionFeed {
                events: events_tx,
                stop: stop_rx,
            },
            Subscription {
                events: events_rx,
                stop: Some(stop_tx),
            },
        )
    }

    /// Next snapshot or listener error; `None` once the adapter stopped.
    pub async fn next(&mut self) -> Option<SnapshotResult<T>> {
        self.events.recv().await
    }

    /// Release the listener.
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}
