//! Hot-swappable settings with change notification.
//!
//! `ConfigStore<T>` keeps the current value inside a `watch` channel, so
//! readers always get a cheap `Arc` snapshot and long-running loops can
//! `await` the next replacement instead of polling.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared settings that can be replaced at runtime (e.g. on SIGHUP).
///
/// Cloning the store is cheap; all clones observe the same value.
pub struct ConfigStore<T> {
    tx: Arc<watch::Sender<Arc<T>>>,
}

/// Receives the new value whenever its [`ConfigStore`] is updated.
pub struct ConfigWatcher<T> {
    rx: watch::Receiver<Arc<T>>,
}

impl<T> ConfigStore<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Replace the stored value and wake every watcher.
    ///
    /// Succeeds even when nobody is watching.
    pub fn update(&self, value: T) {
        self.tx.send_replace(Arc::new(value));
    }

    /// Snapshot of the current value. Never blocks on writers.
    pub fn current(&self) -> Arc<T> {
        self.tx.borrow().clone()
    }

    /// Subscribe to replacements made after this call.
    pub fn subscribe(&self) -> ConfigWatcher<T> {
        ConfigWatcher {
            rx: self.tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> ConfigWatcher<T> {
    /// Wait for the next replacement and return it.
    ///
    /// Fails once every [`ConfigStore`] clone has been dropped.
    pub async fn changed(&mut self) -> Result<Arc<T>, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }
}
