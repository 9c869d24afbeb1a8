//! Observable cells.
//!
//! An [`Observable`] holds the current value of one piece of control state.
//! Reads return a clone, writes publish only when the value actually changes,
//! and consumers either hold a `tokio::sync::watch::Receiver` or register a
//! callback with [`Observable::watch`].
//!
//! Callback delivery is deferred: the callback runs on a spawned task after
//! the writer's synchronous work yields, and bursts of writes may coalesce
//! into one call carrying the latest value.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::{Error, Result};

/// Options for [`Observable::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Invoke the callback once, synchronously, with the current value and no
    /// previous value.
    pub immediate: bool,
}

/// Stop handle for a callback watcher.
///
/// Dropping the handle detaches the watcher; it keeps running until the
/// observed cell is dropped. Call [`WatchHandle::stop`] to unregister.
#[derive(Debug)]
pub struct WatchHandle {
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }
}

/// A value cell that notifies subscribers on change.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T> Observable<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        let (tx, _rx) = watch::channel(value);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Borrow the current value without cloning. Do not write to this cell
    /// from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Store `value`, notifying subscribers if it differs from the current
    /// one. Returns whether anything changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Mutate the value in place and notify subscribers unconditionally.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        self.tx.send_modify(f);
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    /// Call `callback(new, old)` on every change until stopped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside a tokio runtime.
    pub fn watch<F>(&self, mut callback: F, options: WatchOptions) -> Result<WatchHandle>
    where
        F: FnMut(&T, Option<&T>) + Send + 'static,
    {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::NoRuntime(format!("cannot register watcher: {e}")))?;

        let mut rx = self.tx.subscribe();
        let mut old = rx.borrow_and_update().clone();
        if options.immediate {
            callback(&old, None);
        }

        let task = handle.spawn(async move {
            while rx.changed().await.is_ok() {
                let new = rx.borrow_and_update().clone();
                callback(&new, Some(&old));
                old = new;
            }
            trace!("observable dropped, watcher exiting");
        });

        Ok(WatchHandle { task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn set_reports_changes_only() {
        let cell = Observable::new(1);
        assert!(!cell.set(1));
        assert!(cell.set(2));
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn watch_requires_runtime() {
        let cell = Observable::new(0);
        assert!(matches!(
            cell.watch(|_, _| {}, WatchOptions::default()),
            Err(Error::NoRuntime(_))
        ));
    }

    #[tokio::test]
    async fn watch_delivers_new_and_old() {
        let cell = Observable::new("a".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = cell
            .watch(
                move |new, old| sink.lock().unwrap().push((new.clone(), old.cloned())),
                WatchOptions { immediate: true },
            )
            .unwrap();

        cell.set("b".to_string());
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), None),
                ("b".to_string(), Some("a".to_string())),
            ]
        );
        handle.stop();
    }
}
