//! Cancellable task group
//!
//! All periodic tasks of a round are spawned into one group and cancelled as
//! a unit. Cancellation is a latched `watch` flag: idempotent, observable by
//! any number of tasks, and triggerable from inside the group itself.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cancellation signal shared by every task in a group
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Cancel the whole group. Cancelling twice is a no-op.
    pub fn cancel(&self) {
        self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the group is cancelled
    pub async fn cancelled(&mut self) {
        // Err only if the sender is dropped
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A set of tasks that share one [`CancelToken`]
#[derive(Debug)]
pub struct TaskGroup {
    token: CancelToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Spawn a task built from a fresh clone of the group's token
    pub fn spawn<F, Fut>(&mut self, name: &'static str, make: F)
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(make(self.token.clone()));
        self.handles.push((name, handle));
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Cancel and wait for every task to finish
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, handle) in self.handles {
            match handle.await {
                Ok(()) => debug!("Task '{}' stopped", name),
                Err(e) if e.is_cancelled() => debug!("Task '{}' aborted", name),
                Err(e) => warn!("Task '{}' panicked: {}", name, e),
            }
        }
    }
}

impl Default for TaskGroup {
    fn default() -> Self {
        Self::new()
    }
}
