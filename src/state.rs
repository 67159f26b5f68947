//! Shared session state primitives: the change feed observed by the
//! presentation layer and the single user-visible error slot.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

/// Monotonic counter bumped whenever any controller mutates session state.
#[derive(Clone, Debug)]
pub struct Revision {
    tx: Arc<watch::Sender<u64>>,
}

impl Revision {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}

/// The one error message shown to the user. Each user action clears it before
/// doing its own work.
#[derive(Clone, Debug)]
pub struct ErrorState {
    message: Arc<Mutex<Option<String>>>,
    revision: Revision,
}

impl ErrorState {
    pub fn new(revision: Revision) -> Self {
        Self {
            message: Arc::new(Mutex::new(None)),
            revision,
        }
    }

    pub fn set(&self, message: impl Into<String>) {
        *self.message.lock() = Some(message.into());
        self.revision.bump();
    }

    pub fn clear(&self) {
        if self.message.lock().take().is_some() {
            self.revision.bump();
        }
    }

    pub fn current(&self) -> Option<String> {
        self.message.lock().clone()
    }
}
