//! FIFO tracking of in-flight control commands.
//!
//! The legacy protocol acknowledges a key with `00 00 00 00` and nothing
//! else, so acknowledgements are matched to commands purely by order.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

// ── PendingCommand ───────────────────────────────────────────────

/// A control command waiting for the TV to accept it.
#[derive(Debug)]
struct PendingCommand {
    /// Registration id, unique per [`PendingCommands`].
    id: u64,
    key: String,
    done: oneshot::Sender<()>,
}

// ── PendingCommands ──────────────────────────────────────────────

#[derive(Debug, Default)]
struct Queue {
    next_id: u64,
    waiters: VecDeque<PendingCommand>,
}

/// Registration-ordered queue of one-shot completions.
///
/// Shared between callers of `control` and the response loop.
#[derive(Debug, Default)]
pub struct PendingCommands {
    queue: Mutex<Queue>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command; the receiver fires when it is acknowledged.
    pub fn register(&self, key: &str) -> (u64, oneshot::Receiver<()>) {
        let (done, rx) = oneshot::channel();
        let mut queue = self.lock();
        queue.next_id += 1;
        let id = queue.next_id;
        queue.waiters.push_back(PendingCommand {
            id,
            key: key.to_string(),
            done,
        });
        (id, rx)
    }

    /// Signal and remove the oldest command. Returns its key, or `None`
    /// when nothing was waiting.
    pub fn complete_oldest(&self) -> Option<String> {
        let command = self.lock().waiters.pop_front()?;
        // The caller may already have stopped waiting.
        let _ = command.done.send(());
        Some(command.key)
    }

    /// Remove a command whether or not it was acknowledged.
    pub fn deregister(&self, id: u64) -> bool {
        let mut queue = self.lock();
        match queue.waiters.iter().position(|c| c.id == id) {
            Some(index) => {
                queue.waiters.remove(index);
                true
            }
            None => false,
        }
    }

    /// Drop every waiter; their receivers resolve with an error.
    pub fn clear(&self) -> usize {
        let mut queue = self.lock();
        let dropped = queue.waiters.len();
        queue.waiters.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().waiters.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_in_registration_order() {
        let pending = PendingCommands::new();
        let (_, mut first) = pending.register("KEY_VOLUP");
        let (_, mut second) = pending.register("KEY_VOLDOWN");
        assert_eq!(pending.len(), 2);

        assert_eq!(pending.complete_oldest().as_deref(), Some("KEY_VOLUP"));
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_err());

        assert_eq!(pending.complete_oldest().as_deref(), Some("KEY_VOLDOWN"));
        assert!(second.try_recv().is_ok());
        assert!(pending.is_empty());
    }

    #[test]
    fn complete_without_waiters_is_noop() {
        let pending = PendingCommands::new();
        assert!(pending.complete_oldest().is_none());
    }

    #[test]
    fn deregister_removes_only_target() {
        let pending = PendingCommands::new();
        let (a, _rx_a) = pending.register("A");
        let (b, _rx_b) = pending.register("B");
        assert_ne!(a, b);

        assert!(pending.deregister(a));
        assert!(!pending.deregister(a));
        assert_eq!(pending.complete_oldest().as_deref(), Some("B"));
    }

    #[test]
    fn late_acknowledgement_after_deregister() {
        let pending = PendingCommands::new();
        let (id, rx) = pending.register("KEY_MENU");
        drop(rx);
        pending.deregister(id);
        assert!(pending.complete_oldest().is_none());
    }

    #[test]
    fn completion_after_receiver_dropped() {
        let pending = PendingCommands::new();
        let (_, rx) = pending.register("KEY_MENU");
        drop(rx);
        assert_eq!(pending.complete_oldest().as_deref(), Some("KEY_MENU"));
    }

    #[test]
    fn clear_wakes_receivers_with_error() {
        let pending = PendingCommands::new();
        let (_, mut rx) = pending.register("KEY_EXIT");
        assert_eq!(pending.clear(), 1);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }
}
