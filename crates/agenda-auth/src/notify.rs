//! Single-slot expiry notification.
//!
//! At most one listener is registered at a time; registering a new one
//! replaces the previous listener without notice.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

/// Listener invoked when the user has to sign in again.
pub type ExpiredCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct SlotState {
    next_id: u64,
    current: Option<(u64, ExpiredCallback)>,
}

/// Holds the registered listener.
#[derive(Default)]
pub(crate) struct ExpirySlot {
    state: Mutex<SlotState>,
}

impl ExpirySlot {
    fn lock(&self) -> std::sync::MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the listener. Returns the id of the new registration, or
    /// `None` when the slot was cleared.
    pub(crate) fn replace(&self, callback: Option<ExpiredCallback>) -> Option<u64> {
        let mut state = self.lock();
        match callback {
            Some(callback) => {
                state.next_id += 1;
                let id = state.next_id;
                state.current = Some((id, callback));
                Some(id)
            }
            None => {
                state.current = None;
                None
            }
        }
    }

    /// Clears the slot only if registration `id` is still the current one.
    fn clear_if_current(&self, id: u64) {
        let mut state = self.lock();
        if matches!(state.current, Some((current, _)) if current == id) {
            state.current = None;
        }
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Invokes the listener, if any. The lock is released before the call so
    /// the listener may re-register.
    pub(crate) fn notify(&self) -> bool {
        let callback = self.lock().current.as_ref().map(|(_, cb)| Arc::clone(cb));
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => {
                debug!("session expired with no listener registered");
                false
            }
        }
    }
}

/// Registration guard returned by
/// [`AuthSession::subscribe_expired`](crate::AuthSession::subscribe_expired).
///
/// Dropping it unregisters the listener, unless another listener has replaced
/// it in the meantime.
#[must_use = "the listener is unregistered when the subscription is dropped"]
pub struct ExpirySubscription {
    slot: Weak<ExpirySlot>,
    id: u64,
}

impl ExpirySubscription {
    pub(crate) fn new(slot: &Arc<ExpirySlot>, id: u64) -> Self {
        Self {
            slot: Arc::downgrade(slot),
            id,
        }
    }

    /// Returns true while this subscription's listener is the registered one.
    pub fn is_active(&self) -> bool {
        self.slot.upgrade().is_some_and(|slot| {
            matches!(slot.lock().current, Some((current, _)) if current == self.id)
        })
    }
}

impl Drop for ExpirySubscription {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.upgrade() {
            slot.clear_if_current(self.id);
        }
    }
}

impl std::fmt::Debug for ExpirySubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySubscription")
            .field("id", &self.id)
            .finish()
    }
}
