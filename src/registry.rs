//! Session registry: live database sessions keyed by opaque handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;

/// Opaque identifier for one open database session. Issued monotonically
/// starting at zero and never reused within a process run; callers only
/// learn handles from a prior `connect` response.
pub type ConnectionId = i64;

/// A registered session slot.
///
/// The async mutex serializes operations issued against one handle while
/// letting operations on different handles run concurrently. The inner
/// `Option` becomes `None` once the session has been taken out for
/// closing, after which the handle behaves as unknown.
pub type SessionSlot<S> = Arc<AsyncMutex<Option<S>>>;

/// Table of live sessions. Generic over the session type so the table
/// itself carries no driver dependency.
pub struct SessionRegistry<S> {
    inner: Mutex<Inner<S>>,
}

struct Inner<S> {
    sessions: HashMap<ConnectionId, SessionSlot<S>>,
    next_id: ConnectionId,
}

impl<S> SessionRegistry<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    /// Stores a session and returns its freshly allocated handle.
    pub fn insert(&self, session: S) -> ConnectionId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .sessions
            .insert(id, Arc::new(AsyncMutex::new(Some(session))));
        id
    }

    /// Pure lookup; clones the slot.
    pub fn get(&self, id: ConnectionId) -> Option<SessionSlot<S>> {
        self.lock().sessions.get(&id).cloned()
    }

    /// Removes and returns the slot without closing the session; the
    /// caller owns the close.
    pub fn remove(&self, id: ConnectionId) -> Option<SessionSlot<S>> {
        self.lock().sessions.remove(&id)
    }

    /// Clears the registry and hands back every slot for teardown.
    /// Calling it again on an empty registry is a no-op.
    pub fn drain(&self) -> Vec<SessionSlot<S>> {
        self.lock().sessions.drain().map(|(_, slot)| slot).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().sessions.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<S>> {
        self.inner.lock().expect("session registry mutex poisoned")
    }
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_zero_and_increase() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.insert("a"), 0);
        assert_eq!(registry.insert("b"), 1);
        assert_eq!(registry.insert("c"), 2);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn handles_are_never_reused() {
        let registry = SessionRegistry::new();
        let first = registry.insert("a");
        assert!(registry.remove(first).is_some());
        let second = registry.insert("b");
        assert!(second > first);
        assert!(registry.get(first).is_none());
    }

    #[tokio::test]
    async fn removed_slot_still_holds_its_session() {
        let registry = SessionRegistry::new();
        let id = registry.insert("a");
        let slot = registry.remove(id).unwrap();
        assert_eq!(slot.lock().await.take(), Some("a"));
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn drain_empties_the_table_and_is_idempotent() {
        let registry = SessionRegistry::new();
        registry.insert("a");
        registry.insert("b");
        assert_eq!(registry.drain().len(), 2);
        assert!(registry.is_empty());
        assert!(registry.drain().is_empty());
    }

    #[tokio::test]
    async fn slots_on_different_handles_are_independent() {
        let registry = SessionRegistry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");

        // Holding one slot's lock must not block access to the other.
        let slot_a = registry.get(a).unwrap();
        let guard_a = slot_a.lock().await;
        let slot_b = registry.get(b).unwrap();
        let guard_b = slot_b.lock().await;
        assert_eq!(guard_a.as_deref(), Some("a"));
        assert_eq!(guard_b.as_deref(), Some("b"));
    }
}
