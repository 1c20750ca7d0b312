//! Selection sessions scoped per session key.
//!
//! Each key owns its own slot behind its own lock, so a search under one key
//! never blocks or overwrites another. Within a key, the slot lock makes
//! replacement atomic: a selection sees either the old id list or the new
//! one, never a mix.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use core_types::{ListingId, SessionKey};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::SelectionError;

/// Ordered result ids from the most recent committed search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSession {
    ids: Arc<[ListingId]>,
    sequence: u64,
}

impl SelectionSession {
    pub fn ids(&self) -> &[ListingId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Sequence number of the search that produced these ids (0 = never searched).
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Map a signed result position to its listing id.
    pub fn listing_at(&self, index: i64) -> Result<&ListingId, SelectionError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.ids.get(i))
            .ok_or(SelectionError::OutOfRange {
                index,
                len: self.ids.len(),
            })
    }
}

#[derive(Debug)]
struct SessionSlot {
    current: SelectionSession,
    issued: u64,
    last_touched: Instant,
}

impl SessionSlot {
    fn new(now: Instant) -> Self {
        Self {
            current: SelectionSession::default(),
            issued: 0,
            last_touched: now,
        }
    }
}

/// Proof that a search was started; committing it is refused once a newer one exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket {
    pub key: SessionKey,
    pub sequence: u64,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    slots: Arc<Mutex<HashMap<SessionKey, Arc<Mutex<SessionSlot>>>>>,
    // Store-wide so a key that is ended and recreated never reissues a sequence.
    next_sequence: Arc<AtomicU64>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_sequence: Arc::new(AtomicU64::new(1)),
            idle_timeout,
        }
    }

    fn slot(&self, key: SessionKey) -> Option<Arc<Mutex<SessionSlot>>> {
        self.slots.lock().get(&key).cloned()
    }

    fn slot_or_create(&self, key: SessionKey, now: Instant) -> Arc<Mutex<SessionSlot>> {
        self.slots
            .lock()
            .entry(key)
            .or_insert_with(|| {
                debug!(session = %key, "creating selection session");
                Arc::new(Mutex::new(SessionSlot::new(now)))
            })
            .clone()
    }

    /// Start a search for `key`, creating the session on first use.
    pub fn begin(&self, key: SessionKey) -> SearchTicket {
        let now = Instant::now();
        let slot = self.slot_or_create(key, now);
        let mut slot = slot.lock();
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        slot.issued = sequence;
        slot.last_touched = now;
        SearchTicket { key, sequence }
    }

    /// Replace the session ids if `ticket` is still the newest search for its key.
    ///
    /// Returns `false` when a newer search was started or the session was evicted.
    pub fn commit(&self, ticket: SearchTicket, ids: Vec<ListingId>) -> bool {
        let Some(slot) = self.slot(ticket.key) else {
            return false;
        };
        let mut slot = slot.lock();
        if slot.issued != ticket.sequence {
            return false;
        }
        slot.current = SelectionSession {
            ids: ids.into(),
            sequence: ticket.sequence,
        };
        slot.last_touched = Instant::now();
        true
    }

    /// Run `f` against the committed session while holding the slot lock.
    ///
    /// Unknown keys see an empty session.
    pub fn with_session<T>(&self, key: SessionKey, f: impl FnOnce(&SelectionSession) -> T) -> T {
        match self.slot(key) {
            Some(slot) => {
                let mut slot = slot.lock();
                slot.last_touched = Instant::now();
                f(&slot.current)
            }
            None => f(&SelectionSession::default()),
        }
    }

    /// Clone of the committed session, if the key is known.
    pub fn snapshot(&self, key: SessionKey) -> Option<SelectionSession> {
        self.slot(key).map(|slot| slot.lock().current.clone())
    }

    /// Explicit session end. Returns whether the key existed.
    pub fn end(&self, key: SessionKey) -> bool {
        let removed = self.slots.lock().remove(&key).is_some();
        if removed {
            debug!(session = %key, "selection session ended");
        }
        removed
    }

    pub fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now())
    }

    /// Drop sessions idle for longer than the timeout, as of `now`.
    pub fn evict_idle_at(&self, now: Instant) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| {
            // A slot locked by an in-flight call is in use, not idle.
            slot.try_lock().is_none_or(|s| {
                now.saturating_duration_since(s.last_touched) <= self.idle_timeout
            })
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            debug!(evicted, remaining = slots.len(), "evicted idle selection sessions");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ListingId> {
        raw.iter().map(|s| ListingId::from(*s)).collect()
    }

    #[test]
    fn commit_replaces_whole_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = SessionKey::generate();

        let t1 = store.begin(key);
        assert!(store.commit(t1, ids(&["2", "1"])));
        let t2 = store.begin(key);
        assert!(store.commit(t2, ids(&["3"])));

        let snap = store.snapshot(key).expect("session exists");
        assert_eq!(snap.ids(), ids(&["3"]).as_slice());
        assert_eq!(snap.sequence(), 2);
    }

    #[test]
    fn stale_ticket_cannot_overwrite_newer_search() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = SessionKey::generate();

        let slow = store.begin(key);
        let fast = store.begin(key);
        assert!(store.commit(fast, ids(&["9"])));
        assert!(!store.commit(slow, ids(&["1", "2"])));
        assert_eq!(store.snapshot(key).unwrap().ids(), ids(&["9"]).as_slice());
    }

    #[test]
    fn keys_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60));
        let a = SessionKey::generate();
        let b = SessionKey::generate();

        let ta = store.begin(a);
        store.commit(ta, ids(&["1"]));
        let tb = store.begin(b);
        store.commit(tb, ids(&["5", "6"]));

        assert_eq!(store.snapshot(a).unwrap().ids(), ids(&["1"]).as_slice());
        assert_eq!(store.snapshot(b).unwrap().len(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn listing_at_rejects_negative_and_past_end() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = SessionKey::generate();
        let t = store.begin(key);
        store.commit(t, ids(&["a", "b"]));

        store.with_session(key, |s| {
            assert_eq!(s.listing_at(1), Ok(&ListingId::from("b")));
            assert_eq!(
                s.listing_at(-1),
                Err(SelectionError::OutOfRange { index: -1, len: 2 })
            );
            assert_eq!(
                s.listing_at(2),
                Err(SelectionError::OutOfRange { index: 2, len: 2 })
            );
        });
    }

    #[test]
    fn unknown_key_reads_as_empty() {
        let store = SessionStore::new(Duration::from_secs(60));
        let len = store.with_session(SessionKey::generate(), SelectionSession::len);
        assert_eq!(len, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn idle_sessions_are_evicted_and_commits_then_fail() {
        let store = SessionStore::new(Duration::from_secs(10));
        let key = SessionKey::generate();
        let ticket = store.begin(key);

        assert_eq!(store.evict_idle_at(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(11);
        assert_eq!(store.evict_idle_at(later), 1);
        assert!(store.snapshot(key).is_none());
        assert!(!store.commit(ticket, ids(&["1"])));
    }

    #[test]
    fn ticket_from_before_end_cannot_commit_into_recreated_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = SessionKey::generate();

        let stale = store.begin(key);
        assert!(store.end(key));
        let fresh = store.begin(key);
        assert_ne!(stale.sequence, fresh.sequence);
        assert!(store.commit(fresh, ids(&["new"])));
        assert!(!store.commit(stale, ids(&["old"])));
        assert_eq!(store.snapshot(key).unwrap().ids(), ids(&["new"]).as_slice());
    }

    #[test]
    fn ticket_from_before_eviction_cannot_commit_into_recreated_session() {
        let store = SessionStore::new(Duration::from_secs(10));
        let key = SessionKey::generate();

        let stale = store.begin(key);
        assert_eq!(store.evict_idle_at(Instant::now() + Duration::from_secs(11)), 1);
        let fresh = store.begin(key);
        assert!(!store.commit(stale, ids(&["old"])));
        assert!(store.commit(fresh, ids(&["new"])));
        assert_eq!(store.snapshot(key).unwrap().sequence(), fresh.sequence);
    }

    #[test]
    fn end_removes_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let key = SessionKey::generate();
        store.begin(key);
        assert!(store.end(key));
        assert!(!store.end(key));
    }
}
