//! In-flight dedup tracker.
//!
//! Holds the ids of reminders that have been dispatched and are awaiting
//! finalization. Shared between the monitor loop and completion callbacks
//! that may run on other tasks or threads, so every access goes through a
//! mutex. Not persisted.
//!
//! Each entry carries a generation. A [`Claim`] only releases the entry it
//! created: once `clear()` (monitor stop) has dropped an entry, a late
//! completion for the old claim cannot remove a newer claim for the same id.

use nudge_core::types::ReminderId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Proof of a successful claim; released at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub id: ReminderId,
    generation: u64,
}

#[derive(Debug, Default)]
struct TrackerInner {
    next_generation: u64,
    in_flight: HashMap<ReminderId, u64>,
}

#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerInner> {
        // The map stays consistent even if a holder panicked.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `id` unless it is already in flight.
    pub fn try_claim(&self, id: ReminderId) -> Option<Claim> {
        let mut inner = self.lock();
        if inner.in_flight.contains_key(&id) {
            return None;
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.in_flight.insert(id, generation);
        Some(Claim { id, generation })
    }

    /// Remove the entry created by `claim`. Returns `false` if it was
    /// already released or cleared.
    pub fn release(&self, claim: Claim) -> bool {
        let mut inner = self.lock();
        match inner.in_flight.get(&claim.id) {
            Some(&generation) if generation == claim.generation => {
                inner.in_flight.remove(&claim.id);
                true
            }
            _ => false,
        }
    }

    pub fn is_held(&self, claim: Claim) -> bool {
        self.lock().in_flight.get(&claim.id) == Some(&claim.generation)
    }

    pub fn contains(&self, id: ReminderId) -> bool {
        self.lock().in_flight.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Outstanding claims become stale.
    pub fn clear(&self) {
        self.lock().in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let t = InFlightTracker::new();
        let claim = t.try_claim(ReminderId(1)).unwrap();
        assert!(t.try_claim(ReminderId(1)).is_none());
        assert!(t.contains(ReminderId(1)));
        assert!(t.release(claim));
        assert!(!t.release(claim));
        assert!(t.is_empty());
    }

    #[test]
    fn test_stale_claim_cannot_release_new_entry() {
        let t = InFlightTracker::new();
        let old = t.try_claim(ReminderId(7)).unwrap();
        t.clear();
        let new = t.try_claim(ReminderId(7)).unwrap();
        assert!(!t.is_held(old));
        assert!(!t.release(old));
        assert!(t.contains(ReminderId(7)));
        assert!(t.release(new));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let t = InFlightTracker::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = t.clone();
                std::thread::spawn(move || t.try_claim(ReminderId(3)).is_some())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(t.len(), 1);
    }
}
