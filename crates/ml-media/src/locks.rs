//! Per-slot exclusive guards
//!
//! Replace, reorder and bulk delete hold a slot's guard for their whole
//! read-modify-write sequence. Waiters are served in arrival order, so two
//! operations on one slot apply in the order they started.
//!
//! A slot's entry lives only while some task holds or waits for it.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::SlotKey;

type LockTable = DashMap<SlotKey, Arc<Mutex<()>>>;

/// Held slot guards; released when dropped
#[must_use = "the slot is unlocked as soon as the guard is dropped"]
pub struct SlotGuard {
    table: Arc<LockTable>,
    held: Vec<(SlotKey, OwnedMutexGuard<()>)>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        for (slot, guard) in self.held.drain(..).rev() {
            drop(guard);
            // The table's own handle is the last one: nobody holds or awaits it
            self.table
                .remove_if(&slot, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

#[derive(Default)]
pub struct SlotLocks {
    table: Arc<LockTable>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots currently held or awaited
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn mutex_for(&self, slot: &SlotKey) -> Arc<Mutex<()>> {
        self.table.entry(slot.clone()).or_default().clone()
    }

    pub async fn lock(&self, slot: &SlotKey) -> SlotGuard {
        let guard = self.mutex_for(slot).lock_owned().await;
        SlotGuard {
            table: self.table.clone(),
            held: vec![(slot.clone(), guard)],
        }
    }

    /// Lock several slots at once, always in sorted order
    pub async fn lock_many(&self, slots: impl IntoIterator<Item = SlotKey>) -> SlotGuard {
        let ordered: BTreeSet<SlotKey> = slots.into_iter().collect();
        let mut held = Vec::with_capacity(ordered.len());
        for slot in ordered {
            let guard = self.mutex_for(&slot).lock_owned().await;
            held.push((slot, guard));
        }
        SlotGuard {
            table: self.table.clone(),
            held,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_slot_is_exclusive() {
        let locks = Arc::new(SlotLocks::new());
        let slot = SlotKey::new("posts", "1", "gallery");

        let guard = locks.lock(&slot).await;
        let waiting = {
            let locks = locks.clone();
            let slot = slot.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&slot).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_slots_are_independent() {
        let locks = SlotLocks::new();
        let _gallery = locks.lock(&SlotKey::new("posts", "1", "gallery")).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock(&SlotKey::new("posts", "1", "cover")),
        )
        .await
        .expect("unrelated slot must not block");
    }

    #[tokio::test]
    async fn test_lock_many_deduplicates() {
        let locks = SlotLocks::new();
        let slot = SlotKey::new("posts", "1", "gallery");

        // Locking the same slot twice in one call must not deadlock
        let guard = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock_many(vec![slot.clone(), slot.clone()]),
        )
        .await
        .unwrap();
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_idle_slots_are_forgotten() {
        let locks = Arc::new(SlotLocks::new());
        let slot = SlotKey::new("posts", "1", "gallery");

        let guard = locks.lock(&slot).await;
        let _other = locks.lock(&SlotKey::new("posts", "1", "cover")).await;
        assert_eq!(locks.len(), 2);

        let waiting = {
            let locks = locks.clone();
            let slot = slot.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&slot).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A waiter keeps the entry alive past the holder's release
        drop(guard);
        assert_eq!(locks.len(), 2);

        waiting.await.unwrap();
        assert_eq!(locks.len(), 1);
    }
}
