//! Attachment Registry
//!
//! Single source of truth for `id -> Attachment` and `slot -> ordered ids`.
//!
//! Every slot's sequence is kept a permutation of exactly the attachments that
//! belong to it. Multi-step mutations run as a [`Transaction`]: each step
//! records how to undo itself, and a failing step unwinds the whole unit before
//! the state lock is released, so readers never see a half-applied change.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use ml_core::{Id, MediaError, MediaResult};
use tokio::sync::RwLock;
use tracing::debug;

use crate::model::{Attachment, SlotKey};

/// Attachment registry trait
#[async_trait]
pub trait AttachmentRegistry: Send + Sync {
    /// Mint a fresh attachment id
    async fn next_id(&self) -> MediaResult<Id>;

    /// Get an attachment by ID
    async fn get(&self, id: Id) -> MediaResult<Attachment>;

    /// Attachments of a slot in slot order; empty for an unknown slot
    async fn list_by_slot(&self, slot: &SlotKey) -> MediaResult<Vec<Attachment>>;

    /// Insert at `position` (clamped to the slot length), or append
    async fn insert(
        &self,
        slot: &SlotKey,
        attachment: Attachment,
        position: Option<usize>,
    ) -> MediaResult<Attachment>;

    /// Remove an attachment from its slot and the id map
    async fn remove(&self, id: Id) -> MediaResult<Attachment>;

    /// Remove every present id as one unit, skipping missing ones
    async fn remove_many(&self, ids: &[Id]) -> MediaResult<Vec<Attachment>>;

    /// Replace the slot's sequence wholesale with a permutation of its members
    async fn set_order(&self, slot: &SlotKey, ids: &[Id]) -> MediaResult<()>;

    /// Merge custom properties into an attachment
    async fn update_properties(
        &self,
        id: Id,
        properties: &BTreeMap<String, String>,
    ) -> MediaResult<Attachment>;

    /// Swap `old_id` for `replacement` at the same position, as one unit.
    /// The replacement takes the old attachment's `title`, `alt` and
    /// `extra_keys` properties as they stand when the swap commits.
    /// Returns the removed attachment and the stored replacement.
    async fn replace(
        &self,
        slot: &SlotKey,
        old_id: Id,
        replacement: Attachment,
        extra_keys: &[String],
    ) -> MediaResult<(Attachment, Attachment)>;
}

#[derive(Debug, Default)]
struct RegistryState {
    attachments: HashMap<Id, Attachment>,
    slots: HashMap<SlotKey, Vec<Id>>,
    /// Ids that were deleted and may never come back
    retired: HashSet<Id>,
}

impl RegistryState {
    fn order(&self, slot: &SlotKey) -> &[Id] {
        self.slots.get(slot).map(Vec::as_slice).unwrap_or_default()
    }

    fn get(&self, id: Id) -> MediaResult<&Attachment> {
        self.attachments
            .get(&id)
            .ok_or_else(|| MediaError::attachment_not_found(id))
    }

    fn list(&self, slot: &SlotKey) -> Vec<Attachment> {
        self.order(slot)
            .iter()
            .filter_map(|id| self.attachments.get(id).cloned())
            .collect()
    }
}

/// Reverse of one applied step
#[derive(Debug)]
enum Undo {
    Inserted { id: Id },
    Removed { attachment: Attachment, position: usize },
    Reordered { slot: SlotKey, previous: Vec<Id> },
}

/// A unit of registry mutations that either fully applies or leaves no trace
struct Transaction<'a> {
    state: &'a mut RegistryState,
    undo: Vec<Undo>,
}

impl<'a> Transaction<'a> {
    fn new(state: &'a mut RegistryState) -> Self {
        Self {
            state,
            undo: Vec::new(),
        }
    }

    fn insert(
        &mut self,
        slot: &SlotKey,
        mut attachment: Attachment,
        position: Option<usize>,
    ) -> MediaResult<Attachment> {
        let id = attachment.id;
        if self.state.attachments.contains_key(&id) || self.state.retired.contains(&id) {
            return Err(MediaError::DuplicateId(id));
        }

        attachment.slot = slot.clone();
        let order = self.state.slots.entry(slot.clone()).or_default();
        let position = position.unwrap_or(order.len()).min(order.len());
        order.insert(position, id);
        self.state.attachments.insert(id, attachment.clone());

        self.undo.push(Undo::Inserted { id });
        Ok(attachment)
    }

    fn remove(&mut self, id: Id) -> MediaResult<Attachment> {
        let attachment = self
            .state
            .attachments
            .remove(&id)
            .ok_or_else(|| MediaError::attachment_not_found(id))?;

        let mut position = 0;
        if let Some(order) = self.state.slots.get_mut(&attachment.slot) {
            if let Some(pos) = order.iter().position(|&member| member == id) {
                order.remove(pos);
                position = pos;
            }
            if order.is_empty() {
                self.state.slots.remove(&attachment.slot);
            }
        }
        self.state.retired.insert(id);

        self.undo.push(Undo::Removed {
            attachment: attachment.clone(),
            position,
        });
        Ok(attachment)
    }

    fn set_order(&mut self, slot: &SlotKey, ids: &[Id]) -> MediaResult<()> {
        let current = self.state.order(slot);
        validate_permutation(slot, current, ids)?;

        let previous = current.to_vec();
        if previous.is_empty() {
            // Only an empty input is a permutation of an empty slot
            return Ok(());
        }
        self.state.slots.insert(slot.clone(), ids.to_vec());

        self.undo.push(Undo::Reordered {
            slot: slot.clone(),
            previous,
        });
        Ok(())
    }

    fn commit(mut self) {
        self.undo.clear();
    }

    fn rollback(mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::Inserted { id } => {
                    if let Some(attachment) = self.state.attachments.remove(&id) {
                        if let Some(order) = self.state.slots.get_mut(&attachment.slot) {
                            order.retain(|&member| member != id);
                            if order.is_empty() {
                                self.state.slots.remove(&attachment.slot);
                            }
                        }
                    }
                }
                Undo::Removed {
                    attachment,
                    position,
                } => {
                    let id = attachment.id;
                    self.state.retired.remove(&id);
                    let order = self.state.slots.entry(attachment.slot.clone()).or_default();
                    let position = position.min(order.len());
                    order.insert(position, id);
                    self.state.attachments.insert(id, attachment);
                }
                Undo::Reordered { slot, previous } => {
                    self.state.slots.insert(slot, previous);
                }
            }
        }
    }
}

/// Run `f` as one transaction against `state`
fn transact<T>(
    state: &mut RegistryState,
    f: impl FnOnce(&mut Transaction<'_>) -> MediaResult<T>,
) -> MediaResult<T> {
    let mut tx = Transaction::new(state);
    match f(&mut tx) {
        Ok(value) => {
            tx.commit();
            Ok(value)
        }
        Err(e) => {
            debug!(steps = tx.undo.len(), error = %e, "Rolling back registry transaction");
            tx.rollback();
            Err(e)
        }
    }
}

/// Check that `proposed` is exactly a permutation of `current`
fn validate_permutation(slot: &SlotKey, current: &[Id], proposed: &[Id]) -> MediaResult<()> {
    let members: HashSet<Id> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());

    for id in proposed {
        if !members.contains(id) {
            return Err(MediaError::invalid_order(
                slot,
                format!("attachment {} is not a member of the slot", id),
            ));
        }
        if !seen.insert(*id) {
            return Err(MediaError::invalid_order(
                slot,
                format!("attachment {} appears more than once", id),
            ));
        }
    }

    if seen.len() != members.len() {
        let missing: Vec<String> = current
            .iter()
            .filter(|id| !seen.contains(id))
            .map(|id| id.to_string())
            .collect();
        return Err(MediaError::invalid_order(
            slot,
            format!("missing attachments: {}", missing.join(", ")),
        ));
    }

    Ok(())
}

/// In-memory attachment registry
pub struct MemoryAttachmentRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicI64,
}

impl Default for MemoryAttachmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAttachmentRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of live attachments across all slots
    pub async fn len(&self) -> usize {
        self.state.read().await.attachments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.attachments.is_empty()
    }

    /// Ordered ids of a slot
    pub async fn order(&self, slot: &SlotKey) -> Vec<Id> {
        self.state.read().await.order(slot).to_vec()
    }
}

#[async_trait]
impl AttachmentRegistry for MemoryAttachmentRegistry {
    async fn next_id(&self) -> MediaResult<Id> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn get(&self, id: Id) -> MediaResult<Attachment> {
        let state = self.state.read().await;
        state.get(id).cloned()
    }

    async fn list_by_slot(&self, slot: &SlotKey) -> MediaResult<Vec<Attachment>> {
        let state = self.state.read().await;
        Ok(state.list(slot))
    }

    async fn insert(
        &self,
        slot: &SlotKey,
        attachment: Attachment,
        position: Option<usize>,
    ) -> MediaResult<Attachment> {
        let mut state = self.state.write().await;
        transact(&mut state, |tx| tx.insert(slot, attachment, position))
    }

    async fn remove(&self, id: Id) -> MediaResult<Attachment> {
        let mut state = self.state.write().await;
        transact(&mut state, |tx| tx.remove(id))
    }

    async fn remove_many(&self, ids: &[Id]) -> MediaResult<Vec<Attachment>> {
        let mut state = self.state.write().await;
        transact(&mut state, |tx| {
            let mut removed = Vec::new();
            for &id in ids {
                if tx.state.attachments.contains_key(&id) {
                    removed.push(tx.remove(id)?);
                }
            }
            Ok(removed)
        })
    }

    async fn set_order(&self, slot: &SlotKey, ids: &[Id]) -> MediaResult<()> {
        let mut state = self.state.write().await;
        transact(&mut state, |tx| tx.set_order(slot, ids))
    }

    async fn update_properties(
        &self,
        id: Id,
        properties: &BTreeMap<String, String>,
    ) -> MediaResult<Attachment> {
        let mut state = self.state.write().await;
        let attachment = state
            .attachments
            .get_mut(&id)
            .ok_or_else(|| MediaError::attachment_not_found(id))?;

        attachment
            .custom_properties
            .merge(properties.iter().map(|(k, v)| (k.clone(), v.clone())));
        attachment.updated_at = Utc::now();

        Ok(attachment.clone())
    }

    async fn replace(
        &self,
        slot: &SlotKey,
        old_id: Id,
        mut replacement: Attachment,
        extra_keys: &[String],
    ) -> MediaResult<(Attachment, Attachment)> {
        let mut state = self.state.write().await;
        transact(&mut state, |tx| {
            let old = tx.state.get(old_id)?;
            if old.slot != *slot {
                return Err(MediaError::attachment_not_found(old_id));
            }
            replacement.custom_properties = old.custom_properties.carry_over(extra_keys);

            let new_id = replacement.id;
            let new_order: Vec<Id> = tx
                .state
                .order(slot)
                .iter()
                .map(|&id| if id == old_id { new_id } else { id })
                .collect();

            let stored = tx.insert(slot, replacement, None)?;
            let removed = tx.remove(old_id)?;
            tx.set_order(slot, &new_order)?;

            Ok((removed, stored))
        })
    }
}
