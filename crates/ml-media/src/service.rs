//! Media Service
//!
//! Orchestrates the registry, byte storage and schema for every mutating
//! operation, under the per-slot exclusivity rules.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ml_core::{Id, MediaError, MediaResult};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::locks::SlotLocks;
use crate::model::{Attachment, CustomProperties, DisplaySummary, SlotKey, Upload};
use crate::registry::AttachmentRegistry;
use crate::schema::SchemaProvider;
use crate::storage::{generate_disk_filename, Storage};

/// Result of a successful replace
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceOutcome {
    pub attachment: Attachment,
    pub summary: DisplaySummary,
}

/// Result of a bulk delete
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DeleteReport {
    pub removed: Vec<Id>,
    pub skipped: Vec<Id>,
}

/// An attachment together with the extra property keys its slot declares
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentDetail {
    pub attachment: Attachment,
    pub extra_fields: Vec<String>,
}

pub struct MediaService<R: AttachmentRegistry, S: Storage + ?Sized> {
    registry: Arc<R>,
    storage: Arc<S>,
    schema: Arc<dyn SchemaProvider>,
    locks: SlotLocks,
}

impl<R: AttachmentRegistry, S: Storage + ?Sized> MediaService<R, S> {
    pub fn new(registry: Arc<R>, storage: Arc<S>, schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            registry,
            storage,
            schema,
            locks: SlotLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub async fn get(&self, id: Id) -> MediaResult<Attachment> {
        self.registry.get(id).await
    }

    pub async fn list(&self, slot: &SlotKey) -> MediaResult<Vec<Attachment>> {
        self.registry.list_by_slot(slot).await
    }

    /// An attachment of `slot` with the extra keys its slot declares
    pub async fn detail(&self, slot: &SlotKey, id: Id) -> MediaResult<AttachmentDetail> {
        let attachment = self.registry.get(id).await?;
        if attachment.slot != *slot {
            return Err(MediaError::attachment_not_found(id));
        }

        Ok(AttachmentDetail {
            extra_fields: self.schema.extra_fields(slot),
            attachment,
        })
    }

    /// Store an upload and insert it into `slot`
    #[instrument(skip(self, upload, properties), fields(slot = %slot, file_name = %upload.file_name))]
    pub async fn attach(
        &self,
        slot: &SlotKey,
        upload: Upload,
        position: Option<usize>,
        properties: Option<BTreeMap<String, String>>,
    ) -> MediaResult<Attachment> {
        let _guard = self.locks.lock(slot).await;

        let mut custom_properties = CustomProperties::new();
        if let Some(properties) = properties {
            custom_properties.merge(properties);
        }

        let attachment = self.store_upload(slot, upload, custom_properties).await?;
        let content_ref = attachment.content_ref.clone();

        match self.registry.insert(slot, attachment, position).await {
            Ok(stored) => {
                info!(id = stored.id, slot = %slot, "Attachment added");
                Ok(stored)
            }
            Err(e) => {
                self.discard_content(&content_ref).await;
                Err(e)
            }
        }
    }

    /// Merge custom properties into an attachment.
    ///
    /// Takes no slot lock. A concurrent replace copies the properties inside
    /// its registry swap, so an update either lands before the swap and is
    /// carried over, or after it and finds the old id gone.
    #[instrument(skip(self, properties))]
    pub async fn update_properties(
        &self,
        id: Id,
        properties: BTreeMap<String, String>,
    ) -> MediaResult<Attachment> {
        let updated = self.registry.update_properties(id, &properties).await?;
        info!(id = id, keys = properties.len(), "Attachment properties updated");
        Ok(updated)
    }

    /// Swap the attachment `old_id` for freshly uploaded bytes, keeping its
    /// position and its carried-over properties
    #[instrument(skip(self, upload), fields(slot = %slot, file_name = %upload.file_name))]
    pub async fn replace(
        &self,
        slot: &SlotKey,
        old_id: Id,
        upload: Upload,
    ) -> MediaResult<ReplaceOutcome> {
        let _guard = self.locks.lock(slot).await;

        let old = self.registry.get(old_id).await?;
        if old.slot != *slot {
            return Err(MediaError::attachment_not_found(old_id));
        }

        let replacement = self
            .store_upload(slot, upload, CustomProperties::new())
            .await?;
        let new_ref = replacement.content_ref.clone();
        let file_url = self.storage.url(&new_ref);
        let extra_keys = self.schema.extra_fields(slot);

        let swapped = self
            .registry
            .replace(slot, old_id, replacement, &extra_keys)
            .await;
        let (removed, stored) = match swapped {
            Ok(swapped) => swapped,
            Err(e) => {
                self.discard_content(&new_ref).await;
                return Err(e);
            }
        };

        info!(old_id = old_id, new_id = stored.id, slot = %slot, "Attachment replaced");
        self.discard_content(&removed.content_ref).await;

        Ok(ReplaceOutcome {
            summary: DisplaySummary::new(&stored, file_url),
            attachment: stored,
        })
    }

    /// Apply a caller-supplied total order to a slot
    #[instrument(skip(self, ids), fields(slot = %slot, count = ids.len()))]
    pub async fn reorder(&self, slot: &SlotKey, ids: &[Id]) -> MediaResult<()> {
        let _guard = self.locks.lock(slot).await;
        self.registry.set_order(slot, ids).await?;
        info!(slot = %slot, "Slot reordered");
        Ok(())
    }

    /// Remove every listed attachment that exists; missing ids are skipped
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn delete_many(&self, ids: &[Id]) -> MediaResult<DeleteReport> {
        let requested: BTreeSet<Id> = ids.iter().copied().collect();

        let mut slots = BTreeSet::new();
        for &id in &requested {
            match self.registry.get(id).await {
                Ok(attachment) => {
                    slots.insert(attachment.slot);
                }
                Err(MediaError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let _guard = self.locks.lock_many(slots).await;
        let targets: Vec<Id> = requested.iter().copied().collect();
        let removed = self.registry.remove_many(&targets).await?;

        for attachment in &removed {
            self.discard_content(&attachment.content_ref).await;
        }

        let removed: Vec<Id> = removed.iter().map(|a| a.id).collect();
        let skipped: Vec<Id> = requested
            .iter()
            .copied()
            .filter(|id| !removed.contains(id))
            .collect();

        info!(removed = removed.len(), skipped = skipped.len(), "Attachments removed");
        Ok(DeleteReport { removed, skipped })
    }

    async fn store_upload(
        &self,
        slot: &SlotKey,
        upload: Upload,
        custom_properties: CustomProperties,
    ) -> MediaResult<Attachment> {
        let content_ref = generate_disk_filename(&upload.file_name);
        let metadata = self.storage.put(&content_ref, upload.data).await?;
        debug!(content_ref = %content_ref, size = metadata.size, storage = self.storage.name(), "Upload stored");

        let mime_type = upload.content_type.unwrap_or(metadata.content_type);
        let id = match self.registry.next_id().await {
            Ok(id) => id,
            Err(e) => {
                self.discard_content(&content_ref).await;
                return Err(e);
            }
        };

        Ok(Attachment::new(
            id,
            slot.clone(),
            content_ref,
            upload.file_name,
            mime_type,
            metadata.size,
        )
        .with_digest(metadata.digest)
        .with_properties(custom_properties))
    }

    /// Best-effort byte disposal; orphaned bytes are tolerated
    async fn discard_content(&self, content_ref: &str) {
        if let Err(e) = self.storage.delete(content_ref).await {
            warn!(content_ref = %content_ref, error = %e, "Failed to delete stored content");
        }
    }
}
