//! # ml-media
//!
//! Ordered media attachment store for MediaLib RS.
//!
//! ## Features
//!
//! - Slots holding a gapless, strictly ordered sequence of attachments
//! - Atomic replace that keeps position and carried-over properties
//! - Atomic bulk reorder and bulk delete under per-slot exclusivity
//! - Storage abstraction (local filesystem, in-memory)
//! - Traversal-safe asset serving with immutable caching
//!
//! ## Example
//!
//! ```rust,ignore
//! use ml_media::{MediaService, MemoryAttachmentRegistry, MemoryStorage, SlotKey, StaticSchema, Upload};
//! use std::sync::Arc;
//!
//! let service = MediaService::new(
//!     Arc::new(MemoryAttachmentRegistry::new()),
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(StaticSchema::default()),
//! );
//!
//! let gallery: SlotKey = "posts/1/gallery".parse()?;
//! let photo = service.attach(&gallery, Upload::new("a.png", bytes), None, None).await?;
//! service.replace(&gallery, photo.id, Upload::new("b.png", other_bytes)).await?;
//! ```

pub mod assets;
pub mod locks;
pub mod mime;
pub mod model;
pub mod registry;
pub mod schema;
pub mod service;
pub mod storage;

pub use assets::{normalize_relative_path, Asset, AssetError, AssetServer};
pub use locks::{SlotGuard, SlotLocks};
pub use model::{
    truncate_display_name, Attachment, CustomProperties, DisplaySummary, SizeClass, SlotKey,
    Upload,
};
pub use registry::{AttachmentRegistry, MemoryAttachmentRegistry};
pub use schema::{SchemaProvider, StaticSchema};
pub use service::{AttachmentDetail, DeleteReport, MediaService, ReplaceOutcome};
pub use storage::{
    generate_disk_filename, FileMetadata, LocalStorage, MemoryStorage, Storage, StorageError,
    StorageResult,
};
