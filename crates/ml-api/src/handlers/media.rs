//! Media slot and attachment handlers

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use ml_core::i18n::{IMAGES_REMOVED, IMAGES_SORTED, IMAGES_UPDATED};
use ml_core::{Envelope, Id};
use ml_media::{Attachment, CustomProperties, DeleteReport, DisplaySummary, SizeClass, SlotKey};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extractors::{AppState, UploadForm};

#[derive(Debug, Deserialize)]
pub struct SlotPath {
    pub record_type: String,
    pub record_id: String,
    pub field: String,
}

impl SlotPath {
    fn slot(&self) -> SlotKey {
        SlotKey::new(&self.record_type, &self.record_id, &self.field)
    }
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPath {
    pub record_type: String,
    pub record_id: String,
    pub field: String,
    pub id: Id,
}

impl AttachmentPath {
    fn slot(&self) -> SlotKey {
        SlotKey::new(&self.record_type, &self.record_id, &self.field)
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentResponse {
    pub id: Id,
    pub slot: String,
    pub file_name: String,
    pub file_url: String,
    pub mime_type: String,
    pub size: u64,
    pub human_size: String,
    pub size_class: SizeClass,
    pub digest: String,
    pub custom_properties: CustomProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttachmentResponse {
    fn from_attachment(state: &AppState, attachment: Attachment) -> Self {
        Self {
            file_url: state.media.storage().url(&attachment.content_ref),
            human_size: attachment.human_size(),
            size_class: attachment.size_class(),
            slot: attachment.slot.to_string(),
            id: attachment.id,
            file_name: attachment.file_name,
            mime_type: attachment.mime_type,
            size: attachment.size,
            digest: attachment.digest,
            custom_properties: attachment.custom_properties,
            created_at: attachment.created_at,
            updated_at: attachment.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SlotResponse {
    pub slot: String,
    pub count: usize,
    pub elements: Vec<AttachmentResponse>,
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub attachment: AttachmentResponse,
    pub extra_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReplaceResponse {
    pub attachment: AttachmentResponse,
    pub summary: DisplaySummary,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<Id>,
}

/// List a slot in order
///
/// GET /media/:record_type/:record_id/:field
pub async fn list_slot(
    State(state): State<AppState>,
    Path(path): Path<SlotPath>,
) -> ApiResult<impl IntoResponse> {
    let slot = path.slot();
    let elements: Vec<AttachmentResponse> = state
        .media
        .list(&slot)
        .await?
        .into_iter()
        .map(|a| AttachmentResponse::from_attachment(&state, a))
        .collect();

    Ok(Json(SlotResponse {
        slot: slot.to_string(),
        count: elements.len(),
        elements,
    }))
}

/// Upload a file into a slot
///
/// POST /media/:record_type/:record_id/:field
///
/// Multipart parts: `file`, optional `position`; any other text part
/// becomes a custom property.
pub async fn attach(
    State(state): State<AppState>,
    Path(path): Path<SlotPath>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let UploadForm { upload, mut fields } = UploadForm::read(multipart).await?;

    let position = fields
        .remove("position")
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|_| ApiError::bad_request(format!("Invalid position: {}", raw)))
        })
        .transpose()?;
    let properties = (!fields.is_empty()).then_some(fields);

    let attachment = state
        .media
        .attach(&path.slot(), upload, position, properties)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(
            Envelope::success(
                state.translate(IMAGES_UPDATED),
                AttachmentResponse::from_attachment(&state, attachment),
            )
            .with_status(StatusCode::CREATED.as_u16()),
        ),
    ))
}

/// Reorder a slot
///
/// PUT /media/:record_type/:record_id/:field
pub async fn reorder_slot(
    State(state): State<AppState>,
    Path(path): Path<SlotPath>,
    Json(body): Json<IdsRequest>,
) -> ApiResult<impl IntoResponse> {
    state.media.reorder(&path.slot(), &body.ids).await?;
    Ok(Json(Envelope::success_empty(state.translate(IMAGES_SORTED))))
}

/// Get one attachment of a slot with its declared property keys
///
/// GET /media/:record_type/:record_id/:field/:id
pub async fn get_attachment(
    State(state): State<AppState>,
    Path(path): Path<AttachmentPath>,
) -> ApiResult<impl IntoResponse> {
    let detail = state.media.detail(&path.slot(), path.id).await?;

    Ok(Json(DetailResponse {
        extra_fields: detail.extra_fields,
        attachment: AttachmentResponse::from_attachment(&state, detail.attachment),
    }))
}

/// Replace an attachment's bytes, keeping its position
///
/// POST /media/:record_type/:record_id/:field/:id
pub async fn replace_attachment(
    State(state): State<AppState>,
    Path(path): Path<AttachmentPath>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let UploadForm { upload, .. } = UploadForm::read(multipart).await?;
    let outcome = state.media.replace(&path.slot(), path.id, upload).await?;

    Ok(Json(Envelope::success(
        state.translate(IMAGES_UPDATED),
        ReplaceResponse {
            summary: outcome.summary,
            attachment: AttachmentResponse::from_attachment(&state, outcome.attachment),
        },
    )))
}

/// Merge custom properties into an attachment
///
/// PATCH /attachments/:id
pub async fn update_properties(
    State(state): State<AppState>,
    Path(id): Path<Id>,
    Json(properties): Json<BTreeMap<String, String>>,
) -> ApiResult<impl IntoResponse> {
    let attachment = state.media.update_properties(id, properties).await?;

    Ok(Json(Envelope::success(
        state.translate(IMAGES_UPDATED),
        AttachmentResponse::from_attachment(&state, attachment),
    )))
}

/// Delete many attachments; unknown ids are skipped
///
/// DELETE /attachments
pub async fn delete_attachments(
    State(state): State<AppState>,
    Json(body): Json<IdsRequest>,
) -> ApiResult<Json<Envelope<DeleteReport>>> {
    let report = state.media.delete_many(&body.ids).await?;
    Ok(Json(Envelope::success(state.translate(IMAGES_REMOVED), report)))
}
