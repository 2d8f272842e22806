//! REST request handlers.
//!
//! Request bodies are strict: unknown fields are rejected, and the router
//! caps bodies at 1 MiB. Reads take no actor; mutations carry the actor
//! tuple in the body.

use crate::api::error::ApiError;
use crate::api::extract::StrictJson;
use crate::capture::{CaptureBundle, CaptureView};
use crate::domain::AttentionItem;
use crate::guard::ActorTuple;
use crate::service::RaiseAttentionInput;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Health check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Capture state
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureStateQuery {
    pub project_id: String,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub view: Option<String>,
}

/// GET /api/v1/capture_state
pub async fn capture_state(
    State(state): State<AppState>,
    Query(query): Query<CaptureStateQuery>,
) -> Result<Json<CaptureBundle>, ApiError> {
    let view = CaptureView::parse(query.view.as_deref())?;
    let bundle = state
        .capture
        .capture_state(
            &CancellationToken::new(),
            &query.project_id,
            query.scope_type.as_deref(),
            query.scope_id.as_deref(),
            view,
        )
        .await?;
    Ok(Json(bundle))
}

// ============================================================================
// Attention items
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttentionListQuery {
    pub project_id: Uuid,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub state: Option<String>,
}

/// GET /api/v1/attention/items
pub async fn list_attention_items(
    State(state): State<AppState>,
    Query(query): Query<AttentionListQuery>,
) -> Result<Json<Vec<AttentionItem>>, ApiError> {
    let ctx = crate::guard::CallContext::user("user");
    let items = state
        .service
        .list_attention_items(
            &ctx,
            query.project_id,
            query.scope_type.as_deref(),
            query.scope_id.as_deref(),
            query.state.as_deref(),
        )
        .await?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RaiseAttentionRequest {
    pub project_id: Uuid,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    pub kind: String,
    pub summary: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default)]
    pub requires_user_action: bool,
    #[serde(default)]
    pub actor: Option<ActorTuple>,
}

/// POST /api/v1/attention/items
pub async fn raise_attention_item(
    State(state): State<AppState>,
    StrictJson(req): StrictJson<RaiseAttentionRequest>,
) -> Result<Json<AttentionItem>, ApiError> {
    let ctx = req
        .actor
        .unwrap_or_default()
        .into_context(CancellationToken::new())?;
    let item = state
        .service
        .raise_attention_item(
            &ctx,
            RaiseAttentionInput {
                project_id: req.project_id,
                scope_type: req.scope_type,
                scope_id: req.scope_id,
                kind: req.kind,
                summary: req.summary,
                body_md: req.body_md,
                requires_user_action: req.requires_user_action,
            },
        )
        .await?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ResolveAttentionRequest {
    #[serde(default)]
    pub actor: Option<ActorTuple>,
}

/// POST /api/v1/attention/items/{id}/resolve
pub async fn resolve_attention_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
    StrictJson(req): StrictJson<ResolveAttentionRequest>,
) -> Result<Json<AttentionItem>, ApiError> {
    let ctx = req
        .actor
        .unwrap_or_default()
        .into_context(CancellationToken::new())?;
    let item = state.service.resolve_attention_item(&ctx, item_id).await?;
    Ok(Json(item))
}
