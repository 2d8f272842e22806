//! Repository trait definition.
//!
//! The narrow persistence surface the core consumes. `not_found` is the one
//! distinguished failure; every other error propagates verbatim. All calls
//! accept the caller's cancellation token and must return
//! `PlannerError::Cancelled` promptly once it trips.

use crate::domain::{
    AttentionItem, ChangeEvent, Column, Comment, KindDef, Lease, Project, ScopeType, Task,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[async_trait]
pub trait Repository: Send + Sync {
    // ========================================================================
    // Projects
    // ========================================================================

    async fn create_project(&self, cancel: &CancellationToken, project: &Project) -> Result<()>;

    async fn update_project(&self, cancel: &CancellationToken, project: &Project) -> Result<()>;

    async fn get_project(&self, cancel: &CancellationToken, id: Uuid) -> Result<Project>;

    async fn list_projects(
        &self,
        cancel: &CancellationToken,
        include_archived: bool,
    ) -> Result<Vec<Project>>;

    /// Replace a project's allowed-kinds set. Empty means "all active kinds".
    async fn set_project_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        kind_ids: &[String],
    ) -> Result<()>;

    async fn list_project_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
    ) -> Result<Vec<String>>;

    // ========================================================================
    // Kinds
    // ========================================================================

    async fn create_kind(&self, cancel: &CancellationToken, kind: &KindDef) -> Result<()>;

    async fn update_kind(&self, cancel: &CancellationToken, kind: &KindDef) -> Result<()>;

    async fn get_kind(&self, cancel: &CancellationToken, id: &str) -> Result<KindDef>;

    async fn list_kinds(
        &self,
        cancel: &CancellationToken,
        include_archived: bool,
    ) -> Result<Vec<KindDef>>;

    // ========================================================================
    // Columns
    // ========================================================================

    async fn create_column(&self, cancel: &CancellationToken, column: &Column) -> Result<()>;

    async fn update_column(&self, cancel: &CancellationToken, column: &Column) -> Result<()>;

    async fn get_column(&self, cancel: &CancellationToken, id: Uuid) -> Result<Column>;

    /// Sorted by (position, id).
    async fn list_columns(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Column>>;

    // ========================================================================
    // Work items
    // ========================================================================

    async fn create_task(&self, cancel: &CancellationToken, task: &Task) -> Result<()>;

    async fn update_task(&self, cancel: &CancellationToken, task: &Task) -> Result<()>;

    async fn get_task(&self, cancel: &CancellationToken, id: Uuid) -> Result<Task>;

    /// Sorted by id for determinism.
    async fn list_tasks(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Task>>;

    /// Hard delete.
    async fn delete_task(&self, cancel: &CancellationToken, id: Uuid) -> Result<()>;

    // ========================================================================
    // Attention items
    // ========================================================================

    async fn create_attention_item(
        &self,
        cancel: &CancellationToken,
        item: &AttentionItem,
    ) -> Result<()>;

    async fn update_attention_item(
        &self,
        cancel: &CancellationToken,
        item: &AttentionItem,
    ) -> Result<()>;

    async fn get_attention_item(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<AttentionItem>;

    /// Sorted by (created_at, id).
    async fn list_attention_items(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
    ) -> Result<Vec<AttentionItem>>;

    // ========================================================================
    // Comments
    // ========================================================================

    async fn create_comment(&self, cancel: &CancellationToken, comment: &Comment) -> Result<()>;

    /// Sorted by (created_at, id).
    async fn list_comments_by_target(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        target_type: &str,
        target_id: &str,
    ) -> Result<Vec<Comment>>;

    // ========================================================================
    // Change events
    // ========================================================================

    /// Assigns the per-project monotonic id and returns the stored event.
    async fn append_change_event(
        &self,
        cancel: &CancellationToken,
        event: &ChangeEvent,
    ) -> Result<ChangeEvent>;

    /// Most recent first; `limit` 0 = all.
    async fn list_change_events(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>>;

    // ========================================================================
    // Leases
    // ========================================================================

    async fn create_lease(&self, cancel: &CancellationToken, lease: &Lease) -> Result<()>;

    async fn update_lease(&self, cancel: &CancellationToken, lease: &Lease) -> Result<()>;

    async fn get_lease(&self, cancel: &CancellationToken, instance_id: &str) -> Result<Lease>;

    /// Sorted by (issued_at, instance_id).
    async fn list_leases_by_scope(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
    ) -> Result<Vec<Lease>>;

    /// Atomically revoke every active lease in the scope; returns how many.
    async fn revoke_leases_by_scope(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<usize>;
}
