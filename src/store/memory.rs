//! In-memory `Repository` implementation.
//!
//! `tokio::sync::RwLock<HashMap>` per entity; listings re-sort on the way
//! out so no map-iteration order leaks. Change-event ids are per-project
//! counters held under the same lock as the event log, which gives the
//! in-order append the port requires.

use crate::domain::{
    sort_columns, AttentionItem, ChangeEvent, Column, Comment, KindDef, Lease, Project, ScopeType,
    Task,
};
use crate::error::{PlannerError, Result};
use crate::store::traits::Repository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Default)]
struct EventLog {
    next_id: u64,
    events: Vec<ChangeEvent>,
}

/// Process-wide in-memory store.
#[derive(Default)]
pub struct MemoryRepository {
    projects: RwLock<HashMap<Uuid, Project>>,
    allowed_kinds: RwLock<HashMap<Uuid, Vec<String>>>,
    kinds: RwLock<HashMap<String, KindDef>>,
    columns: RwLock<HashMap<Uuid, Column>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    attention: RwLock<HashMap<Uuid, AttentionItem>>,
    comments: RwLock<HashMap<Uuid, Comment>>,
    events: RwLock<HashMap<Uuid, EventLog>>,
    leases: RwLock<HashMap<String, Lease>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(PlannerError::Cancelled);
    }
    Ok(())
}

#[async_trait]
impl Repository for MemoryRepository {
    // ------------------------------------------------------------------ projects

    async fn create_project(&self, cancel: &CancellationToken, project: &Project) -> Result<()> {
        ensure_live(cancel)?;
        let mut projects = self.projects.write().await;
        if projects.values().any(|p| p.slug == project.slug) {
            return Err(PlannerError::invalid_request(format!(
                "project slug '{}' already exists",
                project.slug
            )));
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn update_project(&self, cancel: &CancellationToken, project: &Project) -> Result<()> {
        ensure_live(cancel)?;
        let mut projects = self.projects.write().await;
        if !projects.contains_key(&project.id) {
            return Err(PlannerError::not_found(format!(
                "project {} not found",
                project.id
            )));
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, cancel: &CancellationToken, id: Uuid) -> Result<Project> {
        ensure_live(cancel)?;
        self.projects
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PlannerError::not_found(format!("project {id} not found")))
    }

    async fn list_projects(
        &self,
        cancel: &CancellationToken,
        include_archived: bool,
    ) -> Result<Vec<Project>> {
        ensure_live(cancel)?;
        let mut out: Vec<Project> = self
            .projects
            .read()
            .await
            .values()
            .filter(|p| include_archived || !p.is_archived())
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(out)
    }

    async fn set_project_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        kind_ids: &[String],
    ) -> Result<()> {
        ensure_live(cancel)?;
        if !self.projects.read().await.contains_key(&project_id) {
            return Err(PlannerError::not_found(format!(
                "project {project_id} not found"
            )));
        }
        self.allowed_kinds
            .write()
            .await
            .insert(project_id, kind_ids.to_vec());
        Ok(())
    }

    async fn list_project_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
    ) -> Result<Vec<String>> {
        ensure_live(cancel)?;
        if !self.projects.read().await.contains_key(&project_id) {
            return Err(PlannerError::not_found(format!(
                "project {project_id} not found"
            )));
        }
        Ok(self
            .allowed_kinds
            .read()
            .await
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------ kinds

    async fn create_kind(&self, cancel: &CancellationToken, kind: &KindDef) -> Result<()> {
        ensure_live(cancel)?;
        self.kinds.write().await.insert(kind.id.clone(), kind.clone());
        Ok(())
    }

    async fn update_kind(&self, cancel: &CancellationToken, kind: &KindDef) -> Result<()> {
        ensure_live(cancel)?;
        let mut kinds = self.kinds.write().await;
        if !kinds.contains_key(&kind.id) {
            return Err(PlannerError::KindNotFound(format!(
                "kind '{}' not found",
                kind.id
            )));
        }
        kinds.insert(kind.id.clone(), kind.clone());
        Ok(())
    }

    async fn get_kind(&self, cancel: &CancellationToken, id: &str) -> Result<KindDef> {
        ensure_live(cancel)?;
        self.kinds
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| PlannerError::KindNotFound(format!("kind '{id}' not found")))
    }

    async fn list_kinds(
        &self,
        cancel: &CancellationToken,
        include_archived: bool,
    ) -> Result<Vec<KindDef>> {
        ensure_live(cancel)?;
        let mut out: Vec<KindDef> = self
            .kinds
            .read()
            .await
            .values()
            .filter(|k| include_archived || !k.is_archived())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    // ------------------------------------------------------------------ columns

    async fn create_column(&self, cancel: &CancellationToken, column: &Column) -> Result<()> {
        ensure_live(cancel)?;
        self.columns.write().await.insert(column.id, column.clone());
        Ok(())
    }

    async fn update_column(&self, cancel: &CancellationToken, column: &Column) -> Result<()> {
        ensure_live(cancel)?;
        let mut columns = self.columns.write().await;
        if !columns.contains_key(&column.id) {
            return Err(PlannerError::not_found(format!(
                "column {} not found",
                column.id
            )));
        }
        columns.insert(column.id, column.clone());
        Ok(())
    }

    async fn get_column(&self, cancel: &CancellationToken, id: Uuid) -> Result<Column> {
        ensure_live(cancel)?;
        self.columns
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PlannerError::not_found(format!("column {id} not found")))
    }

    async fn list_columns(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Column>> {
        ensure_live(cancel)?;
        let mut out: Vec<Column> = self
            .columns
            .read()
            .await
            .values()
            .filter(|c| c.project_id == project_id && (include_archived || !c.is_archived()))
            .cloned()
            .collect();
        sort_columns(&mut out);
        Ok(out)
    }

    // ------------------------------------------------------------------ tasks

    async fn create_task(&self, cancel: &CancellationToken, task: &Task) -> Result<()> {
        ensure_live(cancel)?;
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&self, cancel: &CancellationToken, task: &Task) -> Result<()> {
        ensure_live(cancel)?;
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(PlannerError::not_found(format!(
                "task {} not found",
                task.id
            )));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, cancel: &CancellationToken, id: Uuid) -> Result<Task> {
        ensure_live(cancel)?;
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PlannerError::not_found(format!("task {id} not found")))
    }

    async fn list_tasks(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        ensure_live(cancel)?;
        let mut out: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.project_id == project_id && (include_archived || !t.is_archived()))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    async fn delete_task(&self, cancel: &CancellationToken, id: Uuid) -> Result<()> {
        ensure_live(cancel)?;
        self.tasks
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PlannerError::not_found(format!("task {id} not found")))
    }

    // ------------------------------------------------------------------ attention

    async fn create_attention_item(
        &self,
        cancel: &CancellationToken,
        item: &AttentionItem,
    ) -> Result<()> {
        ensure_live(cancel)?;
        self.attention.write().await.insert(item.id, item.clone());
        Ok(())
    }

    async fn update_attention_item(
        &self,
        cancel: &CancellationToken,
        item: &AttentionItem,
    ) -> Result<()> {
        ensure_live(cancel)?;
        let mut attention = self.attention.write().await;
        if !attention.contains_key(&item.id) {
            return Err(PlannerError::not_found(format!(
                "attention item {} not found",
                item.id
            )));
        }
        attention.insert(item.id, item.clone());
        Ok(())
    }

    async fn get_attention_item(
        &self,
        cancel: &CancellationToken,
        id: Uuid,
    ) -> Result<AttentionItem> {
        ensure_live(cancel)?;
        self.attention
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| PlannerError::not_found(format!("attention item {id} not found")))
    }

    async fn list_attention_items(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
    ) -> Result<Vec<AttentionItem>> {
        ensure_live(cancel)?;
        let mut out: Vec<AttentionItem> = self
            .attention
            .read()
            .await
            .values()
            .filter(|a| a.project_id == project_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(out)
    }

    // ------------------------------------------------------------------ comments

    async fn create_comment(&self, cancel: &CancellationToken, comment: &Comment) -> Result<()> {
        ensure_live(cancel)?;
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(())
    }

    async fn list_comments_by_target(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        target_type: &str,
        target_id: &str,
    ) -> Result<Vec<Comment>> {
        ensure_live(cancel)?;
        let mut out: Vec<Comment> = self
            .comments
            .read()
            .await
            .values()
            .filter(|c| {
                c.project_id == project_id
                    && c.target_type == target_type
                    && c.target_id == target_id
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(out)
    }

    // ------------------------------------------------------------------ change events

    async fn append_change_event(
        &self,
        cancel: &CancellationToken,
        event: &ChangeEvent,
    ) -> Result<ChangeEvent> {
        ensure_live(cancel)?;
        let mut logs = self.events.write().await;
        let log = logs.entry(event.project_id).or_default();
        log.next_id += 1;
        let mut stored = event.clone();
        stored.id = log.next_id;
        log.events.push(stored.clone());
        Ok(stored)
    }

    async fn list_change_events(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>> {
        ensure_live(cancel)?;
        let logs = self.events.read().await;
        let mut out: Vec<ChangeEvent> = logs
            .get(&project_id)
            .map(|l| l.events.clone())
            .unwrap_or_default();
        out.sort_by(|a, b| b.id.cmp(&a.id));
        if limit > 0 {
            out.truncate(limit);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------ leases

    async fn create_lease(&self, cancel: &CancellationToken, lease: &Lease) -> Result<()> {
        ensure_live(cancel)?;
        let mut leases = self.leases.write().await;
        if leases.contains_key(&lease.instance_id) {
            return Err(PlannerError::invalid_request(format!(
                "lease instance '{}' already exists",
                lease.instance_id
            )));
        }
        leases.insert(lease.instance_id.clone(), lease.clone());
        Ok(())
    }

    async fn update_lease(&self, cancel: &CancellationToken, lease: &Lease) -> Result<()> {
        ensure_live(cancel)?;
        let mut leases = self.leases.write().await;
        if !leases.contains_key(&lease.instance_id) {
            return Err(PlannerError::not_found(format!(
                "lease instance '{}' not found",
                lease.instance_id
            )));
        }
        leases.insert(lease.instance_id.clone(), lease.clone());
        Ok(())
    }

    async fn get_lease(&self, cancel: &CancellationToken, instance_id: &str) -> Result<Lease> {
        ensure_live(cancel)?;
        self.leases
            .read()
            .await
            .get(instance_id)
            .cloned()
            .ok_or_else(|| {
                PlannerError::not_found(format!("lease instance '{instance_id}' not found"))
            })
    }

    async fn list_leases_by_scope(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
    ) -> Result<Vec<Lease>> {
        ensure_live(cancel)?;
        let mut out: Vec<Lease> = self
            .leases
            .read()
            .await
            .values()
            .filter(|l| {
                l.project_id == project_id
                    && l.scope_type == scope_type
                    && l.scope_id == scope_id
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (a.issued_at, a.instance_id.as_str()).cmp(&(b.issued_at, b.instance_id.as_str()))
        });
        Ok(out)
    }

    async fn revoke_leases_by_scope(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
        at: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<usize> {
        ensure_live(cancel)?;
        // Single write lock: all matching active leases flip together.
        let mut leases = self.leases.write().await;
        let mut revoked = 0;
        for lease in leases.values_mut() {
            if lease.project_id == project_id
                && lease.scope_type == scope_type
                && lease.scope_id == scope_id
                && lease.is_active_at(at)
            {
                lease.revoked_at = Some(at);
                lease.revoked_reason = reason.map(str::to_string);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, ChangeOp, ProjectMetadata};

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn test_project_round_trip_and_slug_conflict() {
        let repo = MemoryRepository::new();
        let c = cancel();
        let p = Project::new("Roadmap", "", None, ProjectMetadata::default()).unwrap();
        repo.create_project(&c, &p).await.unwrap();
        let got = repo.get_project(&c, p.id).await.unwrap();
        assert_eq!(got.slug, "roadmap");

        let dup = Project::new("Roadmap", "", None, ProjectMetadata::default()).unwrap();
        assert!(repo.create_project(&c, &dup).await.is_err());
    }

    #[tokio::test]
    async fn test_not_found_is_distinguished() {
        let repo = MemoryRepository::new();
        let c = cancel();
        let err = repo.get_task(&c, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_change_event_ids_are_monotonic_per_project() {
        let repo = MemoryRepository::new();
        let c = cancel();
        let project = Uuid::new_v4();
        let other = Uuid::new_v4();
        let actor = Actor::user("m");
        for _ in 0..3 {
            repo.append_change_event(
                &c,
                &ChangeEvent::new(project, Uuid::new_v4(), ChangeOp::Create, &actor),
            )
            .await
            .unwrap();
        }
        let stored = repo
            .append_change_event(
                &c,
                &ChangeEvent::new(other, Uuid::new_v4(), ChangeOp::Create, &actor),
            )
            .await
            .unwrap();
        assert_eq!(stored.id, 1);

        let events = repo.list_change_events(&c, project, 0).await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].id, 3); // most recent first
        let limited = repo.list_change_events(&c, project, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_revoke_by_scope_is_atomic_over_active() {
        let repo = MemoryRepository::new();
        let c = cancel();
        let project = Uuid::new_v4();
        let mk = |iid: &str| {
            crate::domain::Lease::new(
                Some(iid),
                "w",
                project,
                ScopeType::Project,
                &project.to_string(),
                crate::domain::LeaseRole::Worker,
                None,
                false,
                chrono::Duration::hours(1),
            )
            .unwrap()
        };
        repo.create_lease(&c, &mk("a")).await.unwrap();
        repo.create_lease(&c, &mk("b")).await.unwrap();
        let n = repo
            .revoke_leases_by_scope(
                &c,
                project,
                ScopeType::Project,
                &project.to_string(),
                Utc::now(),
                Some("shutdown"),
            )
            .await
            .unwrap();
        assert_eq!(n, 2);
        let a = repo.get_lease(&c, "a").await.unwrap();
        assert!(a.is_revoked());
        assert_eq!(a.revoked_reason.as_deref(), Some("shutdown"));
    }

    #[tokio::test]
    async fn test_cancellation_is_honored() {
        let repo = MemoryRepository::new();
        let c = cancel();
        c.cancel();
        let err = repo.list_projects(&c, false).await.unwrap_err();
        assert_eq!(err.code(), "service_unavailable");
    }
}
