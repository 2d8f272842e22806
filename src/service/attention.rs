//! Attention items: raise, list, resolve.

use crate::domain::{AttentionItem, AttentionState, ChangeEvent, ChangeOp, ScopeType, Task};
use crate::error::{PlannerError, Result};
use crate::guard::CallContext;
use crate::scopes::{self, ScopeEntity};
use crate::service::WorkGraphService;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RaiseAttentionInput {
    pub project_id: Uuid,
    pub scope_type: Option<String>,
    pub scope_id: Option<String>,
    /// e.g. `blocker`, `risk_note`, `approval_required`.
    pub kind: String,
    pub summary: String,
    pub body_md: String,
    pub requires_user_action: bool,
}

impl WorkGraphService {
    fn check_attention_enabled(&self) -> Result<()> {
        if !self.config.attention_enabled {
            return Err(PlannerError::AttentionUnavailable(
                "the attention surface is disabled in this instance".into(),
            ));
        }
        Ok(())
    }

    /// Raise an attention item at a scope tuple. The scope id must resolve
    /// to an entity of the claimed type.
    pub async fn raise_attention_item(
        &self,
        ctx: &CallContext,
        input: RaiseAttentionInput,
    ) -> Result<AttentionItem> {
        let op = "raise attention item";
        self.check_attention_enabled().map_err(|e| e.op(op))?;
        self.repo
            .get_project(&ctx.cancel, input.project_id)
            .await
            .map_err(|e| e.op(op))?;

        let (scope_type, scope_id) = scopes::normalize_scope(
            input.project_id,
            input.scope_type.as_deref(),
            input.scope_id.as_deref(),
        )
        .map_err(|e| e.op(op))?;
        let entity = scopes::resolve_scope(
            self.repo.as_ref(),
            &ctx.cancel,
            input.project_id,
            scope_type,
            &scope_id,
        )
        .await
        .map_err(|e| e.op(op))?;

        let target_task = match &entity {
            ScopeEntity::Task(task) => Some(task.clone()),
            ScopeEntity::Project(_) => None,
        };
        self.guard
            .authorize(ctx, input.project_id, target_task.as_ref())
            .await
            .map_err(|e| e.op(op))?;

        let item = AttentionItem::new(
            input.project_id,
            scope_type,
            &scope_id,
            &input.kind,
            &input.summary,
            &input.body_md,
            input.requires_user_action,
            &ctx.actor,
        )
        .map_err(|e| e.op(op))?;
        self.repo
            .create_attention_item(&ctx.cancel, &item)
            .await
            .map_err(|e| e.op(op))?;
        Ok(item)
    }

    /// Attention items at a scope, optionally filtered by state, sorted by
    /// (created_at, id).
    pub async fn list_attention_items(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        scope_type: Option<&str>,
        scope_id: Option<&str>,
        state: Option<&str>,
    ) -> Result<Vec<AttentionItem>> {
        let op = "list attention items";
        self.check_attention_enabled().map_err(|e| e.op(op))?;
        self.repo
            .get_project(&ctx.cancel, project_id)
            .await
            .map_err(|e| e.op(op))?;
        let state = state
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(AttentionState::parse)
            .transpose()
            .map_err(|e| e.op(op))?;
        let scope = match (scope_type, scope_id) {
            (None, None) => None,
            _ => Some(scopes::normalize_scope(project_id, scope_type, scope_id).map_err(|e| e.op(op))?),
        };
        let items = self
            .repo
            .list_attention_items(&ctx.cancel, project_id)
            .await?
            .into_iter()
            .filter(|a| {
                scope
                    .as_ref()
                    .map_or(true, |(st, sid)| a.scope_type == *st && a.scope_id == *sid)
            })
            .filter(|a| state.map_or(true, |s| a.state == s))
            .collect();
        Ok(items)
    }

    /// Resolve an attention item. Resolving twice is a no-op.
    pub async fn resolve_attention_item(
        &self,
        ctx: &CallContext,
        item_id: Uuid,
    ) -> Result<AttentionItem> {
        let op = "resolve attention item";
        self.check_attention_enabled().map_err(|e| e.op(op))?;
        let item = self
            .repo
            .get_attention_item(&ctx.cancel, item_id)
            .await
            .map_err(|e| e.op(op))?;

        let target_task: Option<Task> = if item.scope_type == ScopeType::Project {
            None
        } else {
            match Uuid::parse_str(&item.scope_id) {
                Ok(task_id) => Some(
                    self.repo
                        .get_task(&ctx.cancel, task_id)
                        .await
                        .map_err(|e| e.op(op))?,
                ),
                Err(_) => None,
            }
        };
        self.guard
            .authorize(ctx, item.project_id, target_task.as_ref())
            .await
            .map_err(|e| e.op(op))?;

        if item.state == AttentionState::Resolved {
            return Ok(item);
        }
        let item = item.resolved(&ctx.actor);
        self.repo
            .update_attention_item(&ctx.cancel, &item)
            .await
            .map_err(|e| e.op(op))?;

        let event_task_id = target_task
            .map(|t| t.id)
            .unwrap_or(item.project_id);
        self.append_event(
            ctx,
            ChangeEvent::new(item.project_id, event_task_id, ChangeOp::Resolve, &ctx.actor)
                .with_meta("attention_id", item.id.to_string()),
        )
        .await?;
        Ok(item)
    }
}
