//! Work-item operations: create (with template expansion), update, move
//! (lifecycle gating), reparent, archive/restore, delete, listings.

use crate::domain::{
    Actor, AttentionItem, ChangeEvent, ChangeOp, ChecklistItem, Column, KindDef, Lifecycle,
    NewTask, Priority, ScopeType, Task, TaskMetadata,
};
use crate::error::{GuardrailKind, PlannerError, Result};
use crate::guard::CallContext;
use crate::service::WorkGraphService;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateTaskInput {
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: String,
    pub scope: String,
    /// Defaults to the first active column.
    pub column_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_at: Option<DateTime<Utc>>,
    pub labels: Vec<String>,
    pub metadata: TaskMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    /// Outer None = untouched; inner None = clear.
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub labels: Option<Vec<String>>,
    pub metadata: Option<TaskMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Archive,
    Hard,
}

impl DeleteMode {
    pub fn parse(s: Option<&str>) -> Result<Self> {
        match s.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::Archive),
            Some(s) => match s.to_ascii_lowercase().as_str() {
                "archive" => Ok(Self::Archive),
                "hard" => Ok(Self::Hard),
                other => Err(PlannerError::InvalidDeleteMode(format!(
                    "delete mode must be 'archive' or 'hard', got '{other}'"
                ))),
            },
        }
    }
}

impl WorkGraphService {
    /// Create a task at the end of its column, then expand the kind
    /// template: checklist merge first, auto-created children second, both
    /// attributed to the system actor.
    pub async fn create_task(&self, ctx: &CallContext, input: CreateTaskInput) -> Result<Task> {
        let op = "create task";
        self.repo
            .get_project(&ctx.cancel, input.project_id)
            .await
            .map_err(|e| e.op(op))?;

        let parent = match input.parent_id {
            Some(parent_id) => {
                let parent = self
                    .repo
                    .get_task(&ctx.cancel, parent_id)
                    .await
                    .map_err(|e| e.op(op))?;
                if parent.project_id != input.project_id {
                    return Err(PlannerError::invalid_request(
                        "parent belongs to a different project",
                    )
                    .op(op));
                }
                Some(parent)
            }
            None => None,
        };

        self.guard
            .authorize(ctx, input.project_id, parent.as_ref())
            .await
            .map_err(|e| e.op(op))?;

        let scope = input.scope.trim().to_ascii_lowercase();
        ScopeType::parse(&scope).map_err(|e| e.op(op))?;

        let kind = self
            .catalog
            .check_task_kind(
                &ctx.cancel,
                input.project_id,
                &input.kind,
                &scope,
                parent.as_ref().map(|p| p.scope.as_str()),
            )
            .await
            .map_err(|e| e.op(op))?;
        self.catalog
            .check_payload(&kind, &input.metadata.kind_payload)
            .map_err(|e| e.op(op))?;

        let column = self
            .resolve_column(ctx, input.project_id, input.column_id)
            .await
            .map_err(|e| e.op(op))?;
        let position = self.next_position(ctx, &column).await?;

        let task = Task::new(
            NewTask {
                project_id: input.project_id,
                parent_id: input.parent_id,
                kind: &kind.id,
                scope: &scope,
                column_id: column.id,
                position,
                title: &input.title,
                description: &input.description,
                priority: input.priority,
                due_at: input.due_at,
                labels: &input.labels,
                lifecycle: column.lifecycle_state(),
                metadata: input.metadata,
            },
            &ctx.actor,
        )
        .map_err(|e| e.op(op))?;
        self.repo
            .create_task(&ctx.cancel, &task)
            .await
            .map_err(|e| e.op(op))?;
        self.append_event(ctx, ChangeEvent::new(task.project_id, task.id, ChangeOp::Create, &ctx.actor))
            .await?;

        let task = self.expand_template(ctx, task, &kind).await?;
        info!(task = %task.id, kind = %task.kind, "created task");
        Ok(task)
    }

    /// Template expansion. Checklist items are appended when their id is not
    /// already present; children are validated like any other create and
    /// inherit the parent's column state.
    async fn expand_template(
        &self,
        ctx: &CallContext,
        mut task: Task,
        kind: &KindDef,
    ) -> Result<Task> {
        let system = Actor::system();

        let existing: HashSet<String> = task
            .metadata
            .contract
            .completion_checklist
            .iter()
            .map(|c| c.id.clone())
            .collect();
        let additions: Vec<ChecklistItem> = kind
            .template
            .completion_checklist
            .iter()
            .filter(|c| !existing.contains(&c.id))
            .cloned()
            .collect();
        if !additions.is_empty() {
            task.metadata.contract.completion_checklist.extend(additions);
            task.updated_by_actor = system.id.clone();
            task.updated_by_type = system.actor_type;
            task.updated_at = Utc::now();
            self.repo.update_task(&ctx.cancel, &task).await?;
            self.append_event(
                ctx,
                ChangeEvent::new(task.project_id, task.id, ChangeOp::Update, &system)
                    .with_meta("changed", "completion_checklist"),
            )
            .await?;
        }

        let column = self.repo.get_column(&ctx.cancel, task.column_id).await?;
        for child_spec in &kind.template.auto_create_children {
            ScopeType::parse(&child_spec.applies_to)?;
            let child_kind = self
                .catalog
                .check_task_kind(
                    &ctx.cancel,
                    task.project_id,
                    &child_spec.kind,
                    &child_spec.applies_to,
                    Some(task.scope.as_str()),
                )
                .await?;
            let metadata = TaskMetadata {
                kind_payload: child_spec.metadata.clone(),
                ..TaskMetadata::default()
            };
            self.catalog.check_payload(&child_kind, &metadata.kind_payload)?;
            let position = self.next_position(ctx, &column).await?;
            let child = Task::new(
                NewTask {
                    project_id: task.project_id,
                    parent_id: Some(task.id),
                    kind: &child_kind.id,
                    scope: &child_spec.applies_to,
                    column_id: column.id,
                    position,
                    title: &child_spec.title,
                    description: &child_spec.description,
                    priority: Priority::Medium,
                    due_at: None,
                    labels: &child_spec.labels,
                    lifecycle: column.lifecycle_state(),
                    metadata,
                },
                &system,
            )?;
            self.repo.create_task(&ctx.cancel, &child).await?;
            self.append_event(
                ctx,
                ChangeEvent::new(child.project_id, child.id, ChangeOp::Create, &system)
                    .with_meta("template_of", task.id.to_string()),
            )
            .await?;
            debug!(parent = %task.id, child = %child.id, "expanded template child");
        }
        Ok(task)
    }

    /// Partial update preserving unmentioned fields.
    pub async fn update_task(
        &self,
        ctx: &CallContext,
        task_id: Uuid,
        input: UpdateTaskInput,
    ) -> Result<Task> {
        let op = "update task";
        let task = self
            .repo
            .get_task(&ctx.cancel, task_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, task.project_id, Some(&task))
            .await
            .map_err(|e| e.op(op))?;

        if let Some(metadata) = &input.metadata {
            let kind = self.catalog.get_kind(&ctx.cancel, &task.kind).await.map_err(|e| e.op(op))?;
            self.catalog
                .check_payload(&kind, &metadata.kind_payload)
                .map_err(|e| e.op(op))?;
        }

        let mut changed: Vec<&str> = Vec::new();
        if input.title.is_some() {
            changed.push("title");
        }
        if input.description.is_some() {
            changed.push("description");
        }
        if input.priority.is_some() {
            changed.push("priority");
        }
        if input.due_at.is_some() {
            changed.push("due_at");
        }
        if input.labels.is_some() {
            changed.push("labels");
        }
        if input.metadata.is_some() {
            changed.push("metadata");
        }

        let task = task
            .with_details(
                input.title.as_deref(),
                input.description.as_deref(),
                input.priority,
                input.due_at,
                input.labels.as_deref(),
                input.metadata,
                &ctx.actor,
            )
            .map_err(|e| e.op(op))?;
        self.repo
            .update_task(&ctx.cancel, &task)
            .await
            .map_err(|e| e.op(op))?;
        self.append_event(
            ctx,
            ChangeEvent::new(task.project_id, task.id, ChangeOp::Update, &ctx.actor)
                .with_meta("changed", changed.join(",")),
        )
        .await?;
        Ok(task)
    }

    /// Move a task into a column, gated by the completion contract.
    pub async fn move_task(
        &self,
        ctx: &CallContext,
        task_id: Uuid,
        to_column: Uuid,
        position: Option<u32>,
    ) -> Result<Task> {
        let op = "move task";
        let task = self
            .repo
            .get_task(&ctx.cancel, task_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, task.project_id, Some(&task))
            .await
            .map_err(|e| e.op(op))?;

        let column = self
            .repo
            .get_column(&ctx.cancel, to_column)
            .await
            .map_err(|e| e.op(op))?;
        if column.project_id != task.project_id {
            return Err(
                PlannerError::invalid_request("target column belongs to a different project")
                    .op(op),
            );
        }
        if column.is_archived() {
            return Err(PlannerError::invalid_request("target column is archived").op(op));
        }

        let target_state = column.lifecycle_state();
        self.check_transition(ctx, &task, &column, target_state)
            .await
            .map_err(|e| e.op(op))?;

        let position = match position {
            Some(p) => p,
            None => self.next_position(ctx, &column).await?,
        };
        let completing = target_state == Lifecycle::Done && task.lifecycle != Lifecycle::Done;
        let task = task.moved_to(column.id, position, target_state, &ctx.actor);
        self.repo
            .update_task(&ctx.cancel, &task)
            .await
            .map_err(|e| e.op(op))?;
        let change_op = if completing {
            ChangeOp::Complete
        } else {
            ChangeOp::Move
        };
        self.append_event(
            ctx,
            ChangeEvent::new(task.project_id, task.id, change_op, &ctx.actor)
                .with_meta("to_column", column.id.to_string())
                .with_meta("to_state", target_state.as_str()),
        )
        .await?;
        Ok(task)
    }

    /// The lifecycle transition gate.
    async fn check_transition(
        &self,
        ctx: &CallContext,
        task: &Task,
        column: &Column,
        target_state: Lifecycle,
    ) -> Result<()> {
        let contract = &task.metadata.contract;

        if target_state != Lifecycle::Done
            && matches!(task.lifecycle, Lifecycle::Todo | Lifecycle::Progress)
            && !contract.start_criteria_met()
        {
            return Err(PlannerError::guardrail(
                GuardrailKind::TransitionBlocked,
                "start_criteria must be met",
            ));
        }

        if target_state == Lifecycle::Done {
            if !contract.completion_criteria_met() {
                return Err(PlannerError::guardrail(
                    GuardrailKind::TransitionBlocked,
                    "completion_criteria must be met",
                ));
            }
            if !contract.completion_checklist_met() {
                return Err(PlannerError::guardrail(
                    GuardrailKind::TransitionBlocked,
                    "completion_checklist must be met",
                ));
            }
            if contract.policy.require_children_done {
                let children = self
                    .list_child_tasks(ctx, task.project_id, task.id, false)
                    .await?;
                let unfinished = children
                    .iter()
                    .filter(|c| !c.lifecycle.is_terminal())
                    .count();
                if unfinished > 0 {
                    return Err(PlannerError::guardrail(
                        GuardrailKind::TransitionBlocked,
                        "subtasks must be done",
                    ));
                }
            }
            let blocking = self
                .unresolved_user_action_items(ctx, task)
                .await?;
            if !blocking.is_empty() {
                return Err(PlannerError::guardrail(
                    GuardrailKind::TransitionBlocked,
                    "unresolved attention items require user action",
                ));
            }
        }

        // A bounded column admits only so many active items.
        if column.wip_limit > 0 && column.id != task.column_id {
            let occupancy = self
                .repo
                .list_tasks(&ctx.cancel, task.project_id, false)
                .await?
                .iter()
                .filter(|t| t.column_id == column.id && t.id != task.id)
                .count();
            if occupancy as u32 >= column.wip_limit {
                return Err(PlannerError::guardrail(
                    GuardrailKind::TransitionBlocked,
                    format!("column '{}' is at its WIP limit", column.name),
                ));
            }
        }
        Ok(())
    }

    async fn unresolved_user_action_items(
        &self,
        ctx: &CallContext,
        task: &Task,
    ) -> Result<Vec<AttentionItem>> {
        if !self.config.attention_enabled {
            return Ok(Vec::new());
        }
        let scope_id = task.id.to_string();
        Ok(self
            .repo
            .list_attention_items(&ctx.cancel, task.project_id)
            .await?
            .into_iter()
            .filter(|a| {
                a.scope_id == scope_id
                    && a.scope_type.as_str() == task.scope
                    && a.is_unresolved()
                    && a.requires_user_action
            })
            .collect())
    }

    /// Re-home a task under a new parent, re-checking kind constraints.
    pub async fn reparent_task(
        &self,
        ctx: &CallContext,
        task_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> Result<Task> {
        let op = "reparent task";
        let task = self
            .repo
            .get_task(&ctx.cancel, task_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, task.project_id, Some(&task))
            .await
            .map_err(|e| e.op(op))?;

        let parent = match new_parent {
            Some(parent_id) => {
                if parent_id == task.id {
                    return Err(
                        PlannerError::invalid_request("a task cannot parent itself").op(op)
                    );
                }
                let parent = self
                    .repo
                    .get_task(&ctx.cancel, parent_id)
                    .await
                    .map_err(|e| e.op(op))?;
                if parent.project_id != task.project_id {
                    return Err(PlannerError::invalid_request(
                        "new parent belongs to a different project",
                    )
                    .op(op));
                }
                // Walking up from the new parent must never reach the task.
                let mut seen: HashSet<Uuid> = HashSet::new();
                let mut cursor = parent.clone();
                loop {
                    if cursor.id == task.id {
                        return Err(PlannerError::invalid_request(
                            "reparenting would create a cycle",
                        )
                        .op(op));
                    }
                    if !seen.insert(cursor.id) {
                        break;
                    }
                    match cursor.parent_id {
                        Some(next) => {
                            cursor = self
                                .repo
                                .get_task(&ctx.cancel, next)
                                .await
                                .map_err(|e| e.op(op))?;
                        }
                        None => break,
                    }
                }
                Some(parent)
            }
            None => None,
        };

        self.catalog
            .check_task_kind(
                &ctx.cancel,
                task.project_id,
                &task.kind,
                &task.scope,
                parent.as_ref().map(|p| p.scope.as_str()),
            )
            .await
            .map_err(|e| e.op(op))?;

        let task = task.reparented(new_parent, &ctx.actor);
        self.repo
            .update_task(&ctx.cancel, &task)
            .await
            .map_err(|e| e.op(op))?;
        self.append_event(
            ctx,
            ChangeEvent::new(task.project_id, task.id, ChangeOp::Reparent, &ctx.actor).with_meta(
                "new_parent",
                new_parent.map(|id| id.to_string()).unwrap_or_default(),
            ),
        )
        .await?;
        Ok(task)
    }

    /// Archive (default) or hard-delete. Hard delete removes only the row
    /// itself; archived children stay archived.
    pub async fn delete_task(
        &self,
        ctx: &CallContext,
        task_id: Uuid,
        mode: DeleteMode,
    ) -> Result<Task> {
        let op = "delete task";
        let task = self
            .repo
            .get_task(&ctx.cancel, task_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, task.project_id, Some(&task))
            .await
            .map_err(|e| e.op(op))?;

        match mode {
            DeleteMode::Archive => {
                let task = task.archived(&ctx.actor);
                self.repo
                    .update_task(&ctx.cancel, &task)
                    .await
                    .map_err(|e| e.op(op))?;
                self.append_event(
                    ctx,
                    ChangeEvent::new(task.project_id, task.id, ChangeOp::Delete, &ctx.actor)
                        .with_meta("mode", "archive"),
                )
                .await?;
                Ok(task)
            }
            DeleteMode::Hard => {
                self.repo
                    .delete_task(&ctx.cancel, task.id)
                    .await
                    .map_err(|e| e.op(op))?;
                self.append_event(
                    ctx,
                    ChangeEvent::new(task.project_id, task.id, ChangeOp::Delete, &ctx.actor)
                        .with_meta("mode", "hard"),
                )
                .await?;
                Ok(task)
            }
        }
    }

    /// Clear the archive flag; the lifecycle state is untouched.
    pub async fn restore_task(&self, ctx: &CallContext, task_id: Uuid) -> Result<Task> {
        let op = "restore task";
        let task = self
            .repo
            .get_task(&ctx.cancel, task_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, task.project_id, Some(&task))
            .await
            .map_err(|e| e.op(op))?;
        let task = task.restored(&ctx.actor);
        self.repo
            .update_task(&ctx.cancel, &task)
            .await
            .map_err(|e| e.op(op))?;
        self.append_event(
            ctx,
            ChangeEvent::new(task.project_id, task.id, ChangeOp::Restore, &ctx.actor),
        )
        .await?;
        Ok(task)
    }

    pub async fn get_task(&self, ctx: &CallContext, task_id: Uuid) -> Result<Task> {
        self.repo.get_task(&ctx.cancel, task_id).await
    }

    /// Tasks of a project sorted by id.
    pub async fn list_tasks(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        self.repo.get_project(&ctx.cancel, project_id).await?;
        self.repo
            .list_tasks(&ctx.cancel, project_id, include_archived)
            .await
    }

    /// Direct children sorted by (position, id).
    pub async fn list_child_tasks(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        parent_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Task>> {
        let mut children: Vec<Task> = self
            .repo
            .list_tasks(&ctx.cancel, project_id, include_archived)
            .await?
            .into_iter()
            .filter(|t| t.parent_id == Some(parent_id))
            .collect();
        children.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
        Ok(children)
    }

    async fn resolve_column(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        column_id: Option<Uuid>,
    ) -> Result<Column> {
        match column_id {
            Some(id) => {
                let column = self.repo.get_column(&ctx.cancel, id).await?;
                if column.project_id != project_id {
                    return Err(PlannerError::invalid_request(
                        "column belongs to a different project",
                    ));
                }
                if column.is_archived() {
                    return Err(PlannerError::invalid_request("column is archived"));
                }
                Ok(column)
            }
            None => self
                .repo
                .list_columns(&ctx.cancel, project_id, false)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| PlannerError::invalid_request("project has no columns")),
        }
    }

    /// End-of-column placement: max position in the column + 1.
    async fn next_position(&self, ctx: &CallContext, column: &Column) -> Result<u32> {
        Ok(self
            .repo
            .list_tasks(&ctx.cancel, column.project_id, true)
            .await?
            .iter()
            .filter(|t| t.column_id == column.id)
            .map(|t| t.position + 1)
            .max()
            .unwrap_or(0))
    }

    pub(crate) async fn append_event(
        &self,
        ctx: &CallContext,
        event: ChangeEvent,
    ) -> Result<ChangeEvent> {
        self.repo.append_change_event(&ctx.cancel, &event).await
    }
}

/// Parse a raw metadata JSON value into the typed record, rejecting shapes
/// that do not fit.
pub fn parse_task_metadata(value: Option<Value>) -> Result<TaskMetadata> {
    match value {
        None | Some(Value::Null) => Ok(TaskMetadata::default()),
        Some(v) => serde_json::from_value(v)
            .map_err(|e| PlannerError::invalid_request(format!("invalid task metadata: {e}"))),
    }
}
