//! Tool-call dispatch: argument parsing, guard context construction, and
//! translation into service calls.

use crate::capture::{BootstrapGuide, CaptureView};
use crate::domain::{KindTemplate, LeaseRole, Priority, ProjectMetadata};
use crate::error::{PlannerError, Result};
use crate::guard::{ActorTuple, CallContext};
use crate::lease::IssueLeaseRequest;
use crate::scopes;
use crate::service::{
    parse_task_metadata, CreateProjectInput, CreateTaskInput, DeleteMode, RaiseAttentionInput,
    TaskSearchFilter, UpdateProjectInput, UpdateTaskInput,
};
use crate::AppState;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Handles tool calls against the shared application state.
pub struct ToolHandler {
    state: AppState,
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn req_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlannerError::invalid_request(format!("'{key}' is required")))
}

fn opt_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn opt_bool(args: &Value, key: &str) -> bool {
    args.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn req_uuid(args: &Value, key: &str) -> Result<Uuid> {
    let raw = req_str(args, key)?;
    Uuid::parse_str(&raw)
        .map_err(|_| PlannerError::invalid_request(format!("'{key}' is not a valid UUID")))
}

fn opt_uuid(args: &Value, key: &str) -> Result<Option<Uuid>> {
    match opt_str(args, key) {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(&raw)
            .map(Some)
            .map_err(|_| PlannerError::invalid_request(format!("'{key}' is not a valid UUID"))),
    }
}

fn opt_u64(args: &Value, key: &str) -> Result<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| PlannerError::invalid_request(format!("'{key}' must be a non-negative integer"))),
    }
}

fn opt_i64(args: &Value, key: &str) -> Result<Option<i64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| PlannerError::invalid_request(format!("'{key}' must be an integer"))),
    }
}

fn opt_str_vec(args: &Value, key: &str) -> Result<Option<Vec<String>>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) => out.push(s.to_string()),
                    None => {
                        return Err(PlannerError::invalid_request(format!(
                            "'{key}' entries must be strings"
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(PlannerError::invalid_request(format!(
            "'{key}' must be a string array"
        ))),
    }
}

fn parse_due_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PlannerError::invalid_request("'due_at' must be an RFC 3339 timestamp"))
}

/// Build the guard context from the tool call's actor tuple.
fn call_context(args: &Value) -> Result<CallContext> {
    let tuple: ActorTuple = match args.get("actor") {
        None | Some(Value::Null) => ActorTuple::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| PlannerError::invalid_request(format!("invalid actor tuple: {e}")))?,
    };
    tuple.into_context(CancellationToken::new())
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| PlannerError::internal(e.to_string()))
}

impl ToolHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Handle a namespaced tool call and return the structured result.
    pub async fn handle(&self, name: &str, args: Option<Value>) -> Result<Value> {
        let args = args.unwrap_or_else(|| json!({}));
        let short = name
            .strip_prefix(&format!("{}.", super::TOOL_NAMESPACE))
            .unwrap_or(name);

        match short {
            // Bootstrap / capture / attention
            "get_bootstrap_guide" => self.get_bootstrap_guide(args).await,
            "capture_state" => self.capture_state(args).await,
            "list_attention_items" => self.list_attention_items(args).await,
            "raise_attention_item" => self.raise_attention_item(args).await,
            "resolve_attention_item" => self.resolve_attention_item(args).await,

            // Projects
            "list_projects" => self.list_projects(args).await,
            "create_project" => self.create_project(args).await,
            "update_project" => self.update_project(args).await,

            // Work graph
            "list_tasks" => self.list_tasks(args).await,
            "create_task" => self.create_task(args).await,
            "update_task" => self.update_task(args).await,
            "move_task" => self.move_task(args).await,
            "delete_task" => self.delete_task(args).await,
            "restore_task" => self.restore_task(args).await,
            "reparent_task" => self.reparent_task(args).await,
            "list_child_tasks" => self.list_child_tasks(args).await,
            "search_task_matches" => self.search_task_matches(args).await,

            // Change feed / dependencies / kinds
            "list_project_change_events" => self.list_project_change_events(args).await,
            "get_project_dependency_rollup" => self.get_project_dependency_rollup(args).await,
            "list_kind_definitions" => self.list_kind_definitions(args).await,
            "upsert_kind_definition" => self.upsert_kind_definition(args).await,
            "set_project_allowed_kinds" => self.set_project_allowed_kinds(args).await,
            "list_project_allowed_kinds" => self.list_project_allowed_kinds(args).await,

            // Leases
            "issue_capability_lease" => self.issue_capability_lease(args).await,
            "heartbeat_capability_lease" => self.heartbeat_capability_lease(args).await,
            "renew_capability_lease" => self.renew_capability_lease(args).await,
            "revoke_capability_lease" => self.revoke_capability_lease(args).await,
            "revoke_all_capability_leases" => self.revoke_all_capability_leases(args).await,

            // Comments
            "create_comment" => self.create_comment(args).await,
            "list_comments_by_target" => self.list_comments_by_target(args).await,

            other => Err(PlannerError::not_found(format!("unknown tool '{other}'"))),
        }
    }

    // ------------------------------------------------------------------
    // Bootstrap / capture / attention
    // ------------------------------------------------------------------

    async fn get_bootstrap_guide(&self, _args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let projects = self.state.repo.list_projects(&cancel, true).await?;
        if projects.is_empty() {
            return to_value(&BootstrapGuide::new());
        }
        Ok(json!({
            "mode": "ready",
            "summary": format!("{} projects available; capture state to resume work", projects.len()),
            "capabilities": BootstrapGuide::new().capabilities,
            "next_steps": ["capture_state", "list_tasks"],
            "recommended_tools": ["capture_state", "list_tasks", "list_attention_items"],
        }))
    }

    async fn capture_state(&self, args: Value) -> Result<Value> {
        let project_id = req_str(&args, "project_id")?;
        let view = CaptureView::parse(opt_str(&args, "view").as_deref())?;
        let bundle = self
            .state
            .capture
            .capture_state(
                &CancellationToken::new(),
                &project_id,
                opt_str(&args, "scope_type").as_deref(),
                opt_str(&args, "scope_id").as_deref(),
                view,
            )
            .await?;
        to_value(&bundle)
    }

    async fn list_attention_items(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let items = self
            .state
            .service
            .list_attention_items(
                &ctx,
                req_uuid(&args, "project_id")?,
                opt_str(&args, "scope_type").as_deref(),
                opt_str(&args, "scope_id").as_deref(),
                opt_str(&args, "state").as_deref(),
            )
            .await?;
        to_value(&items)
    }

    async fn raise_attention_item(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let item = self
            .state
            .service
            .raise_attention_item(
                &ctx,
                RaiseAttentionInput {
                    project_id: req_uuid(&args, "project_id")?,
                    scope_type: opt_str(&args, "scope_type"),
                    scope_id: opt_str(&args, "scope_id"),
                    kind: req_str(&args, "kind")?,
                    summary: req_str(&args, "summary")?,
                    body_md: opt_str(&args, "body_md").unwrap_or_default(),
                    requires_user_action: opt_bool(&args, "requires_user_action"),
                },
            )
            .await?;
        to_value(&item)
    }

    async fn resolve_attention_item(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let item = self
            .state
            .service
            .resolve_attention_item(&ctx, req_uuid(&args, "attention_id")?)
            .await?;
        to_value(&item)
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    async fn list_projects(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let projects = self
            .state
            .service
            .list_projects(&ctx, opt_bool(&args, "include_archived"))
            .await?;
        to_value(&projects)
    }

    fn project_metadata_from(
        args: &Value,
        existing: Option<&ProjectMetadata>,
    ) -> Result<ProjectMetadata> {
        let mut metadata = existing.cloned().unwrap_or_default();
        if let Some(owner) = opt_str(args, "owner") {
            metadata.owner = owner;
        }
        if let Some(tags) = opt_str_vec(args, "tags")? {
            metadata.tags = tags;
        }
        if let Some(allow) = args.get("allow_orchestrator_override").and_then(Value::as_bool) {
            metadata.capability_policy.allow_orchestrator_override = allow;
        }
        if let Some(token) = opt_str(args, "orchestrator_override_token") {
            metadata.capability_policy.orchestrator_override_token = token;
        }
        Ok(metadata)
    }

    async fn create_project(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let project = self
            .state
            .service
            .create_project_with_metadata(
                &ctx,
                CreateProjectInput {
                    name: req_str(&args, "name")?,
                    description: opt_str(&args, "description").unwrap_or_default(),
                    kind_id: opt_str(&args, "kind_id"),
                    metadata: Self::project_metadata_from(&args, None)?,
                    allowed_kinds: opt_str_vec(&args, "allowed_kinds")?.unwrap_or_default(),
                },
            )
            .await?;
        to_value(&project)
    }

    async fn update_project(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let project_id = req_uuid(&args, "project_id")?;
        let current = self.state.service.get_project(&ctx, project_id).await?;
        let touch_metadata = args.get("owner").is_some()
            || args.get("tags").is_some()
            || args.get("allow_orchestrator_override").is_some()
            || args.get("orchestrator_override_token").is_some();
        let project = self
            .state
            .service
            .update_project(
                &ctx,
                project_id,
                UpdateProjectInput {
                    name: opt_str(&args, "name"),
                    description: opt_str(&args, "description"),
                    kind_id: opt_str(&args, "kind_id"),
                    metadata: if touch_metadata {
                        Some(Self::project_metadata_from(&args, Some(&current.metadata))?)
                    } else {
                        None
                    },
                },
            )
            .await?;
        to_value(&project)
    }

    // ------------------------------------------------------------------
    // Work graph
    // ------------------------------------------------------------------

    async fn list_tasks(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let tasks = self
            .state
            .service
            .list_tasks(
                &ctx,
                req_uuid(&args, "project_id")?,
                opt_bool(&args, "include_archived"),
            )
            .await?;
        to_value(&tasks)
    }

    async fn create_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let priority = match opt_str(&args, "priority") {
            Some(p) => Priority::parse(&p)?,
            None => Priority::Medium,
        };
        let due_at = match opt_str(&args, "due_at") {
            Some(raw) => Some(parse_due_at(&raw)?),
            None => None,
        };
        let task = self
            .state
            .service
            .create_task(
                &ctx,
                CreateTaskInput {
                    project_id: req_uuid(&args, "project_id")?,
                    parent_id: opt_uuid(&args, "parent_id")?,
                    kind: req_str(&args, "kind")?,
                    scope: req_str(&args, "scope")?,
                    column_id: opt_uuid(&args, "column_id")?,
                    title: req_str(&args, "title")?,
                    description: opt_str(&args, "description").unwrap_or_default(),
                    priority,
                    due_at,
                    labels: opt_str_vec(&args, "labels")?.unwrap_or_default(),
                    metadata: parse_task_metadata(args.get("metadata").cloned())?,
                },
            )
            .await?;
        to_value(&task)
    }

    async fn update_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let priority = match opt_str(&args, "priority") {
            Some(p) => Some(Priority::parse(&p)?),
            None => None,
        };
        // Distinguish "clear the due date" (explicit null) from "untouched".
        let due_at = match args.get("due_at") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(raw)) => Some(Some(parse_due_at(raw)?)),
            Some(_) => {
                return Err(PlannerError::invalid_request(
                    "'due_at' must be an RFC 3339 string or null",
                ))
            }
        };
        let metadata = match args.get("metadata") {
            None | Some(Value::Null) => None,
            Some(v) => Some(parse_task_metadata(Some(v.clone()))?),
        };
        let task = self
            .state
            .service
            .update_task(
                &ctx,
                req_uuid(&args, "task_id")?,
                UpdateTaskInput {
                    title: opt_str(&args, "title"),
                    description: opt_str(&args, "description"),
                    priority,
                    due_at,
                    labels: opt_str_vec(&args, "labels")?,
                    metadata,
                },
            )
            .await?;
        to_value(&task)
    }

    async fn move_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let position = opt_u64(&args, "position")?.map(|p| p as u32);
        let task = self
            .state
            .service
            .move_task(
                &ctx,
                req_uuid(&args, "task_id")?,
                req_uuid(&args, "to_column")?,
                position,
            )
            .await?;
        to_value(&task)
    }

    async fn delete_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let mode = DeleteMode::parse(opt_str(&args, "mode").as_deref())?;
        let task = self
            .state
            .service
            .delete_task(&ctx, req_uuid(&args, "task_id")?, mode)
            .await?;
        to_value(&task)
    }

    async fn restore_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let task = self
            .state
            .service
            .restore_task(&ctx, req_uuid(&args, "task_id")?)
            .await?;
        to_value(&task)
    }

    async fn reparent_task(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let task = self
            .state
            .service
            .reparent_task(
                &ctx,
                req_uuid(&args, "task_id")?,
                opt_uuid(&args, "new_parent_id")?,
            )
            .await?;
        to_value(&task)
    }

    async fn list_child_tasks(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let tasks = self
            .state
            .service
            .list_child_tasks(
                &ctx,
                req_uuid(&args, "project_id")?,
                req_uuid(&args, "parent_id")?,
                opt_bool(&args, "include_archived"),
            )
            .await?;
        to_value(&tasks)
    }

    async fn search_task_matches(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let matches = self
            .state
            .service
            .search_task_matches(
                &ctx,
                TaskSearchFilter {
                    project_id: opt_uuid(&args, "project_id")?,
                    all_projects: opt_bool(&args, "all_projects"),
                    query: opt_str(&args, "query").unwrap_or_default(),
                    include_archived: opt_bool(&args, "include_archived"),
                    states: opt_str_vec(&args, "states")?.unwrap_or_default(),
                },
            )
            .await?;
        to_value(&matches)
    }

    // ------------------------------------------------------------------
    // Change feed / dependencies / kinds
    // ------------------------------------------------------------------

    async fn list_project_change_events(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let events = self
            .state
            .service
            .list_project_change_events(
                &ctx,
                req_uuid(&args, "project_id")?,
                opt_u64(&args, "limit")?.unwrap_or(0) as usize,
            )
            .await?;
        to_value(&events)
    }

    async fn get_project_dependency_rollup(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let rollup = self
            .state
            .service
            .get_project_dependency_rollup(&ctx, req_uuid(&args, "project_id")?)
            .await?;
        to_value(&rollup)
    }

    async fn list_kind_definitions(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let kinds = self
            .state
            .catalog
            .list_kinds(&cancel, opt_bool(&args, "include_archived"))
            .await?;
        to_value(&kinds)
    }

    async fn upsert_kind_definition(&self, args: Value) -> Result<Value> {
        // The catalog is global, so no lease scope can cover it: kind
        // definitions are managed by user actors only.
        let ctx = call_context(&args)?;
        if !ctx.actor.is_user() {
            return Err(PlannerError::invalid_request(
                "kind definitions are managed by user actors",
            ));
        }
        let template: KindTemplate = match args.get("template") {
            None | Some(Value::Null) => KindTemplate::default(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| PlannerError::invalid_request(format!("invalid kind template: {e}")))?,
        };
        let kind = self
            .state
            .catalog
            .upsert_kind(
                &ctx.cancel,
                &req_str(&args, "id")?,
                &opt_str(&args, "display_name").unwrap_or_default(),
                &opt_str(&args, "description_md").unwrap_or_default(),
                &opt_str_vec(&args, "applies_to")?.unwrap_or_default(),
                &opt_str_vec(&args, "allowed_parent_scopes")?.unwrap_or_default(),
                args.get("payload_schema")
                    .filter(|v| !v.is_null())
                    .cloned(),
                template,
            )
            .await?;
        to_value(&kind)
    }

    async fn set_project_allowed_kinds(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let kinds = self
            .state
            .service
            .set_project_allowed_kinds(
                &ctx,
                req_uuid(&args, "project_id")?,
                &opt_str_vec(&args, "kind_ids")?.unwrap_or_default(),
            )
            .await?;
        to_value(&kinds)
    }

    async fn list_project_allowed_kinds(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let kinds = self
            .state
            .service
            .list_project_allowed_kinds(&ctx, req_uuid(&args, "project_id")?)
            .await?;
        to_value(&kinds)
    }

    // ------------------------------------------------------------------
    // Leases
    // ------------------------------------------------------------------

    async fn issue_capability_lease(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let project_id = req_uuid(&args, "project_id")?;
        let (scope_type, scope_id) = scopes::normalize_scope(
            project_id,
            opt_str(&args, "scope_type").as_deref(),
            opt_str(&args, "scope_id").as_deref(),
        )?;
        let lease = self
            .state
            .leases
            .issue(
                &cancel,
                IssueLeaseRequest {
                    project_id,
                    scope_type,
                    scope_id,
                    role: LeaseRole::parse(&req_str(&args, "role")?)?,
                    agent_name: req_str(&args, "agent_name")?,
                    instance_id: opt_str(&args, "agent_instance_id"),
                    parent_instance_id: opt_str(&args, "parent_instance_id"),
                    allow_equal_scope_delegation: opt_bool(&args, "allow_equal_scope_delegation"),
                    ttl_secs: opt_i64(&args, "ttl_secs")?,
                    override_token: opt_str(&args, "override_token"),
                },
            )
            .await?;
        to_value(&lease)
    }

    async fn heartbeat_capability_lease(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let lease = self
            .state
            .leases
            .heartbeat(
                &cancel,
                &req_str(&args, "agent_instance_id")?,
                &req_str(&args, "lease_token")?,
            )
            .await?;
        to_value(&lease)
    }

    async fn renew_capability_lease(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let lease = self
            .state
            .leases
            .renew(
                &cancel,
                &req_str(&args, "agent_instance_id")?,
                &req_str(&args, "lease_token")?,
                opt_i64(&args, "ttl_secs")?,
            )
            .await?;
        to_value(&lease)
    }

    async fn revoke_capability_lease(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let lease = self
            .state
            .leases
            .revoke(
                &cancel,
                &req_str(&args, "agent_instance_id")?,
                opt_str(&args, "reason").as_deref(),
            )
            .await?;
        to_value(&lease)
    }

    async fn revoke_all_capability_leases(&self, args: Value) -> Result<Value> {
        let cancel = CancellationToken::new();
        let project_id = req_uuid(&args, "project_id")?;
        let (scope_type, scope_id) = scopes::normalize_scope(
            project_id,
            opt_str(&args, "scope_type").as_deref(),
            opt_str(&args, "scope_id").as_deref(),
        )?;
        let revoked = self
            .state
            .leases
            .revoke_all(
                &cancel,
                project_id,
                scope_type,
                &scope_id,
                opt_str(&args, "reason").as_deref(),
            )
            .await?;
        Ok(json!({ "revoked": revoked }))
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    async fn create_comment(&self, args: Value) -> Result<Value> {
        let ctx = call_context(&args)?;
        let comment = self
            .state
            .service
            .create_comment(
                &ctx,
                req_uuid(&args, "project_id")?,
                &req_str(&args, "target_type")?,
                &req_str(&args, "target_id")?,
                &req_str(&args, "body_md")?,
            )
            .await?;
        to_value(&comment)
    }

    async fn list_comments_by_target(&self, args: Value) -> Result<Value> {
        let ctx = CallContext::user("user");
        let comments = self
            .state
            .service
            .list_comments_by_target(
                &ctx,
                req_uuid(&args, "project_id")?,
                &req_str(&args, "target_type")?,
                &req_str(&args, "target_id")?,
            )
            .await?;
        to_value(&comments)
    }
}
