//! Tool definitions exposed by the JSON-RPC surface.

use super::protocol::{InputSchema, ToolDefinition};
use super::TOOL_NAMESPACE;
use serde_json::{json, Value};

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: format!("{TOOL_NAMESPACE}.{name}"),
        description: description.to_string(),
        input_schema: InputSchema {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required.iter().map(|s| s.to_string()).collect())
            },
        },
    }
}

fn actor_property() -> Value {
    json!({
        "type": "object",
        "description": "Actor tuple: actor_type (user|agent), actor_id, agent_name, agent_instance_id, lease_token, override_token"
    })
}

/// Generate all tool definitions.
pub fn all_tools() -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    tools.extend(bootstrap_tools());
    tools.extend(project_tools());
    tools.extend(task_tools());
    tools.extend(catalog_tools());
    tools.extend(lease_tools());
    tools.extend(comment_tools());
    tools
}

// ============================================================================
// Bootstrap / capture / attention (5)
// ============================================================================

fn bootstrap_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "get_bootstrap_guide",
            "Get onboarding guidance for an empty planner instance",
            json!({}),
            &[],
        ),
        tool(
            "capture_state",
            "Capture a deterministic summary-first state bundle for a scope",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "scope_type": {"type": "string", "description": "project|branch|phase|subphase|task|subtask (default project)"},
                "scope_id": {"type": "string", "description": "Scope entity id (defaults to the project id at project scope)"},
                "view": {"type": "string", "description": "summary or full (default summary)"}
            }),
            &["project_id"],
        ),
        tool(
            "list_attention_items",
            "List attention items at a scope, optionally filtered by state",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "scope_type": {"type": "string", "description": "Scope type filter"},
                "scope_id": {"type": "string", "description": "Scope id filter"},
                "state": {"type": "string", "description": "open|acknowledged|resolved"}
            }),
            &["project_id"],
        ),
        tool(
            "raise_attention_item",
            "Raise a blocker/risk/approval record at a scope",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "scope_type": {"type": "string", "description": "Scope type (default project)"},
                "scope_id": {"type": "string", "description": "Scope entity id"},
                "kind": {"type": "string", "description": "e.g. blocker, risk_note, approval_required"},
                "summary": {"type": "string", "description": "One-line summary"},
                "body_md": {"type": "string", "description": "Markdown body"},
                "requires_user_action": {"type": "boolean", "description": "Blocks completion until resolved"},
                "actor": actor_property()
            }),
            &["project_id", "kind", "summary"],
        ),
        tool(
            "resolve_attention_item",
            "Resolve an attention item (idempotent)",
            json!({
                "attention_id": {"type": "string", "description": "Attention item UUID"},
                "actor": actor_property()
            }),
            &["attention_id"],
        ),
    ]
}

// ============================================================================
// Projects (3)
// ============================================================================

fn project_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "list_projects",
            "List projects",
            json!({
                "include_archived": {"type": "boolean", "description": "Include archived projects"}
            }),
            &[],
        ),
        tool(
            "create_project",
            "Create a project with default columns and an initialized kind allow-list",
            json!({
                "name": {"type": "string", "description": "Project name"},
                "description": {"type": "string", "description": "Project description"},
                "kind_id": {"type": "string", "description": "Kind classifying the project (default 'project')"},
                "owner": {"type": "string", "description": "Owner recorded in metadata"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "allow_orchestrator_override": {"type": "boolean"},
                "orchestrator_override_token": {"type": "string"},
                "allowed_kinds": {"type": "array", "items": {"type": "string"}, "description": "Explicit allow-list (default: all catalog kinds)"},
                "actor": actor_property()
            }),
            &["name"],
        ),
        tool(
            "update_project",
            "Update a project's name, description, kind, or metadata",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "name": {"type": "string"},
                "description": {"type": "string"},
                "kind_id": {"type": "string"},
                "owner": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}},
                "allow_orchestrator_override": {"type": "boolean"},
                "orchestrator_override_token": {"type": "string"},
                "actor": actor_property()
            }),
            &["project_id"],
        ),
    ]
}

// ============================================================================
// Work graph (9)
// ============================================================================

fn task_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "list_tasks",
            "List a project's tasks",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "include_archived": {"type": "boolean"}
            }),
            &["project_id"],
        ),
        tool(
            "create_task",
            "Create a work item; the kind template expands immediately",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "parent_id": {"type": "string", "description": "Parent work-item UUID"},
                "kind": {"type": "string", "description": "Catalog kind id"},
                "scope": {"type": "string", "description": "branch|phase|subphase|task|subtask"},
                "column_id": {"type": "string", "description": "Target column (default: first column)"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "priority": {"type": "string", "description": "low|medium|high"},
                "due_at": {"type": "string", "description": "RFC 3339 timestamp"},
                "labels": {"type": "array", "items": {"type": "string"}},
                "metadata": {"type": "object", "description": "kind_payload, contract, depends_on, blocked_by, blocked_reason"},
                "actor": actor_property()
            }),
            &["project_id", "kind", "scope", "title"],
        ),
        tool(
            "update_task",
            "Partially update a task's details",
            json!({
                "task_id": {"type": "string", "description": "Task UUID"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "priority": {"type": "string", "description": "low|medium|high"},
                "due_at": {"type": "string", "description": "RFC 3339 timestamp, or null to clear"},
                "labels": {"type": "array", "items": {"type": "string"}},
                "metadata": {"type": "object"},
                "actor": actor_property()
            }),
            &["task_id"],
        ),
        tool(
            "move_task",
            "Move a task into a column, honoring the completion contract",
            json!({
                "task_id": {"type": "string", "description": "Task UUID"},
                "to_column": {"type": "string", "description": "Target column UUID"},
                "position": {"type": "integer", "description": "Position in the column (default: end)"},
                "actor": actor_property()
            }),
            &["task_id", "to_column"],
        ),
        tool(
            "delete_task",
            "Archive (default) or hard-delete a task",
            json!({
                "task_id": {"type": "string", "description": "Task UUID"},
                "mode": {"type": "string", "description": "archive|hard (default archive)"},
                "actor": actor_property()
            }),
            &["task_id"],
        ),
        tool(
            "restore_task",
            "Clear a task's archive flag without touching its lifecycle",
            json!({
                "task_id": {"type": "string", "description": "Task UUID"},
                "actor": actor_property()
            }),
            &["task_id"],
        ),
        tool(
            "reparent_task",
            "Move a task under a new parent, re-checking kind constraints",
            json!({
                "task_id": {"type": "string", "description": "Task UUID"},
                "new_parent_id": {"type": "string", "description": "New parent UUID; omit to detach"},
                "actor": actor_property()
            }),
            &["task_id"],
        ),
        tool(
            "list_child_tasks",
            "List direct children of a work item",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "parent_id": {"type": "string", "description": "Parent work-item UUID"},
                "include_archived": {"type": "boolean"}
            }),
            &["project_id", "parent_id"],
        ),
        tool(
            "search_task_matches",
            "Case-insensitive substring search over titles, descriptions, and labels",
            json!({
                "project_id": {"type": "string", "description": "Project UUID (omit with all_projects)"},
                "all_projects": {"type": "boolean", "description": "Search across every project"},
                "query": {"type": "string", "description": "Substring to match"},
                "include_archived": {"type": "boolean"},
                "states": {"type": "array", "items": {"type": "string"}, "description": "todo|progress|done|archived"}
            }),
            &[],
        ),
    ]
}

// ============================================================================
// Change feed / dependencies / kinds (6)
// ============================================================================

fn catalog_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "list_project_change_events",
            "List a project's change feed, most recent first",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "limit": {"type": "integer", "description": "Max events (0 = all)"}
            }),
            &["project_id"],
        ),
        tool(
            "get_project_dependency_rollup",
            "Aggregate dependency and blocker counts for a project",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"}
            }),
            &["project_id"],
        ),
        tool(
            "list_kind_definitions",
            "List the kind catalog",
            json!({
                "include_archived": {"type": "boolean"}
            }),
            &[],
        ),
        tool(
            "upsert_kind_definition",
            "Create or update a kind definition",
            json!({
                "id": {"type": "string", "description": "Lowercase kind id"},
                "display_name": {"type": "string"},
                "description_md": {"type": "string"},
                "applies_to": {"type": "array", "items": {"type": "string"}},
                "allowed_parent_scopes": {"type": "array", "items": {"type": "string"}},
                "payload_schema": {"type": "object", "description": "JSON-Schema subset for kind payloads"},
                "template": {"type": "object", "description": "completion_checklist and auto_create_children"},
                "actor": actor_property()
            }),
            &["id"],
        ),
        tool(
            "set_project_allowed_kinds",
            "Replace a project's kind allow-list",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "kind_ids": {"type": "array", "items": {"type": "string"}},
                "actor": actor_property()
            }),
            &["project_id", "kind_ids"],
        ),
        tool(
            "list_project_allowed_kinds",
            "Resolve the kinds a project may use",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"}
            }),
            &["project_id"],
        ),
    ]
}

// ============================================================================
// Leases (5)
// ============================================================================

fn lease_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "issue_capability_lease",
            "Issue a capability lease binding an agent instance to a scope",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "scope_type": {"type": "string", "description": "project|branch|phase|subphase|task|subtask"},
                "scope_id": {"type": "string", "description": "Scope entity id (defaults to project id at project scope)"},
                "role": {"type": "string", "description": "worker|orchestrator"},
                "agent_name": {"type": "string"},
                "agent_instance_id": {"type": "string", "description": "Caller-chosen instance id (generated if absent)"},
                "parent_instance_id": {"type": "string", "description": "Delegating lease instance"},
                "allow_equal_scope_delegation": {"type": "boolean"},
                "ttl_secs": {"type": "integer", "description": "Requested TTL (default 24h)"},
                "override_token": {"type": "string", "description": "Orchestrator takeover token"}
            }),
            &["project_id", "role", "agent_name"],
        ),
        tool(
            "heartbeat_capability_lease",
            "Record liveness without extending the lease",
            json!({
                "agent_instance_id": {"type": "string"},
                "lease_token": {"type": "string"}
            }),
            &["agent_instance_id", "lease_token"],
        ),
        tool(
            "renew_capability_lease",
            "Extend a lease; an expired (not revoked) lease may be revived",
            json!({
                "agent_instance_id": {"type": "string"},
                "lease_token": {"type": "string"},
                "ttl_secs": {"type": "integer", "description": "New TTL (default 24h)"}
            }),
            &["agent_instance_id", "lease_token"],
        ),
        tool(
            "revoke_capability_lease",
            "Revoke one lease",
            json!({
                "agent_instance_id": {"type": "string"},
                "reason": {"type": "string"}
            }),
            &["agent_instance_id"],
        ),
        tool(
            "revoke_all_capability_leases",
            "Atomically revoke every active lease in a scope",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "scope_type": {"type": "string"},
                "scope_id": {"type": "string"},
                "reason": {"type": "string"}
            }),
            &["project_id"],
        ),
    ]
}

// ============================================================================
// Comments (2)
// ============================================================================

fn comment_tools() -> Vec<ToolDefinition> {
    vec![
        tool(
            "create_comment",
            "Attach a markdown comment to a project, task, or attention item",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "target_type": {"type": "string", "description": "project|task|attention"},
                "target_id": {"type": "string"},
                "body_md": {"type": "string"},
                "actor": actor_property()
            }),
            &["project_id", "target_type", "target_id", "body_md"],
        ),
        tool(
            "list_comments_by_target",
            "List comments on one target, oldest first",
            json!({
                "project_id": {"type": "string", "description": "Project UUID"},
                "target_type": {"type": "string", "description": "project|task|attention"},
                "target_id": {"type": "string"}
            }),
            &["project_id", "target_type", "target_id"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_catalog_is_complete_and_namespaced() {
        let tools = all_tools();
        assert_eq!(tools.len(), 30);
        for t in &tools {
            assert!(t.name.starts_with("workgraph."), "unnamespaced: {}", t.name);
        }
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        for required in [
            "workgraph.capture_state",
            "workgraph.get_bootstrap_guide",
            "workgraph.create_task",
            "workgraph.move_task",
            "workgraph.restore_task",
            "workgraph.issue_capability_lease",
            "workgraph.renew_capability_lease",
            "workgraph.list_comments_by_target",
        ] {
            assert!(names.contains(&required), "missing {required}");
        }
    }
}
