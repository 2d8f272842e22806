//! Work items ("tasks" throughout, covering the full hierarchy).

use crate::domain::actor::{Actor, ActorType};
use crate::domain::lifecycle::Lifecycle;
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Task priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(PlannerError::invalid_request(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

/// One checklist entry of a completion contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractPolicy {
    #[serde(default)]
    pub require_children_done: bool,
}

/// Governs when an item may transition to progress or done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionContract {
    #[serde(default)]
    pub start_criteria: Vec<ChecklistItem>,
    #[serde(default)]
    pub completion_criteria: Vec<ChecklistItem>,
    /// Merged from the kind template on create.
    #[serde(default)]
    pub completion_checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub policy: ContractPolicy,
}

impl CompletionContract {
    pub fn start_criteria_met(&self) -> bool {
        self.start_criteria.iter().all(|c| c.done)
    }

    pub fn completion_criteria_met(&self) -> bool {
        self.completion_criteria.iter().all(|c| c.done)
    }

    pub fn completion_checklist_met(&self) -> bool {
        self.completion_checklist.iter().all(|c| c.done)
    }
}

/// Typed metadata record carried by every work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Kind-specific payload validated against the kind's schema.
    #[serde(default)]
    pub kind_payload: Value,
    #[serde(default)]
    pub contract: CompletionContract,
    #[serde(default)]
    pub depends_on: Vec<Uuid>,
    #[serde(default)]
    pub blocked_by: Vec<Uuid>,
    #[serde(default)]
    pub blocked_reason: String,
}

impl TaskMetadata {
    pub fn has_open_blockers(&self) -> bool {
        !self.blocked_by.is_empty() || !self.blocked_reason.trim().is_empty()
    }
}

/// A node of the hierarchical work graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Must resolve to a work item in the same project.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub kind: String,
    /// A scope-type value describing what this item applies to.
    pub scope: String,
    pub column_id: Uuid,
    pub position: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    /// Lowercased, deduplicated.
    #[serde(default)]
    pub labels: Vec<String>,
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub metadata: TaskMetadata,
    pub created_by_actor: String,
    pub updated_by_actor: String,
    pub updated_by_type: ActorType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Trim, lowercase, and deduplicate a label list preserving first occurrence.
pub fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let l = label.trim().to_lowercase();
        if !l.is_empty() && !out.contains(&l) {
            out.push(l);
        }
    }
    out
}

/// Fields for constructing a new task; placement is decided by the service.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub project_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub kind: &'a str,
    pub scope: &'a str,
    pub column_id: Uuid,
    pub position: u32,
    pub title: &'a str,
    pub description: &'a str,
    pub priority: Priority,
    pub due_at: Option<DateTime<Utc>>,
    pub labels: &'a [String],
    pub lifecycle: Lifecycle,
    pub metadata: TaskMetadata,
}

impl Task {
    pub fn new(spec: NewTask<'_>, actor: &Actor) -> Result<Self> {
        let title = spec.title.trim();
        if title.is_empty() {
            return Err(PlannerError::invalid_request("task title is required"));
        }
        let kind = spec.kind.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err(PlannerError::invalid_request("task kind is required"));
        }
        let scope = spec.scope.trim().to_ascii_lowercase();
        if scope.is_empty() {
            return Err(PlannerError::invalid_request("task scope is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id: spec.project_id,
            parent_id: spec.parent_id,
            kind,
            scope,
            column_id: spec.column_id,
            position: spec.position,
            title: title.to_string(),
            description: spec.description.trim().to_string(),
            priority: spec.priority,
            due_at: spec.due_at,
            labels: normalize_labels(spec.labels),
            lifecycle: spec.lifecycle,
            metadata: spec.metadata,
            created_by_actor: actor.id.clone(),
            updated_by_actor: actor.id.clone(),
            updated_by_type: actor.actor_type,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            archived_at: None,
            canceled_at: None,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    fn touch(&mut self, actor: &Actor) {
        self.updated_by_actor = actor.id.clone();
        self.updated_by_type = actor.actor_type;
        self.updated_at = Utc::now();
    }

    /// Partial detail update; fields not mentioned are preserved.
    #[allow(clippy::too_many_arguments)]
    pub fn with_details(
        mut self,
        title: Option<&str>,
        description: Option<&str>,
        priority: Option<Priority>,
        due_at: Option<Option<DateTime<Utc>>>,
        labels: Option<&[String]>,
        metadata: Option<TaskMetadata>,
        actor: &Actor,
    ) -> Result<Self> {
        if let Some(title) = title {
            let title = title.trim();
            if title.is_empty() {
                return Err(PlannerError::invalid_request("task title is required"));
            }
            self.title = title.to_string();
        }
        if let Some(description) = description {
            self.description = description.trim().to_string();
        }
        if let Some(priority) = priority {
            self.priority = priority;
        }
        if let Some(due_at) = due_at {
            self.due_at = due_at;
        }
        if let Some(labels) = labels {
            self.labels = normalize_labels(labels);
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
        self.touch(actor);
        Ok(self)
    }

    /// Place the item in a column and take on the column's lifecycle.
    /// Timestamp effects: done sets `completed_at`; progress sets
    /// `started_at` if unset.
    pub fn moved_to(
        mut self,
        column_id: Uuid,
        position: u32,
        lifecycle: Lifecycle,
        actor: &Actor,
    ) -> Self {
        self.column_id = column_id;
        self.position = position;
        self.lifecycle = lifecycle;
        let now = Utc::now();
        match lifecycle {
            Lifecycle::Done => self.completed_at = Some(now),
            Lifecycle::Progress => {
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                }
            }
            _ => {}
        }
        self.touch(actor);
        self
    }

    pub fn reparented(mut self, new_parent: Option<Uuid>, actor: &Actor) -> Self {
        self.parent_id = new_parent;
        self.touch(actor);
        self
    }

    /// Archive keeps the lifecycle state so restore can return to it.
    pub fn archived(mut self, actor: &Actor) -> Self {
        self.archived_at = Some(Utc::now());
        self.touch(actor);
        self
    }

    pub fn restored(mut self, actor: &Actor) -> Self {
        self.archived_at = None;
        self.touch(actor);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task() -> Task {
        Task::new(
            NewTask {
                project_id: Uuid::new_v4(),
                parent_id: None,
                kind: "Task",
                scope: "task",
                column_id: Uuid::new_v4(),
                position: 0,
                title: "  Ship it  ",
                description: " details ",
                priority: Priority::Medium,
                due_at: None,
                labels: &["Backend".to_string(), " backend ".to_string(), "API".to_string()],
                lifecycle: Lifecycle::Todo,
                metadata: TaskMetadata::default(),
            },
            &Actor::user("maria"),
        )
        .unwrap()
    }

    #[test]
    fn test_new_normalizes() {
        let t = new_task();
        assert_eq!(t.title, "Ship it");
        assert_eq!(t.description, "details");
        assert_eq!(t.kind, "task");
        assert_eq!(t.labels, vec!["backend", "api"]);
        assert_eq!(t.updated_by_type, ActorType::User);
    }

    #[test]
    fn test_empty_title_rejected() {
        let err = new_task()
            .with_details(Some("  "), None, None, None, None, None, &Actor::user("m"))
            .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_normalize_labels_dedups() {
        let labels = vec![
            " Rust ".to_string(),
            "rust".to_string(),
            "".to_string(),
            "API".to_string(),
        ];
        assert_eq!(normalize_labels(&labels), vec!["rust", "api"]);
    }

    #[test]
    fn test_move_to_done_sets_completed_at() {
        let t = new_task();
        let col = Uuid::new_v4();
        let t = t.moved_to(col, 3, Lifecycle::Done, &Actor::agent("w-1"));
        assert_eq!(t.lifecycle, Lifecycle::Done);
        assert_eq!(t.column_id, col);
        assert_eq!(t.position, 3);
        assert!(t.completed_at.is_some());
        assert_eq!(t.updated_by_actor, "w-1");
        assert_eq!(t.updated_by_type, ActorType::Agent);
    }

    #[test]
    fn test_move_to_progress_sets_started_at_once() {
        let t = new_task();
        let col = Uuid::new_v4();
        let t = t.moved_to(col, 0, Lifecycle::Progress, &Actor::user("m"));
        let first = t.started_at.unwrap();
        let t = t.moved_to(col, 1, Lifecycle::Progress, &Actor::user("m"));
        assert_eq!(t.started_at.unwrap(), first);
    }

    #[test]
    fn test_archive_restore_preserves_lifecycle() {
        let t = new_task();
        let col = t.column_id;
        let t = t.moved_to(col, 0, Lifecycle::Progress, &Actor::user("m"));
        let t = t.archived(&Actor::user("m"));
        assert!(t.is_archived());
        assert_eq!(t.lifecycle, Lifecycle::Progress);
        let t = t.restored(&Actor::user("m"));
        assert!(!t.is_archived());
        assert_eq!(t.lifecycle, Lifecycle::Progress);
    }

    #[test]
    fn test_contract_checks() {
        let mut contract = CompletionContract::default();
        assert!(contract.completion_criteria_met());
        contract.completion_criteria.push(ChecklistItem {
            id: "c1".into(),
            text: "tests pass".into(),
            done: false,
        });
        assert!(!contract.completion_criteria_met());
        contract.completion_criteria[0].done = true;
        assert!(contract.completion_criteria_met());
    }

    #[test]
    fn test_metadata_blockers() {
        let mut meta = TaskMetadata::default();
        assert!(!meta.has_open_blockers());
        meta.blocked_reason = "waiting on design".into();
        assert!(meta.has_open_blockers());
    }
}
