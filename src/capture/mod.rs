//! Capture-state synthesizer: a deterministic, summary-first bundle that
//! lets an agent recover context after a session break.

pub mod guide;
pub mod hash;

pub use guide::BootstrapGuide;

use crate::domain::{AttentionItem, Column, Lifecycle, ScopeType, Task};
use crate::error::{PlannerError, Result};
use crate::scopes::{self, ScopeEntity};
use crate::store::Repository;
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureView {
    Summary,
    Full,
}

impl CaptureView {
    pub fn parse(s: Option<&str>) -> Result<Self> {
        match s.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(Self::Summary),
            Some(s) => match s.to_ascii_lowercase().as_str() {
                "summary" => Ok(Self::Summary),
                "full" => Ok(Self::Full),
                other => Err(PlannerError::invalid_request(format!(
                    "unknown capture view '{other}'"
                ))),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopePathEntry {
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalOverview {
    pub project_id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionOverview {
    pub available: bool,
    pub open_count: usize,
    pub requires_user_action_count: usize,
    /// Open items for the scope, sorted by (created_at, id).
    pub items: Vec<AttentionItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkOverview {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub archived: usize,
    pub with_open_blockers: usize,
    pub with_incomplete_completion_criteria: usize,
}

/// The capture bundle. `tasks` and `columns` are populated for the full
/// view only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureBundle {
    pub captured_at: DateTime<Utc>,
    pub view: CaptureView,
    pub scope_path: Vec<ScopePathEntry>,
    pub state_hash: String,
    pub goal_overview: GoalOverview,
    pub attention_overview: AttentionOverview,
    pub work_overview: WorkOverview,
    pub warnings_overview: Vec<String>,
    /// Always non-empty.
    pub resume_hints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<Column>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

pub struct CaptureSynthesizer {
    repo: Arc<dyn Repository>,
    attention_enabled: bool,
}

impl CaptureSynthesizer {
    pub fn new(repo: Arc<dyn Repository>, attention_enabled: bool) -> Self {
        Self {
            repo,
            attention_enabled,
        }
    }

    /// Fail with onboarding guidance when the instance holds no projects.
    pub async fn ensure_bootstrapped(&self, cancel: &CancellationToken) -> Result<()> {
        let projects = self.repo.list_projects(cancel, true).await?;
        if projects.is_empty() {
            let guide = BootstrapGuide::new();
            return Err(PlannerError::BootstrapRequired(guide.summary));
        }
        Ok(())
    }

    /// Synthesize the bundle for a scope tuple.
    pub async fn capture_state(
        &self,
        cancel: &CancellationToken,
        project_id: &str,
        scope_type: Option<&str>,
        scope_id: Option<&str>,
        view: CaptureView,
    ) -> Result<CaptureBundle> {
        let op = "capture state";
        self.ensure_bootstrapped(cancel).await.map_err(|e| e.op(op))?;

        let project_id = Uuid::parse_str(project_id.trim()).map_err(|_| {
            PlannerError::invalid_request(format!("'{project_id}' is not a project id")).op(op)
        })?;
        let (scope_type, scope_id) =
            scopes::normalize_scope(project_id, scope_type, scope_id).map_err(|e| e.op(op))?;

        let project = self.repo.get_project(cancel, project_id).await.map_err(|e| e.op(op))?;
        let entity = scopes::resolve_scope(
            self.repo.as_ref(),
            cancel,
            project_id,
            scope_type,
            &scope_id,
        )
        .await
        .map_err(|e| e.op(op))?;

        let scope_path = scopes::scope_path(self.repo.as_ref(), cancel, &project, &entity)
            .await?
            .into_iter()
            .map(|(scope_type, scope_id, name)| ScopePathEntry {
                scope_type,
                scope_id,
                name,
            })
            .collect();

        let columns = self.repo.list_columns(cancel, project_id, true).await?;
        let tasks = self.repo.list_tasks(cancel, project_id, true).await?;
        let attention = if self.attention_enabled {
            self.repo.list_attention_items(cancel, project_id).await?
        } else {
            Vec::new()
        };

        let open: Vec<&AttentionItem> = attention.iter().filter(|a| a.is_unresolved()).collect();
        let open_count = open.len();
        let requires_user_action_count =
            open.iter().filter(|a| a.requires_user_action).count();

        let state_hash = hash::state_hash(
            &project,
            &columns,
            &tasks,
            open_count,
            requires_user_action_count,
        )?;

        // Open items for the requested scope; repository order is already
        // (created_at, id).
        let scope_items: Vec<AttentionItem> = attention
            .iter()
            .filter(|a| a.is_unresolved() && a.scope_type == scope_type && a.scope_id == scope_id)
            .cloned()
            .collect();

        let mut work = WorkOverview {
            total: tasks.len(),
            ..WorkOverview::default()
        };
        for task in &tasks {
            if task.is_archived() {
                work.archived += 1;
                continue;
            }
            match task.lifecycle {
                Lifecycle::Todo => work.todo += 1,
                Lifecycle::Progress => work.in_progress += 1,
                Lifecycle::Done => work.done += 1,
                Lifecycle::Archived => work.archived += 1,
            }
            if task.metadata.has_open_blockers() {
                work.with_open_blockers += 1;
            }
            if !task.metadata.contract.completion_criteria_met() {
                work.with_incomplete_completion_criteria += 1;
            }
        }

        let mut warnings: Vec<String> = Vec::new();
        if work.with_open_blockers > 0 {
            warnings.push(format!(
                "{} tasks report open blockers",
                work.with_open_blockers
            ));
        }
        if requires_user_action_count > 0 {
            warnings.push(format!(
                "{requires_user_action_count} attention items require user action"
            ));
        }
        if work.with_incomplete_completion_criteria > 0 {
            warnings.push(format!(
                "{} tasks have incomplete completion criteria",
                work.with_incomplete_completion_criteria
            ));
        }

        let mut resume_hints: Vec<String> = Vec::new();
        if open_count > 0 {
            resume_hints.push("list_attention_items".to_string());
        }
        resume_hints.push("list_project_change_events".to_string());
        if matches!(entity, ScopeEntity::Task(_)) {
            resume_hints.push("list_child_tasks".to_string());
        }
        if resume_hints.is_empty() {
            resume_hints.push("capture_state".to_string());
        }

        let full = view == CaptureView::Full;
        Ok(CaptureBundle {
            captured_at: Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now),
            view,
            scope_path,
            state_hash,
            goal_overview: GoalOverview {
                project_id: project.id,
                name: project.name.clone(),
                description: project.description.clone(),
            },
            attention_overview: AttentionOverview {
                available: self.attention_enabled,
                open_count,
                requires_user_action_count,
                items: scope_items,
            },
            work_overview: work,
            warnings_overview: warnings,
            resume_hints,
            columns: full.then_some(columns),
            tasks: full.then_some(tasks),
        })
    }
}
