//! Case-insensitive substring search over tasks.

use crate::domain::Task;
use crate::error::Result;
use crate::guard::CallContext;
use crate::service::WorkGraphService;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TaskSearchFilter {
    /// Required unless `all_projects` is set.
    pub project_id: Option<Uuid>,
    pub all_projects: bool,
    pub query: String,
    pub include_archived: bool,
    /// Normalized state ids (`todo|progress|done|archived`); empty = all.
    pub states: Vec<String>,
}

/// One search hit with its normalized state id: column-name-derived for
/// active items, `archived` for archived ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSearchMatch {
    pub project_id: Uuid,
    pub state_id: String,
    pub task: Task,
}

fn matches_query(task: &Task, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
        || task.labels.iter().any(|l| l.contains(needle))
}

impl WorkGraphService {
    /// Substring search over title, description, and labels, with a
    /// deterministic (project, state, column, position, id) ordering.
    pub async fn search_task_matches(
        &self,
        ctx: &CallContext,
        filter: TaskSearchFilter,
    ) -> Result<Vec<TaskSearchMatch>> {
        let projects = if filter.all_projects {
            self.repo.list_projects(&ctx.cancel, filter.include_archived).await?
        } else {
            let project_id = filter.project_id.ok_or_else(|| {
                crate::error::PlannerError::invalid_request(
                    "search requires a project id or the cross-project flag",
                )
            })?;
            vec![self.repo.get_project(&ctx.cancel, project_id).await?]
        };

        let needle = filter.query.trim().to_lowercase();
        let mut states: Vec<String> = Vec::new();
        for state in &filter.states {
            let state = state.trim();
            if state.is_empty() {
                continue;
            }
            states.push(
                crate::domain::Lifecycle::parse(state)
                    .map_err(|e| e.op("search tasks"))?
                    .as_str()
                    .to_string(),
            );
        }

        let mut out: Vec<TaskSearchMatch> = Vec::new();
        for project in &projects {
            let columns = self.repo.list_columns(&ctx.cancel, project.id, true).await?;
            let column_states: HashMap<Uuid, &'static str> =
                columns.iter().map(|c| (c.id, c.state_id())).collect();
            let tasks = self
                .repo
                .list_tasks(&ctx.cancel, project.id, filter.include_archived)
                .await?;
            for task in tasks {
                if !matches_query(&task, &needle) {
                    continue;
                }
                let state_id = if task.is_archived() {
                    "archived".to_string()
                } else {
                    column_states
                        .get(&task.column_id)
                        .copied()
                        .unwrap_or("todo")
                        .to_string()
                };
                if !states.is_empty() && !states.contains(&state_id) {
                    continue;
                }
                out.push(TaskSearchMatch {
                    project_id: project.id,
                    state_id,
                    task,
                });
            }
        }

        out.sort_by(|a, b| {
            (
                a.project_id,
                a.state_id.as_str(),
                a.task.column_id,
                a.task.position,
                a.task.id,
            )
                .cmp(&(
                    b.project_id,
                    b.state_id.as_str(),
                    b.task.column_id,
                    b.task.position,
                    b.task.id,
                ))
        });
        Ok(out)
    }
}
