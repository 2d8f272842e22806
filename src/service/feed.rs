//! Change feed and dependency rollup.

use crate::domain::ChangeEvent;
use crate::error::Result;
use crate::guard::CallContext;
use crate::service::WorkGraphService;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Aggregate dependency counts for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRollup {
    pub total_items: usize,
    pub items_with_dependencies: usize,
    pub dependency_edges: usize,
    pub blocked_items: usize,
    pub blocked_by_edges: usize,
    /// Edges whose target is not in a terminal state.
    pub unresolved_dependency_edges: usize,
}

impl WorkGraphService {
    /// Most recent change events first; `limit` 0 = all.
    pub async fn list_project_change_events(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>> {
        self.repo.get_project(&ctx.cancel, project_id).await?;
        self.repo
            .list_change_events(&ctx.cancel, project_id, limit)
            .await
    }

    pub async fn get_project_dependency_rollup(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
    ) -> Result<DependencyRollup> {
        self.repo.get_project(&ctx.cancel, project_id).await?;
        let tasks = self.repo.list_tasks(&ctx.cancel, project_id, true).await?;
        let by_id: HashMap<Uuid, &crate::domain::Task> =
            tasks.iter().map(|t| (t.id, t)).collect();

        let mut rollup = DependencyRollup {
            total_items: tasks.len(),
            ..DependencyRollup::default()
        };
        for task in &tasks {
            let deps = &task.metadata.depends_on;
            if !deps.is_empty() {
                rollup.items_with_dependencies += 1;
                rollup.dependency_edges += deps.len();
                rollup.unresolved_dependency_edges += deps
                    .iter()
                    .filter(|dep| {
                        by_id
                            .get(dep)
                            .map_or(true, |t| !t.lifecycle.is_terminal())
                    })
                    .count();
            }
            if task.metadata.has_open_blockers() {
                rollup.blocked_items += 1;
            }
            rollup.blocked_by_edges += task.metadata.blocked_by.len();
        }
        Ok(rollup)
    }
}
