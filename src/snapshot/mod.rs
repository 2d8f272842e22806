//! Self-describing snapshot documents for export and import.
//!
//! Importers validate referential integrity, reject duplicate ids, default
//! an empty kind/scope, and upsert by id.

use crate::domain::{Column, Project, Task};
use crate::error::{PlannerError, Result};
use crate::store::Repository;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const SNAPSHOT_VERSION: &str = "v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDoc {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub projects: Vec<Project>,
    pub columns: Vec<Column>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub projects: usize,
    pub columns: usize,
    pub tasks: usize,
}

/// Export every project with its columns and tasks, archived included.
pub async fn export_snapshot(
    repo: &dyn Repository,
    cancel: &CancellationToken,
) -> Result<SnapshotDoc> {
    let projects = repo.list_projects(cancel, true).await?;
    let mut columns = Vec::new();
    let mut tasks = Vec::new();
    for project in &projects {
        columns.extend(repo.list_columns(cancel, project.id, true).await?);
        tasks.extend(repo.list_tasks(cancel, project.id, true).await?);
    }
    Ok(SnapshotDoc {
        version: SNAPSHOT_VERSION.to_string(),
        exported_at: Utc::now(),
        projects,
        columns,
        tasks,
    })
}

fn duplicate_check<I: IntoIterator<Item = Uuid>>(ids: I, what: &str) -> Result<()> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(PlannerError::invalid_request(format!(
                "duplicate {what} id {id} in snapshot"
            )));
        }
    }
    Ok(())
}

/// Validate a snapshot and upsert its rows by id.
pub async fn import_snapshot(
    repo: &dyn Repository,
    cancel: &CancellationToken,
    doc: SnapshotDoc,
) -> Result<ImportSummary> {
    let op = "import snapshot";
    if doc.version != SNAPSHOT_VERSION {
        return Err(PlannerError::invalid_request(format!(
            "unsupported snapshot version '{}'",
            doc.version
        ))
        .op(op));
    }

    duplicate_check(doc.projects.iter().map(|p| p.id), "project").map_err(|e| e.op(op))?;
    duplicate_check(doc.columns.iter().map(|c| c.id), "column").map_err(|e| e.op(op))?;
    duplicate_check(doc.tasks.iter().map(|t| t.id), "task").map_err(|e| e.op(op))?;

    let project_ids: HashSet<Uuid> = doc.projects.iter().map(|p| p.id).collect();
    let column_ids: HashSet<Uuid> = doc.columns.iter().map(|c| c.id).collect();
    let task_ids: HashSet<Uuid> = doc.tasks.iter().map(|t| t.id).collect();

    for column in &doc.columns {
        if !project_ids.contains(&column.project_id) {
            return Err(PlannerError::invalid_request(format!(
                "column {} references missing project {}",
                column.id, column.project_id
            ))
            .op(op));
        }
    }
    for task in &doc.tasks {
        if !project_ids.contains(&task.project_id) {
            return Err(PlannerError::invalid_request(format!(
                "task {} references missing project {}",
                task.id, task.project_id
            ))
            .op(op));
        }
        if !column_ids.contains(&task.column_id) {
            return Err(PlannerError::invalid_request(format!(
                "task {} references missing column {}",
                task.id, task.column_id
            ))
            .op(op));
        }
        if let Some(parent_id) = task.parent_id {
            if !task_ids.contains(&parent_id) {
                return Err(PlannerError::invalid_request(format!(
                    "task {} references missing parent {parent_id}",
                    task.id
                ))
                .op(op));
            }
        }
    }

    let mut summary = ImportSummary::default();
    for project in doc.projects {
        match repo.update_project(cancel, &project).await {
            Ok(()) => {}
            Err(PlannerError::NotFound(_)) => repo.create_project(cancel, &project).await?,
            Err(e) => return Err(e.op(op)),
        }
        summary.projects += 1;
    }
    for column in doc.columns {
        match repo.update_column(cancel, &column).await {
            Ok(()) => {}
            Err(PlannerError::NotFound(_)) => repo.create_column(cancel, &column).await?,
            Err(e) => return Err(e.op(op)),
        }
        summary.columns += 1;
    }
    for mut task in doc.tasks {
        // Legacy rows may omit classification; default both sides.
        if task.kind.trim().is_empty() {
            task.kind = "task".to_string();
        }
        if task.scope.trim().is_empty() {
            task.scope = "task".to_string();
        }
        match repo.update_task(cancel, &task).await {
            Ok(()) => {}
            Err(PlannerError::NotFound(_)) => repo.create_task(cancel, &task).await?,
            Err(e) => return Err(e.op(op)),
        }
        summary.tasks += 1;
    }
    Ok(summary)
}
