//! Scope-tuple resolution against the live work graph.
//!
//! A scope tuple is (project id, scope type, scope id). Project scope points
//! at the project row itself; every other scope type must resolve to a work
//! item whose own `scope` matches the claimed type. Ancestor walks are the
//! basis for lease scope matching and capture scope paths.

use crate::domain::{Project, ScopeType, Task};
use crate::error::{PlannerError, Result};
use crate::store::Repository;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a scope tuple resolved to.
#[derive(Debug, Clone)]
pub enum ScopeEntity {
    Project(Project),
    Task(Task),
}

impl ScopeEntity {
    pub fn name(&self) -> &str {
        match self {
            Self::Project(p) => &p.name,
            Self::Task(t) => &t.title,
        }
    }
}

/// Normalize a scope tuple: scope type defaults to `project`; at project
/// scope the id defaults to (and must equal) the project id; elsewhere the
/// id is required.
pub fn normalize_scope(
    project_id: Uuid,
    scope_type: Option<&str>,
    scope_id: Option<&str>,
) -> Result<(ScopeType, String)> {
    let scope_type = match scope_type.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => ScopeType::parse(s)?,
        None => ScopeType::Project,
    };
    let scope_id = scope_id.map(str::trim).filter(|s| !s.is_empty());
    match scope_type {
        ScopeType::Project => {
            let id = scope_id.unwrap_or_default();
            if !id.is_empty() && id != project_id.to_string() {
                return Err(PlannerError::unsupported_scope(
                    "project-scope id must equal the project id",
                ));
            }
            Ok((scope_type, project_id.to_string()))
        }
        _ => {
            let id = scope_id.ok_or_else(|| {
                PlannerError::unsupported_scope(format!(
                    "scope id is required for {scope_type} scope"
                ))
            })?;
            Ok((scope_type, id.to_string()))
        }
    }
}

/// Resolve a normalized scope tuple to its entity, checking that the id
/// points at an entity of the claimed type.
pub async fn resolve_scope(
    repo: &dyn Repository,
    cancel: &CancellationToken,
    project_id: Uuid,
    scope_type: ScopeType,
    scope_id: &str,
) -> Result<ScopeEntity> {
    if scope_type == ScopeType::Project {
        let project = repo.get_project(cancel, project_id).await?;
        return Ok(ScopeEntity::Project(project));
    }
    let task_id = Uuid::parse_str(scope_id).map_err(|_| {
        PlannerError::unsupported_scope(format!("scope id '{scope_id}' is not a work-item id"))
    })?;
    let task = repo.get_task(cancel, task_id).await?;
    if task.project_id != project_id {
        return Err(PlannerError::unsupported_scope(format!(
            "scope id '{scope_id}' does not belong to the project"
        )));
    }
    if task.scope != scope_type.as_str() {
        return Err(PlannerError::unsupported_scope(format!(
            "scope id '{scope_id}' is a {} scope, not {scope_type}",
            task.scope
        )));
    }
    Ok(ScopeEntity::Task(task))
}

/// Acceptable lease scopes for a work item: the item's own tuple, each
/// ancestor's tuple, and the project tuple. Scopes beyond the parent chain
/// never appear.
pub async fn scope_candidates(
    repo: &dyn Repository,
    cancel: &CancellationToken,
    project_id: Uuid,
    target: Option<&Task>,
) -> Result<Vec<(ScopeType, String)>> {
    let mut out: Vec<(ScopeType, String)> = Vec::new();
    if let Some(task) = target {
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut current = Some(task.clone());
        while let Some(task) = current {
            if !seen.insert(task.id) {
                break; // defensive against a corrupted parent chain
            }
            if let Ok(scope_type) = ScopeType::parse(&task.scope) {
                out.push((scope_type, task.id.to_string()));
            }
            current = match task.parent_id {
                Some(parent_id) => Some(repo.get_task(cancel, parent_id).await?),
                None => None,
            };
        }
    }
    out.push((ScopeType::Project, project_id.to_string()));
    Ok(out)
}

/// Path entries from the project root down to the requested scope.
pub async fn scope_path(
    repo: &dyn Repository,
    cancel: &CancellationToken,
    project: &Project,
    entity: &ScopeEntity,
) -> Result<Vec<(ScopeType, String, String)>> {
    let mut path = vec![(
        ScopeType::Project,
        project.id.to_string(),
        project.name.clone(),
    )];
    if let ScopeEntity::Task(task) = entity {
        let mut chain: Vec<(ScopeType, String, String)> = Vec::new();
        let mut seen: HashSet<Uuid> = HashSet::new();
        let mut current = Some(task.clone());
        while let Some(task) = current {
            if !seen.insert(task.id) {
                break;
            }
            let scope_type = ScopeType::parse(&task.scope)?;
            chain.push((scope_type, task.id.to_string(), task.title.clone()));
            current = match task.parent_id {
                Some(parent_id) => Some(repo.get_task(cancel, parent_id).await?),
                None => None,
            };
        }
        chain.reverse();
        path.extend(chain);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults_to_project() {
        let project = Uuid::new_v4();
        let (st, id) = normalize_scope(project, None, None).unwrap();
        assert_eq!(st, ScopeType::Project);
        assert_eq!(id, project.to_string());
    }

    #[test]
    fn test_normalize_project_id_mismatch() {
        let err = normalize_scope(Uuid::new_v4(), Some("project"), Some("other")).unwrap_err();
        assert_eq!(err.code(), "unsupported_scope");
    }

    #[test]
    fn test_normalize_requires_id_for_non_project() {
        let err = normalize_scope(Uuid::new_v4(), Some("task"), None).unwrap_err();
        assert_eq!(err.code(), "unsupported_scope");
    }

    #[test]
    fn test_normalize_unknown_scope_type() {
        let err = normalize_scope(Uuid::new_v4(), Some("galaxy"), Some("x")).unwrap_err();
        assert_eq!(err.code(), "unsupported_scope");
    }
}
