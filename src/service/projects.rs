//! Project and column operations.

use crate::domain::{Column, Project, ProjectMetadata};
use crate::error::{PlannerError, Result};
use crate::guard::CallContext;
use crate::service::WorkGraphService;
use tracing::info;
use uuid::Uuid;

/// Default board layout for new projects.
const DEFAULT_COLUMNS: [&str; 3] = ["To Do", "In Progress", "Done"];

#[derive(Debug, Clone, Default)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: String,
    /// Defaults to the built-in `project` kind.
    pub kind_id: Option<String>,
    pub metadata: ProjectMetadata,
    /// Explicit allow-list; when empty the full catalog is materialized.
    pub allowed_kinds: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind_id: Option<String>,
    pub metadata: Option<ProjectMetadata>,
}

impl WorkGraphService {
    /// Create a project, validate its kind, initialize the allow-list, and
    /// lay out the default columns when configured.
    pub async fn create_project_with_metadata(
        &self,
        ctx: &CallContext,
        input: CreateProjectInput,
    ) -> Result<Project> {
        let op = "create project";
        self.catalog.ensure_bootstrap(&ctx.cancel).await?;

        let project = Project::new(
            &input.name,
            &input.description,
            input.kind_id.as_deref(),
            input.metadata,
        )
        .map_err(|e| e.op(op))?;

        // The project kind must exist and classify projects.
        let kind = self
            .catalog
            .get_kind(&ctx.cancel, &project.kind_id)
            .await
            .map_err(|e| e.op(op))?;
        if !kind.applies_to_scope("project") {
            return Err(
                PlannerError::KindNotAllowed(format!(
                    "kind '{}' does not apply to project scope",
                    kind.id
                ))
                .op(op),
            );
        }

        self.guard.authorize(ctx, project.id, None).await.map_err(|e| e.op(op))?;

        self.repo
            .create_project(&ctx.cancel, &project)
            .await
            .map_err(|e| e.op(op))?;

        // An explicit allow-list is persisted; an empty one stays empty so
        // resolution falls back to the full live catalog.
        if !input.allowed_kinds.is_empty() {
            self.catalog
                .set_allowed_kinds(&ctx.cancel, project.id, &input.allowed_kinds)
                .await
                .map_err(|e| e.op(op))?;
        }

        if self.config.auto_create_columns {
            for (position, name) in DEFAULT_COLUMNS.iter().enumerate() {
                let column = Column::new(project.id, name, position as u32, 0)?;
                self.repo
                    .create_column(&ctx.cancel, &column)
                    .await
                    .map_err(|e| e.op(op))?;
            }
        }

        info!(project = %project.slug, "created project");
        Ok(project)
    }

    pub async fn update_project(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        input: UpdateProjectInput,
    ) -> Result<Project> {
        let op = "update project";
        let project = self
            .repo
            .get_project(&ctx.cancel, project_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, project_id, None)
            .await
            .map_err(|e| e.op(op))?;

        let mut project = project
            .with_details(
                input.name.as_deref(),
                input.description.as_deref(),
                input.metadata,
            )
            .map_err(|e| e.op(op))?;

        if let Some(kind_id) = input.kind_id {
            let kind = self
                .catalog
                .get_kind(&ctx.cancel, &kind_id)
                .await
                .map_err(|e| e.op(op))?;
            if !kind.applies_to_scope("project") {
                return Err(
                    PlannerError::KindNotAllowed(format!(
                        "kind '{}' does not apply to project scope",
                        kind.id
                    ))
                    .op(op),
                );
            }
            project.kind_id = kind.id;
        }

        self.repo
            .update_project(&ctx.cancel, &project)
            .await
            .map_err(|e| e.op(op))?;
        Ok(project)
    }

    pub async fn list_projects(
        &self,
        ctx: &CallContext,
        include_archived: bool,
    ) -> Result<Vec<Project>> {
        self.repo.list_projects(&ctx.cancel, include_archived).await
    }

    pub async fn get_project(&self, ctx: &CallContext, project_id: Uuid) -> Result<Project> {
        self.repo.get_project(&ctx.cancel, project_id).await
    }

    pub async fn set_project_allowed_kinds(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        kind_ids: &[String],
    ) -> Result<Vec<String>> {
        let op = "set allowed kinds";
        self.repo
            .get_project(&ctx.cancel, project_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, project_id, None)
            .await
            .map_err(|e| e.op(op))?;
        self.catalog
            .set_allowed_kinds(&ctx.cancel, project_id, kind_ids)
            .await
            .map_err(|e| e.op(op))
    }

    pub async fn list_project_allowed_kinds(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
    ) -> Result<Vec<String>> {
        self.repo
            .get_project(&ctx.cancel, project_id)
            .await?;
        self.catalog
            .resolve_allowed_kinds(&ctx.cancel, project_id)
            .await
    }

    pub async fn create_column(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        name: &str,
        position: Option<u32>,
        wip_limit: u32,
    ) -> Result<Column> {
        let op = "create column";
        self.repo
            .get_project(&ctx.cancel, project_id)
            .await
            .map_err(|e| e.op(op))?;
        self.guard
            .authorize(ctx, project_id, None)
            .await
            .map_err(|e| e.op(op))?;

        let position = match position {
            Some(p) => p,
            None => {
                let existing = self.repo.list_columns(&ctx.cancel, project_id, true).await?;
                existing.iter().map(|c| c.position + 1).max().unwrap_or(0)
            }
        };
        let column = Column::new(project_id, name, position, wip_limit).map_err(|e| e.op(op))?;
        self.repo
            .create_column(&ctx.cancel, &column)
            .await
            .map_err(|e| e.op(op))?;
        Ok(column)
    }

    /// Columns sorted by (position, id).
    pub async fn list_columns(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        include_archived: bool,
    ) -> Result<Vec<Column>> {
        self.repo.get_project(&ctx.cancel, project_id).await?;
        self.repo
            .list_columns(&ctx.cancel, project_id, include_archived)
            .await
    }
}
