//! Comments on projects, tasks, and attention items.

use crate::domain::Comment;
use crate::error::{PlannerError, Result};
use crate::guard::CallContext;
use crate::service::WorkGraphService;
use uuid::Uuid;

impl WorkGraphService {
    /// Attach a markdown comment to a target tuple. The target must resolve
    /// within the project.
    pub async fn create_comment(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        target_type: &str,
        target_id: &str,
        body_md: &str,
    ) -> Result<Comment> {
        let op = "create comment";
        self.repo
            .get_project(&ctx.cancel, project_id)
            .await
            .map_err(|e| e.op(op))?;

        let comment = Comment::new(project_id, target_type, target_id, body_md, &ctx.actor)
            .map_err(|e| e.op(op))?;

        let target_task = match comment.target_type.as_str() {
            "project" => {
                if comment.target_id != project_id.to_string() {
                    return Err(PlannerError::invalid_request(
                        "project-comment target id must equal the project id",
                    )
                    .op(op));
                }
                None
            }
            "task" => {
                let task_id = Uuid::parse_str(&comment.target_id).map_err(|_| {
                    PlannerError::invalid_request("comment target id is not a work-item id").op(op)
                })?;
                let task = self
                    .repo
                    .get_task(&ctx.cancel, task_id)
                    .await
                    .map_err(|e| e.op(op))?;
                if task.project_id != project_id {
                    return Err(PlannerError::invalid_request(
                        "comment target belongs to a different project",
                    )
                    .op(op));
                }
                Some(task)
            }
            "attention" => {
                let item_id = Uuid::parse_str(&comment.target_id).map_err(|_| {
                    PlannerError::invalid_request("comment target id is not an attention id")
                        .op(op)
                })?;
                let item = self
                    .repo
                    .get_attention_item(&ctx.cancel, item_id)
                    .await
                    .map_err(|e| e.op(op))?;
                if item.project_id != project_id {
                    return Err(PlannerError::invalid_request(
                        "comment target belongs to a different project",
                    )
                    .op(op));
                }
                None
            }
            _ => unreachable!("validated by Comment::new"),
        };

        self.guard
            .authorize(ctx, project_id, target_task.as_ref())
            .await
            .map_err(|e| e.op(op))?;

        self.repo
            .create_comment(&ctx.cancel, &comment)
            .await
            .map_err(|e| e.op(op))?;
        Ok(comment)
    }

    /// Comments on one target, oldest first.
    pub async fn list_comments_by_target(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        target_type: &str,
        target_id: &str,
    ) -> Result<Vec<Comment>> {
        self.repo.get_project(&ctx.cancel, project_id).await?;
        self.repo
            .list_comments_by_target(
                &ctx.cancel,
                project_id,
                &target_type.trim().to_ascii_lowercase(),
                target_id.trim(),
            )
            .await
    }
}
