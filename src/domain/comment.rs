//! Markdown comments attached to a target tuple.

use crate::domain::actor::{Actor, ActorType};
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub project_id: Uuid,
    /// `project`, `task`, or `attention`.
    pub target_type: String,
    pub target_id: String,
    pub body_md: String,
    pub author_id: String,
    pub author_type: ActorType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        project_id: Uuid,
        target_type: &str,
        target_id: &str,
        body_md: &str,
        actor: &Actor,
    ) -> Result<Self> {
        let body = body_md.trim();
        if body.is_empty() {
            return Err(PlannerError::invalid_request("comment body is required"));
        }
        let target_type = target_type.trim().to_ascii_lowercase();
        if !matches!(target_type.as_str(), "project" | "task" | "attention") {
            return Err(PlannerError::invalid_request(format!(
                "unknown comment target type '{target_type}'"
            )));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            target_type,
            target_id: target_id.trim().to_string(),
            body_md: body.to_string(),
            author_id: actor.id.clone(),
            author_type: actor.actor_type,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_comment() {
        let c = Comment::new(
            Uuid::new_v4(),
            "Task",
            "abc",
            "  looks good  ",
            &Actor::user("maria"),
        )
        .unwrap();
        assert_eq!(c.target_type, "task");
        assert_eq!(c.body_md, "looks good");
        assert_eq!(c.author_type, ActorType::User);
    }

    #[test]
    fn test_bad_target_type() {
        let err =
            Comment::new(Uuid::new_v4(), "column", "abc", "hi", &Actor::user("m")).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_empty_body_rejected() {
        let err = Comment::new(Uuid::new_v4(), "task", "abc", "  ", &Actor::user("m")).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
