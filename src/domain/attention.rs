//! Attention items: blockers, risks, and approvals attached to a scope.

use crate::domain::actor::Actor;
use crate::domain::scope::ScopeType;
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionState {
    Open,
    Acknowledged,
    Resolved,
}

impl AttentionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "acknowledged" => Ok(Self::Acknowledged),
            "resolved" => Ok(Self::Resolved),
            other => Err(PlannerError::invalid_request(format!(
                "unknown attention state '{other}'"
            ))),
        }
    }
}

/// A blocker/risk/approval/user-action record at a scope tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionItem {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scope_type: ScopeType,
    /// At project scope this equals the project id.
    pub scope_id: String,
    /// e.g. `blocker`, `risk_note`, `approval_required`.
    pub kind: String,
    pub state: AttentionState,
    pub summary: String,
    #[serde(default)]
    pub body_md: String,
    #[serde(default)]
    pub requires_user_action: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

impl AttentionItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
        kind: &str,
        summary: &str,
        body_md: &str,
        requires_user_action: bool,
        actor: &Actor,
    ) -> Result<Self> {
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(PlannerError::invalid_request(
                "attention summary is required",
            ));
        }
        let kind = kind.trim().to_ascii_lowercase();
        if kind.is_empty() {
            return Err(PlannerError::invalid_request("attention kind is required"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            scope_type,
            scope_id: scope_id.trim().to_string(),
            kind,
            state: AttentionState::Open,
            summary: summary.to_string(),
            body_md: body_md.trim().to_string(),
            requires_user_action,
            created_at: Utc::now(),
            created_by: actor.id.clone(),
            resolved_at: None,
            resolved_by: None,
        })
    }

    pub fn is_unresolved(&self) -> bool {
        self.state != AttentionState::Resolved
    }

    /// Resolving an already-resolved item is a no-op: the original resolve
    /// timestamp and actor are kept.
    pub fn resolved(mut self, actor: &Actor) -> Self {
        if self.state == AttentionState::Resolved {
            return self;
        }
        self.state = AttentionState::Resolved;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(actor.id.clone());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> AttentionItem {
        AttentionItem::new(
            Uuid::new_v4(),
            ScopeType::Task,
            "t-1",
            "blocker",
            "CI is red",
            "",
            true,
            &Actor::agent("w-1"),
        )
        .unwrap()
    }

    #[test]
    fn test_new_starts_open() {
        let a = item();
        assert_eq!(a.state, AttentionState::Open);
        assert!(a.is_unresolved());
        assert!(a.requires_user_action);
    }

    #[test]
    fn test_empty_summary_rejected() {
        let err = AttentionItem::new(
            Uuid::new_v4(),
            ScopeType::Project,
            "p",
            "blocker",
            " ",
            "",
            false,
            &Actor::user("m"),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let a = item().resolved(&Actor::user("maria"));
        let first = a.resolved_at.unwrap();
        let a = a.resolved(&Actor::user("other"));
        assert_eq!(a.resolved_at.unwrap(), first);
        assert_eq!(a.resolved_by.as_deref(), Some("maria"));
    }
}
