//! Capability leases: time-bounded authorizations binding an agent instance
//! to a scope tuple and role.

use crate::domain::scope::ScopeType;
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseRole {
    Worker,
    Orchestrator,
}

impl LeaseRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Orchestrator => "orchestrator",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "worker" => Ok(Self::Worker),
            "orchestrator" => Ok(Self::Orchestrator),
            other => Err(PlannerError::invalid_request(format!(
                "unknown lease role '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    /// Caller-chosen or generated instance identifier.
    pub instance_id: String,
    /// Opaque token, never reused.
    pub token: String,
    pub agent_name: String,
    pub project_id: Uuid,
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub role: LeaseRole,
    /// Delegating parent, when issued down a chain.
    #[serde(default)]
    pub parent_instance_id: Option<String>,
    #[serde(default)]
    pub allow_equal_scope_delegation: bool,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub revoked_reason: Option<String>,
}

impl Lease {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: Option<&str>,
        agent_name: &str,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
        role: LeaseRole,
        parent_instance_id: Option<String>,
        allow_equal_scope_delegation: bool,
        ttl: Duration,
    ) -> Result<Self> {
        let agent_name = agent_name.trim();
        if agent_name.is_empty() {
            return Err(PlannerError::invalid_request("agent name is required"));
        }
        if ttl <= Duration::zero() {
            return Err(PlannerError::invalid_request("lease ttl must be positive"));
        }
        let now = Utc::now();
        let instance_id = instance_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{agent_name}-{}", Uuid::new_v4().simple()));
        Ok(Self {
            instance_id,
            token: Uuid::new_v4().simple().to_string(),
            agent_name: agent_name.to_string(),
            project_id,
            scope_type,
            scope_id: scope_id.trim().to_string(),
            role,
            parent_instance_id,
            allow_equal_scope_delegation,
            issued_at: now,
            expires_at: now + ttl,
            heartbeat_at: now,
            revoked_at: None,
            revoked_reason: None,
        })
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Active iff not revoked and not expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired_at(now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lease(ttl: Duration) -> Lease {
        Lease::new(
            Some("w-1-a"),
            "w-1",
            Uuid::new_v4(),
            ScopeType::Project,
            "p",
            LeaseRole::Worker,
            None,
            false,
            ttl,
        )
        .unwrap()
    }

    #[test]
    fn test_active_window() {
        let l = lease(Duration::hours(24));
        assert!(l.is_active());
        assert!(l.is_expired_at(l.expires_at));
        assert!(!l.is_active_at(l.expires_at));
    }

    #[test]
    fn test_generated_instance_id_and_token() {
        let l = Lease::new(
            None,
            "w-2",
            Uuid::new_v4(),
            ScopeType::Task,
            "t",
            LeaseRole::Worker,
            None,
            false,
            Duration::hours(1),
        )
        .unwrap();
        assert!(l.instance_id.starts_with("w-2-"));
        assert!(!l.token.is_empty());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let err = Lease::new(
            None,
            "w",
            Uuid::new_v4(),
            ScopeType::Project,
            "p",
            LeaseRole::Worker,
            None,
            false,
            Duration::zero(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
