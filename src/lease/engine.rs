//! Issue, heartbeat, renew, and revoke capability leases.
//!
//! Renew deliberately accepts an expired (but not revoked) lease: the
//! user-approved revival path for interrupted work. Heartbeat does not.

use crate::domain::{Lease, LeaseRole, Project, ScopeType};
use crate::error::{GuardrailKind, PlannerError, Result};
use crate::scopes;
use crate::store::Repository;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct IssueLeaseRequest {
    pub project_id: Uuid,
    pub scope_type: ScopeType,
    pub scope_id: String,
    pub role: LeaseRole,
    pub agent_name: String,
    pub instance_id: Option<String>,
    pub parent_instance_id: Option<String>,
    pub allow_equal_scope_delegation: bool,
    pub ttl_secs: Option<i64>,
    pub override_token: Option<String>,
}

pub struct LeaseEngine {
    repo: Arc<dyn Repository>,
    default_ttl: Duration,
}

impl LeaseEngine {
    pub fn new(repo: Arc<dyn Repository>, default_ttl: Duration) -> Self {
        Self { repo, default_ttl }
    }

    fn ttl(&self, requested_secs: Option<i64>) -> Result<Duration> {
        match requested_secs {
            None => Ok(self.default_ttl),
            Some(secs) if secs > 0 => Ok(Duration::seconds(secs)),
            Some(_) => Err(PlannerError::invalid_request("lease ttl must be positive")),
        }
    }

    pub async fn issue(
        &self,
        cancel: &CancellationToken,
        req: IssueLeaseRequest,
    ) -> Result<Lease> {
        let project = self.repo.get_project(cancel, req.project_id).await?;

        // The scope must exist and be of the claimed type.
        let entity = scopes::resolve_scope(
            self.repo.as_ref(),
            cancel,
            req.project_id,
            req.scope_type,
            &req.scope_id,
        )
        .await?;

        if let Some(parent_instance_id) = req
            .parent_instance_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            self.check_delegation(cancel, &req, parent_instance_id, &entity)
                .await?;
        }

        if req.role == LeaseRole::Orchestrator {
            self.check_orchestrator_overlap(cancel, &req, &project).await?;
        }

        let lease = Lease::new(
            req.instance_id.as_deref(),
            &req.agent_name,
            req.project_id,
            req.scope_type,
            &req.scope_id,
            req.role,
            req.parent_instance_id
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            req.allow_equal_scope_delegation,
            self.ttl(req.ttl_secs)?,
        )?;
        self.repo.create_lease(cancel, &lease).await?;
        info!(
            agent = %lease.agent_name,
            instance = %lease.instance_id,
            scope = %lease.scope_type,
            role = %lease.role.as_str(),
            "issued capability lease"
        );
        Ok(lease)
    }

    /// Delegated issuance: the parent lease must be active in the same
    /// project, and the child scope must sit strictly below the parent's
    /// unless equal-scope delegation was requested.
    async fn check_delegation(
        &self,
        cancel: &CancellationToken,
        req: &IssueLeaseRequest,
        parent_instance_id: &str,
        entity: &scopes::ScopeEntity,
    ) -> Result<()> {
        let parent = match self.repo.get_lease(cancel, parent_instance_id).await {
            Ok(lease) => lease,
            Err(PlannerError::NotFound(_)) => {
                return Err(PlannerError::guardrail(
                    GuardrailKind::LeaseInvalid,
                    format!("parent lease '{parent_instance_id}' does not exist"),
                ))
            }
            Err(e) => return Err(e),
        };
        if parent.project_id != req.project_id {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "parent lease belongs to a different project",
            ));
        }
        if parent.is_revoked() {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseRevoked,
                "parent lease is revoked",
            ));
        }
        if !parent.is_active() {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseExpired,
                "parent lease has expired",
            ));
        }

        let target_task = match entity {
            scopes::ScopeEntity::Task(task) => Some(task),
            scopes::ScopeEntity::Project(_) => None,
        };
        let candidates = scopes::scope_candidates(
            self.repo.as_ref(),
            cancel,
            req.project_id,
            target_task,
        )
        .await?;
        let parent_tuple = (parent.scope_type, parent.scope_id.clone());
        let equal = parent_tuple.0 == req.scope_type && parent_tuple.1 == req.scope_id;
        let within = candidates
            .iter()
            .any(|(st, id)| *st == parent_tuple.0 && *id == parent_tuple.1);
        if equal {
            if !req.allow_equal_scope_delegation {
                return Err(PlannerError::guardrail(
                    GuardrailKind::LeaseInvalid,
                    "delegated lease scope must be narrower than the parent's",
                ));
            }
        } else if !within {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "delegated lease scope is outside the parent lease's scope",
            ));
        }
        Ok(())
    }

    /// At most one active orchestrator per scope tuple, unless project
    /// policy allows a token-verified takeover.
    async fn check_orchestrator_overlap(
        &self,
        cancel: &CancellationToken,
        req: &IssueLeaseRequest,
        project: &Project,
    ) -> Result<()> {
        let existing = self
            .repo
            .list_leases_by_scope(cancel, req.project_id, req.scope_type, &req.scope_id)
            .await?;
        let now = Utc::now();
        let overlapping = existing.iter().any(|l| {
            l.role == LeaseRole::Orchestrator
                && l.is_active_at(now)
                && req
                    .instance_id
                    .as_deref()
                    .map_or(true, |id| id != l.instance_id)
        });
        if !overlapping {
            return Ok(());
        }
        let policy = &project.metadata.capability_policy;
        if !policy.allow_orchestrator_override {
            return Err(PlannerError::guardrail(
                GuardrailKind::OrchestratorOverlap,
                "an active orchestrator already holds this scope",
            ));
        }
        match req.override_token.as_deref().map(str::trim) {
            None | Some("") => Err(PlannerError::guardrail(
                GuardrailKind::OverrideTokenRequired,
                "orchestrator takeover requires the project override token",
            )),
            Some(token) if token != policy.orchestrator_override_token => {
                Err(PlannerError::guardrail(
                    GuardrailKind::OverrideTokenInvalid,
                    "orchestrator override token does not match",
                ))
            }
            Some(_) => Ok(()),
        }
    }

    fn authenticate(lease: &Lease, token: &str) -> Result<()> {
        if lease.token != token {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "lease token does not match",
            ));
        }
        Ok(())
    }

    /// Refresh liveness without extending the expiry window.
    pub async fn heartbeat(
        &self,
        cancel: &CancellationToken,
        instance_id: &str,
        token: &str,
    ) -> Result<Lease> {
        let mut lease = self.fetch(cancel, instance_id).await?;
        Self::authenticate(&lease, token)?;
        if lease.is_revoked() {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseRevoked,
                "lease is revoked",
            ));
        }
        if !lease.is_active() {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseExpired,
                "lease has expired; renew to continue",
            ));
        }
        lease.heartbeat_at = Utc::now();
        self.repo.update_lease(cancel, &lease).await?;
        Ok(lease)
    }

    /// Extend the expiry window. Succeeds for an expired lease as long as it
    /// is not revoked.
    pub async fn renew(
        &self,
        cancel: &CancellationToken,
        instance_id: &str,
        token: &str,
        ttl_secs: Option<i64>,
    ) -> Result<Lease> {
        let mut lease = self.fetch(cancel, instance_id).await?;
        Self::authenticate(&lease, token)?;
        if lease.is_revoked() {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseRevoked,
                "a revoked lease cannot be renewed",
            ));
        }
        let now = Utc::now();
        if !lease.is_active_at(now) {
            debug!(instance = %lease.instance_id, "reviving expired lease");
        }
        lease.expires_at = now + self.ttl(ttl_secs)?;
        lease.heartbeat_at = now;
        self.repo.update_lease(cancel, &lease).await?;
        Ok(lease)
    }

    pub async fn revoke(
        &self,
        cancel: &CancellationToken,
        instance_id: &str,
        reason: Option<&str>,
    ) -> Result<Lease> {
        let mut lease = self.fetch(cancel, instance_id).await?;
        if lease.revoked_at.is_none() {
            lease.revoked_at = Some(Utc::now());
            lease.revoked_reason = reason.map(str::to_string);
            self.repo.update_lease(cancel, &lease).await?;
        }
        Ok(lease)
    }

    /// Atomically revoke every active lease in a scope.
    pub async fn revoke_all(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        scope_type: ScopeType,
        scope_id: &str,
        reason: Option<&str>,
    ) -> Result<usize> {
        self.repo.get_project(cancel, project_id).await?;
        self.repo
            .revoke_leases_by_scope(cancel, project_id, scope_type, scope_id, Utc::now(), reason)
            .await
    }

    async fn fetch(&self, cancel: &CancellationToken, instance_id: &str) -> Result<Lease> {
        match self.repo.get_lease(cancel, instance_id).await {
            Ok(lease) => Ok(lease),
            Err(PlannerError::NotFound(_)) => Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                format!("lease instance '{instance_id}' does not exist"),
            )),
            Err(e) => Err(e),
        }
    }
}
