//! Mutation guard: binds an actor and (for non-user actors) a capability
//! lease to the scope of every write.
//!
//! The per-call state travels in an immutable [`CallContext`] passed
//! explicitly as the first parameter of every mutation entry point. The
//! transports construct it after parsing the request; tests construct it
//! directly.

use crate::domain::{Actor, ActorType, Lease, Task};
use crate::error::{GuardrailKind, PlannerError, Result};
use crate::scopes;
use crate::store::Repository;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Lease tuple claimed by a non-user caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseClaims {
    pub agent_name: String,
    pub instance_id: String,
    pub lease_token: String,
    pub override_token: Option<String>,
}

impl LeaseClaims {
    fn is_complete(&self) -> bool {
        !self.agent_name.trim().is_empty()
            && !self.instance_id.trim().is_empty()
            && !self.lease_token.trim().is_empty()
    }
}

/// Immutable per-call state: who is calling, under which lease, and the
/// caller's cancellation token.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub actor: Actor,
    pub lease: Option<LeaseClaims>,
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new(actor: Actor, lease: Option<LeaseClaims>) -> Self {
        Self {
            actor,
            lease,
            cancel: CancellationToken::new(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(Actor::user(id), None)
    }

    pub fn agent(id: impl Into<String>, claims: LeaseClaims) -> Self {
        Self::new(Actor::agent(id), Some(claims))
    }
}

pub struct MutationGuard {
    repo: Arc<dyn Repository>,
}

impl MutationGuard {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    /// Enforce the per-call policy for a mutation touching `project_id` at
    /// the given target. Returns the lease that authorized the call, when
    /// one was used.
    ///
    /// The acceptable scopes are derived from the target's parent chain:
    /// the item's own tuple, each ancestor's, and the project tuple.
    pub async fn authorize(
        &self,
        ctx: &CallContext,
        project_id: Uuid,
        target: Option<&Task>,
    ) -> Result<Option<Lease>> {
        match ctx.actor.actor_type {
            ActorType::User => {
                if ctx.lease.is_some() {
                    return Err(PlannerError::invalid_request(
                        "a user-attributed mutation must not carry a lease tuple",
                    ));
                }
                Ok(None)
            }
            // Every non-user actor type is held to the same lease checks.
            ActorType::Agent | ActorType::System => {
                let claims = ctx.lease.as_ref().ok_or_else(|| {
                    PlannerError::guardrail(
                        GuardrailKind::LeaseRequired,
                        "non-user mutations require a capability lease",
                    )
                })?;
                if !claims.is_complete() {
                    return Err(PlannerError::invalid_request(
                        "lease tuple requires agent name, instance id, and lease token",
                    ));
                }
                let lease = self.check_lease(ctx, claims, project_id, target).await?;
                Ok(Some(lease))
            }
        }
    }

    async fn check_lease(
        &self,
        ctx: &CallContext,
        claims: &LeaseClaims,
        project_id: Uuid,
        target: Option<&Task>,
    ) -> Result<Lease> {
        let mut lease = match self.repo.get_lease(&ctx.cancel, &claims.instance_id).await {
            Ok(lease) => lease,
            Err(PlannerError::NotFound(_)) => {
                return Err(PlannerError::guardrail(
                    GuardrailKind::LeaseInvalid,
                    "no lease for the claimed instance",
                ))
            }
            Err(e) => return Err(e),
        };
        if lease.agent_name != claims.agent_name || lease.token != claims.lease_token {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "lease credentials do not match",
            ));
        }
        if lease.project_id != project_id {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "lease is bound to a different project",
            ));
        }
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

        let candidates =
            scopes::scope_candidates(self.repo.as_ref(), &ctx.cancel, project_id, target).await?;
        let authorized = candidates
            .iter()
            .any(|(st, id)| *st == lease.scope_type && *id == lease.scope_id);
        if !authorized {
            return Err(PlannerError::guardrail(
                GuardrailKind::LeaseInvalid,
                "lease scope does not cover the target",
            ));
        }

        // Heartbeat as a side effect; last write wins and a lost update is
        // acceptable.
        lease.heartbeat_at = Utc::now();
        if let Err(e) = self.repo.update_lease(&ctx.cancel, &lease).await {
            debug!(instance = %lease.instance_id, error = %e, "heartbeat update skipped");
        }
        Ok(lease)
    }
}

/// Actor tuple as carried by both transports on mutation requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorTuple {
    #[serde(default)]
    pub actor_type: Option<String>,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub agent_name: Option<String>,
    #[serde(default)]
    pub agent_instance_id: Option<String>,
    #[serde(default)]
    pub lease_token: Option<String>,
    #[serde(default)]
    pub override_token: Option<String>,
}

impl ActorTuple {
    fn field(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Normalize the tuple into a call context. A missing actor type means
    /// a user caller; agent callers are attributed by agent name. The
    /// `system` actor is internal attribution (template expansion) and is
    /// never accepted from a transport.
    pub fn into_context(self, cancel: CancellationToken) -> Result<CallContext> {
        let actor_type = match Self::field(&self.actor_type) {
            Some(s) => match ActorType::parse(s)? {
                ActorType::System => {
                    return Err(PlannerError::invalid_request(
                        "actor type 'system' is reserved for internal attribution",
                    ))
                }
                other => other,
            },
            None => ActorType::User,
        };
        let claims = if Self::field(&self.agent_name).is_some()
            || Self::field(&self.agent_instance_id).is_some()
            || Self::field(&self.lease_token).is_some()
        {
            Some(LeaseClaims {
                agent_name: Self::field(&self.agent_name).unwrap_or_default().to_string(),
                instance_id: Self::field(&self.agent_instance_id)
                    .unwrap_or_default()
                    .to_string(),
                lease_token: Self::field(&self.lease_token).unwrap_or_default().to_string(),
                override_token: Self::field(&self.override_token).map(str::to_string),
            })
        } else {
            None
        };
        let actor_id = Self::field(&self.actor_id)
            .or_else(|| Self::field(&self.agent_name))
            .unwrap_or(if actor_type == ActorType::Agent {
                "agent"
            } else {
                "user"
            })
            .to_string();
        Ok(CallContext {
            actor: Actor::new(actor_id, actor_type),
            lease: claims,
            cancel,
        })
    }
}
