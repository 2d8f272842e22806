//! Error taxonomy with stable machine-readable codes.
//!
//! Every fallible path in the planner returns a [`PlannerError`]. Each
//! variant maps to exactly one stable string code; the transport shims are
//! the only places that translate codes into HTTP statuses or JSON-RPC tool
//! errors. Messages never contain internal paths or other agents' tokens.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Sub-kinds of `guardrail_failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    LeaseRequired,
    LeaseInvalid,
    LeaseExpired,
    LeaseRevoked,
    OrchestratorOverlap,
    OverrideTokenRequired,
    OverrideTokenInvalid,
    TransitionBlocked,
}

impl GuardrailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaseRequired => "lease_required",
            Self::LeaseInvalid => "lease_invalid",
            Self::LeaseExpired => "lease_expired",
            Self::LeaseRevoked => "lease_revoked",
            Self::OrchestratorOverlap => "orchestrator_overlap",
            Self::OverrideTokenRequired => "override_token_required",
            Self::OverrideTokenInvalid => "override_token_invalid",
            Self::TransitionBlocked => "transition_blocked",
        }
    }
}

impl fmt::Display for GuardrailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified planner error.
#[derive(Debug, Clone, Error)]
pub enum PlannerError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    UnsupportedScope(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BootstrapRequired(String),

    #[error("{kind}: {message}")]
    Guardrail {
        kind: GuardrailKind,
        message: String,
    },

    #[error("{0}")]
    KindNotFound(String),

    #[error("{0}")]
    KindNotAllowed(String),

    #[error("{0}")]
    InvalidKindPayload(String),

    #[error("{0}")]
    InvalidKindPayloadSchema(String),

    #[error("{0}")]
    AttentionUnavailable(String),

    #[error("{0}")]
    InvalidDeleteMode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

impl PlannerError {
    /// Stable top-level code for the transport shims.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnsupportedScope(_) => "unsupported_scope",
            Self::NotFound(_) => "not_found",
            Self::BootstrapRequired(_) => "bootstrap_required",
            Self::Guardrail { .. } => "guardrail_failed",
            Self::KindNotFound(_) => "kind_not_found",
            Self::KindNotAllowed(_) => "kind_not_allowed",
            Self::InvalidKindPayload(_) => "invalid_kind_payload",
            Self::InvalidKindPayloadSchema(_) => "invalid_kind_payload_schema",
            Self::AttentionUnavailable(_) => "attention_unavailable",
            Self::InvalidDeleteMode(_) => "invalid_delete_mode",
            Self::Cancelled => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Guardrail sub-kind, when this is a guardrail failure.
    pub fn guardrail_kind(&self) -> Option<GuardrailKind> {
        match self {
            Self::Guardrail { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn guardrail(kind: GuardrailKind, message: impl Into<String>) -> Self {
        Self::Guardrail {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn unsupported_scope(message: impl Into<String>) -> Self {
        Self::UnsupportedScope(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Prefix the message with operation context, preserving the kind.
    pub fn op(self, operation: &str) -> Self {
        match self {
            Self::InvalidRequest(m) => Self::InvalidRequest(format!("{operation}: {m}")),
            Self::UnsupportedScope(m) => Self::UnsupportedScope(format!("{operation}: {m}")),
            Self::NotFound(m) => Self::NotFound(format!("{operation}: {m}")),
            Self::BootstrapRequired(m) => Self::BootstrapRequired(format!("{operation}: {m}")),
            Self::Guardrail { kind, message } => Self::Guardrail {
                kind,
                message: format!("{operation}: {message}"),
            },
            Self::KindNotFound(m) => Self::KindNotFound(format!("{operation}: {m}")),
            Self::KindNotAllowed(m) => Self::KindNotAllowed(format!("{operation}: {m}")),
            Self::InvalidKindPayload(m) => Self::InvalidKindPayload(format!("{operation}: {m}")),
            Self::InvalidKindPayloadSchema(m) => {
                Self::InvalidKindPayloadSchema(format!("{operation}: {m}"))
            }
            Self::AttentionUnavailable(m) => {
                Self::AttentionUnavailable(format!("{operation}: {m}"))
            }
            Self::InvalidDeleteMode(m) => Self::InvalidDeleteMode(format!("{operation}: {m}")),
            Self::Cancelled => Self::Cancelled,
            Self::Internal(m) => Self::Internal(format!("{operation}: {m}")),
        }
    }
}

impl From<serde_json::Error> for PlannerError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T, E = PlannerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(PlannerError::invalid_request("x").code(), "invalid_request");
        assert_eq!(PlannerError::not_found("x").code(), "not_found");
        assert_eq!(
            PlannerError::BootstrapRequired("x".into()).code(),
            "bootstrap_required"
        );
        assert_eq!(
            PlannerError::guardrail(GuardrailKind::LeaseExpired, "x").code(),
            "guardrail_failed"
        );
        assert_eq!(PlannerError::Cancelled.code(), "service_unavailable");
    }

    #[test]
    fn test_guardrail_message_carries_sub_kind() {
        let err = PlannerError::guardrail(GuardrailKind::TransitionBlocked, "criteria unmet");
        assert_eq!(err.to_string(), "transition_blocked: criteria unmet");
        assert_eq!(err.guardrail_kind(), Some(GuardrailKind::TransitionBlocked));
    }

    #[test]
    fn test_op_preserves_kind() {
        let err = PlannerError::guardrail(GuardrailKind::TransitionBlocked, "subtasks must be done")
            .op("move task");
        assert_eq!(err.code(), "guardrail_failed");
        assert_eq!(
            err.to_string(),
            "transition_blocked: move task: subtasks must be done"
        );

        let err = PlannerError::not_found("task 42").op("update task");
        assert_eq!(err.code(), "not_found");
        assert!(err.to_string().starts_with("update task:"));
    }

    #[test]
    fn test_guardrail_sub_kind_strings() {
        assert_eq!(GuardrailKind::LeaseRequired.as_str(), "lease_required");
        assert_eq!(
            GuardrailKind::OrchestratorOverlap.as_str(),
            "orchestrator_overlap"
        );
        assert_eq!(
            GuardrailKind::OverrideTokenInvalid.as_str(),
            "override_token_invalid"
        );
    }
}
