//! Translation of planner errors into the HTTP error envelope.
//!
//! Envelope: `{ "error": { "code", "message", "hint"?, "context"? } }`.
//! The status mapping is the single place transport codes are decided.

use crate::error::PlannerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Application error type for the REST surface.
#[derive(Debug)]
pub struct ApiError(pub PlannerError);

impl From<PlannerError> for ApiError {
    fn from(err: PlannerError) -> Self {
        Self(err)
    }
}

fn status_for(err: &PlannerError) -> StatusCode {
    match err {
        PlannerError::InvalidRequest(_)
        | PlannerError::UnsupportedScope(_)
        | PlannerError::InvalidDeleteMode(_)
        | PlannerError::InvalidKindPayload(_)
        | PlannerError::InvalidKindPayloadSchema(_) => StatusCode::BAD_REQUEST,
        PlannerError::NotFound(_) | PlannerError::KindNotFound(_) => StatusCode::NOT_FOUND,
        PlannerError::BootstrapRequired(_)
        | PlannerError::Guardrail { .. }
        | PlannerError::KindNotAllowed(_) => StatusCode::CONFLICT,
        // The surface is compiled in but switched off for this instance.
        PlannerError::AttentionUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
        PlannerError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        PlannerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn hint_for(err: &PlannerError) -> Option<&'static str> {
    match err {
        PlannerError::BootstrapRequired(_) => {
            Some("create a project first, then retry this call")
        }
        PlannerError::Guardrail { kind, .. } => match kind {
            crate::error::GuardrailKind::LeaseExpired => {
                Some("renew the lease and retry the mutation")
            }
            crate::error::GuardrailKind::LeaseRequired => {
                Some("issue a capability lease for this scope first")
            }
            _ => None,
        },
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);
        let mut body = json!({
            "error": {
                "code": err.code(),
                "message": err.to_string(),
            }
        });
        if let Some(hint) = hint_for(&err) {
            body["error"]["hint"] = json!(hint);
        }
        if let Some(kind) = err.guardrail_kind() {
            body["error"]["context"] = json!({ "rule": kind.as_str() });
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GuardrailKind;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&PlannerError::invalid_request("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&PlannerError::not_found("x")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&PlannerError::BootstrapRequired("x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&PlannerError::guardrail(GuardrailKind::LeaseExpired, "x")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&PlannerError::AttentionUnavailable("x".into())),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            status_for(&PlannerError::Cancelled),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&PlannerError::internal("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
