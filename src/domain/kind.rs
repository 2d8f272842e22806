//! Kind definitions: the dynamic classification catalog for work items.

use crate::domain::task::ChecklistItem;
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Child spec expanded when an item of the owning kind is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub kind: String,
    /// Scope the child applies to.
    pub applies_to: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindTemplate {
    /// Checklist items merged into new items of this kind.
    #[serde(default)]
    pub completion_checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub auto_create_children: Vec<ChildSpec>,
}

/// Global catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindDef {
    /// Lowercased identifier.
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub description_md: String,
    /// Scopes this kind may classify.
    #[serde(default)]
    pub applies_to: Vec<String>,
    /// Scopes a parent item may have.
    #[serde(default)]
    pub allowed_parent_scopes: Vec<String>,
    /// JSON-Schema subset for `metadata.kind_payload`; None = unchecked.
    #[serde(default)]
    pub payload_schema: Option<Value>,
    #[serde(default)]
    pub template: KindTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

fn normalize_scope_set(values: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for v in values {
        let v = v.trim().to_ascii_lowercase();
        if !v.is_empty() && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

impl KindDef {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        display_name: &str,
        description_md: &str,
        applies_to: &[String],
        allowed_parent_scopes: &[String],
        payload_schema: Option<Value>,
        template: KindTemplate,
    ) -> Result<Self> {
        let id = id.trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(PlannerError::invalid_request("kind id is required"));
        }
        if id.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '-')) {
            return Err(PlannerError::invalid_request(format!(
                "kind id '{id}' may only contain alphanumerics, '-' and '_'"
            )));
        }
        let display_name = display_name.trim();
        let now = Utc::now();
        Ok(Self {
            id: id.clone(),
            display_name: if display_name.is_empty() {
                id
            } else {
                display_name.to_string()
            },
            description_md: description_md.trim().to_string(),
            applies_to: normalize_scope_set(applies_to),
            allowed_parent_scopes: normalize_scope_set(allowed_parent_scopes),
            payload_schema,
            template,
            created_at: now,
            updated_at: now,
            archived_at: None,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    pub fn applies_to_scope(&self, scope: &str) -> bool {
        self.applies_to.iter().any(|s| s == scope)
    }

    pub fn allows_parent_scope(&self, scope: &str) -> bool {
        self.allowed_parent_scopes.iter().any(|s| s == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_id_and_sets() {
        let k = KindDef::new(
            " Phase ",
            "Phase",
            "",
            &["Phase".into(), "phase".into(), "subphase".into()],
            &["project".into(), "branch".into()],
            None,
            KindTemplate::default(),
        )
        .unwrap();
        assert_eq!(k.id, "phase");
        assert_eq!(k.applies_to, vec!["phase", "subphase"]);
        assert!(k.applies_to_scope("phase"));
        assert!(!k.applies_to_scope("task"));
        assert!(k.allows_parent_scope("branch"));
    }

    #[test]
    fn test_bad_id_rejected() {
        assert!(KindDef::new("", "x", "", &[], &[], None, KindTemplate::default()).is_err());
        assert!(
            KindDef::new("a b", "x", "", &[], &[], None, KindTemplate::default()).is_err()
        );
    }
}
