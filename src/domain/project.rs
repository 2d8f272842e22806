//! Project entity and its capability policy.

use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Controls whether a second orchestrator may take over a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    #[serde(default)]
    pub allow_orchestrator_override: bool,
    /// Opaque secret compared against the issue-time override token.
    #[serde(default)]
    pub orchestrator_override_token: String,
}

/// Owner, tags, and capability policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub capability_policy: CapabilityPolicy,
}

/// A project roots one work graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Kind classifying the project itself; defaults to the built-in `project`.
    pub kind_id: String,
    #[serde(default)]
    pub metadata: ProjectMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

/// Derive a lowercase slug from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

impl Project {
    /// Validate and construct a new project. The name is trimmed and must be
    /// non-empty; the slug is derived from the name.
    pub fn new(
        name: &str,
        description: &str,
        kind_id: Option<&str>,
        metadata: ProjectMetadata,
    ) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::invalid_request("project name is required"));
        }
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(PlannerError::invalid_request(
                "project name must contain at least one alphanumeric character",
            ));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            slug,
            name: name.to_string(),
            description: description.trim().to_string(),
            kind_id: kind_id
                .map(|k| k.trim().to_ascii_lowercase())
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| "project".to_string()),
            metadata,
            created_at: now,
            updated_at: now,
            archived_at: None,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Apply a detail update, producing the new value.
    pub fn with_details(
        mut self,
        name: Option<&str>,
        description: Option<&str>,
        metadata: Option<ProjectMetadata>,
    ) -> Result<Self> {
        if let Some(name) = name {
            let name = name.trim();
            if name.is_empty() {
                return Err(PlannerError::invalid_request("project name is required"));
            }
            self.name = name.to_string();
            self.slug = slugify(name);
        }
        if let Some(description) = description {
            self.description = description.trim().to_string();
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
        self.updated_at = Utc::now();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Roadmap"), "roadmap");
        assert_eq!(slugify("  Big Launch Q3! "), "big-launch-q3");
        assert_eq!(slugify("a__b"), "a-b");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_new_trims_and_slugs() {
        let p = Project::new("  Roadmap ", " plan ", None, ProjectMetadata::default()).unwrap();
        assert_eq!(p.name, "Roadmap");
        assert_eq!(p.slug, "roadmap");
        assert_eq!(p.description, "plan");
        assert_eq!(p.kind_id, "project");
        assert!(p.archived_at.is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Project::new("   ", "", None, ProjectMetadata::default()).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_with_details_keeps_unmentioned_fields() {
        let p = Project::new("Roadmap", "desc", None, ProjectMetadata::default()).unwrap();
        let p2 = p.clone().with_details(None, Some("new desc"), None).unwrap();
        assert_eq!(p2.name, "Roadmap");
        assert_eq!(p2.description, "new desc");
        assert_eq!(p2.slug, p.slug);
    }
}
