//! Onboarding guidance returned while the instance has no projects.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapGuide {
    pub mode: String,
    pub summary: String,
    pub capabilities: Vec<String>,
    pub next_steps: Vec<String>,
    pub recommended_tools: Vec<String>,
}

impl BootstrapGuide {
    pub fn new() -> Self {
        Self {
            mode: "bootstrap_required".to_string(),
            summary: "This planner holds no projects yet. Create a project to root a work graph, \
                      then add tasks and capture state as you go."
                .to_string(),
            capabilities: vec![
                "hierarchical work items with kinds, scopes, and completion contracts".to_string(),
                "capability leases authorizing agent mutations".to_string(),
                "attention items that block completion until resolved".to_string(),
                "deterministic capture_state bundles for context recovery".to_string(),
            ],
            next_steps: vec![
                "create a project with create_project".to_string(),
                "list the kind catalog with list_kind_definitions".to_string(),
                "create tasks with create_task".to_string(),
                "capture the project state with capture_state".to_string(),
            ],
            recommended_tools: vec![
                "create_project".to_string(),
                "list_kind_definitions".to_string(),
                "create_task".to_string(),
                "capture_state".to_string(),
            ],
        }
    }
}

impl Default for BootstrapGuide {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guide_shape() {
        let g = BootstrapGuide::new();
        assert_eq!(g.mode, "bootstrap_required");
        assert!(!g.next_steps.is_empty());
        assert!(!g.recommended_tools.is_empty());
    }
}
