//! Built-in kinds seeded into an empty catalog.

use crate::domain::{KindDef, KindTemplate};
use crate::error::Result;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// The eight built-in kinds with their scope rules.
pub fn builtin_kinds() -> Result<Vec<KindDef>> {
    let specs: &[(&str, &str, &[&str], &[&str])] = &[
        ("project", "Project", &["project"], &[]),
        ("branch", "Branch", &["branch"], &["project"]),
        ("phase", "Phase", &["phase"], &["project", "branch"]),
        ("subphase", "Subphase", &["subphase"], &["phase"]),
        (
            "task",
            "Task",
            &["task"],
            &["project", "branch", "phase", "subphase"],
        ),
        ("subtask", "Subtask", &["subtask"], &["task"]),
        (
            "decision",
            "Decision",
            &["branch", "phase", "subphase", "task", "subtask"],
            &["branch", "phase", "subphase", "task", "subtask"],
        ),
        (
            "note",
            "Note",
            &["branch", "phase", "subphase", "task", "subtask"],
            &["branch", "phase", "subphase", "task", "subtask"],
        ),
    ];
    specs
        .iter()
        .map(|(id, name, applies_to, parents)| {
            KindDef::new(
                id,
                name,
                "",
                &strings(applies_to),
                &strings(parents),
                None,
                KindTemplate::default(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set() {
        let kinds = builtin_kinds().unwrap();
        assert_eq!(kinds.len(), 8);
        let task = kinds.iter().find(|k| k.id == "task").unwrap();
        assert!(task.applies_to_scope("task"));
        assert!(task.allows_parent_scope("subphase"));
        assert!(!task.allows_parent_scope("task"));
        let subtask = kinds.iter().find(|k| k.id == "subtask").unwrap();
        assert!(subtask.allows_parent_scope("task"));
    }
}
