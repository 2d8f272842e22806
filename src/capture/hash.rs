//! Deterministic project state hash.
//!
//! One canonical encoding for every hashing path: a key-sorted JSON object
//! of the project row, columns sorted by (position, id), tasks sorted by
//! id, and the two attention counters, digested with SHA-256 and rendered
//! as lowercase hex.

use crate::canonical::content_hash;
use crate::domain::{Column, Project, Task};
use crate::error::{PlannerError, Result};
use serde_json::json;

pub fn state_hash(
    project: &Project,
    columns: &[Column],
    tasks: &[Task],
    open_attention: usize,
    requires_user_action: usize,
) -> Result<String> {
    let mut columns: Vec<&Column> = columns.iter().collect();
    columns.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
    let mut tasks: Vec<&Task> = tasks.iter().collect();
    tasks.sort_by(|a, b| a.id.cmp(&b.id));

    let doc = json!({
        "project": serde_json::to_value(project)
            .map_err(|e| PlannerError::internal(e.to_string()))?,
        "columns": serde_json::to_value(&columns)
            .map_err(|e| PlannerError::internal(e.to_string()))?,
        "tasks": serde_json::to_value(&tasks)
            .map_err(|e| PlannerError::internal(e.to_string()))?,
        "open_attention": open_attention,
        "requires_user_action": requires_user_action,
    });
    Ok(content_hash(&doc))
}
