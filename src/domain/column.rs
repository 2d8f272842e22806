//! Columns order work items within a project board.

use crate::domain::lifecycle::Lifecycle;
use crate::error::{PlannerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub position: u32,
    /// 0 = unbounded.
    #[serde(default)]
    pub wip_limit: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
}

impl Column {
    pub fn new(project_id: Uuid, name: &str, position: u32, wip_limit: u32) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlannerError::invalid_request("column name is required"));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            position,
            wip_limit,
            created_at: now,
            updated_at: now,
            archived_at: None,
        })
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Lifecycle a task takes on when placed in this column, derived from
    /// the column name via the lifecycle alias table. Unrecognized names
    /// classify as todo.
    pub fn lifecycle_state(&self) -> Lifecycle {
        Lifecycle::try_parse(&self.name).unwrap_or(Lifecycle::Todo)
    }

    /// Normalized state id used in search results.
    pub fn state_id(&self) -> &'static str {
        self.lifecycle_state().as_str()
    }
}

/// Display order within one project: position, ties broken by id.
pub fn sort_columns(columns: &mut [Column]) {
    columns.sort_by(|a, b| (a.position, a.id).cmp(&(b.position, b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_from_name() {
        let project = Uuid::new_v4();
        let c = Column::new(project, "To Do", 0, 0).unwrap();
        assert_eq!(c.lifecycle_state(), Lifecycle::Todo);
        let c = Column::new(project, "In Progress", 1, 0).unwrap();
        assert_eq!(c.lifecycle_state(), Lifecycle::Progress);
        let c = Column::new(project, "Done", 2, 0).unwrap();
        assert_eq!(c.lifecycle_state(), Lifecycle::Done);
        let c = Column::new(project, "Icebox", 3, 0).unwrap();
        assert_eq!(c.lifecycle_state(), Lifecycle::Todo);
    }

    #[test]
    fn test_sort_by_position_then_id() {
        let project = Uuid::new_v4();
        let mut a = Column::new(project, "A", 1, 0).unwrap();
        let mut b = Column::new(project, "B", 0, 0).unwrap();
        let c = Column::new(project, "C", 1, 0).unwrap();
        a.id = Uuid::from_u128(2);
        b.id = Uuid::from_u128(3);
        let mut cols = vec![a.clone(), c.clone(), b.clone()];
        sort_columns(&mut cols);
        assert_eq!(cols[0].name, "B");
        assert_eq!(cols[1].position, 1);
        assert!(cols[1].id < cols[2].id);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Column::new(Uuid::new_v4(), "  ", 0, 0).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }
}
