//! Append-only change feed entries.

use crate::domain::actor::{Actor, ActorType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
    Restore,
    Move,
    Reparent,
    Complete,
    Resolve,
}

/// One row of a project's change feed. Ids are per-project monotonic and
/// assigned by the repository at append time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 0 until assigned by the repository.
    #[serde(default)]
    pub id: u64,
    pub project_id: Uuid,
    pub task_id: Uuid,
    pub op: ChangeOp,
    pub actor_id: String,
    pub actor_type: ActorType,
    /// Key-value metadata, e.g. changed-field names. BTreeMap keeps the
    /// serialized form deterministic.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(project_id: Uuid, task_id: Uuid, op: ChangeOp, actor: &Actor) -> Self {
        Self {
            id: 0,
            project_id,
            task_id,
            op,
            actor_id: actor.id.clone(),
            actor_type: actor.actor_type,
            meta: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_attribution() {
        let e = ChangeEvent::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            ChangeOp::Move,
            &Actor::agent("w-1"),
        )
        .with_meta("to_column", "done");
        assert_eq!(e.actor_id, "w-1");
        assert_eq!(e.actor_type, ActorType::Agent);
        assert_eq!(e.meta.get("to_column").unwrap(), "done");
        assert_eq!(e.id, 0);
    }

    #[test]
    fn test_op_serialization_is_snake_case() {
        let json = serde_json::to_string(&ChangeOp::Reparent).unwrap();
        assert_eq!(json, "\"reparent\"");
    }
}
