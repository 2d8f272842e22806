//! Scope tuples identify points in the work graph.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Level of the work graph a scope tuple points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeType {
    Project,
    Branch,
    Phase,
    Subphase,
    Task,
    Subtask,
}

impl ScopeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Branch => "branch",
            Self::Phase => "phase",
            Self::Subphase => "subphase",
            Self::Task => "task",
            Self::Subtask => "subtask",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "project" => Ok(Self::Project),
            "branch" => Ok(Self::Branch),
            "phase" => Ok(Self::Phase),
            "subphase" => Ok(Self::Subphase),
            "task" => Ok(Self::Task),
            "subtask" => Ok(Self::Subtask),
            other => Err(PlannerError::unsupported_scope(format!(
                "unknown scope type '{other}'"
            ))),
        }
    }

    pub fn all() -> &'static [ScopeType] {
        &[
            Self::Project,
            Self::Branch,
            Self::Phase,
            Self::Subphase,
            Self::Task,
            Self::Subtask,
        ]
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
