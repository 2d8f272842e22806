//! Lifecycle states and the alias table shared by state normalization and
//! column classification.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Todo,
    Progress,
    Done,
    Archived,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Progress => "progress",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Normalize a lifecycle string, accepting the usual aliases.
    pub fn parse(s: &str) -> Result<Self> {
        Self::try_parse(s).ok_or_else(|| {
            PlannerError::invalid_request(format!("unknown lifecycle state '{}'", s.trim()))
        })
    }

    /// Alias-tolerant parse without an error.
    pub fn try_parse(s: &str) -> Option<Self> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match normalized.as_str() {
            "to-do" | "todo" => Some(Self::Todo),
            "in-progress" | "progress" | "doing" => Some(Self::Progress),
            "complete" | "completed" | "done" => Some(Self::Done),
            "archive" | "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Done and archived items are terminal for dependency resolution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Archived)
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases() {
        assert_eq!(Lifecycle::parse("to-do").unwrap(), Lifecycle::Todo);
        assert_eq!(Lifecycle::parse("To Do").unwrap(), Lifecycle::Todo);
        assert_eq!(Lifecycle::parse("doing").unwrap(), Lifecycle::Progress);
        assert_eq!(Lifecycle::parse("In Progress").unwrap(), Lifecycle::Progress);
        assert_eq!(Lifecycle::parse("completed").unwrap(), Lifecycle::Done);
        assert_eq!(Lifecycle::parse("archive").unwrap(), Lifecycle::Archived);
    }

    #[test]
    fn test_unknown_state() {
        let err = Lifecycle::parse("paused").unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn test_terminal() {
        assert!(Lifecycle::Done.is_terminal());
        assert!(Lifecycle::Archived.is_terminal());
        assert!(!Lifecycle::Progress.is_terminal());
    }
}
