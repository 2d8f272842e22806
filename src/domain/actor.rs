//! Actor attribution for mutations.

use crate::error::{PlannerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who performed a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    User,
    Agent,
    System,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Agent => "agent",
            Self::System => "system",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "system" => Ok(Self::System),
            other => Err(PlannerError::invalid_request(format!(
                "unknown actor type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized actor identity attached to every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub actor_type: ActorType,
}

impl Actor {
    pub fn new(id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            id: id.into(),
            actor_type,
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::new(id, ActorType::User)
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self::new(id, ActorType::Agent)
    }

    /// The actor recorded for template expansion and other internal writes.
    /// Never a transport-claimable identity: the adapter shims reject
    /// `system` in incoming actor tuples, and the mutation guard holds a
    /// system context to the same lease checks as an agent.
    pub fn system() -> Self {
        Self::new("system", ActorType::System)
    }

    pub fn is_user(&self) -> bool {
        self.actor_type == ActorType::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_type_parse() {
        assert_eq!(ActorType::parse("user").unwrap(), ActorType::User);
        assert_eq!(ActorType::parse(" Agent ").unwrap(), ActorType::Agent);
        assert_eq!(ActorType::parse("SYSTEM").unwrap(), ActorType::System);
        assert!(ActorType::parse("robot").is_err());
    }

    #[test]
    fn test_actor_constructors() {
        let a = Actor::user("maria");
        assert!(a.is_user());
        let s = Actor::system();
        assert_eq!(s.actor_type, ActorType::System);
        assert_eq!(s.id, "system");
    }
}
