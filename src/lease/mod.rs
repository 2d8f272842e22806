//! Capability lease engine.

pub mod engine;

pub use engine::{IssueLeaseRequest, LeaseEngine};
