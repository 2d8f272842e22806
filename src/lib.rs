//! Workgraph
//!
//! A scoped task-and-state planner serving two machine-facing transports
//! against a single durable work graph:
//! - a JSON-over-HTTP REST surface (axum)
//! - a JSON-RPC 2.0 tool surface over stdio
//!
//! The application core is the interesting part: hierarchical work items,
//! the capability-lease guardrail on every non-user mutation, the kind
//! catalog with schema-validated payloads and template-driven children, the
//! completion contract with attention-based transition blocking, and the
//! deterministic `capture_state` bundle.

pub mod api;
pub mod canonical;
pub mod capture;
pub mod catalog;
pub mod domain;
pub mod error;
pub mod guard;
pub mod lease;
pub mod mcp;
pub mod schema;
pub mod scopes;
pub mod service;
pub mod snapshot;
pub mod store;

use crate::capture::CaptureSynthesizer;
use crate::catalog::KindCatalog;
use crate::lease::LeaseEngine;
use crate::service::{ServiceConfig, WorkGraphService};
use crate::store::{MemoryRepository, Repository};
use anyhow::Result;
use std::sync::Arc;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    /// Default lease TTL in seconds (24h unless overridden).
    pub default_lease_ttl_secs: i64,
    pub auto_create_columns: bool,
    pub attention_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .unwrap_or(8080),
            default_lease_ttl_secs: std::env::var("DEFAULT_LEASE_TTL_SECS")
                .unwrap_or_else(|_| "86400".into())
                .parse()
                .unwrap_or(86_400),
            auto_create_columns: std::env::var("AUTO_CREATE_COLUMNS")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            attention_enabled: std::env::var("ATTENTION_ENABLED")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            default_lease_ttl_secs: 86_400,
            auto_create_columns: true,
            attention_enabled: true,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub catalog: Arc<KindCatalog>,
    pub service: Arc<WorkGraphService>,
    pub leases: Arc<LeaseEngine>,
    pub capture: Arc<CaptureSynthesizer>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire all services over a repository.
    pub fn new(repo: Arc<dyn Repository>, config: Config) -> Self {
        let catalog = Arc::new(KindCatalog::new(repo.clone()));
        let service = Arc::new(WorkGraphService::new(
            repo.clone(),
            catalog.clone(),
            ServiceConfig {
                auto_create_columns: config.auto_create_columns,
                attention_enabled: config.attention_enabled,
            },
        ));
        let leases = Arc::new(LeaseEngine::new(
            repo.clone(),
            chrono::Duration::seconds(config.default_lease_ttl_secs),
        ));
        let capture = Arc::new(CaptureSynthesizer::new(
            repo.clone(),
            config.attention_enabled,
        ));
        Self {
            repo,
            catalog,
            service,
            leases,
            capture,
            config: Arc::new(config),
        }
    }

    /// State backed by the in-memory repository.
    pub fn in_memory(config: Config) -> Self {
        Self::new(Arc::new(MemoryRepository::new()), config)
    }
}
