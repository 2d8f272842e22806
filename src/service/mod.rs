//! Work graph service: the single entry point for every project, column,
//! task, comment, and attention operation. Mutations are guarded; reads are
//! not. Each operation returns the updated entity.

mod attention;
mod comments;
mod feed;
mod projects;
mod search;
mod tasks;

pub use attention::RaiseAttentionInput;
pub use feed::DependencyRollup;
pub use projects::{CreateProjectInput, UpdateProjectInput};
pub use search::{TaskSearchFilter, TaskSearchMatch};
pub use tasks::{parse_task_metadata, CreateTaskInput, DeleteMode, UpdateTaskInput};

use crate::catalog::KindCatalog;
use crate::guard::MutationGuard;
use crate::store::Repository;
use std::sync::Arc;

/// Behavior toggles owned by the binary configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Create the default To Do / In Progress / Done columns on new projects.
    pub auto_create_columns: bool,
    /// When off, the attention surface reports `attention_unavailable`.
    pub attention_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_create_columns: true,
            attention_enabled: true,
        }
    }
}

pub struct WorkGraphService {
    repo: Arc<dyn Repository>,
    catalog: Arc<KindCatalog>,
    guard: MutationGuard,
    config: ServiceConfig,
}

impl WorkGraphService {
    pub fn new(repo: Arc<dyn Repository>, catalog: Arc<KindCatalog>, config: ServiceConfig) -> Self {
        let guard = MutationGuard::new(repo.clone());
        Self {
            repo,
            catalog,
            guard,
            config,
        }
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn catalog(&self) -> &Arc<KindCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
