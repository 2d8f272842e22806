//! Kind catalog: global kind definitions, project allow-lists, built-in
//! bootstrap, and payload validation through the compiled-schema cache.

pub mod builtin;

use crate::domain::{KindDef, KindTemplate};
use crate::error::{PlannerError, Result};
use crate::schema::SchemaCache;
use crate::store::Repository;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub struct KindCatalog {
    repo: Arc<dyn Repository>,
    schemas: SchemaCache,
    /// Set exactly once, on successful seeding.
    bootstrap: OnceCell<()>,
    /// A real seeding failure is sticky for the process lifetime so partial
    /// seeding is never retried. Cancellation is not a failure.
    bootstrap_failure: std::sync::Mutex<Option<PlannerError>>,
}

impl KindCatalog {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            schemas: SchemaCache::new(),
            bootstrap: OnceCell::new(),
            bootstrap_failure: std::sync::Mutex::new(None),
        }
    }

    /// Seed the built-in kinds if the catalog is empty. Runs at most once
    /// per process; concurrent callers observe the single outcome.
    pub async fn ensure_bootstrap(&self, cancel: &CancellationToken) -> Result<()> {
        if let Some(err) = self.bootstrap_failure.lock().expect("bootstrap lock").clone() {
            return Err(err);
        }
        self.bootstrap
            .get_or_try_init(|| async {
                match self.seed(cancel).await {
                    Ok(()) => Ok(()),
                    Err(PlannerError::Cancelled) => Err(PlannerError::Cancelled),
                    Err(e) => {
                        *self.bootstrap_failure.lock().expect("bootstrap lock") =
                            Some(e.clone());
                        Err(e)
                    }
                }
            })
            .await
            .map(|_| ())
    }

    async fn seed(&self, cancel: &CancellationToken) -> Result<()> {
        let existing = self.repo.list_kinds(cancel, true).await?;
        if !existing.is_empty() {
            return Ok(());
        }
        info!("seeding built-in kind catalog");
        for kind in builtin::builtin_kinds()? {
            self.repo.create_kind(cancel, &kind).await?;
        }
        Ok(())
    }

    pub async fn get_kind(&self, cancel: &CancellationToken, id: &str) -> Result<KindDef> {
        self.ensure_bootstrap(cancel).await?;
        self.repo.get_kind(cancel, &id.trim().to_ascii_lowercase()).await
    }

    pub async fn list_kinds(
        &self,
        cancel: &CancellationToken,
        include_archived: bool,
    ) -> Result<Vec<KindDef>> {
        self.ensure_bootstrap(cancel).await?;
        self.repo.list_kinds(cancel, include_archived).await
    }

    /// Create or update a kind. The payload schema is compiled up front so a
    /// broken schema never lands in the catalog; `created_at` is preserved
    /// on update and the compiled-schema cache entry is invalidated.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_kind(
        &self,
        cancel: &CancellationToken,
        id: &str,
        display_name: &str,
        description_md: &str,
        applies_to: &[String],
        allowed_parent_scopes: &[String],
        payload_schema: Option<Value>,
        template: KindTemplate,
    ) -> Result<KindDef> {
        self.ensure_bootstrap(cancel).await?;
        let mut kind = KindDef::new(
            id,
            display_name,
            description_md,
            applies_to,
            allowed_parent_scopes,
            payload_schema,
            template,
        )?;
        if let Some(schema) = &kind.payload_schema {
            crate::schema::CompiledSchema::compile(schema)?;
        }
        match self.repo.get_kind(cancel, &kind.id).await {
            Ok(existing) => {
                kind.created_at = existing.created_at;
                self.repo.update_kind(cancel, &kind).await?;
            }
            Err(PlannerError::KindNotFound(_)) => {
                self.repo.create_kind(cancel, &kind).await?;
            }
            Err(e) => return Err(e),
        }
        self.schemas.invalidate(&kind.id);
        Ok(kind)
    }

    /// The kinds a project may use: its explicit allow-list when non-empty,
    /// else every active catalog kind with at least one `applies_to` entry.
    pub async fn resolve_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
    ) -> Result<Vec<String>> {
        self.ensure_bootstrap(cancel).await?;
        let explicit = self
            .repo
            .list_project_allowed_kinds(cancel, project_id)
            .await?;
        if !explicit.is_empty() {
            return Ok(explicit);
        }
        Ok(self
            .repo
            .list_kinds(cancel, false)
            .await?
            .into_iter()
            .filter(|k| !k.applies_to.is_empty())
            .map(|k| k.id)
            .collect())
    }

    /// Replace a project's allow-list. Every referenced kind must exist and
    /// the list must be non-empty.
    pub async fn set_allowed_kinds(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        kind_ids: &[String],
    ) -> Result<Vec<String>> {
        self.ensure_bootstrap(cancel).await?;
        let mut normalized: Vec<String> = Vec::with_capacity(kind_ids.len());
        for id in kind_ids {
            let id = id.trim().to_ascii_lowercase();
            if id.is_empty() {
                continue;
            }
            self.repo.get_kind(cancel, &id).await?;
            if !normalized.contains(&id) {
                normalized.push(id);
            }
        }
        if normalized.is_empty() {
            return Err(PlannerError::KindNotAllowed(
                "allowed-kinds list must name at least one kind".into(),
            ));
        }
        self.repo
            .set_project_allowed_kinds(cancel, project_id, &normalized)
            .await?;
        Ok(normalized)
    }

    /// Validate a kind against a project's allow-list plus the scope rules,
    /// returning the definition for template use.
    pub async fn check_task_kind(
        &self,
        cancel: &CancellationToken,
        project_id: Uuid,
        kind_id: &str,
        scope: &str,
        parent_scope: Option<&str>,
    ) -> Result<KindDef> {
        let kind = self.get_kind(cancel, kind_id).await?;
        if kind.is_archived() {
            return Err(PlannerError::KindNotAllowed(format!(
                "kind '{}' is archived",
                kind.id
            )));
        }
        let allowed = self.resolve_allowed_kinds(cancel, project_id).await?;
        if !allowed.iter().any(|k| k == &kind.id) {
            return Err(PlannerError::KindNotAllowed(format!(
                "kind '{}' is not allowed in this project",
                kind.id
            )));
        }
        if !kind.applies_to_scope(scope) {
            return Err(PlannerError::KindNotAllowed(format!(
                "kind '{}' does not apply to {scope} scope",
                kind.id
            )));
        }
        if let Some(parent_scope) = parent_scope {
            if !kind.allows_parent_scope(parent_scope) {
                return Err(PlannerError::KindNotAllowed(format!(
                    "kind '{}' may not sit under a {parent_scope} parent",
                    kind.id
                )));
            }
        }
        Ok(kind)
    }

    /// Validate a kind payload against the kind's compiled schema.
    pub fn check_payload(&self, kind: &KindDef, payload: &Value) -> Result<()> {
        let Some(schema) = &kind.payload_schema else {
            return Ok(());
        };
        let compiled = self.schemas.get_or_compile(&kind.id, schema)?;
        compiled.1.validate(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Project, ProjectMetadata};
    use crate::store::MemoryRepository;
    use serde_json::json;

    fn setup() -> (Arc<MemoryRepository>, KindCatalog, CancellationToken) {
        let repo = Arc::new(MemoryRepository::new());
        let catalog = KindCatalog::new(repo.clone());
        (repo, catalog, CancellationToken::new())
    }

    async fn project(repo: &MemoryRepository, cancel: &CancellationToken) -> Project {
        let p = Project::new("Roadmap", "", None, ProjectMetadata::default()).unwrap();
        repo.create_project(cancel, &p).await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_builtins_once() {
        let (_, catalog, cancel) = setup();
        catalog.ensure_bootstrap(&cancel).await.unwrap();
        let kinds = catalog.list_kinds(&cancel, false).await.unwrap();
        let ids: Vec<&str> = kinds.iter().map(|k| k.id.as_str()).collect();
        for expected in [
            "project", "branch", "phase", "subphase", "task", "subtask", "decision", "note",
        ] {
            assert!(ids.contains(&expected), "missing builtin '{expected}'");
        }
        // second call is a no-op
        catalog.ensure_bootstrap(&cancel).await.unwrap();
        assert_eq!(catalog.list_kinds(&cancel, false).await.unwrap().len(), kinds.len());
    }

    #[tokio::test]
    async fn test_allow_list_fallback_and_explicit() {
        let (repo, catalog, cancel) = setup();
        let p = project(&repo, &cancel).await;
        let all = catalog.resolve_allowed_kinds(&cancel, p.id).await.unwrap();
        assert!(all.contains(&"task".to_string()));

        catalog
            .set_allowed_kinds(&cancel, p.id, &["task".into(), "subtask".into()])
            .await
            .unwrap();
        let explicit = catalog.resolve_allowed_kinds(&cancel, p.id).await.unwrap();
        assert_eq!(explicit, vec!["task", "subtask"]);
    }

    #[tokio::test]
    async fn test_set_allow_list_rejects_unknown_and_empty() {
        let (repo, catalog, cancel) = setup();
        let p = project(&repo, &cancel).await;
        let err = catalog
            .set_allowed_kinds(&cancel, p.id, &["galaxy".into()])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "kind_not_found");
        let err = catalog.set_allowed_kinds(&cancel, p.id, &[]).await.unwrap_err();
        assert_eq!(err.code(), "kind_not_allowed");
    }

    #[tokio::test]
    async fn test_check_task_kind_rules() {
        let (repo, catalog, cancel) = setup();
        let p = project(&repo, &cancel).await;

        catalog
            .check_task_kind(&cancel, p.id, "task", "task", Some("phase"))
            .await
            .unwrap();

        let err = catalog
            .check_task_kind(&cancel, p.id, "task", "branch", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "kind_not_allowed");

        let err = catalog
            .check_task_kind(&cancel, p.id, "subtask", "subtask", Some("phase"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "kind_not_allowed");

        catalog
            .set_allowed_kinds(&cancel, p.id, &["note".into()])
            .await
            .unwrap();
        let err = catalog
            .check_task_kind(&cancel, p.id, "task", "task", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "kind_not_allowed");
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at_and_invalidates_cache() {
        let (_, catalog, cancel) = setup();
        let schema = json!({"type": "object", "required": ["url"],
                            "properties": {"url": {"type": "string"}}});
        let v1 = catalog
            .upsert_kind(
                &cancel,
                "deploy",
                "Deploy",
                "",
                &["task".into()],
                &["phase".into()],
                Some(schema),
                KindTemplate::default(),
            )
            .await
            .unwrap();
        catalog
            .check_payload(&v1, &json!({"url": "https://example.test"}))
            .unwrap();
        let err = catalog.check_payload(&v1, &json!({})).unwrap_err();
        assert_eq!(err.code(), "invalid_kind_payload");

        let v2 = catalog
            .upsert_kind(
                &cancel,
                "deploy",
                "Deploy",
                "",
                &["task".into()],
                &["phase".into()],
                Some(json!({"type": "object"})),
                KindTemplate::default(),
            )
            .await
            .unwrap();
        assert_eq!(v2.created_at, v1.created_at);
        catalog.check_payload(&v2, &json!({})).unwrap();
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_schema() {
        let (_, catalog, cancel) = setup();
        let err = catalog
            .upsert_kind(
                &cancel,
                "deploy",
                "Deploy",
                "",
                &["task".into()],
                &[],
                Some(json!({"type": "quantum"})),
                KindTemplate::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_kind_payload_schema");
    }
}
