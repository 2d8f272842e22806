//! Snapshot export/import round-trip tests.

use tokio_util::sync::CancellationToken;
use workgraph::domain::{Priority, TaskMetadata};
use workgraph::guard::CallContext;
use workgraph::service::{CreateProjectInput, CreateTaskInput, DeleteMode};
use workgraph::snapshot::{export_snapshot, import_snapshot, SnapshotDoc};
use workgraph::store::{MemoryRepository, Repository};
use workgraph::{AppState, Config};

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

fn user() -> CallContext {
    CallContext::user("maria")
}

async fn seeded_state() -> AppState {
    let state = AppState::in_memory(Config::default());
    let project = state
        .service
        .create_project_with_metadata(
            &user(),
            CreateProjectInput {
                name: "Roadmap".to_string(),
                ..CreateProjectInput::default()
            },
        )
        .await
        .unwrap();
    let parent = state
        .service
        .create_task(
            &user(),
            CreateTaskInput {
                project_id: project.id,
                parent_id: None,
                kind: "task".to_string(),
                scope: "task".to_string(),
                column_id: None,
                title: "Parent".to_string(),
                description: "top".to_string(),
                priority: Priority::High,
                due_at: None,
                labels: vec!["core".to_string()],
                metadata: TaskMetadata::default(),
            },
        )
        .await
        .unwrap();
    let child = state
        .service
        .create_task(
            &user(),
            CreateTaskInput {
                project_id: project.id,
                parent_id: Some(parent.id),
                kind: "subtask".to_string(),
                scope: "subtask".to_string(),
                column_id: None,
                title: "Child".to_string(),
                description: String::new(),
                priority: Priority::Medium,
                due_at: None,
                labels: Vec::new(),
                metadata: TaskMetadata::default(),
            },
        )
        .await
        .unwrap();
    state
        .service
        .delete_task(&user(), child.id, DeleteMode::Archive)
        .await
        .unwrap();
    state
}

#[tokio::test]
async fn test_export_import_round_trip() {
    let state = seeded_state().await;
    let doc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();
    assert_eq!(doc.version, "v1");
    assert_eq!(doc.projects.len(), 1);
    assert_eq!(doc.columns.len(), 3);
    assert_eq!(doc.tasks.len(), 2);

    let target = MemoryRepository::new();
    let summary = import_snapshot(&target, &cancel(), doc.clone()).await.unwrap();
    assert_eq!(summary.projects, 1);
    assert_eq!(summary.columns, 3);
    assert_eq!(summary.tasks, 2);

    let reexported = export_snapshot(&target, &cancel()).await.unwrap();
    assert_eq!(reexported.projects, doc.projects);
    assert_eq!(reexported.columns, doc.columns);
    assert_eq!(reexported.tasks, doc.tasks);
}

#[tokio::test]
async fn test_import_is_an_upsert() {
    let state = seeded_state().await;
    let mut doc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();
    doc.tasks[0].title = "Renamed".to_string();

    let summary = import_snapshot(state.repo.as_ref(), &cancel(), doc.clone())
        .await
        .unwrap();
    assert_eq!(summary.tasks, 2);
    let task = state
        .repo
        .get_task(&cancel(), doc.tasks[0].id)
        .await
        .unwrap();
    assert_eq!(task.title, "Renamed");
}

#[tokio::test]
async fn test_import_rejects_unknown_version() {
    let state = seeded_state().await;
    let mut doc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();
    doc.version = "v2".to_string();
    let err = import_snapshot(&MemoryRepository::new(), &cancel(), doc)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_request");
}

#[tokio::test]
async fn test_import_rejects_duplicate_ids() {
    let state = seeded_state().await;
    let mut doc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();
    let dup = doc.tasks[0].clone();
    doc.tasks.push(dup);
    let err = import_snapshot(&MemoryRepository::new(), &cancel(), doc)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("duplicate task id"));
}

#[tokio::test]
async fn test_import_rejects_dangling_references() {
    let state = seeded_state().await;
    let doc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();

    // dangling column ref
    let mut broken = doc.clone();
    broken.tasks[0].column_id = uuid::Uuid::new_v4();
    let err = import_snapshot(&MemoryRepository::new(), &cancel(), broken)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing column"));

    // dangling parent ref
    let mut broken = doc.clone();
    for task in &mut broken.tasks {
        if task.parent_id.is_some() {
            task.parent_id = Some(uuid::Uuid::new_v4());
        }
    }
    let err = import_snapshot(&MemoryRepository::new(), &cancel(), broken)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing parent"));

    // dangling project ref
    let mut broken = doc;
    broken.columns[0].project_id = uuid::Uuid::new_v4();
    let err = import_snapshot(&MemoryRepository::new(), &cancel(), broken)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing project"));
}

#[tokio::test]
async fn test_import_defaults_empty_kind_and_scope() {
    let state = seeded_state().await;
    let mut doc: SnapshotDoc = export_snapshot(state.repo.as_ref(), &cancel()).await.unwrap();
    let legacy_id = doc.tasks[0].id;
    doc.tasks[0].kind = String::new();
    doc.tasks[0].scope = String::new();

    let target = MemoryRepository::new();
    import_snapshot(&target, &cancel(), doc).await.unwrap();
    let task = target.get_task(&cancel(), legacy_id).await.unwrap();
    assert_eq!(task.kind, "task");
    assert_eq!(task.scope, "task");
}
