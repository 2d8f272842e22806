//! Capture-state synthesizer integration tests.

use tokio_util::sync::CancellationToken;
use workgraph::capture::CaptureView;
use workgraph::domain::{Priority, ScopeType, TaskMetadata};
use workgraph::guard::CallContext;
use workgraph::service::{
    CreateProjectInput, CreateTaskInput, RaiseAttentionInput, UpdateTaskInput,
};
use workgraph::{AppState, Config};

fn state() -> AppState {
    AppState::in_memory(Config::default())
}

fn user() -> CallContext {
    CallContext::user("maria")
}

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

async fn make_project(state: &AppState, name: &str) -> workgraph::domain::Project {
    state
        .service
        .create_project_with_metadata(
            &user(),
            CreateProjectInput {
                name: name.to_string(),
                ..CreateProjectInput::default()
            },
        )
        .await
        .unwrap()
}

fn task_input(project: uuid::Uuid, title: &str) -> CreateTaskInput {
    CreateTaskInput {
        project_id: project,
        parent_id: None,
        kind: "task".to_string(),
        scope: "task".to_string(),
        column_id: None,
        title: title.to_string(),
        description: String::new(),
        priority: Priority::Medium,
        due_at: None,
        labels: Vec::new(),
        metadata: TaskMetadata::default(),
    }
}

#[tokio::test]
async fn test_empty_store_requires_bootstrap() {
    let state = state();
    let err = state
        .capture
        .capture_state(&cancel(), "any", None, None, CaptureView::Summary)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bootstrap_required");
}

#[tokio::test]
async fn test_capture_is_deterministic_until_mutated() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let task = state
        .service
        .create_task(&user(), task_input(project.id, "One"))
        .await
        .unwrap();

    let first = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();
    let second = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();
    assert_eq!(first.state_hash, second.state_hash);
    assert_eq!(first.state_hash.len(), 64);

    state
        .service
        .update_task(
            &user(),
            task.id,
            UpdateTaskInput {
                description: Some("changed".to_string()),
                ..UpdateTaskInput::default()
            },
        )
        .await
        .unwrap();
    let third = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();
    assert_ne!(first.state_hash, third.state_hash);
}

#[tokio::test]
async fn test_capture_overviews_and_warnings() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let task = state
        .service
        .create_task(&user(), task_input(project.id, "Watched"))
        .await
        .unwrap();
    let mut blocked = task_input(project.id, "Blocked");
    blocked.metadata.blocked_reason = "waiting on vendor".to_string();
    state.service.create_task(&user(), blocked).await.unwrap();

    state
        .service
        .raise_attention_item(
            &user(),
            RaiseAttentionInput {
                project_id: project.id,
                scope_type: Some("task".to_string()),
                scope_id: Some(task.id.to_string()),
                kind: "approval_required".to_string(),
                summary: "Sign-off needed".to_string(),
                body_md: String::new(),
                requires_user_action: true,
            },
        )
        .await
        .unwrap();

    let bundle = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();

    assert_eq!(bundle.goal_overview.name, "Roadmap");
    assert_eq!(bundle.work_overview.total, 2);
    assert_eq!(bundle.work_overview.todo, 2);
    assert_eq!(bundle.work_overview.with_open_blockers, 1);
    assert!(bundle.attention_overview.available);
    assert_eq!(bundle.attention_overview.open_count, 1);
    assert_eq!(bundle.attention_overview.requires_user_action_count, 1);
    assert!(bundle
        .warnings_overview
        .iter()
        .any(|w| w.contains("attention items require user action")));
    assert!(bundle
        .warnings_overview
        .iter()
        .any(|w| w.contains("open blockers")));
    assert!(!bundle.resume_hints.is_empty());
    assert!(bundle
        .resume_hints
        .contains(&"list_attention_items".to_string()));
    // summary view omits row data
    assert!(bundle.tasks.is_none());
    assert!(bundle.columns.is_none());
    // second resolution timestamp
    assert_eq!(bundle.captured_at.timestamp_subsec_nanos(), 0);
}

#[tokio::test]
async fn test_capture_scope_path_walks_ancestors() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let parent = state
        .service
        .create_task(&user(), task_input(project.id, "Parent"))
        .await
        .unwrap();
    let mut child_input = task_input(project.id, "Child");
    child_input.parent_id = Some(parent.id);
    child_input.kind = "subtask".to_string();
    child_input.scope = "subtask".to_string();
    let child = state
        .service
        .create_task(&user(), child_input)
        .await
        .unwrap();

    let bundle = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            Some("subtask"),
            Some(&child.id.to_string()),
            CaptureView::Full,
        )
        .await
        .unwrap();

    let path: Vec<(ScopeType, &str)> = bundle
        .scope_path
        .iter()
        .map(|e| (e.scope_type, e.name.as_str()))
        .collect();
    assert_eq!(
        path,
        vec![
            (ScopeType::Project, "Roadmap"),
            (ScopeType::Task, "Parent"),
            (ScopeType::Subtask, "Child"),
        ]
    );
    assert!(bundle.tasks.is_some());
    assert!(bundle.columns.is_some());
    assert!(bundle
        .resume_hints
        .contains(&"list_child_tasks".to_string()));
}

#[tokio::test]
async fn test_capture_scope_errors() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;

    let err = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            Some("galaxy"),
            Some("x"),
            CaptureView::Summary,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_scope");

    let err = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            Some("task"),
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_scope");

    // a project id that parses but does not exist
    let err = state
        .capture
        .capture_state(
            &cancel(),
            &uuid::Uuid::new_v4().to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_resolving_attention_changes_hash() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let item = state
        .service
        .raise_attention_item(
            &user(),
            RaiseAttentionInput {
                project_id: project.id,
                scope_type: None,
                scope_id: None,
                kind: "blocker".to_string(),
                summary: "hold".to_string(),
                body_md: String::new(),
                requires_user_action: false,
            },
        )
        .await
        .unwrap();

    let before = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();
    state
        .service
        .resolve_attention_item(&user(), item.id)
        .await
        .unwrap();
    let after = state
        .capture
        .capture_state(
            &cancel(),
            &project.id.to_string(),
            None,
            None,
            CaptureView::Summary,
        )
        .await
        .unwrap();
    assert_ne!(before.state_hash, after.state_hash);
    assert_eq!(after.attention_overview.open_count, 0);
}
