//! Failure atomicity: a failed commit leaves the board exactly as it was

use taskboard::test_support::{add_tasks, board, column, memory_manager, titles, USER};
use taskboard::{BoardError, ErrorKind, TaskPatch};

#[tokio::test]
async fn test_failed_transfer_is_invisible() {
    let (storage, manager) = memory_manager();
    let todo = column(&manager, 0).await;
    let doing = column(&manager, 1).await;
    let tasks = add_tasks(&manager, &todo.id, &["A", "B", "C"]).await;
    add_tasks(&manager, &doing.id, &["X", "Y"]).await;
    let before = board(&manager).await;

    storage.fail_next_commits(1, ErrorKind::Storage);
    let err = manager
        .move_task(&tasks[0].id, &doing.id, Some(1), &USER.into())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let after = board(&manager).await;
    assert_eq!(before.columns, after.columns);
    assert_eq!(before.board.updated_at, after.board.updated_at);
}

#[tokio::test]
async fn test_failed_delete_keeps_task_and_order() {
    let (storage, manager) = memory_manager();
    let todo = column(&manager, 0).await;
    let tasks = add_tasks(&manager, &todo.id, &["A", "B", "C"]).await;

    storage.fail_next_commits(1, ErrorKind::Storage);
    manager
        .delete_task(&tasks[0].id, &USER.into())
        .await
        .unwrap_err();

    assert_eq!(titles(&manager, &todo.id).await, vec!["A", "B", "C"]);
    assert!(manager.get_task(&tasks[0].id).await.is_ok());
}

#[tokio::test]
async fn test_single_conflict_is_retried() {
    let (storage, manager) = memory_manager();
    let todo = column(&manager, 0).await;
    let tasks = add_tasks(&manager, &todo.id, &["A", "B", "C"]).await;

    storage.fail_next_commits(1, ErrorKind::Conflict);
    let moved = manager
        .move_task(&tasks[2].id, &todo.id, Some(0), &USER.into())
        .await
        .unwrap();
    assert_eq!(moved.position, 0);
    assert_eq!(titles(&manager, &todo.id).await, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn test_conflict_surfaces_after_retry_budget() {
    let (storage, manager) = memory_manager();
    let todo = column(&manager, 0).await;
    let tasks = add_tasks(&manager, &todo.id, &["A"]).await;

    storage.fail_next_commits(2, ErrorKind::Conflict);
    let err = manager
        .update_task(
            &tasks[0].id,
            &TaskPatch::new().with_title("renamed"),
            &USER.into(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Conflict { .. }));
    assert!(err.is_retryable());
    assert_eq!(titles(&manager, &todo.id).await, vec!["A"]);

    // The board recovers once the conflict clears
    manager
        .update_task(
            &tasks[0].id,
            &TaskPatch::new().with_title("renamed"),
            &USER.into(),
        )
        .await
        .unwrap();
    assert_eq!(titles(&manager, &todo.id).await, vec!["renamed"]);
}

#[tokio::test]
async fn test_board_creation_failure_leaves_nothing() {
    let (storage, manager) = memory_manager();
    storage.fail_next_commits(1, ErrorKind::Storage);

    let err = manager
        .get_or_create_board_view(&taskboard::test_support::PROJECT.into())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let view = board(&manager).await;
    assert_eq!(view.columns.len(), 3);
}
