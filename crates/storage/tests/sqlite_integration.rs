use exam_core::model::{AttemptId, Position};
use storage::repository::{CursorStore, Storage};
use storage::sqlite::SqliteCursorStore;
use uuid::Uuid;

fn attempt() -> AttemptId {
    AttemptId::new(Uuid::new_v4())
}

#[tokio::test]
async fn sqlite_cursor_round_trip_and_clear() {
    let repo = SqliteCursorStore::connect("sqlite:file:memdb_cursor_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let id = attempt();
    assert_eq!(repo.load_cursor(id).await.unwrap(), None);

    repo.save_cursor(id, Position::new(3).unwrap()).await.unwrap();
    repo.save_cursor(id, Position::new(12).unwrap()).await.unwrap();
    assert_eq!(repo.load_cursor(id).await.unwrap(), Position::new(12));

    repo.clear_cursor(id).await.unwrap();
    assert_eq!(repo.load_cursor(id).await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_cursors_do_not_leak_between_attempts() {
    let storage = Storage::sqlite("sqlite:file:memdb_cursor_scoped?mode=memory&cache=shared")
        .await
        .expect("storage");

    let first = attempt();
    let second = attempt();
    storage
        .cursors
        .save_cursor(first, Position::new(5).unwrap())
        .await
        .unwrap();

    assert_eq!(storage.cursors.load_cursor(second).await.unwrap(), None);
    storage.cursors.clear_cursor(second).await.unwrap();
    assert_eq!(
        storage.cursors.load_cursor(first).await.unwrap(),
        Position::new(5)
    );
}

#[tokio::test]
async fn sqlite_migrations_are_idempotent() {
    let repo = SqliteCursorStore::connect("sqlite:file:memdb_cursor_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let id = attempt();
    repo.save_cursor(id, Position::FIRST).await.unwrap();
    assert_eq!(repo.load_cursor(id).await.unwrap(), Some(Position::FIRST));
}
