use crate::db::*;
use crate::types::{LaunchMethod, JobId, LaunchConfig, GameRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

fn record(id: &str) -> GameRecord {
    GameRecord::completed(
        JobId::from(id),
        format!("{}.zip", id),
        PathBuf::from(format!("/games/{}.zip", id)),
    )
}

fn wine(exe: &str) -> LaunchConfig {
    LaunchConfig {
        executable_path: exe.to_string(),
        launch_method: LaunchMethod::Wine,
        custom_command: None,
    }
}

#[tokio::test]
async fn test_upsert_and_get_game() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let game = record("doom");
    db.upsert_game(&game).await.unwrap();

    let loaded = db.get_game(&game.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, game.id);
    assert_eq!(loaded.filename, "doom.zip");
    assert_eq!(loaded.path, Path::new("/games/doom.zip"));
    assert!(!loaded.extracted);
    assert!(loaded.extracted_path.is_none());
    assert!(loaded.launch_config.is_none());
    assert_eq!(
        loaded.downloaded_at.timestamp(),
        game.downloaded_at.timestamp()
    );

    db.close().await;
}

#[tokio::test]
async fn test_get_missing_game_returns_none() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    assert!(db.get_game(&JobId::from("nope")).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_upsert_replaces_existing_record() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut game = record("quake");
    db.upsert_game(&game).await.unwrap();

    game.path = PathBuf::from("/elsewhere/quake.zip");
    game.launch_config = Some(wine("quake.exe"));
    db.upsert_game(&game).await.unwrap();

    let all = db.list_games().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].path, Path::new("/elsewhere/quake.zip"));
    assert_eq!(all[0].launch_config, Some(wine("quake.exe")));

    db.close().await;
}

#[tokio::test]
async fn test_mark_extracted() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let game = record("hexen");
    db.upsert_game(&game).await.unwrap();

    assert!(
        db.mark_extracted(&game.id, Path::new("/games/hexen"))
            .await
            .unwrap()
    );
    let loaded = db.get_game(&game.id).await.unwrap().unwrap();
    assert!(loaded.extracted);
    assert_eq!(loaded.extracted_path, Some(PathBuf::from("/games/hexen")));

    assert!(
        !db.mark_extracted(&JobId::from("ghost"), Path::new("/x"))
            .await
            .unwrap()
    );

    db.close().await;
}

#[tokio::test]
async fn test_set_launch_config_keeps_icon_when_not_given() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let game = record("heretic");
    db.upsert_game(&game).await.unwrap();

    assert!(
        db.set_launch_config(&game.id, &wine("a.exe"), Some(Path::new("/icons/h.png")))
            .await
            .unwrap()
    );
    assert!(
        db.set_launch_config(&game.id, &wine("b.exe"), None)
            .await
            .unwrap()
    );

    let loaded = db.get_game(&game.id).await.unwrap().unwrap();
    assert_eq!(loaded.launch_config, Some(wine("b.exe")));
    assert_eq!(loaded.icon_path, Some(PathBuf::from("/icons/h.png")));

    assert!(
        !db.set_launch_config(&JobId::from("ghost"), &wine("c.exe"), None)
            .await
            .unwrap()
    );

    db.close().await;
}

#[tokio::test]
async fn test_list_games_in_download_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let mut older = record("older");
    older.downloaded_at -= chrono::Duration::hours(1);
    let newer = record("newer");

    db.upsert_game(&newer).await.unwrap();
    db.upsert_game(&older).await.unwrap();

    let ids: Vec<String> = db
        .list_games()
        .await
        .unwrap()
        .into_iter()
        .map(|g| g.id.0)
        .collect();
    assert_eq!(ids, vec!["older", "newer"]);

    db.close().await;
}

#[tokio::test]
async fn test_concurrent_upserts_are_not_lost() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.upsert_game(&record(&format!("game-{}", i))).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.list_games().await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_corrupt_launch_config_is_a_storage_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let game = record("bad");
    db.upsert_game(&game).await.unwrap();
    sqlx::query("UPDATE games SET launch_config = 'not json' WHERE id = 'bad'")
        .execute(db.pool())
        .await
        .unwrap();

    let err = db.get_game(&game.id).await.unwrap_err();
    assert!(matches!(
        err,
        crate::error::Error::Storage(crate::error::StorageError::QueryFailed(_))
    ));

    db.close().await;
}

#[tokio::test]
async fn test_query_after_close_returns_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    db.upsert_game(&record("x")).await.unwrap();

    db.pool.close().await;

    assert!(db.get_game(&JobId::from("x")).await.is_err());
    assert!(db.upsert_game(&record("y")).await.is_err());
}
