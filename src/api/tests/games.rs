use super::*;
use serde_json::json;

async fn write_game_file(downloader: &Downloader, name: &str) -> std::path::PathBuf {
    let path = downloader.get_config().download.download_dir.join(name);
    tokio::fs::write(&path, b"game bytes").await.unwrap();
    path
}

#[tokio::test]
async fn test_list_games_empty() {
    let (app, _downloader, _temp_dir) = test_app().await;

    let response = app.oneshot(get("/api/v1/games")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_register_manual_download() {
    let (app, downloader, _temp_dir) = test_app().await;
    let path = write_game_file(&downloader, "manual.zip").await;

    let response = app
        .clone()
        .oneshot(send_json(
            "POST",
            "/api/v1/games/manual",
            json!({"id": "m1", "filename": "manual.zip", "path": path}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = json_body(response).await;
    assert_eq!(record["id"], "m1");
    assert_eq!(record["extracted"], false);

    let response = app.clone().oneshot(get("/api/v1/games")).await.unwrap();
    let games = json_body(response).await;
    assert_eq!(games.as_array().unwrap().len(), 1);

    // Registered files show up as completed jobs too
    let response = app.oneshot(get("/api/v1/downloads/m1")).await.unwrap();
    assert_eq!(json_body(response).await["status"], "completed");
}

#[tokio::test]
async fn test_register_manual_download_generates_id() {
    let (app, downloader, _temp_dir) = test_app().await;
    let path = write_game_file(&downloader, "noid.zip").await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/v1/games/manual",
            json!({"filename": "noid.zip", "path": path}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let record = json_body(response).await;
    assert!(!record["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_register_manual_download_missing_file() {
    let (app, _downloader, temp_dir) = test_app().await;

    let response = app
        .oneshot(send_json(
            "POST",
            "/api/v1/games/manual",
            json!({"filename": "gone.zip", "path": temp_dir.path().join("gone.zip")}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_launch_config() {
    let (app, downloader, temp_dir) = test_app().await;
    let path = write_game_file(&downloader, "launch.zip").await;
    downloader
        .register_manual_download(&JobId::new("l1"), "launch.zip", &path)
        .await
        .unwrap();

    let icon = temp_dir.path().join("icon.png");
    let response = app
        .clone()
        .oneshot(send_json(
            "PUT",
            "/api/v1/games/l1/launch-config",
            json!({
                "executable_path": "game/start.exe",
                "launch_method": "wine",
                "icon_path": icon,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = json_body(response).await;
    assert_eq!(record["launch_config"]["launch_method"], "wine");
    assert_eq!(record["icon_path"], json!(icon));

    let response = app.oneshot(get("/api/v1/games/l1")).await.unwrap();
    let stored = json_body(response).await;
    assert_eq!(stored["launch_config"]["executable_path"], "game/start.exe");
}

#[tokio::test]
async fn test_game_not_found() {
    let (app, _downloader, _temp_dir) = test_app().await;

    let response = app
        .clone()
        .oneshot(get("/api/v1/games/missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(send_json(
            "PUT",
            "/api/v1/games/missing/launch-config",
            json!({"executable_path": "a.exe", "launch_method": "direct"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
