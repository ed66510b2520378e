use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use okr_harness::config::Config;
use okr_harness::engine::OkrEngine;
use okr_harness::server::build_router;

async fn spawn_server() -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    let okrs = tmp.path().join("okrs");
    fs::create_dir_all(&okrs).unwrap();
    fs::write(
        okrs.join("platform.md"),
        "---\nteam: Platform\nquarter: 2025-Q3\n---\n# Objective: Improve reliability\n\n- KR1: Reduce P99 latency by 30%\n",
    )
    .unwrap();
    fs::write(
        okrs.join("sales.md"),
        "---\nteam: Sales\nquarter: 2025-Q4\n---\n# Objective: Grow enterprise revenue\n\n- KR1: Close 20 enterprise deals\n",
    )
    .unwrap();

    let mut config = Config::default();
    config.corpus.dir = okrs;
    config.embedding.provider = "hash".to_string();

    let engine = Arc::new(OkrEngine::from_config(&config).unwrap());
    let app = build_router(engine, config.retrieval.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (tmp, format!("http://{}", addr))
}

#[tokio::test]
async fn test_health_and_refresh() {
    let (_tmp, base) = spawn_server().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["documents"], 2);

    let refreshed: serde_json::Value = client
        .post(format!("{}/refresh", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(refreshed["status"], "refreshed");
    assert_eq!(refreshed["document_count"], 2);
    assert_eq!(refreshed["teams"], serde_json::json!(["Platform", "Sales"]));
}

#[tokio::test]
async fn test_ask_endpoint() {
    let (_tmp, base) = spawn_server().await;

    let resp = reqwest::get(format!("{}/ask?q=objectives%20for%20Platform", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();

    assert_eq!(body["query"], "objectives for Platform");
    assert_eq!(body["team"], "Platform");
    assert!(body.get("quarter").is_none());
    let bullets = body["bullets"].as_array().unwrap();
    assert!(bullets.contains(&serde_json::json!("Objective: Improve reliability")));
    for citation in body["citations"].as_array().unwrap() {
        assert_eq!(citation["path"], "platform.md");
    }
}

#[tokio::test]
async fn test_search_endpoint() {
    let (_tmp, base) = spawn_server().await;

    let hits: serde_json::Value = reqwest::get(format!("{}/search?q=enterprise&k=1", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["path"], "sales.md");
    assert!(hits[0]["snippet"].as_str().unwrap().contains("enterprise"));
}

#[tokio::test]
async fn test_short_query_is_bad_request() {
    let (_tmp, base) = spawn_server().await;

    for url in [
        format!("{}/search?q=a", base),
        format!("{}/ask", base),
        format!("{}/download?q=", base),
    ] {
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 400, "{}", url);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "bad_request");
    }
}

#[tokio::test]
async fn test_download_endpoint() {
    let (_tmp, base) = spawn_server().await;

    let resp = reqwest::get(format!("{}/download?q=reliability&format=csv", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/csv");
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"okrs.csv\""
    );
    let text = resp.text().await.unwrap();
    assert!(text.starts_with("path,team,quarter,snippet"));
    assert!(text.contains("platform.md,Platform,2025-Q3,"));

    let resp = reqwest::get(format!("{}/download?q=reliability", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/zip");
    let bytes = resp.bytes().await.unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    assert_eq!(archive.len(), 2);
}

#[tokio::test]
async fn test_unsupported_format() {
    let (_tmp, base) = spawn_server().await;

    let resp = reqwest::get(format!("{}/download?q=reliability&format=pdf", base))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unsupported_format");
}

#[tokio::test]
async fn test_teams_and_quarters_endpoints() {
    let (_tmp, base) = spawn_server().await;

    let teams: serde_json::Value = reqwest::get(format!("{}/teams?quarter=2025-q3", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(teams["teams"], serde_json::json!(["Platform"]));

    let quarters: serde_json::Value = reqwest::get(format!("{}/quarters", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quarters["quarters"], serde_json::json!(["2025-Q3", "2025-Q4"]));
}
