//! HTTP adapter tests over a real socket.

use pivot_core::core::EventFields;
use pivot_core::Application;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::helpers::*;

fn app() -> Application {
    let mut app = Application::new();
    app.get("/", |req, res| {
        res.header("x-powered-by", "pivot")
            .json(&json!({ "ip": req.ip(), "ua": req.user_agent() }));
        Ok(())
    })
    .unwrap();
    app.get("/users/:id<\\d+>", |req, res| {
        res.json(&json!({ "id": req.param("id"), "page": req.get("page") }));
        Ok(())
    })
    .unwrap();
    app.post("/echo", |req, res| {
        res.status(201).json(req.inputs());
        Ok(())
    })
    .unwrap();
    app.post("/upload", |req, res| {
        let content = req
            .file("doc")
            .and_then(|file| std::fs::read_to_string(&file.tmp_name).ok());
        res.json(&json!({
            "title": req.input("title"),
            "file": req.file("doc"),
            "content": content,
        }));
        Ok(())
    })
    .unwrap();
    app.get("/events", |_req, res| {
        for n in 1..=2u64 {
            let id = n.to_string();
            res.send_event(json!({ "tick": n }), EventFields::new().event("tick").id(&id))?;
        }
        res.end_stream()?;
        Ok(())
    })
    .unwrap();
    app
}

#[tokio::test]
async fn test_get_json() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
    assert_header_starts_with(&resp, "x-powered-by", "pivot");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ip"], "127.0.0.1");
}

#[tokio::test]
async fn test_route_params_and_query() {
    let server = TestServer::start(app()).await;
    let body: Value = server.get("/users/7?page=2").await.json().await.unwrap();
    assert_eq!(body, json!({ "id": 7, "page": "2" }));

    let resp = server.get("/users/abc").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Not Found");
    assert!(body["error_id"].as_str().unwrap().starts_with("err_"));
}

#[tokio::test]
async fn test_post_json_and_form() {
    let server = TestServer::start(app()).await;

    let resp = server.post_json("/echo", &json!({ "name": "Ana" })).await;
    assert_status(&resp, StatusCode::CREATED);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "name": "Ana" }));

    let resp = server.post_form("/echo", &[("a", "1"), ("b", "two words")]).await;
    assert_eq!(
        resp.json::<Value>().await.unwrap(),
        json!({ "a": "1", "b": "two words" })
    );
}

#[tokio::test]
async fn test_multipart_upload() {
    let server = TestServer::start(app()).await;
    let part = reqwest::multipart::Part::bytes(b"hello".to_vec())
        .file_name("hello.txt")
        .mime_str("text/plain")
        .unwrap();
    let form = reqwest::multipart::Form::new()
        .text("title", "greeting")
        .part("doc", part);

    let resp = server
        .client
        .post(server.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::OK);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["title"], "greeting");
    assert_eq!(body["file"]["name"], "hello.txt");
    assert_eq!(body["file"]["size"], 5);
    assert_eq!(body["file"]["error"], 0);

    assert_eq!(body["content"], "hello");

    // Temp files are removed once the handler has finished.
    let tmp = std::path::PathBuf::from(body["file"]["tmp_name"].as_str().unwrap());
    for _ in 0..50 {
        if !tmp.exists() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(!tmp.exists(), "upload temp file left behind: {}", tmp.display());
}

#[tokio::test]
async fn test_server_sent_events() {
    let server = TestServer::start(app()).await;
    let resp = server.get("/events").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "text/event-stream");
    assert_header_starts_with(&resp, "cache-control", "no-cache");

    let text = resp.text().await.unwrap();
    assert!(text.contains("id: 1\nevent: tick\ndata: {\"tick\":1}\n\n"));
    assert!(text.contains("id: 2\nevent: tick\ndata: {\"tick\":2}\n\n"));
}

#[tokio::test]
async fn test_body_limit() {
    let mut app = app();
    app.configure(|c| c.server.max_body_size = 16);
    let server = TestServer::start(app).await;

    let resp = server
        .client
        .post(server.url("/echo"))
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_status(&resp, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_graceful_shutdown_stops_accepting() {
    let server = TestServer::start(app()).await;
    assert_status(&server.get("/").await, StatusCode::OK);

    server.server.trigger_shutdown();
    assert!(
        server
            .server
            .wait_for_drain(std::time::Duration::from_secs(5))
            .await
    );
}
