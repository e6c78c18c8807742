// Copyright (c) 2025 Nalu MCP Authors
//
// Licensed under dual license:
// - MIT License (LICENSE-MIT or https://opensource.org/licenses/MIT)
// - Apache License, Version 2.0 (LICENSE-APACHE or https://www.apache.org/licenses/LICENSE-2.0)

//! End-to-end test over a real socket: the server is built from
//! configuration, the search API and the result pages are served by mockito.

use std::net::SocketAddr;

use mockito::Matcher;
use nalu_mcp_lib::config::NaluConfig;
use nalu_mcp_lib::protocol::{PROTOCOL_VERSION_HEADER, SESSION_HEADER};
use nalu_mcp_lib::server::NaluServer;
use nalu_mcp_lib::transport::{serve_listener, HEALTH_PATH, MCP_PATH, SEARCH_KEY_HEADER};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Running {
    base: String,
    client: reqwest::Client,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn start(config: NaluConfig) -> Self {
        let server = NaluServer::build(config).await.unwrap();
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        let router = server.router();
        let task = tokio::spawn(async move {
            serve_listener(listener, router, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });
        Self {
            base,
            client: reqwest::Client::new(),
            stop: Some(stop),
            task,
        }
    }

    async fn post(&self, session: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self.client.post(format!("{}{MCP_PATH}", self.base)).json(&body);
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }
        request.send().await.unwrap()
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap();
    }
}

fn config_for(mock: &mockito::ServerGuard) -> NaluConfig {
    let mut config = NaluConfig::default();
    config.search.endpoint = format!("{}/customsearch/v1", mock.url());
    config.search.api_key = Some("configured-key".to_string());
    config.search.engine_id = Some("configured-cx".to_string());
    config
}

async fn mock_pages(mock: &mut mockito::ServerGuard) {
    mock.mock("GET", "/a")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html><head><title>A</title><script>var x = 1;</script></head><body><h1>Swell report</h1><p>Six feet at Sunset.</p></body></html>")
        .create_async()
        .await;
    mock.mock("GET", "/b")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("Winds light and variable.")
        .create_async()
        .await;
}

fn search_body(mock: &mockito::ServerGuard) -> String {
    json!({"items": [
        {"title": "Report A", "link": format!("{}/a", mock.url()), "snippet": "a"},
        {"title": "Report B", "link": format!("{}/b", mock.url()), "snippet": "b"},
    ]})
    .to_string()
}

#[tokio::test]
async fn test_full_session_over_http() {
    let mut mock = mockito::Server::new_async().await;
    mock_pages(&mut mock).await;
    let search = mock
        .mock("GET", "/customsearch/v1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("key".into(), "configured-key".into()),
            Matcher::UrlEncoded("num".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(search_body(&mock))
        .create_async()
        .await;

    let running = Running::start(config_for(&mock)).await;

    let health: Value = running
        .client
        .get(format!("{}{HEALTH_PATH}", running.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["tools"], json!(["search", "get_time"]));

    let init = running
        .post(
            None,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize",
                   "params": {"protocolVersion": "2024-11-05", "clientInfo": {"name": "it"}}}),
        )
        .await;
    assert_eq!(init.status(), 200);
    assert_eq!(init.headers()[PROTOCOL_VERSION_HEADER], "2024-11-05");
    let session = init.headers()[SESSION_HEADER].to_str().unwrap().to_string();
    let init_body: Value = init.json().await.unwrap();
    assert_eq!(init_body["result"]["protocolVersion"], "2024-11-05");

    let ack = running
        .post(
            Some(&session),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
    assert_eq!(ack.status(), 202);

    let called: Value = running
        .post(
            Some(&session),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "search", "arguments": {"query": "north shore", "num_results": 2}}}),
        )
        .await
        .json()
        .await
        .unwrap();
    let text = called["result"]["content"][0]["text"].as_str().unwrap();
    let payload: Value = serde_json::from_str(text).unwrap();
    assert_eq!(payload["total_results"], 2);
    assert_eq!(payload["results"][0]["scraped_content"], "Swell report Six feet at Sunset.");
    assert_eq!(payload["results"][1]["scraped_content"], "Winds light and variable.");
    search.assert_async().await;

    let closed = running
        .client
        .delete(format!("{}{MCP_PATH}", running.base))
        .header(SESSION_HEADER, &session)
        .send()
        .await
        .unwrap();
    assert_eq!(closed.status(), 204);

    let after = running
        .post(Some(&session), json!({"jsonrpc": "2.0", "id": 3, "method": "ping"}))
        .await;
    assert_eq!(after.status(), 404);

    running.shutdown().await;
}

#[tokio::test]
async fn test_credential_header_overrides_configuration() {
    let mut mock = mockito::Server::new_async().await;
    mock_pages(&mut mock).await;
    let search = mock
        .mock("GET", "/customsearch/v1")
        .match_query(Matcher::UrlEncoded("key".into(), "header-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(search_body(&mock))
        .create_async()
        .await;

    let running = Running::start(config_for(&mock)).await;
    let init = running
        .post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
        .await;
    let session = init.headers()[SESSION_HEADER].to_str().unwrap().to_string();

    let response = running
        .client
        .post(format!("{}{MCP_PATH}", running.base))
        .header(SESSION_HEADER, &session)
        .header(SEARCH_KEY_HEADER, "header-key")
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                      "params": {"name": "search", "arguments": {"query": "q", "num_results": 1}}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["isError"], false);
    search.assert_async().await;

    running.shutdown().await;
}

#[tokio::test]
async fn test_rejected_key_is_reported_in_band() {
    let mut mock = mockito::Server::new_async().await;
    mock.mock("GET", "/customsearch/v1")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#)
        .create_async()
        .await;

    let running = Running::start(config_for(&mock)).await;
    let init = running
        .post(None, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}))
        .await;
    let session = init.headers()[SESSION_HEADER].to_str().unwrap().to_string();

    let response = running
        .post(
            Some(&session),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call",
                   "params": {"name": "search", "arguments": {"query": "q"}}}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["isError"], true);
    let message = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(message.starts_with("Search authentication failed"), "{message}");

    running.shutdown().await;
}
