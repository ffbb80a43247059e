//! Admin API tests against a live listener.

use std::net::SocketAddr;

use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value as Json};

use sip_cfg::admin::{self, AdminState};
use sip_cfg::{Shutdown, Value};

mod common;

const KEY: &str = "test-key";

struct Harness {
    addr: SocketAddr,
    client: Client,
    state: AdminState,
    _shutdown: Shutdown,
}

impl Harness {
    async fn start() -> Self {
        let state = AdminState::new(common::net_store(), KEY);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        tokio::spawn(admin::serve(listener, state.clone(), shutdown.subscribe()));

        let client = Client::builder().no_proxy().build().unwrap();
        Self {
            addr,
            client,
            state,
            _shutdown: shutdown,
        }
    }

    async fn call(&self, method: Method, path: &str, body: Option<Json>) -> (StatusCode, Json) {
        let mut request = self
            .client
            .request(method, format!("http://{}{}", self.addr, path))
            .bearer_auth(KEY);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let res = request.send().await.expect("admin API unreachable");
        let status = res.status();
        let text = res.text().await.unwrap();
        let json = if text.is_empty() {
            Json::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, json)
    }

    async fn open_session(&self) -> String {
        let (status, body) = self.call(Method::POST, "/admin/sessions", None).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_key() {
    let h = Harness::start().await;
    let url = format!("http://{}/admin/status", h.addr);

    let res = h.client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = h.client.get(&url).bearer_auth("nope").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status_and_groups() {
    let h = Harness::start().await;
    let (status, body) = h.call(Method::GET, "/admin/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["current_generation"], 0);
    assert_eq!(body["sessions"], 0);

    let (status, body) = h.call(Method::GET, "/admin/groups", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "net");
    assert_eq!(body[0]["variables"][0]["name"], "timeout");
    assert_eq!(body[0]["variables"][0]["max"], 3600);
}

#[tokio::test]
async fn test_get_and_set_variable() {
    let h = Harness::start().await;
    let (status, body) = h.call(Method::GET, "/admin/groups/net/timeout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], json!({"type": "int", "value": 30}));
    assert_eq!(body["info"]["max"], 3600);

    let (status, body) = h
        .call(Method::PUT, "/admin/groups/net/timeout", Some(json!({"input": "45"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["generation"], 1);
    assert_eq!(h.state.store.get("net", "timeout").unwrap(), Value::Int(45));

    let (status, _) = h
        .call(
            Method::PUT,
            "/admin/groups/net/timeout",
            Some(json!({"value": {"type": "int", "value": 4000}})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = h.call(Method::GET, "/admin/groups/net/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_transaction_flow() {
    let h = Harness::start().await;
    let id = h.open_session().await;

    let stage = format!("/admin/sessions/{}/changes/net/timeout", id);
    let (status, body) = h.call(Method::PUT, &stage, Some(json!({"input": "45"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending"], 1);

    let (status, body) = h.call(Method::GET, &format!("/admin/sessions/{}/diff", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["current"]["value"], 30);
    assert_eq!(body[0]["proposed"]["value"], 45);

    // Nothing visible before commit.
    assert_eq!(h.state.store.get("net", "timeout").unwrap(), Value::Int(30));

    let commit = format!("/admin/sessions/{}/commit", id);
    let (status, body) = h.call(Method::POST, &commit, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 1);
    assert_eq!(h.state.store.get("net", "timeout").unwrap(), Value::Int(45));

    let (status, body) = h.call(Method::DELETE, &format!("/admin/sessions/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discarded"], 0);
    assert!(h.state.sessions.is_empty());
}

#[tokio::test]
async fn test_rejected_stage_blocks_session_commit() {
    let h = Harness::start().await;
    let id = h.open_session().await;
    let stage = format!("/admin/sessions/{}/changes/net/timeout", id);

    h.call(Method::PUT, &stage, Some(json!({"input": "45"}))).await;
    let (status, _) = h.call(Method::PUT, &stage, Some(json!({"input": "4000"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = h.call(Method::POST, &format!("/admin/sessions/{}/commit", id), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(h.state.store.acquire_current().id(), 0);

    let rollback = format!("/admin/sessions/{}/rollback", id);
    let (status, body) = h.call(Method::POST, &rollback, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["discarded"], 1);
}

#[tokio::test]
async fn test_unknown_session() {
    let h = Harness::start().await;
    let path = format!("/admin/sessions/{}/diff", uuid::Uuid::new_v4());
    let (status, body) = h.call(Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("unknown session"));
}
