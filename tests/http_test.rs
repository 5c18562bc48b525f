//! HttpTransport against a local one-shot HTTP responder.

use std::time::Duration;

use fetchq::config::Config;
use fetchq::config::secrets::SecretString;
use fetchq::{HttpTransport, Method, Queue, Request};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Accept one connection, capture the raw request, answer with `reply`.
async fn serve_once(reply: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        socket.write_all(reply.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(String::from_utf8_lossy(&raw).into_owned());
    });

    (format!("http://{addr}/items"), rx)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(end) = text.find("\r\n\r\n") else {
        return false;
    };
    let length = text[..end]
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    raw.len() >= end + 4 + length
}

const JSON_REPLY: &str = "HTTP/1.1 201 Created\r\n\
    Content-Type: application/json\r\n\
    Content-Length: 13\r\n\
    Connection: close\r\n\
    \r\n\
    {\"id\":\"w-1\"}\n";

#[tokio::test]
async fn posts_json_body_and_decodes_json_reply() {
    let (url, captured) = serve_once(JSON_REPLY).await;
    let queue = Queue::new(HttpTransport::default()).unwrap();

    let response = queue
        .post(Request::new(url).header("X-Trace", "abc").body(json!({"name": "widget"})))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.status_text, "Created");
    assert!(response.ok);
    assert_eq!(response.json, Some(json!({"id": "w-1"})));

    let raw = captured.await.unwrap();
    assert!(raw.starts_with("POST /items HTTP/1.1"));
    assert!(raw.to_ascii_lowercase().contains("x-trace: abc"));
    assert!(raw.ends_with(r#"{"name":"widget"}"#));
}

#[tokio::test]
async fn configured_client_sends_bearer_token() {
    let (url, captured) = serve_once(
        "HTTP/1.1 204 No Content\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    let config = Config {
        timeout: Duration::from_secs(5),
        user_agent: "fetchq-test".to_string(),
        bearer_token: Some(SecretString::from("sk-test")),
        ..Config::default()
    };
    let queue = Queue::new(HttpTransport::from_config(&config).unwrap()).unwrap();

    let response = queue.get(Request::new(url)).await.unwrap().unwrap();
    assert_eq!(response.status, 204);
    assert!(response.json.is_none());

    let raw = captured.await.unwrap().to_ascii_lowercase();
    assert!(raw.contains("authorization: bearer sk-test"));
    assert!(raw.contains("user-agent: fetchq-test"));
}

#[tokio::test]
async fn connection_failure_rejects_with_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let queue = Queue::new(HttpTransport::default()).unwrap();
    let error = queue
        .get(Request::new(format!("http://{addr}/")))
        .await
        .unwrap_err();
    assert!(matches!(error, fetchq::Error::Transport(_)));
}

#[tokio::test]
async fn custom_methods_reach_the_server() {
    let (url, captured) = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
    )
    .await;
    let queue = Queue::new(HttpTransport::default()).unwrap();

    let request = Request::new(url).method(Method::Other("PURGE".to_string()));
    let response = queue.push(request).await.unwrap().unwrap();

    assert_eq!(response.status, 200);
    assert!(captured.await.unwrap().starts_with("PURGE /items HTTP/1.1"));
}
