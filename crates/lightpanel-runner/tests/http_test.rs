//! HTTP front-end tests, driving the router in-process with `oneshot`.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lightpanel_protocol::PanelState;
use lightpanel_runner::http::{router, UNRECOGNISED};
use lightpanel_runner::{Link, LogIndicator, PanelActor, PanelHandle};
use tokio::io::{duplex, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tower::ServiceExt;

fn start() -> (Router, PanelHandle, DuplexStream) {
    let (mut link, link_events) = Link::new(None);
    let (ours, theirs) = duplex(1024);
    link.attach(ours);

    let (actor, handle) = PanelActor::new(link, link_events, Box::new(LogIndicator::default()), None);
    actor.spawn();
    (router(handle.clone()), handle, theirs)
}

async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn wait_for_state(handle: &PanelHandle, state: PanelState) {
    for _ in 0..200 {
        let snapshot = handle.snapshot().await.unwrap();
        if snapshot.state == state && snapshot.awaiting.is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("panel never reached {}", state);
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _handle, _panel) = start();

    let (status, body) = call(&app, "GET", "/lights/fancy").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, UNRECOGNISED);
}

#[tokio::test]
async fn test_state_endpoint() {
    let (app, _handle, _panel) = start();

    let (status, body) = call(&app, "GET", "/state").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["state"], "Disconnected");
    assert_eq!(json["awaiting"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_status_codes() {
    let (app, handle, panel) = start();
    let (reader, mut writer) = tokio::io::split(panel);
    let mut lines = BufReader::new(reader).lines();

    // Not connected yet
    assert_eq!(call(&app, "GET", "/disconnect").await.0, StatusCode::CONFLICT);

    // Validation failures
    assert_eq!(call(&app, "POST", "/tempo/0").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(call(&app, "POST", "/tempo/361").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(call(&app, "POST", "/led/3/0/on").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(call(&app, "POST", "/led/0/0/color/sparkly").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(call(&app, "POST", "/line/-1/reset").await.0, StatusCode::BAD_REQUEST);
    assert_eq!(call(&app, "POST", "/led/x/0/on").await.0, StatusCode::BAD_REQUEST);

    // Handshake
    assert_eq!(call(&app, "GET", "/connect").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("HELLO"));

    // Still waiting for READY
    assert_eq!(call(&app, "POST", "/led/1/3/on").await.0, StatusCode::CONFLICT);
    assert_eq!(call(&app, "GET", "/connect").await.0, StatusCode::CONFLICT);

    writer.write_all(b"READY\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    assert_eq!(call(&app, "POST", "/led/1/3/on").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ON 1 3"));
    writer.write_all(b"DONE\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    assert_eq!(call(&app, "POST", "/led/2/5/color/blue").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("SETCOLOR 2 5 0 0 255"));
    writer.write_all(b"DONE\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    let request = Request::builder()
        .method("POST")
        .uri("/led/0/1")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"color":"rgba(10,20,30,40)","on":true}"#))
        .unwrap();
    assert_eq!(send(&app, request).await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("ON 0 1 10 20 30 40"));
    writer.write_all(b"DONE\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    assert_eq!(call(&app, "POST", "/line/1/stop/yes").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("STOP 1 1"));
    writer.write_all(b"STOPPED 1\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    assert_eq!(call(&app, "POST", "/panel/off").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("PANELOFF"));
    writer.write_all(b"OFF\n").await.unwrap();
    wait_for_state(&handle, PanelState::Connected).await;

    assert_eq!(call(&app, "GET", "/disconnect").await.0, StatusCode::NO_CONTENT);
    assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("GOODBYE"));
    writer.write_all(b"SHUTDOWN\n").await.unwrap();
    wait_for_state(&handle, PanelState::Disconnected).await;
}

#[tokio::test]
async fn test_actor_gone() {
    let (app, handle, _panel) = start();
    handle.shutdown().await;

    let (status, _) = call(&app, "GET", "/state").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(call(&app, "POST", "/panel/off").await.0, StatusCode::SERVICE_UNAVAILABLE);
}
