//! WebSocket transport against a served router and a real client.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use relaykit_gateway::app_state::AppState;
use relaykit_gateway::config;
use relaykit_gateway::router::build_router_with;
use relaykit_gateway::stream::Tick;
use relaykit_gateway::transport::accept_stream;

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn state(max_sessions: usize) -> AppState {
    let cfg = config::load_from_str(&format!(
        "version: 1\nruntime:\n  hostname: \"node-ws\"\nstreams:\n  default_interval_ms: 100\n  max_sessions: {max_sessions}\n"
    ))
    .unwrap();
    AppState::new(cfg)
}

async fn cpu_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let streams = state.streams().clone();
    let interval = state.default_stream_interval();
    accept_stream(ws, state.streams(), move |transport| {
        streams.open_periodic(transport, "cpu", interval, |_tick: Tick| async {
            Ok(json!({ "cpu": 42 }))
        })
    })
}

async fn serve(state: AppState) -> SocketAddr {
    let domain = Router::new().route("/stream/cpu", get(cpu_stream));
    let app = build_router_with(state, domain);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, res) = connect_async(format!("ws://{addr}/stream/cpu")).await.unwrap();
    assert_eq!(res.status().as_u16(), 101);
    ws
}

async fn next_json(ws: &mut Client) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("no frame in time")
        .expect("stream ended")
        .unwrap();
    assert!(msg.is_text(), "expected a text frame, got {msg:?}");
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

#[tokio::test]
async fn frames_are_pushed_as_text() {
    let state = state(0);
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    for _ in 0..2 {
        let frame = next_json(&mut ws).await;
        assert_eq!(frame["type"], "cpu");
        assert_eq!(frame["hostname"], "node-ws");
        assert_eq!(frame["data"], json!({ "cpu": 42 }));
        assert!(frame["timestamp"].as_str().unwrap().ends_with('Z'));
    }
    assert_eq!(state.streams().active_sessions(), 1);
}

#[tokio::test]
async fn client_close_frame_ends_session() {
    let state = state(0);
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    next_json(&mut ws).await;
    ws.close(None).await.unwrap();

    wait_until("session teardown", || state.streams().active_sessions() == 0).await;
    assert_eq!(
        state
            .metrics()
            .stream_sessions_closed
            .get(&[("mode", "periodic"), ("reason", "peer_closed")]),
        1
    );
}

#[tokio::test]
async fn server_close_sends_normal_close_frame() {
    let state = state(0);
    let addr = serve(state.clone()).await;
    let mut ws = connect(addr).await;

    next_json(&mut ws).await;
    state.streams().shutdown().await;
    assert_eq!(state.streams().active_sessions(), 0);

    let close = loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no close frame in time")
            .expect("stream ended before close frame")
            .unwrap();
        match msg {
            Message::Text(_) => continue,
            Message::Close(frame) => break frame,
            other => panic!("unexpected message {other:?}"),
        }
    };
    assert_eq!(close.map(|f| f.code), Some(CloseCode::Normal));

    // nothing is pushed after the close frame
    let rest = tokio::time::timeout(Duration::from_millis(300), ws.next()).await;
    if let Ok(Some(Ok(Message::Text(t)))) = rest {
        panic!("frame after close: {t}");
    }
}

#[tokio::test]
async fn over_capacity_is_refused_before_upgrade() {
    let state = state(1);
    let addr = serve(state.clone()).await;

    let mut first = connect(addr).await;
    next_json(&mut first).await;
    assert_eq!(state.streams().active_sessions(), 1);

    let err = connect_async(format!("ws://{addr}/stream/cpu"))
        .await
        .err()
        .expect("second session must be refused");
    let res = match err {
        WsError::Http(res) => res,
        other => panic!("expected an HTTP refusal, got {other:?}"),
    };
    assert_eq!(res.status().as_u16(), 503);
    if let Some(body) = res.body().as_ref().filter(|b| !b.is_empty()) {
        let body: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["data"], json!({ "code": "SERVICE_UNAVAILABLE" }));
    }

    assert_eq!(state.streams().active_sessions(), 1);
    first.close(None).await.unwrap();
    wait_until("slot release", || state.streams().admit().is_ok()).await;
}
